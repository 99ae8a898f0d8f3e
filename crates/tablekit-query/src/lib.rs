//! # tablekit-query
//!
//! Compilers that turn declarative map keys into parameterized SQL fragments.
//!
//! Three small grammars are supported:
//!
//! - **Filter keys** (`"age >"`, `"id IN"`, `"name NOT LIKE"`) compile into
//!   `WHERE` conditions. See [`compile_key`] and [`compile_map`].
//! - **Order maps** (`{"name": "asc"}`) compile into an `ORDER BY` body.
//!   See [`compile_order`].
//! - **Delta keys** (`"score +="`) compile into `SET` assignments.
//!   See [`compile_delta`] and [`compile_delta_map`].
//!
//! Every compiler is pure and never fails: an entry that does not fit its
//! grammar is dropped and the reason is logged at `debug` level. Callers that
//! need the reason can use [`FilterExpression::parse`] / [`UpdateDelta::parse`]
//! which return a typed [`GrammarMiss`].
//!
//! Field names are always backtick-quoted; values only ever travel as bound
//! parameters in [`Fragment::params`].
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use tablekit_query::{compile_key, compile_map};
//!
//! let frag = compile_key("age >", &json!(18));
//! assert_eq!(frag.sql, "`age` > ?");
//! assert_eq!(frag.params, vec![json!(18)]);
//!
//! let filter = json!({"id IN": "1,2,3", "name LIKE": "a%"});
//! let clause = compile_map(filter.as_object().unwrap());
//! assert_eq!(clause.sql, "`id` IN (?, ?, ?) AND `name` LIKE ?");
//! ```

pub mod delta;
pub mod error;
pub mod filter;
pub mod fragment;
pub mod order;
pub mod page;

mod parser;

// Re-exports for convenience.
pub use delta::{compile_delta, compile_delta_map, ArithOp, UpdateDelta};
pub use error::GrammarMiss;
pub use filter::{compile_key, compile_map, FilterExpression, Operator};
pub use fragment::{quote_ident, Fragment};
pub use order::{compile_order, Direction, OrderSpec};
pub use page::{normalize_page, PageWindow};
