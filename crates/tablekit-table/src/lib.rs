//! # tablekit-table
//!
//! A thin CRUD layer over two relational backends: a pooled MySQL server
//! (via `sqlx`) and an embedded SQLite file (via `rusqlite`).
//!
//! Filters, orders and update data are plain JSON maps whose keys carry the
//! operator (`"age >"`, `"id IN"`, `"score +="`); they are compiled by
//! [`tablekit_query`] into parameterized SQL and run through a [`Gateway`].
//!
//! ## Quick start
//!
//! ```no_run
//! use serde_json::json;
//! use tablekit_table::{registry, ConnectionConfig, SqliteConfig};
//!
//! # async fn demo() -> Result<(), tablekit_table::TableError> {
//! let db = registry().connect(&ConnectionConfig::Sqlite(SqliteConfig::new("shop.db")))?;
//! let users = db.table("users");
//!
//! let row = json!({"name": "ada", "age": 36});
//! let id = users.add_returning_id(row.as_object().unwrap()).await;
//!
//! let filter = json!({"age >=": 18});
//! let adults = users.gets(filter.as_object(), None, 0, 0, "*").await;
//! # let _ = (id, adults);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod statement;
pub mod table;

// Re-exports for convenience.
pub use config::{ConnectionConfig, MySqlConfig, SqliteConfig};
pub use database::Database;
pub use error::TableError;
pub use gateway::{Dialect, ExecResult, Gateway, MySqlGateway, Row, SqliteGateway};
pub use registry::{registry, GatewayRegistry};
pub use table::{Params, Table, Upserted};
pub use tablekit_query::{normalize_page, PageWindow};
