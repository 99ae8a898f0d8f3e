//! The executable surface of a backend.
//!
//! A [`Gateway`] runs one parameterized statement at a time and reports
//! either the write outcome ([`ExecResult`]) or the fetched rows. Two
//! realizations exist:
//!
//! - [`MySqlGateway`]: pooled, natively asynchronous network backend.
//! - [`SqliteGateway`]: embedded synchronous backend, run on the blocking
//!   thread pool so it presents the same async contract.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::TableError;

mod mysql;
mod sqlite;

pub use mysql::MySqlGateway;
pub use sqlite::SqliteGateway;

/// A fetched row: column name → value.
pub type Row = Map<String, Value>;

/// SQL dialect spoken by a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Whether `UPDATE`/`DELETE` accept `ORDER BY ... LIMIT n` directly.
    pub fn supports_mutation_limit(self) -> bool {
        matches!(self, Dialect::MySql)
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub affected_rows: u64,
    /// Generated key, when the backend reports a positive one.
    pub last_insert_id: Option<i64>,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Run an INSERT / UPDATE / DELETE (or DDL) statement.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, TableError>;

    /// Run a SELECT and return every row.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, TableError>;

    /// Release the underlying connections. Further calls fail.
    async fn close(&self);
}

/// Log a statement about to run. `verbose` comes from the config's debug flag.
pub(crate) fn log_statement(verbose: bool, backend: &'static str, sql: &str, params: &[Value]) {
    if verbose {
        info!(backend, sql = %sql, params = ?params, "executing statement");
    } else {
        debug!(backend, sql = %sql, params = ?params, "executing statement");
    }
}

/// Bytes as a JSON string when they are valid UTF-8, else as a byte array.
pub(crate) fn bytes_to_json(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

pub(crate) fn positive_id(id: i64) -> Option<i64> {
    (id > 0).then_some(id)
}
