use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use super::{bytes_to_json, log_statement, positive_id, Dialect, ExecResult, Gateway, Row};
use crate::error::TableError;

/// Embedded SQLite gateway.
///
/// `rusqlite` is synchronous, so every statement runs on Tokio's blocking
/// pool. The single connection sits behind a mutex: calls never run in
/// parallel against the same file handle.
pub struct SqliteGateway {
    conn: Arc<Mutex<Option<Connection>>>,
    debug: bool,
}

impl SqliteGateway {
    /// Opens (or creates) a SQLite database at the given file path.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path, debug: bool) -> Result<Self, TableError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        debug!("Opened SQLite gateway at {}", path.display());
        Ok(Self::from_connection(conn, debug))
    }

    /// Opens an in-memory SQLite database (useful for testing).
    pub fn open_memory() -> Result<Self, TableError> {
        Self::open_memory_with(false)
    }

    pub fn open_memory_with(debug: bool) -> Result<Self, TableError> {
        let conn = Connection::open_in_memory()?;
        debug!("Opened in-memory SQLite gateway");
        Ok(Self::from_connection(conn, debug))
    }

    fn from_connection(conn: Connection, debug: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            debug,
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, TableError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, TableError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            match guard.as_ref() {
                Some(conn) => f(conn),
                None => Err(TableError::Closed),
            }
        })
        .await?
    }
}

#[async_trait]
impl Gateway for SqliteGateway {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, TableError> {
        log_statement(self.debug, "sqlite", sql, params);
        let sql = sql.to_owned();
        let params = params.to_vec();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let affected = stmt.execute(params_from_iter(params.iter().map(SqlParam)))?;
            Ok(ExecResult {
                affected_rows: affected as u64,
                last_insert_id: positive_id(conn.last_insert_rowid()),
            })
        })
        .await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, TableError> {
        log_statement(self.debug, "sqlite", sql, params);
        let sql = sql.to_owned();
        let params = params.to_vec();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let col_names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();

            let rows = stmt.query_map(params_from_iter(params.iter().map(SqlParam)), |row| {
                let mut map = Map::new();
                for (i, col_name) in col_names.iter().enumerate() {
                    map.insert(col_name.clone(), value_ref_to_json(row.get_ref(i)?));
                }
                Ok(map)
            })?;

            let mut result = Vec::new();
            for row_result in rows {
                result.push(row_result?);
            }
            debug!("Fetched {} rows", result.len());
            Ok(result)
        })
        .await
    }

    async fn close(&self) {
        let conn = Arc::clone(&self.conn);
        let closed = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(conn) = guard.take() {
                if let Err((_, e)) = conn.close() {
                    tracing::warn!(error = %e, "SQLite close failed");
                }
            }
        })
        .await;
        if let Err(e) = closed {
            tracing::warn!(error = %e, "SQLite close task failed");
        }
    }
}

/// Binds a JSON value as a SQLite parameter. Booleans become 0/1, nested
/// arrays and objects are stored as their JSON text.
struct SqlParam<'a>(&'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Sql::Integer(*b as i64)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ToSqlOutput::Owned(Sql::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    ToSqlOutput::Owned(Sql::Real(f))
                } else {
                    ToSqlOutput::Owned(Sql::Text(n.to_string()))
                }
            }
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            other => ToSqlOutput::Owned(Sql::Text(other.to_string())),
        })
    }
}

fn value_ref_to_json(val: ValueRef<'_>) -> Value {
    match val {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Number(n.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => bytes_to_json(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn binds_every_json_kind() {
        let gw = SqliteGateway::open_memory().unwrap();
        gw.execute("CREATE TABLE t (a, b, c, d, e, f)", &[]).await.unwrap();
        let res = gw
            .execute(
                "INSERT INTO t VALUES (?, ?, ?, ?, ?, ?)",
                &[json!(null), json!(true), json!(7), json!(2.5), json!("s"), json!([1, 2])],
            )
            .await
            .unwrap();
        assert_eq!(res.affected_rows, 1);
        assert_eq!(res.last_insert_id, Some(1));

        let rows = gw.query("SELECT * FROM t", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["a"], json!(null));
        assert_eq!(row["b"], json!(1));
        assert_eq!(row["c"], json!(7));
        assert_eq!(row["d"], json!(2.5));
        assert_eq!(row["e"], json!("s"));
        assert_eq!(row["f"], json!("[1,2]"));
    }

    #[tokio::test]
    async fn blobs_decode_to_text_or_bytes() {
        let gw = SqliteGateway::open_memory().unwrap();
        let rows = gw
            .query("SELECT X'6869' AS text_blob, X'FF00' AS raw_blob", &[])
            .await
            .unwrap();
        assert_eq!(rows[0]["text_blob"], json!("hi"));
        assert_eq!(rows[0]["raw_blob"], json!([255, 0]));
    }

    #[tokio::test]
    async fn closed_gateway_rejects_statements() {
        let gw = SqliteGateway::open_memory().unwrap();
        gw.close().await;
        assert!(gw.query("SELECT 1", &[]).await.is_err());
    }
}
