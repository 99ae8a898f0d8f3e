use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row as _, TypeInfo, ValueRef as _};
use tracing::{debug, instrument};

use super::{bytes_to_json, log_statement, Dialect, ExecResult, Gateway, Row};
use crate::config::MySqlConfig;
use crate::error::TableError;

/// Pooled MySQL gateway.
///
/// The pool caps concurrent connections at [`MySqlConfig::limit`]; requests
/// beyond the cap wait for a free connection. Connections are opened lazily,
/// so construction never touches the network.
pub struct MySqlGateway {
    pool: MySqlPool,
    debug: bool,
}

impl MySqlGateway {
    /// Build a lazily connecting pool. Fails with [`TableError::Config`]
    /// when called outside a Tokio runtime.
    #[instrument(skip_all, fields(host = %config.host, port = config.port))]
    pub fn connect_lazy(config: &MySqlConfig) -> Result<Self, TableError> {
        config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(TableError::Config(
                "MySQL pool must be created inside a Tokio runtime".into(),
            ));
        }

        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .charset(&config.charset);
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        if let Some(database) = &config.database {
            options = options.database(database);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(config.limit)
            .connect_lazy_with(options);

        debug!("Created MySQL pool with limit {}", config.limit);
        Ok(Self {
            pool,
            debug: config.debug,
        })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: MySqlPool, debug: bool) -> Self {
        Self { pool, debug }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl Gateway for MySqlGateway {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, TableError> {
        log_statement(self.debug, "mysql", sql, params);
        let result = bind_all(sqlx::query(sql), params)
            .execute(&self.pool)
            .await?;
        let id = result.last_insert_id();
        Ok(ExecResult {
            affected_rows: result.rows_affected(),
            last_insert_id: i64::try_from(id).ok().filter(|id| *id > 0),
        })
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, TableError> {
        log_statement(self.debug, "mysql", sql, params);
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        debug!("Fetched {} rows", rows.len());
        rows.iter().map(row_to_json).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A JSON value narrowed to the type it is bound as.
#[derive(Debug, Clone, PartialEq)]
enum MySqlParam {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl From<&Value> for MySqlParam {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => MySqlParam::Null,
            Value::Bool(b) => MySqlParam::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MySqlParam::Int(i)
                } else if let Some(u) = n.as_u64() {
                    MySqlParam::UInt(u)
                } else {
                    MySqlParam::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => MySqlParam::Text(s.clone()),
            // Arrays and objects travel as JSON text.
            other => MySqlParam::Text(other.to_string()),
        }
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
    for value in params {
        query = match MySqlParam::from(value) {
            MySqlParam::Null => query.bind(None::<String>),
            MySqlParam::Bool(b) => query.bind(b),
            MySqlParam::Int(i) => query.bind(i),
            MySqlParam::UInt(u) => query.bind(u),
            MySqlParam::Float(f) => query.bind(f),
            MySqlParam::Text(s) => query.bind(s),
        };
    }
    query
}

/// Decode a row by column type. The declared type picks the Rust type and
/// decoding skips sqlx's strict compatibility check.
fn row_to_json(row: &MySqlRow) -> Result<Row, TableError> {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        if raw.is_null() {
            map.insert(column.name().to_string(), Value::Null);
            continue;
        }
        let type_name = column.type_info().name();
        let value = decode_column(row, i, type_name).map_err(|e| {
            TableError::Decode(format!("column `{}` ({type_name}): {e}", column.name()))
        })?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

/// Rust type a MySQL column is decoded through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Signed,
    Unsigned,
    Float,
    Double,
    /// Exact decimals keep their textual form.
    Decimal,
    Date,
    Time,
    DateTime,
    Json,
    Bytes,
    Text,
}

impl ColumnKind {
    fn of(type_name: &str) -> Self {
        let base = type_name.trim_end_matches(" UNSIGNED");
        let unsigned = base.len() != type_name.len();
        match base {
            "BOOLEAN" => ColumnKind::Bool,
            "YEAR" | "BIT" => ColumnKind::Unsigned,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" if unsigned => {
                ColumnKind::Unsigned
            }
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => ColumnKind::Signed,
            "FLOAT" => ColumnKind::Float,
            "DOUBLE" => ColumnKind::Double,
            "DECIMAL" => ColumnKind::Decimal,
            "DATE" => ColumnKind::Date,
            "TIME" => ColumnKind::Time,
            "DATETIME" | "TIMESTAMP" => ColumnKind::DateTime,
            "JSON" => ColumnKind::Json,
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB"
            | "GEOMETRY" => ColumnKind::Bytes,
            _ => ColumnKind::Text,
        }
    }
}

fn decode_column(row: &MySqlRow, i: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    Ok(match ColumnKind::of(type_name) {
        ColumnKind::Bool => Value::Bool(row.try_get_unchecked::<bool, _>(i)?),
        ColumnKind::Signed => Value::from(row.try_get_unchecked::<i64, _>(i)?),
        ColumnKind::Unsigned => Value::from(row.try_get_unchecked::<u64, _>(i)?),
        ColumnKind::Float => float(f64::from(row.try_get_unchecked::<f32, _>(i)?)),
        ColumnKind::Double => float(row.try_get_unchecked::<f64, _>(i)?),
        ColumnKind::Decimal | ColumnKind::Text => {
            Value::String(row.try_get_unchecked::<String, _>(i)?)
        }
        ColumnKind::Date => {
            Value::String(row.try_get_unchecked::<chrono::NaiveDate, _>(i)?.to_string())
        }
        ColumnKind::Time => {
            Value::String(row.try_get_unchecked::<chrono::NaiveTime, _>(i)?.to_string())
        }
        ColumnKind::DateTime => Value::String(
            row.try_get_unchecked::<chrono::NaiveDateTime, _>(i)?
                .format("%Y-%m-%d %H:%M:%S%.f")
                .to_string(),
        ),
        ColumnKind::Json => row.try_get_unchecked::<sqlx::types::Json<Value>, _>(i)?.0,
        ColumnKind::Bytes => bytes_to_json(&row.try_get_unchecked::<Vec<u8>, _>(i)?),
    })
}

fn float(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
