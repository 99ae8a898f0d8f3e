use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, instrument};

use crate::config::ConnectionConfig;
use crate::error::TableError;
use crate::gateway::{Gateway, MySqlGateway, SqliteGateway};
use crate::table::Table;

/// One open gateway plus the [`Table`] handles created over it.
///
/// Table handles are cached by name: asking twice for `"users"` returns the
/// same `Arc<Table>`, so every caller shares its `last_insert_id`.
pub struct Database {
    gateway: Arc<dyn Gateway>,
    tables: DashMap<String, Arc<Table>>,
}

impl Database {
    /// Validate `config` and build its gateway. MySQL pools connect lazily,
    /// so this never blocks on the network; outside a Tokio runtime a MySQL
    /// config fails with [`TableError::Config`].
    #[instrument(skip_all)]
    pub fn open(config: &ConnectionConfig) -> Result<Self, TableError> {
        config.validate()?;
        let gateway: Arc<dyn Gateway> = match config {
            ConnectionConfig::Mysql(cfg) => Arc::new(MySqlGateway::connect_lazy(cfg)?),
            ConnectionConfig::Sqlite(cfg) if cfg.path == ":memory:" => {
                Arc::new(SqliteGateway::open_memory_with(cfg.debug)?)
            }
            ConnectionConfig::Sqlite(cfg) => {
                Arc::new(SqliteGateway::open(Path::new(&cfg.path), cfg.debug)?)
            }
        };
        info!(dialect = ?gateway.dialect(), "Database opened");
        Ok(Self::with_gateway(gateway))
    }

    /// Wrap an already built gateway.
    pub fn with_gateway(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            tables: DashMap::new(),
        }
    }

    /// Handle for `name`, created on first use.
    pub fn table(&self, name: &str) -> Arc<Table> {
        if let Some(table) = self.tables.get(name) {
            return Arc::clone(table.value());
        }
        let entry = self
            .tables
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Table::new(name, Arc::clone(&self.gateway))));
        Arc::clone(entry.value())
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    /// Names of the tables handed out so far.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|e| e.key().clone()).collect()
    }

    /// Close the gateway. Table handles stay alive but every call on them
    /// fails (or returns its neutral value) from now on.
    pub async fn close(&self) {
        self.gateway.close().await;
        info!(tables = self.tables.len(), "Database closed");
    }
}
