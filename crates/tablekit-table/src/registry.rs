//! Process-wide registry of open databases, keyed by connection config.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::database::Database;
use crate::error::TableError;

/// Maps serialized configs to their [`Database`]. Equal configs always get
/// the same instance, so a pool is created once per distinct config.
pub struct GatewayRegistry {
    entries: DashMap<String, Arc<Database>>,
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the database for `config`, opening it on first use. A config
    /// that fails validation is never cached. MySQL configs must be
    /// connected from inside a Tokio runtime.
    pub fn connect(&self, config: &ConnectionConfig) -> Result<Arc<Database>, TableError> {
        let key = config.cache_key()?;
        match self.entries.entry(key) {
            Entry::Occupied(e) => {
                debug!("Reusing cached database");
                Ok(Arc::clone(e.get()))
            }
            Entry::Vacant(e) => {
                let db = Arc::new(Database::open(config)?);
                info!(dialect = ?db.gateway().dialect(), "Registered new database");
                Ok(Arc::clone(e.insert(db).value()))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry and close its gateway. Handles still held by
    /// callers stop working; a later `connect` opens a fresh database.
    pub async fn shutdown(&self) {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        let mut closed = 0usize;
        for key in keys {
            if let Some((_, db)) = self.entries.remove(&key) {
                db.close().await;
                closed += 1;
            }
        }
        info!(closed, "Gateway registry shut down");
    }
}

static REGISTRY: Lazy<GatewayRegistry> = Lazy::new(GatewayRegistry::new);

/// The process-wide [`GatewayRegistry`].
pub fn registry() -> &'static GatewayRegistry {
    &REGISTRY
}
