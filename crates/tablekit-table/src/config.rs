//! Connection configuration.
//!
//! A [`ConnectionConfig`] is plain data: it can be built in code,
//! deserialized from whatever config source the application uses, or read
//! from environment variables with [`ConnectionConfig::from_env`].
//!
//! | Variable                  | Default     | Description                          |
//! |---------------------------|-------------|--------------------------------------|
//! | `TABLEKIT_DRIVER`         | `mysql`     | `mysql` or `sqlite`                  |
//! | `TABLEKIT_MYSQL_HOST`     | `127.0.0.1` | MySQL host                           |
//! | `TABLEKIT_MYSQL_PORT`     | `3306`      | MySQL port                           |
//! | `TABLEKIT_MYSQL_USER`     | `root`      | MySQL user                           |
//! | `TABLEKIT_MYSQL_PASSWORD` | unset       | MySQL password                       |
//! | `TABLEKIT_MYSQL_DATABASE` | unset       | Default schema                       |
//! | `TABLEKIT_MYSQL_CHARSET`  | `utf8mb4`   | Connection charset                   |
//! | `TABLEKIT_MYSQL_LIMIT`    | `10`        | Pool size (max open connections)     |
//! | `TABLEKIT_SQLITE_PATH`    | `:memory:`  | SQLite database file                 |
//! | `TABLEKIT_DEBUG`          | `false`     | Log every statement at `info` level  |
//!
//! The serialized form of a config is the registry cache key, so two equal
//! configs always share one gateway.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// Which backend to connect to, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Mysql(MySqlConfig),
    Sqlite(SqliteConfig),
}

/// Pooled MySQL connection settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: Option<String>,
    pub charset: String,
    /// Pool size: maximum number of open connections.
    pub limit: u32,
    /// Log every statement at `info` instead of `debug`.
    pub debug: bool,
}

/// Embedded SQLite settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file, or `:memory:`.
    pub path: String,
    pub debug: bool,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3306,
            user: "root".into(),
            password: None,
            database: None,
            charset: "utf8mb4".into(),
            limit: 10,
            debug: false,
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".into(),
            debug: false,
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("limit", &self.limit)
            .field("debug", &self.debug)
            .finish()
    }
}

impl MySqlConfig {
    /// Load from `TABLEKIT_MYSQL_*`, applying defaults where a variable is
    /// absent or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host:     env_str("TABLEKIT_MYSQL_HOST", &defaults.host),
            port:     env_parse("TABLEKIT_MYSQL_PORT", defaults.port),
            user:     env_str("TABLEKIT_MYSQL_USER", &defaults.user),
            password: env_opt("TABLEKIT_MYSQL_PASSWORD"),
            database: env_opt("TABLEKIT_MYSQL_DATABASE"),
            charset:  env_str("TABLEKIT_MYSQL_CHARSET", &defaults.charset),
            limit:    env_parse("TABLEKIT_MYSQL_LIMIT", defaults.limit),
            debug:    env_bool("TABLEKIT_DEBUG"),
        }
    }

    pub fn validate(&self) -> Result<(), TableError> {
        if self.host.trim().is_empty() {
            return Err(TableError::Config("MySQL host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(TableError::Config("MySQL port must not be 0".into()));
        }
        if self.user.is_empty() {
            return Err(TableError::Config("MySQL user must not be empty".into()));
        }
        if self.limit == 0 {
            return Err(TableError::Config("MySQL pool limit must be at least 1".into()));
        }
        if self.charset.trim().is_empty() {
            return Err(TableError::Config("MySQL charset must not be empty".into()));
        }
        Ok(())
    }
}

impl SqliteConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            debug: false,
        }
    }

    pub fn from_env() -> Self {
        Self {
            path:  env_str("TABLEKIT_SQLITE_PATH", ":memory:"),
            debug: env_bool("TABLEKIT_DEBUG"),
        }
    }

    pub fn validate(&self) -> Result<(), TableError> {
        if self.path.trim().is_empty() {
            return Err(TableError::Config("SQLite path must not be empty".into()));
        }
        Ok(())
    }
}

impl ConnectionConfig {
    /// Load from `TABLEKIT_*` variables. Fails only on an unknown driver.
    pub fn from_env() -> Result<Self, TableError> {
        let driver = env_str("TABLEKIT_DRIVER", "mysql");
        match driver.to_ascii_lowercase().as_str() {
            "mysql" => Ok(ConnectionConfig::Mysql(MySqlConfig::from_env())),
            "sqlite" => Ok(ConnectionConfig::Sqlite(SqliteConfig::from_env())),
            other => Err(TableError::Config(format!("unknown driver '{other}'"))),
        }
    }

    pub fn validate(&self) -> Result<(), TableError> {
        match self {
            ConnectionConfig::Mysql(cfg) => cfg.validate(),
            ConnectionConfig::Sqlite(cfg) => cfg.validate(),
        }
    }

    pub fn debug(&self) -> bool {
        match self {
            ConnectionConfig::Mysql(cfg) => cfg.debug,
            ConnectionConfig::Sqlite(cfg) => cfg.debug,
        }
    }

    /// Canonical descriptor used as the registry key.
    pub fn cache_key(&self) -> Result<String, TableError> {
        serde_json::to_string(self)
            .map_err(|e| TableError::Config(format!("cannot serialize config: {e}")))
    }
}

fn env_bool(key: &str) -> bool {
    std::env::var(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = MySqlConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 3306);
        assert_eq!(cfg.charset, "utf8mb4");
        assert_eq!(cfg.limit, 10);
        assert!(cfg.validate().is_ok());
        assert!(SqliteConfig::default().validate().is_ok());
    }

    #[test]
    fn env_override_applied() {
        std::env::set_var("TABLEKIT_MYSQL_LIMIT", "32");
        let cfg = MySqlConfig::from_env();
        assert_eq!(cfg.limit, 32);
        std::env::remove_var("TABLEKIT_MYSQL_LIMIT");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let zero_pool = MySqlConfig { limit: 0, ..MySqlConfig::default() };
        assert!(matches!(zero_pool.validate(), Err(TableError::Config(_))));

        let no_host = MySqlConfig { host: " ".into(), ..MySqlConfig::default() };
        assert!(no_host.validate().is_err());

        assert!(ConnectionConfig::Sqlite(SqliteConfig::new("")).validate().is_err());
    }

    #[test]
    fn debug_output_redacts_password() {
        let cfg = MySqlConfig {
            password: Some("hunter2".into()),
            ..MySqlConfig::default()
        };
        let out = format!("{cfg:?}");
        assert!(!out.contains("hunter2"));
        assert!(out.contains("***"));
    }

    #[test]
    fn cache_key_distinguishes_configs() {
        let a = ConnectionConfig::Mysql(MySqlConfig::default());
        let b = ConnectionConfig::Mysql(MySqlConfig::default());
        let c = ConnectionConfig::Mysql(MySqlConfig { port: 3307, ..MySqlConfig::default() });
        assert_eq!(a.cache_key().unwrap(), b.cache_key().unwrap());
        assert_ne!(a.cache_key().unwrap(), c.cache_key().unwrap());
    }

    #[test]
    fn deserializes_tagged_config_with_defaults() {
        let cfg: ConnectionConfig =
            serde_json::from_str(r#"{"driver":"mysql","database":"shop","limit":4}"#).unwrap();
        match cfg {
            ConnectionConfig::Mysql(m) => {
                assert_eq!(m.database.as_deref(), Some("shop"));
                assert_eq!(m.limit, 4);
                assert_eq!(m.port, 3306);
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }
}
