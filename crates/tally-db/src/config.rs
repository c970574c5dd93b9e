//! Application configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                   | Default          |
//! |----------------------------|------------------|
//! | `TALLY_DATABASE_PATH`      | `./tally.db`     |
//! | `TALLY_DB_MAX_CONNECTIONS` | `5`              |
//! | `TALLY_DB_ACQUIRE_TIMEOUT_SECS` | `30`        |
//! | `TALLY_LOG`                | `info,tally=debug,sqlx=warn` |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::pool::DbConfig;

/// Runtime configuration for binaries embedding the checkout service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Seconds a checkout waits for a pooled connection
    pub acquire_timeout_secs: u64,

    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = AppConfig {
            database_path: lookup("TALLY_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./tally.db")),

            max_connections: lookup("TALLY_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TALLY_DB_MAX_CONNECTIONS".to_string()))?,

            acquire_timeout_secs: lookup("TALLY_DB_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("TALLY_DB_ACQUIRE_TIMEOUT_SECS".to_string())
                })?,

            log_filter: lookup("TALLY_LOG")
                .unwrap_or_else(|| "info,tally=debug,sqlx=warn".to_string()),
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "TALLY_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        if config.acquire_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "TALLY_DB_ACQUIRE_TIMEOUT_SECS".to_string(),
            ));
        }

        if config.database_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired(
                "TALLY_DATABASE_PATH".to_string(),
            ));
        }

        Ok(config)
    }

    /// Pool settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.database_path, PathBuf::from("./tally.db"));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.db_config().max_connections, 5);
        assert_eq!(config.db_config().acquire_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TALLY_DATABASE_PATH", "/var/lib/tally/pos.db"),
            ("TALLY_DB_MAX_CONNECTIONS", "8"),
            ("TALLY_DB_ACQUIRE_TIMEOUT_SECS", "5"),
            ("TALLY_LOG", "warn"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/tally/pos.db"));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.db_config().acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values() {
        let err = AppConfig::from_lookup(lookup(&[("TALLY_DB_MAX_CONNECTIONS", "many")]));
        assert!(matches!(err, Err(ConfigError::InvalidValue(_))));

        let err = AppConfig::from_lookup(lookup(&[("TALLY_DB_MAX_CONNECTIONS", "0")]));
        assert!(matches!(err, Err(ConfigError::InvalidValue(_))));

        let err = AppConfig::from_lookup(lookup(&[("TALLY_DB_ACQUIRE_TIMEOUT_SECS", "0")]));
        assert!(matches!(err, Err(ConfigError::InvalidValue(_))));

        let err = AppConfig::from_lookup(lookup(&[("TALLY_DATABASE_PATH", "")]));
        assert!(matches!(err, Err(ConfigError::MissingRequired(_))));
    }
}
