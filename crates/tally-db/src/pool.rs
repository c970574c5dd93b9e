//! # Database Pool Management
//!
//! Opens the SQLite store behind the checkout service and hands out
//! repositories that share one pool.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AppConfig::from_env()                                                  │
//! │       │ db_config()                                                     │
//! │       ▼                                                                 │
//! │  DbConfig { path, max_connections, acquire_timeout, ... }               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new ──► open file (WAL, foreign keys) ──► migrate            │
//! │       │                                                                 │
//! │       ├──► catalog()       CatalogRepository      (reads + inserts)     │
//! │       ├──► transactions()  TransactionRepository  (reads)               │
//! │       └──► checkout()      CheckoutService        (one SQL tx / call)   │
//! │                                                                         │
//! │  Database::close ──► waits for checked-out connections, then shuts     │
//! │                      the pool                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A checkout mutation holds its connection for the whole
//! read-price-write cycle, so `max_connections` bounds how many carts can
//! be mutated at once.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::checkout::CheckoutService;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::repository::transaction::TransactionRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/tally/pos.db")
///     .max_connections(4)
///     .acquire_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first open.
    pub database_path: PathBuf,

    /// Upper bound on open connections. Default 5.
    pub max_connections: u32,

    /// Connections kept open while idle. Default 1.
    pub min_connections: u32,

    /// How long a caller waits for a free connection. Default 30s.
    pub acquire_timeout: Duration,

    /// Idle connections above the minimum close after this. Default 10m.
    pub idle_timeout: Duration,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// A private in-memory store for tests.
    ///
    /// Each connection to `:memory:` sees its own database, so the pool is
    /// capped at one connection: release anything acquired by hand before
    /// calling a repository method.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the store.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./tally.db")).await?;
///
/// let txn = db.checkout().create_transaction(&[LineSpec::product("tea", 2)]).await?;
/// let listing = db.catalog().listing("tea", Utc::now()).await?;
/// db.close().await;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and brings the schema up to date.
    ///
    /// Foreign keys are switched on per connection: variants, bundle items
    /// and transaction items rely on `ON DELETE CASCADE`.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            max_connections = config.max_connections,
            "Opening database"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!("Pool connected");

        migrations::run_migrations(&pool).await?;
        info!("Database ready");

        Ok(Database { pool })
    }

    /// Raw pool, for queries outside the repositories.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.pool.clone())
    }

    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(self.pool.clone())
    }

    /// Shuts the pool down. Every handle cloned from this one stops working.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert_eq!(db.catalog().count_products().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_database_rejects_queries() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        db.close().await;
        assert!(catalog.count_products().await.is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/pos.db")
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));
    }
}
