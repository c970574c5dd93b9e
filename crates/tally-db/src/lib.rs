//! # tally-db: Storage & Checkout Layer for Tally POS
//!
//! This crate persists the catalog and transactions in SQLite and runs
//! every cart mutation through the pure pricing engine in `tally-core`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Data Flow                              │
//! │                                                                         │
//! │  Caller (terminal UI, seed binary, tests)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Checkout    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (checkout.rs) │    │               │    │  (embedded)  │  │   │
//! │  │   │               │───►│ CatalogRepo   │    │ 001_initial  │  │   │
//! │  │   │ add / update  │    │ TransactionRe │    │ _schema.sql  │  │   │
//! │  │   │ remove / pay  │    │               │    │              │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │ price_lines        │ SqlitePool (pool.rs)          │   │
//! │  └───────────┼────────────────────┼────────────────────────────────┘   │
//! │              ▼                    ▼                                     │
//! │        tally-core           SQLite Database                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Catalog and transaction storage
//! - [`checkout`] - Atomic cart mutations and settlement
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//! use tally_core::{LineSpec, Money};
//!
//! let db = Database::new(DbConfig::new("./tally.db")).await?;
//!
//! let txn = db.checkout().create_transaction(&[LineSpec::product("tea", 2)]).await?;
//! let txn = db.checkout().complete(&txn.id, txn.grand_total()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::CheckoutService;
pub use config::{AppConfig, ConfigError};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::transaction::TransactionRepository;
