//! # Repository Module
//!
//! Database repository implementations for Tally POS.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CatalogRepository                 TransactionRepository               │
//! │  ├── load(request) → snapshot      ├── get_by_id(id)                   │
//! │  ├── get_product / get_bundle      └── list_ids_by_status(status)      │
//! │  ├── listing(id, now)                                                  │
//! │  └── insert_product / _promo /     connection-level writes used by     │
//! │      _bundle (validated)           CheckoutService inside one SQL tx   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Catalog graphs and listings
//! - [`TransactionRepository`](transaction::TransactionRepository) - Transactions and items

pub mod catalog;
pub mod transaction;
