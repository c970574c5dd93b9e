//! # tally-core: Pricing & Settlement Logic for Tally POS
//!
//! This crate is the **heart** of Tally POS. It turns a cart line into a
//! priced snapshot and a set of lines into transaction totals, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               tally-db (CheckoutService)                        │   │
//! │  │    create / add / update / remove / complete / void             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ CatalogSnapshot + PricingContext       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │ price_item│  │   rules   │  │   │
//! │  │   │  Bundle   │  │   Rate    │  │ aggregate │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    SQLite (via tally-db)                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog entities, cart lines, transactions
//! - [`money`] - Money (cents) and Rate (basis points)
//! - [`pricing`] - Unit price, discount, promo, bundle tax, totals
//! - [`catalog`] - The lookup port pricing reads entities through
//! - [`listing`] - Display read models
//! - [`error`] - Domain error types
//! - [`validation`] - Input and catalog rules
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use tally_core::pricing::{price_item, PricedLine};
//! use tally_core::{CatalogSnapshot, LineSpec, Money, PricingContext, Product};
//!
//! let mut catalog = CatalogSnapshot::new();
//! catalog.insert_product(Product {
//!     id: "tea".into(),
//!     sku: "TEA".into(),
//!     name: "Tea".into(),
//!     has_variant: false,
//!     base_price: None,
//!     sell_price: Some(Money::from_cents(250)),
//!     discount: None,
//!     promos: vec![],
//!     variants: vec![],
//! });
//!
//! let line = LineSpec::product("tea", 2);
//! let ctx = PricingContext::for_lines(Utc::now(), Default::default(), std::slice::from_ref(&line));
//! let priced = price_item(&line, &catalog, &ctx).unwrap();
//!
//! assert_eq!(priced.subtotal(), Money::from_cents(500));
//! assert!(matches!(priced, PricedLine::Product(_)));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod error;
pub mod listing;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use catalog::{Catalog, CatalogRequest, CatalogSnapshot};
pub use error::{CoreError, CoreResult, ValidationError};
pub use listing::{ProductListing, VariantListing};
pub use money::{Money, Rate};
pub use pricing::PricingContext;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single transaction.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest unit amount (prices, fixed adjustments) in cents: $10 billion.
///
/// `MAX_AMOUNT_CENTS × MAX_ITEM_QUANTITY × MAX_CART_ITEMS`, doubled for
/// tax, stays far below `i64::MAX`, so line and transaction totals
/// cannot overflow.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;
