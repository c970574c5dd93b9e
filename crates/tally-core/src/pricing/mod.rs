//! # Pricing Engine
//!
//! Deterministic per-line pricing and transaction aggregation.
//!
//! ## Components (leaf-first)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   price::resolve_unit_price ──┐                                         │
//! │   discount::apply_discount ───┼──► item::price_item ──► totals::aggregate│
//! │   promo::select_promo ────────┤        ▲                                │
//! │   bundle::price_bundle ───────┘        │                                │
//! │                                   Catalog + PricingContext              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here reads the clock or touches storage: the entity graph comes
//! in through a [`Catalog`](crate::catalog::Catalog) and "now" through
//! [`PricingContext`].

pub mod bundle;
pub mod discount;
pub mod item;
pub mod price;
pub mod promo;
pub mod totals;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::LineSpec;
use crate::MAX_AMOUNT_CENTS;

pub use bundle::{price_bundle, BundlePrice};
pub use discount::{apply_discount, discount_amount, is_active};
pub use item::{line_target, price_item, price_lines, BundleLine, LineTarget, PricedLine, ProductLine};
pub use price::{resolve_unit_price, ResolvedPrice};
pub use promo::{promo_amount, select_promo, PromoMatch};
pub use totals::{aggregate, aggregate_items, TransactionTotals};

/// Inputs shared by every line of one pricing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingContext {
    /// Instant used for discount activity windows.
    pub now: DateTime<Utc>,
    /// Every product id present in the cart, for promo co-purchase checks.
    pub cart_product_ids: BTreeSet<String>,
}

impl PricingContext {
    /// A context with an empty cart.
    pub fn new(now: DateTime<Utc>) -> Self {
        PricingContext {
            now,
            cart_product_ids: BTreeSet::new(),
        }
    }

    /// A context whose cart holds `existing` plus every product referenced
    /// by `lines`.
    pub fn for_lines(now: DateTime<Utc>, existing: BTreeSet<String>, lines: &[LineSpec]) -> Self {
        let mut cart_product_ids = existing;
        cart_product_ids.extend(lines.iter().filter_map(|l| match line_target(l) {
            Ok(LineTarget::Product { product_id, .. }) => Some(product_id.to_string()),
            _ => None,
        }));

        PricingContext {
            now,
            cart_product_ids,
        }
    }
}

/// Rejects a catalog amount that would make line arithmetic overflow.
///
/// Stored catalogs are validated on insert; this covers snapshots built
/// in memory.
pub(crate) fn ensure_in_range(what: &str, owner: &str, amount: Money) -> CoreResult<()> {
    if amount.is_negative() || amount.cents() > MAX_AMOUNT_CENTS {
        return Err(CoreError::Configuration(format!(
            "{} {} of {} is outside 0..={}",
            what,
            amount,
            owner,
            Money::from_cents(MAX_AMOUNT_CENTS)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_merges_cart_products() {
        let existing: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        let lines = vec![LineSpec::product("b", 1), LineSpec::bundle("x", 1)];

        let ctx = PricingContext::for_lines(Utc::now(), existing, &lines);
        let ids: Vec<&str> = ctx.cart_product_ids.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_context_uses_trimmed_ids_of_valid_lines() {
        let mut both = LineSpec::product("c", 1);
        both.bundle_id = Some("x".to_string());
        let lines = vec![LineSpec::product(" 7 ", 1), both, LineSpec::product("  ", 1)];

        let ctx = PricingContext::for_lines(Utc::now(), BTreeSet::new(), &lines);
        let ids: Vec<&str> = ctx.cart_product_ids.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["7"]);
    }

    #[test]
    fn test_ensure_in_range() {
        assert!(ensure_in_range("price", "p", Money::from_cents(MAX_AMOUNT_CENTS)).is_ok());
        assert!(matches!(
            ensure_in_range("price", "p", Money::from_cents(MAX_AMOUNT_CENTS + 1)),
            Err(CoreError::Configuration(_))
        ));
        assert!(ensure_in_range("price", "p", Money::from_cents(-1)).is_err());
    }
}
