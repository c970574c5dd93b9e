//! # Promo Calculator
//!
//! Selects the promo that applies to a product line.
//!
//! ## First Match Wins
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  promos (stored order)        line: qty 3, cart {5, 7, 9}               │
//! │                                                                         │
//! │  1. "Buy 5"   min_qty 5            ✗ quantity                          │
//! │  2. "Combo"   requires {5, 8}      ✗ 8 not in cart                     │
//! │  3. "Trio"    min_qty 3, {5, 7}    ✓ ◄── APPLIED, stop here            │
//! │  4. "Half"    50%                  (never looked at)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only one promo ever applies per line, and it is the first eligible one,
//! not the most generous. Merchants order their promos accordingly.

use std::collections::BTreeSet;

use crate::money::Money;
use crate::types::Promo;

/// The promo chosen for a line and its per-unit amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PromoMatch<'a> {
    pub promo: &'a Promo,
    pub amount: Money,
}

/// Whether `promo` may apply to a line of `quantity` within a cart holding
/// `cart_product_ids`.
pub fn is_eligible(promo: &Promo, quantity: i64, cart_product_ids: &BTreeSet<String>) -> bool {
    if !promo.is_active || promo.min_quantity > quantity {
        return false;
    }

    promo.required_product_ids.is_subset(cart_product_ids)
}

/// Returns the first eligible promo and its amount on `price`.
pub fn select_promo<'a>(
    price: Money,
    quantity: i64,
    promos: &'a [Promo],
    cart_product_ids: &BTreeSet<String>,
) -> Option<PromoMatch<'a>> {
    promos
        .iter()
        .find(|p| is_eligible(p, quantity, cart_product_ids))
        .map(|promo| PromoMatch {
            promo,
            amount: promo.value.amount_of(price),
        })
}

/// Per-unit promo amount, zero when nothing is eligible.
pub fn promo_amount(
    price: Money,
    quantity: i64,
    promos: &[Promo],
    cart_product_ids: &BTreeSet<String>,
) -> Money {
    select_promo(price, quantity, promos, cart_product_ids)
        .map(|m| m.amount)
        .unwrap_or_default()
}

// =============================================================================
// Unit Tests
// =============================================================================
