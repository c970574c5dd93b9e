//! # Bundle Pricer
//!
//! Bundles are priced at bundle level: their items never contribute a
//! price, and product discounts/promos do not apply. Only the bundle's
//! tax is added.
//!
//! ```text
//! price = sell_price × quantity
//! tax   = price × rate              (percentage)
//!       = amount × quantity         (fixed, per bundle)
//! total = price + tax
//! ```

use crate::error::CoreResult;
use crate::money::Money;
use crate::pricing::ensure_in_range;
use crate::types::{Adjustment, Bundle};
use crate::validation::validate_quantity;

/// Result of pricing a bundle line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundlePrice {
    /// Unit selling price of the bundle.
    pub sell_price: Money,
    /// Unit base price, informational.
    pub base_price: Option<Money>,
    /// `sell_price × quantity`.
    pub price: Money,
    /// Tax for the whole line.
    pub tax: Money,
    /// `price + tax`.
    pub total: Money,
}

/// Prices `quantity` units of `bundle`.
pub fn price_bundle(bundle: &Bundle, quantity: i64) -> CoreResult<BundlePrice> {
    validate_quantity(quantity)?;
    ensure_in_range("sell price", &bundle.id, bundle.sell_price)?;
    if let Some(Adjustment::Fixed(amount)) = bundle.tax.as_ref().map(|t| t.value) {
        ensure_in_range("tax", &bundle.id, amount)?;
    }

    let price = bundle.sell_price.multiply_quantity(quantity);

    let tax = match bundle.tax.as_ref().map(|t| t.value) {
        Some(Adjustment::Percentage(rate)) => price.percentage(rate),
        Some(Adjustment::Fixed(amount)) => amount.multiply_quantity(quantity),
        None => Money::zero(),
    };

    Ok(BundlePrice {
        sell_price: bundle.sell_price,
        base_price: bundle.base_price,
        price,
        tax,
        total: price + tax,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
