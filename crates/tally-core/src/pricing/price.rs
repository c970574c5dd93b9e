//! # Price Resolver
//!
//! Determines the unit selling price of a product line.
//!
//! ```text
//! has_variant?
//!   ├── yes ─► variant id given? ── no ──► MissingVariant
//!   │              │ yes
//!   │              ▼
//!   │          variant on product? ── no ──► VariantNotFound
//!   │              │ yes
//!   │              ▼
//!   │          variant.sell_price
//!   │
//!   └── no ──► product.sell_price (missing ──► Configuration)
//!
//! then: final_price = apply_discount(sell_price, product.discount, now)
//! ```
//!
//! The parent product's discount applies to a variant's own sell price.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::discount::apply_discount;
use crate::pricing::ensure_in_range;
use crate::types::{Adjustment, Product};

/// A resolved unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPrice {
    /// Pre-discount selling price. Stored as the line's `price`.
    pub sell_price: Money,
    /// Post-discount price, recomputed (never read from a cache).
    pub final_price: Money,
}

impl ResolvedPrice {
    /// Per-unit discount amount.
    #[inline]
    pub fn discount(&self) -> Money {
        self.sell_price - self.final_price
    }
}

/// Resolves the unit price for `product`, honouring variant overrides.
///
/// A variant id given for a product without variants is ignored.
pub fn resolve_unit_price(
    product: &Product,
    variant_id: Option<&str>,
    now: DateTime<Utc>,
) -> CoreResult<ResolvedPrice> {
    let sell_price = if product.has_variant {
        let variant_id = variant_id.ok_or_else(|| CoreError::MissingVariant {
            product_id: product.id.clone(),
        })?;

        product
            .variant(variant_id)
            .ok_or_else(|| CoreError::VariantNotFound {
                product_id: product.id.clone(),
                variant_id: variant_id.to_string(),
            })?
            .sell_price
    } else {
        product.sell_price.ok_or_else(|| {
            CoreError::Configuration(format!("product {} has no sell price", product.id))
        })?
    };

    ensure_in_range("sell price", &product.id, sell_price)?;
    if let Some(Adjustment::Fixed(amount)) = product.discount.as_ref().map(|d| d.value) {
        ensure_in_range("discount", &product.id, amount)?;
    }

    Ok(ResolvedPrice {
        sell_price,
        final_price: apply_discount(sell_price, product.discount.as_ref(), now),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Rate;
    use crate::types::{Adjustment, Discount, ProductVariant};

    fn product(sell_cents: Option<i64>) -> Product {
        Product {
            id: "tea".to_string(),
            sku: "TEA".to_string(),
            name: "Iced Tea".to_string(),
            has_variant: false,
            base_price: None,
            sell_price: sell_cents.map(Money::from_cents),
            discount: None,
            promos: vec![],
            variants: vec![],
        }
    }

    fn with_variants(mut p: Product) -> Product {
        p.has_variant = true;
        // A stale direct price must be ignored when variants exist.
        p.sell_price = Some(Money::from_cents(1));
        p.variants = vec![
            ProductVariant {
                id: "tea-s".to_string(),
                product_id: p.id.clone(),
                name: "Small".to_string(),
                base_price: None,
                sell_price: Money::from_cents(300),
            },
            ProductVariant {
                id: "tea-l".to_string(),
                product_id: p.id.clone(),
                name: "Large".to_string(),
                base_price: Some(Money::from_cents(150)),
                sell_price: Money::from_cents(500),
            },
        ];
        p
    }

    #[test]
    fn test_simple_product_price() {
        let p = product(Some(10_000));
        let resolved = resolve_unit_price(&p, None, Utc::now()).unwrap();

        assert_eq!(resolved.sell_price.cents(), 10_000);
        assert_eq!(resolved.final_price.cents(), 10_000);
        assert!(resolved.discount().is_zero());
    }

    #[test]
    fn test_variant_price_overrides_product() {
        let p = with_variants(product(None));
        let resolved = resolve_unit_price(&p, Some("tea-l"), Utc::now()).unwrap();
        assert_eq!(resolved.sell_price.cents(), 500);
    }

    #[test]
    fn test_parent_discount_applies_to_variant() {
        let mut p = with_variants(product(None));
        p.discount = Some(Discount {
            id: "d".to_string(),
            name: "20% off".to_string(),
            value: Adjustment::Percentage(Rate::from_percent(20)),
            is_active: true,
            start_at: None,
            end_at: None,
        });

        let resolved = resolve_unit_price(&p, Some("tea-s"), Utc::now()).unwrap();
        assert_eq!(resolved.sell_price.cents(), 300);
        assert_eq!(resolved.final_price.cents(), 240);
        assert_eq!(resolved.discount().cents(), 60);
    }

    #[test]
    fn test_missing_variant() {
        let p = with_variants(product(None));
        let err = resolve_unit_price(&p, None, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::MissingVariant { .. }));
    }

    #[test]
    fn test_unknown_variant() {
        let p = with_variants(product(None));
        let err = resolve_unit_price(&p, Some("tea-xxl"), Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::VariantNotFound { ref variant_id, .. } if variant_id == "tea-xxl"
        ));
    }

    #[test]
    fn test_product_without_price_is_configuration_error() {
        let p = product(None);
        let err = resolve_unit_price(&p, None, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn test_variant_id_ignored_without_variants() {
        let p = product(Some(700));
        let resolved = resolve_unit_price(&p, Some("anything"), Utc::now()).unwrap();
        assert_eq!(resolved.sell_price.cents(), 700);
    }
}
