//! # Transaction Totals
//!
//! Folds priced lines into the transaction's aggregate monetary state.
//!
//! Totals are always recomputed from every line, never patched with a
//! delta, so stored aggregates cannot drift from their items.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::pricing::item::PricedLine;
use crate::types::TransactionItem;

/// Aggregate monetary state of a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTotals {
    /// Σ (price - discount - promo) × quantity, tax excluded.
    pub total: Money,
    pub total_discount: Money,
    pub total_promo: Money,
    /// Σ bundle line tax.
    pub total_tax: Money,
}

impl TransactionTotals {
    #[inline]
    pub fn grand_total(&self) -> Money {
        self.total + self.total_tax
    }
}

/// Aggregates priced lines.
///
/// ```rust
/// use tally_core::money::Money;
/// use tally_core::pricing::{aggregate, PricedLine, ProductLine};
///
/// let line = PricedLine::Product(ProductLine {
///     product_id: "p1".into(),
///     variant_id: None,
///     price: Money::from_major(100),
///     discount: Money::from_major(10),
///     promo: Money::from_major(5),
///     promo_id: None,
///     quantity: 2,
/// });
///
/// let totals = aggregate(&[line]);
/// assert_eq!(totals.total, Money::from_major(170));
/// assert_eq!(totals.total_discount, Money::from_major(20));
/// assert_eq!(totals.total_promo, Money::from_major(10));
/// ```
pub fn aggregate(lines: &[PricedLine]) -> TransactionTotals {
    lines
        .iter()
        .fold(TransactionTotals::default(), |mut acc, line| {
            match line {
                PricedLine::Product(p) => {
                    acc.total += p.unit_net().multiply_quantity(p.quantity);
                    acc.total_discount += p.discount.multiply_quantity(p.quantity);
                    acc.total_promo += p.promo.multiply_quantity(p.quantity);
                }
                PricedLine::Bundle(b) => {
                    acc.total += b.price.multiply_quantity(b.quantity);
                    acc.total_tax += b.tax;
                }
            }
            acc
        })
}

/// Aggregates stored transaction items from their pricing snapshots.
pub fn aggregate_items(items: &[TransactionItem]) -> TransactionTotals {
    let lines: Vec<PricedLine> = items.iter().map(TransactionItem::priced_line).collect();
    aggregate(&lines)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::item::{BundleLine, ProductLine};

    fn product(price: i64, discount: i64, promo: i64, quantity: i64) -> PricedLine {
        PricedLine::Product(ProductLine {
            product_id: "p".to_string(),
            variant_id: None,
            price: Money::from_cents(price),
            discount: Money::from_cents(discount),
            promo: Money::from_cents(promo),
            promo_id: None,
            quantity,
        })
    }

    #[test]
    fn test_empty_cart() {
        let totals = aggregate(&[]);
        assert_eq!(totals, TransactionTotals::default());
        assert!(totals.grand_total().is_zero());
    }

    #[test]
    fn test_total_equals_sum_of_line_subtotals() {
        let lines = vec![
            product(1_000, 100, 0, 3),
            product(250, 0, 25, 4),
            product(999, 999, 0, 1),
            PricedLine::Bundle(BundleLine {
                bundle_id: "b".to_string(),
                price: Money::from_cents(5_000),
                tax: Money::from_cents(1_000),
                quantity: 2,
            }),
        ];

        let totals = aggregate(&lines);
        let expected: Money = lines.iter().map(PricedLine::subtotal).sum();

        assert_eq!(totals.total, expected);
        assert_eq!(totals.total.cents(), 2_700 + 900 + 0 + 10_000);
        assert_eq!(totals.total_discount.cents(), 300 + 999);
        assert_eq!(totals.total_promo.cents(), 100);
        assert_eq!(totals.total_tax.cents(), 1_000);
        assert_eq!(totals.grand_total().cents(), 14_600);
    }

    #[test]
    fn test_bundle_lines_carry_no_discount_or_promo() {
        let lines = vec![PricedLine::Bundle(BundleLine {
            bundle_id: "b".to_string(),
            price: Money::from_cents(700),
            tax: Money::zero(),
            quantity: 3,
        })];

        let totals = aggregate(&lines);
        assert!(totals.total_discount.is_zero());
        assert!(totals.total_promo.is_zero());
        assert_eq!(totals.total.cents(), 2_100);
    }
}
