//! # Discount Calculator
//!
//! Applies a product's discount to a selling price.
//!
//! ## Canonical Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  finalPrice = max(sellPrice - adjustment(sellPrice), 0)   if active    │
//! │             = sellPrice                                   otherwise    │
//! │                                                                         │
//! │  discount   = sellPrice - finalPrice                                   │
//! │                                                                         │
//! │  e.g. $100.00, 10%  → finalPrice $90.00, discount $10.00               │
//! │       $5.00, $8 off → finalPrice $0.00,  discount $5.00  (clamped)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The discount amount is always derived from the clamped final price, so
//! it can never exceed the price it was taken from.

use chrono::{DateTime, Utc};

use crate::money::Money;
use crate::types::Discount;

/// Whether a discount is in force at `now`.
///
/// Both window bounds are inclusive: a discount whose `end_at` equals
/// `now` is still active.
pub fn is_active(discount: &Discount, now: DateTime<Utc>) -> bool {
    if !discount.is_active {
        return false;
    }

    let started = discount.start_at.map_or(true, |start| now >= start);
    let not_ended = discount.end_at.map_or(true, |end| now <= end);

    started && not_ended
}

/// Returns the post-discount unit price, floored at zero.
///
/// ```rust
/// use chrono::Utc;
/// use tally_core::money::{Money, Rate};
/// use tally_core::pricing::discount::apply_discount;
/// use tally_core::types::{Adjustment, Discount};
///
/// let ten_off = Discount {
///     id: "d1".into(),
///     name: "10% off".into(),
///     value: Adjustment::Percentage(Rate::from_percent(10)),
///     is_active: true,
///     start_at: None,
///     end_at: None,
/// };
///
/// let final_price = apply_discount(Money::from_major(100), Some(&ten_off), Utc::now());
/// assert_eq!(final_price, Money::from_major(90));
/// ```
pub fn apply_discount(
    sell_price: Money,
    discount: Option<&Discount>,
    now: DateTime<Utc>,
) -> Money {
    match discount {
        Some(d) if is_active(d, now) => (sell_price - d.value.amount_of(sell_price)).clamp_to_zero(),
        _ => sell_price,
    }
}

/// Returns the per-unit discount amount for a selling price.
pub fn discount_amount(
    sell_price: Money,
    discount: Option<&Discount>,
    now: DateTime<Utc>,
) -> Money {
    sell_price - apply_discount(sell_price, discount, now)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Rate;
    use crate::types::Adjustment;
    use chrono::{Duration, TimeZone};

    fn discount(value: Adjustment) -> Discount {
        Discount {
            id: "d1".to_string(),
            name: "Test discount".to_string(),
            value,
            is_active: true,
            start_at: None,
            end_at: None,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_no_discount_keeps_price() {
        let price = Money::from_major(100);
        assert_eq!(apply_discount(price, None, noon()), price);
        assert_eq!(discount_amount(price, None, noon()), Money::zero());
    }

    #[test]
    fn test_percentage_discount() {
        let d = discount(Adjustment::Percentage(Rate::from_percent(10)));
        let price = Money::from_major(100);

        assert_eq!(apply_discount(price, Some(&d), noon()), Money::from_major(90));
        assert_eq!(discount_amount(price, Some(&d), noon()), Money::from_major(10));
    }

    #[test]
    fn test_fixed_discount() {
        let d = discount(Adjustment::Fixed(Money::from_cents(250)));
        let price = Money::from_major(10);

        assert_eq!(apply_discount(price, Some(&d), noon()).cents(), 750);
        assert_eq!(discount_amount(price, Some(&d), noon()).cents(), 250);
    }

    #[test]
    fn test_fixed_discount_larger_than_price_clamps() {
        let d = discount(Adjustment::Fixed(Money::from_major(8)));
        let price = Money::from_major(5);

        assert_eq!(apply_discount(price, Some(&d), noon()), Money::zero());
        assert_eq!(discount_amount(price, Some(&d), noon()), price);
    }

    #[test]
    fn test_inactive_flag_disables_discount() {
        let mut d = discount(Adjustment::Percentage(Rate::from_percent(50)));
        d.is_active = false;

        let price = Money::from_major(20);
        assert_eq!(apply_discount(price, Some(&d), noon()), price);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let now = noon();
        let mut d = discount(Adjustment::Percentage(Rate::from_percent(10)));
        d.start_at = Some(now - Duration::days(1));
        d.end_at = Some(now);

        assert!(is_active(&d, now));
        assert!(!is_active(&d, now + Duration::nanoseconds(1)));

        d.start_at = Some(now);
        assert!(is_active(&d, now));
        assert!(!is_active(&d, now - Duration::nanoseconds(1)));
    }

    #[test]
    fn test_open_ended_windows() {
        let now = noon();
        let mut d = discount(Adjustment::Percentage(Rate::from_percent(10)));

        d.start_at = Some(now + Duration::hours(1));
        assert!(!is_active(&d, now));

        d.start_at = None;
        d.end_at = Some(now - Duration::hours(1));
        assert!(!is_active(&d, now));

        d.end_at = None;
        assert!(is_active(&d, now));
    }

    #[test]
    fn test_final_price_never_negative() {
        let now = noon();
        let prices = [0, 1, 99, 100, 5_000, 1_000_000];
        let adjustments = [
            Adjustment::Percentage(Rate::from_bps(0)),
            Adjustment::Percentage(Rate::from_bps(3333)),
            Adjustment::Percentage(Rate::FULL),
            Adjustment::Fixed(Money::zero()),
            Adjustment::Fixed(Money::from_cents(1)),
            Adjustment::Fixed(Money::from_cents(2_000_000)),
        ];

        for cents in prices {
            for value in adjustments {
                let d = discount(value);
                let price = Money::from_cents(cents);
                let final_price = apply_discount(price, Some(&d), now);
                assert!(!final_price.is_negative(), "{price} with {value:?}");
                assert!(discount_amount(price, Some(&d), now) <= price);
            }
        }
    }
}
