//! # Domain Types
//!
//! Entity graphs consumed by the pricing engine and the transaction records
//! it produces.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐        ┌─────────────────┐                        │
//! │  │    Product      │ owns   │ ProductVariant  │                        │
//! │  │  has_variant    │───────►│  sell_price     │                        │
//! │  │  sell_price?    │        └─────────────────┘                        │
//! │  │  discount?  ────┼──► Discount (window, Adjustment)                  │
//! │  │  promos[]   ────┼──► Promo (min qty, required products, Adjustment) │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐        ┌─────────────────┐                        │
//! │  │     Bundle      │ owns   │   BundleItem    │  (informational)       │
//! │  │  sell_price     │───────►│  product, qty   │                        │
//! │  │  tax?       ────┼──► Tax (Adjustment)                               │
//! │  └─────────────────┘        └─────────────────┘                        │
//! │                                                                         │
//! │  ┌─────────────────┐        ┌─────────────────┐                        │
//! │  │  Transaction    │ owns   │ TransactionItem │                        │
//! │  │  total, totals  │───────►│ price, discount │                        │
//! │  │  status         │        │ promo, tax      │                        │
//! │  └─────────────────┘        └─────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, Rate};
use crate::pricing::{BundleLine, PricedLine, ProductLine, TransactionTotals};

// =============================================================================
// Adjustment
// =============================================================================

/// The value of a discount, promo or tax.
///
/// The variant is the single source of truth for how the amount is read.
/// A small fixed amount is never reinterpreted as a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "amount", rename_all = "snake_case")]
pub enum Adjustment {
    /// A share of the base amount.
    Percentage(Rate),
    /// A flat amount per unit.
    Fixed(Money),
}

impl Adjustment {
    /// Returns the amount this adjustment takes from (or adds to) `base`.
    ///
    /// ```rust
    /// use tally_core::money::{Money, Rate};
    /// use tally_core::types::Adjustment;
    ///
    /// let pct = Adjustment::Percentage(Rate::from_percent(10));
    /// assert_eq!(pct.amount_of(Money::from_major(100)), Money::from_major(10));
    ///
    /// let fixed = Adjustment::Fixed(Money::from_major(3));
    /// assert_eq!(fixed.amount_of(Money::from_major(100)), Money::from_major(3));
    /// ```
    pub fn amount_of(&self, base: Money) -> Money {
        match self {
            Adjustment::Percentage(rate) => base.percentage(*rate),
            Adjustment::Fixed(amount) => *amount,
        }
    }

    #[inline]
    pub fn is_percentage(&self) -> bool {
        matches!(self, Adjustment::Percentage(_))
    }
}

// =============================================================================
// Discount / Promo / Tax
// =============================================================================

/// A product-level discount.
///
/// Active only while `is_active` is set and `now` falls inside the
/// (inclusive) window. A missing bound is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub id: String,
    pub name: String,
    pub value: Adjustment,
    pub is_active: bool,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

/// A promotion attached to one or more products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promo {
    pub id: String,
    pub name: String,
    pub value: Adjustment,
    pub is_active: bool,
    /// Minimum line quantity for the promo to apply.
    pub min_quantity: i64,
    /// Products that must all be present in the same cart.
    /// Empty means no co-purchase requirement.
    pub required_product_ids: BTreeSet<String>,
}

/// A tax attached to a bundle. Always in force when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    pub id: String,
    pub name: String,
    pub value: Adjustment,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale, loaded with its full pricing graph.
///
/// ## Price Fields
/// - `sell_price`: the selling price. Ignored when `has_variant` is set.
/// - `base_price`: cost / list price, informational only.
///
/// There is deliberately no stored "final price" here: the post-discount
/// price is recomputed on every pricing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub has_variant: bool,
    pub base_price: Option<Money>,
    pub sell_price: Option<Money>,
    pub discount: Option<Discount>,
    /// Candidate promos in their stored order (first match wins).
    pub promos: Vec<Promo>,
    pub variants: Vec<ProductVariant>,
}

impl Product {
    /// Finds one of this product's variants by id.
    pub fn variant(&self, variant_id: &str) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }
}

/// A variant of a product (size, flavour...).
///
/// Variants carry their own prices but never their own discount: the
/// parent product's discount applies to the variant's sell price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub base_price: Option<Money>,
    pub sell_price: Money,
}

// =============================================================================
// Bundle
// =============================================================================

/// A fixed-price group of products, priced at bundle level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: String,
    pub name: String,
    pub sell_price: Money,
    pub base_price: Option<Money>,
    pub tax: Option<Tax>,
    pub items: Vec<BundleItem>,
}

/// A product contained in a bundle. Does not affect the bundle's price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleItem {
    pub product_id: String,
    pub quantity: i64,
}

// =============================================================================
// Line Specification (inbound)
// =============================================================================

/// A free-form add-on recorded on a line ("milk: oat"). Not priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAttribute {
    pub name: String,
    pub value: String,
}

/// One requested cart line, as received from the caller.
///
/// Exactly one of `product_id` / `bundle_id` must be set; that is checked
/// when the line is priced, not when it is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineSpec {
    pub product_id: Option<String>,
    pub bundle_id: Option<String>,
    pub product_variant_id: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub attributes: Vec<LineAttribute>,
}

impl LineSpec {
    /// A product line.
    pub fn product(product_id: impl Into<String>, quantity: i64) -> Self {
        LineSpec {
            product_id: Some(product_id.into()),
            quantity,
            ..Default::default()
        }
    }

    /// A bundle line.
    pub fn bundle(bundle_id: impl Into<String>, quantity: i64) -> Self {
        LineSpec {
            bundle_id: Some(bundle_id.into()),
            quantity,
            ..Default::default()
        }
    }

    /// Sets the variant of a product line.
    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.product_variant_id = Some(variant_id.into());
        self
    }

    /// Adds a line attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(LineAttribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

// =============================================================================
// Transaction Status
// =============================================================================

/// The status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Lines can still be added, updated and removed.
    #[default]
    Draft,
    /// Settled for exactly the computed grand total.
    Completed,
    /// Cancelled.
    Voided,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Draft => "draft",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Voided => "voided",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Transaction Item
// =============================================================================

/// A priced line of a transaction.
///
/// ## Snapshot Pattern
/// `price`, `discount`, `promo` and `tax` are computed once when the line
/// is added or updated. A later catalog price change does not alter them.
///
/// `price`, `discount` and `promo` are unit amounts; `tax` is the line's
/// total tax (bundle lines only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub id: String,
    pub transaction_id: String,
    pub product_id: Option<String>,
    pub product_variant_id: Option<String>,
    pub bundle_id: Option<String>,
    pub quantity: i64,
    pub price: Money,
    pub discount: Money,
    pub promo: Money,
    pub tax: Money,
    /// The promo that won selection, if any.
    pub promo_id: Option<String>,
    pub attributes: Vec<LineAttribute>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionItem {
    /// Builds an item from a requested line and its pricing result.
    pub fn from_priced(
        id: impl Into<String>,
        transaction_id: impl Into<String>,
        spec: &LineSpec,
        line: &PricedLine,
        now: DateTime<Utc>,
    ) -> Self {
        let mut item = TransactionItem {
            id: id.into(),
            transaction_id: transaction_id.into(),
            product_id: None,
            product_variant_id: None,
            bundle_id: None,
            quantity: line.quantity(),
            price: Money::zero(),
            discount: Money::zero(),
            promo: Money::zero(),
            tax: Money::zero(),
            promo_id: None,
            attributes: spec.attributes.clone(),
            created_at: now,
            updated_at: now,
        };
        item.apply_priced(spec, line, now);
        item
    }

    /// Overwrites this item's reference and pricing snapshot.
    pub fn apply_priced(&mut self, spec: &LineSpec, line: &PricedLine, now: DateTime<Utc>) {
        match line {
            PricedLine::Product(p) => {
                self.product_id = Some(p.product_id.clone());
                self.product_variant_id = p.variant_id.clone();
                self.bundle_id = None;
                self.price = p.price;
                self.discount = p.discount;
                self.promo = p.promo;
                self.tax = Money::zero();
                self.promo_id = p.promo_id.clone();
            }
            PricedLine::Bundle(b) => {
                self.product_id = None;
                self.product_variant_id = None;
                self.bundle_id = Some(b.bundle_id.clone());
                self.price = b.price;
                self.discount = Money::zero();
                self.promo = Money::zero();
                self.tax = b.tax;
                self.promo_id = None;
            }
        }
        self.quantity = line.quantity();
        self.attributes = spec.attributes.clone();
        self.updated_at = now;
    }

    /// Rebuilds the tagged pricing result from the stored snapshot.
    pub fn priced_line(&self) -> PricedLine {
        match &self.bundle_id {
            Some(bundle_id) => PricedLine::Bundle(BundleLine {
                bundle_id: bundle_id.clone(),
                price: self.price,
                tax: self.tax,
                quantity: self.quantity,
            }),
            None => PricedLine::Product(ProductLine {
                product_id: self.product_id.clone().unwrap_or_default(),
                variant_id: self.product_variant_id.clone(),
                price: self.price,
                discount: self.discount,
                promo: self.promo,
                promo_id: self.promo_id.clone(),
                quantity: self.quantity,
            }),
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A transaction with its lines and aggregate monetary state.
///
/// ## Invariant
/// ```text
/// total          = Σ (price - discount - promo) × quantity
/// total_discount = Σ discount × quantity
/// total_promo    = Σ promo × quantity
/// total_tax      = Σ tax                      (bundle lines)
/// ```
/// Aggregates are overwritten from the items on every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub status: TransactionStatus,
    pub total: Money,
    pub total_discount: Money,
    pub total_promo: Money,
    pub total_tax: Money,
    pub items: Vec<TransactionItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Creates an empty draft transaction.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Transaction {
            id: id.into(),
            status: TransactionStatus::Draft,
            total: Money::zero(),
            total_discount: Money::zero(),
            total_promo: Money::zero(),
            total_tax: Money::zero(),
            items: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Amount due: net line total plus bundle tax.
    #[inline]
    pub fn grand_total(&self) -> Money {
        self.total + self.total_tax
    }

    /// Overwrites the aggregate fields.
    pub fn apply_totals(&mut self, totals: &TransactionTotals) {
        self.total = totals.total;
        self.total_discount = totals.total_discount;
        self.total_promo = totals.total_promo;
        self.total_tax = totals.total_tax;
    }

    /// Product ids present in the cart, for promo co-purchase checks.
    pub fn product_ids(&self) -> BTreeSet<String> {
        self.items
            .iter()
            .filter_map(|i| i.product_id.clone())
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjustment_serialized_shape() {
        let pct = Adjustment::Percentage(Rate::from_percent(10));
        let json = serde_json::to_value(pct).unwrap();
        assert_eq!(json, serde_json::json!({"type": "percentage", "amount": 1000}));

        let fixed: Adjustment =
            serde_json::from_value(serde_json::json!({"type": "fixed", "amount": 250})).unwrap();
        assert_eq!(fixed, Adjustment::Fixed(Money::from_cents(250)));
    }

    #[test]
    fn test_line_spec_builders() {
        let line = LineSpec::product("latte", 2)
            .with_variant("latte-large")
            .with_attribute("milk", "oat");

        assert_eq!(line.product_id.as_deref(), Some("latte"));
        assert_eq!(line.product_variant_id.as_deref(), Some("latte-large"));
        assert!(line.bundle_id.is_none());
        assert_eq!(line.attributes.len(), 1);

        let bundle = LineSpec::bundle("breakfast", 1);
        assert!(bundle.product_id.is_none());
        assert_eq!(bundle.bundle_id.as_deref(), Some("breakfast"));
    }

    #[test]
    fn test_item_round_trips_through_priced_line() {
        let now = Utc::now();
        let spec = LineSpec::product("p1", 3);
        let line = PricedLine::Product(ProductLine {
            product_id: "p1".to_string(),
            variant_id: None,
            price: Money::from_cents(1000),
            discount: Money::from_cents(100),
            promo: Money::from_cents(50),
            promo_id: Some("promo-1".to_string()),
            quantity: 3,
        });

        let item = TransactionItem::from_priced("i1", "t1", &spec, &line, now);
        assert_eq!(item.quantity, 3);
        assert_eq!(item.promo_id.as_deref(), Some("promo-1"));
        assert_eq!(item.priced_line(), line);
    }

    #[test]
    fn test_bundle_item_snapshot() {
        let now = Utc::now();
        let spec = LineSpec::bundle("b1", 2);
        let line = PricedLine::Bundle(BundleLine {
            bundle_id: "b1".to_string(),
            price: Money::from_major(50),
            tax: Money::from_major(10),
            quantity: 2,
        });

        let item = TransactionItem::from_priced("i1", "t1", &spec, &line, now);
        assert!(item.product_id.is_none());
        assert_eq!(item.discount, Money::zero());
        assert_eq!(item.tax, Money::from_major(10));
        assert_eq!(item.priced_line(), line);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TransactionStatus::Draft.to_string(), "draft");
        assert_eq!(TransactionStatus::default(), TransactionStatus::Draft);
    }
}
