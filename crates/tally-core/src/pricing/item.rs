//! # Item Pricing
//!
//! Dispatches each cart line to the product path or the bundle path and
//! returns a tagged [`PricedLine`].
//!
//! ## Per-Line Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LineSpec                                                               │
//! │     │                                                                   │
//! │     ├── neither / both of product_id, bundle_id ──► InvalidLine        │
//! │     │                                                                   │
//! │     ├── product ──► catalog.product(id) ── missing ──► EntityNotFound  │
//! │     │                  │                                                │
//! │     │                  ▼                                                │
//! │     │            resolve_unit_price ──► price, final_price             │
//! │     │                  │                                                │
//! │     │                  ▼                                                │
//! │     │            discount = price - final_price                        │
//! │     │                  │                                                │
//! │     │                  ▼                                                │
//! │     │            select_promo(final_price, qty, promos, cart ids)      │
//! │     │                  │                                                │
//! │     │                  ▼                                                │
//! │     │            price - discount - promo < 0 ──► Configuration        │
//! │     │                  │                                                │
//! │     │                  ▼                                                │
//! │     │            PricedLine::Product                                    │
//! │     │                                                                   │
//! │     └── bundle ──► catalog.bundle(id) ──► price_bundle                 │
//! │                        │                                                │
//! │                        ▼                                                │
//! │                  PricedLine::Bundle                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::bundle::price_bundle;
use crate::pricing::price::resolve_unit_price;
use crate::pricing::promo::select_promo;
use crate::pricing::{ensure_in_range, PricingContext};
use crate::types::LineSpec;
use crate::validation::{validate_attributes, validate_quantity};

// =============================================================================
// Line Target
// =============================================================================

/// What a line refers to, once the product/bundle exclusivity is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTarget<'a> {
    Product {
        product_id: &'a str,
        variant_id: Option<&'a str>,
    },
    Bundle {
        bundle_id: &'a str,
    },
}

fn non_empty(id: &Option<String>) -> Option<&str> {
    id.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Checks that exactly one of product / bundle is referenced.
pub fn line_target(spec: &LineSpec) -> CoreResult<LineTarget<'_>> {
    match (non_empty(&spec.product_id), non_empty(&spec.bundle_id)) {
        (Some(product_id), None) => Ok(LineTarget::Product {
            product_id,
            variant_id: non_empty(&spec.product_variant_id),
        }),
        (None, Some(bundle_id)) => Ok(LineTarget::Bundle { bundle_id }),
        (Some(_), Some(_)) => Err(CoreError::InvalidLine {
            reason: "both product and bundle set".to_string(),
        }),
        (None, None) => Err(CoreError::InvalidLine {
            reason: "neither product nor bundle set".to_string(),
        }),
    }
}

// =============================================================================
// Priced Line
// =============================================================================

/// A priced product line. Amounts are per unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    pub product_id: String,
    pub variant_id: Option<String>,
    /// Pre-discount unit selling price.
    pub price: Money,
    pub discount: Money,
    pub promo: Money,
    pub promo_id: Option<String>,
    pub quantity: i64,
}

impl ProductLine {
    /// `price - discount - promo`.
    #[inline]
    pub fn unit_net(&self) -> Money {
        self.price - self.discount - self.promo
    }
}

/// A priced bundle line. `price` is per unit, `tax` is for the whole line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleLine {
    pub bundle_id: String,
    pub price: Money,
    pub tax: Money,
    pub quantity: i64,
}

/// The outcome of pricing one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricedLine {
    Product(ProductLine),
    Bundle(BundleLine),
}

impl PricedLine {
    pub fn quantity(&self) -> i64 {
        match self {
            PricedLine::Product(p) => p.quantity,
            PricedLine::Bundle(b) => b.quantity,
        }
    }

    /// Line subtotal before tax.
    pub fn subtotal(&self) -> Money {
        match self {
            PricedLine::Product(p) => p.unit_net().multiply_quantity(p.quantity),
            PricedLine::Bundle(b) => b.price.multiply_quantity(b.quantity),
        }
    }
}

// =============================================================================
// Orchestration
// =============================================================================

/// Prices a single line against `catalog`.
pub fn price_item<C>(spec: &LineSpec, catalog: &C, ctx: &PricingContext) -> CoreResult<PricedLine>
where
    C: Catalog + ?Sized,
{
    validate_quantity(spec.quantity)?;
    validate_attributes(&spec.attributes)?;

    match line_target(spec)? {
        LineTarget::Product {
            product_id,
            variant_id,
        } => {
            let product = catalog
                .product(product_id)
                .ok_or_else(|| CoreError::not_found("Product", product_id))?;

            let resolved = resolve_unit_price(product, variant_id, ctx.now)?;
            let matched = select_promo(
                resolved.final_price,
                spec.quantity,
                &product.promos,
                &ctx.cart_product_ids,
            );
            if let Some(m) = &matched {
                ensure_in_range("promo", &m.promo.id, m.amount)?;
            }

            let line = ProductLine {
                product_id: product.id.clone(),
                variant_id: if product.has_variant {
                    variant_id.map(str::to_string)
                } else {
                    None
                },
                price: resolved.sell_price,
                discount: resolved.discount(),
                promo: matched.map(|m| m.amount).unwrap_or_default(),
                promo_id: matched.map(|m| m.promo.id.clone()),
                quantity: spec.quantity,
            };

            if line.unit_net().is_negative() {
                return Err(CoreError::Configuration(format!(
                    "discount {} and promo {} exceed price {} of product {}",
                    line.discount, line.promo, line.price, line.product_id
                )));
            }

            Ok(PricedLine::Product(line))
        }
        LineTarget::Bundle { bundle_id } => {
            let bundle = catalog
                .bundle(bundle_id)
                .ok_or_else(|| CoreError::not_found("Bundle", bundle_id))?;

            let priced = price_bundle(bundle, spec.quantity)?;

            Ok(PricedLine::Bundle(BundleLine {
                bundle_id: bundle.id.clone(),
                price: priced.sell_price,
                tax: priced.tax,
                quantity: spec.quantity,
            }))
        }
    }
}

/// Prices every line, or none: the first failure aborts the whole batch.
pub fn price_lines<C>(
    specs: &[LineSpec],
    catalog: &C,
    ctx: &PricingContext,
) -> CoreResult<Vec<PricedLine>>
where
    C: Catalog + ?Sized,
{
    specs
        .iter()
        .map(|spec| price_item(spec, catalog, ctx))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
