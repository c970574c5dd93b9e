//! # Product Listings
//!
//! Display read models for menus and product screens.
//!
//! A listing's `final_price` is a snapshot for display only. The pricing
//! engine never reads it back; it always recomputes from `sell_price` and
//! the active discount. The only code shared with the engine is
//! [`apply_discount`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::pricing::discount::{apply_discount, is_active};
use crate::types::Product;

/// A product as shown to a cashier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub has_variant: bool,
    /// `None` when the product is sold only through its variants.
    pub sell_price: Option<Money>,
    pub final_price: Option<Money>,
    pub discount_active: bool,
    pub variants: Vec<VariantListing>,
}

/// A variant as shown to a cashier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantListing {
    pub id: String,
    pub name: String,
    pub sell_price: Money,
    pub final_price: Money,
}

impl ProductListing {
    /// Maps a product graph to its listing at `now`.
    pub fn from_product(product: &Product, now: DateTime<Utc>) -> Self {
        let discount = product.discount.as_ref();
        let sell_price = if product.has_variant {
            None
        } else {
            product.sell_price
        };

        ProductListing {
            id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            has_variant: product.has_variant,
            sell_price,
            final_price: sell_price.map(|p| apply_discount(p, discount, now)),
            discount_active: discount.map_or(false, |d| is_active(d, now)),
            variants: product
                .variants
                .iter()
                .map(|v| VariantListing {
                    id: v.id.clone(),
                    name: v.name.clone(),
                    sell_price: v.sell_price,
                    final_price: apply_discount(v.sell_price, discount, now),
                })
                .collect(),
        }
    }
}
