//! # Validation Module
//!
//! Input and catalog validation for Tally POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Cart lines (this module)                                     │
//! │  ├── quantity 1..=999, attributes, cart size                           │
//! │  └── run before any line is priced                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Catalog writes (this module)                                 │
//! │  ├── rates ≤ 100%, non-negative amounts                                │
//! │  └── variants owned by their product                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::{Money, Rate};
use crate::types::{Adjustment, Bundle, LineAttribute, Product, Promo};
use crate::{MAX_AMOUNT_CENTS, MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an entity id.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most 64 characters
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty, at most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ```rust
/// use tally_core::validation::validate_sku;
///
/// assert!(validate_sku("LATTE-M").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, variant, bundle, promo).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Line Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates line attributes: named, with short values.
pub fn validate_attributes(attributes: &[LineAttribute]) -> ValidationResult<()> {
    for attr in attributes {
        if attr.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "attribute name".to_string(),
            });
        }

        if attr.name.len() > 50 {
            return Err(ValidationError::TooLong {
                field: "attribute name".to_string(),
                max: 50,
            });
        }

        if attr.value.len() > 200 {
            return Err(ValidationError::TooLong {
                field: "attribute value".to_string(),
                max: 200,
            });
        }
    }

    Ok(())
}

/// Validates the number of lines a transaction would hold.
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Amount Validators
// =============================================================================

/// Validates a monetary amount: zero up to MAX_AMOUNT_CENTS.
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() || amount.cents() > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates a rate: 0% to 100%.
pub fn validate_rate(field: &str, rate: Rate) -> ValidationResult<()> {
    if rate > Rate::FULL {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: Rate::FULL.bps() as i64,
        });
    }

    Ok(())
}

/// Validates either kind of adjustment.
pub fn validate_adjustment(field: &str, value: &Adjustment) -> ValidationResult<()> {
    match value {
        Adjustment::Percentage(rate) => validate_rate(field, *rate),
        Adjustment::Fixed(amount) => validate_amount(field, *amount),
    }
}

// =============================================================================
// Catalog Validators
// =============================================================================

/// Validates a promo definition.
pub fn validate_promo(promo: &Promo) -> ValidationResult<()> {
    validate_id("promo id", &promo.id)?;
    validate_name("promo name", &promo.name)?;
    validate_adjustment("promo amount", &promo.value)?;

    if promo.min_quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "promo min quantity".to_string(),
            min: 0,
            max: MAX_ITEM_QUANTITY,
        });
    }

    for id in &promo.required_product_ids {
        validate_id("required product id", id)?;
    }

    Ok(())
}

/// Validates a product graph before it is stored.
///
/// ## Rules
/// - `has_variant` ⇒ at least one variant, each owned by this product
/// - no variants ⇒ a sell price
/// - all amounts non-negative, all rates ≤ 100%
/// - discount window, when fully bounded, does not end before it starts
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_id("product id", &product.id)?;
    validate_sku(&product.sku)?;
    validate_name("name", &product.name)?;

    if let Some(price) = product.sell_price {
        validate_amount("sell price", price)?;
    }
    if let Some(price) = product.base_price {
        validate_amount("base price", price)?;
    }

    if product.has_variant {
        if product.variants.is_empty() {
            return Err(ValidationError::Required {
                field: "variants".to_string(),
            });
        }
    } else if product.sell_price.is_none() {
        return Err(ValidationError::Required {
            field: "sell price".to_string(),
        });
    }

    for variant in &product.variants {
        validate_id("variant id", &variant.id)?;
        validate_name("variant name", &variant.name)?;
        validate_amount("variant sell price", variant.sell_price)?;

        if variant.product_id != product.id {
            return Err(ValidationError::InvalidFormat {
                field: "variant product id".to_string(),
                reason: format!("variant {} belongs to another product", variant.id),
            });
        }
    }

    if let Some(discount) = &product.discount {
        validate_id("discount id", &discount.id)?;
        validate_adjustment("discount amount", &discount.value)?;

        if let (Some(start), Some(end)) = (discount.start_at, discount.end_at) {
            if end < start {
                return Err(ValidationError::InvalidFormat {
                    field: "discount window".to_string(),
                    reason: "ends before it starts".to_string(),
                });
            }
        }
    }

    for promo in &product.promos {
        validate_promo(promo)?;
    }

    Ok(())
}

/// Validates a bundle before it is stored.
pub fn validate_bundle(bundle: &Bundle) -> ValidationResult<()> {
    validate_id("bundle id", &bundle.id)?;
    validate_name("bundle name", &bundle.name)?;
    validate_amount("bundle sell price", bundle.sell_price)?;

    if let Some(tax) = &bundle.tax {
        validate_id("tax id", &tax.id)?;
        validate_adjustment("tax amount", &tax.value)?;
    }

    for item in &bundle.items {
        validate_id("bundle product id", &item.product_id)?;
        validate_quantity(item.quantity)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
