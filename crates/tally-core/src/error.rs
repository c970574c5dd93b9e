//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Pricing / settlement failures                  │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures, wraps CoreError unchanged    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any pricing error aborts the whole cart mutation. No line is priced
//! "as far as it got", so a transaction's totals are never half-updated.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Pricing and settlement errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A line references neither or both of a product and a bundle.
    #[error("Line must reference exactly one of product or bundle ({reason})")]
    InvalidLine { reason: String },

    /// The product has variants but the line did not name one.
    ///
    /// ## User Workflow
    /// ```text
    /// Add "Latte" (hasVariant = true), no size picked
    ///      │
    ///      ▼
    /// resolve_unit_price(product, None)
    ///      │
    ///      ▼
    /// MissingVariant { product_id: "latte" }
    ///      │
    ///      ▼
    /// UI asks for a size; nothing is written
    /// ```
    #[error("Product {product_id} requires a variant")]
    MissingVariant { product_id: String },

    /// The named variant does not belong to the product.
    #[error("Variant {variant_id} not found on product {product_id}")]
    VariantNotFound {
        product_id: String,
        variant_id: String,
    },

    /// A referenced product, bundle or transaction is not in the store.
    #[error("{entity} not found: {id}")]
    EntityNotFound { entity: String, id: String },

    /// The stored catalog data cannot be priced, e.g. discount + promo
    /// exceed the unit price, or a product without variants has no price.
    #[error("Pricing configuration error: {0}")]
    Configuration(String),

    /// Transaction is not in a state that allows the requested operation.
    #[error("Transaction {transaction_id} is {status}, cannot perform operation")]
    InvalidTransactionStatus {
        transaction_id: String,
        status: String,
    },

    /// Settlement amount does not match the computed grand total.
    #[error("Paid amount {paid} does not match transaction total {expected}")]
    PaymentMismatch { expected: Money, paid: Money },

    /// Transaction has reached the maximum number of lines.
    #[error("Transaction cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an EntityNotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::EntityNotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any pricing runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::VariantNotFound {
            product_id: "latte".to_string(),
            variant_id: "xl".to_string(),
        };
        assert_eq!(err.to_string(), "Variant xl not found on product latte");

        let err = CoreError::not_found("Bundle", "b-1");
        assert_eq!(err.to_string(), "Bundle not found: b-1");

        let err = CoreError::PaymentMismatch {
            expected: Money::from_cents(1100),
            paid: Money::from_cents(1000),
        };
        assert_eq!(
            err.to_string(),
            "Paid amount $10.00 does not match transaction total $11.00"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
