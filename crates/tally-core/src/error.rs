//! # Error Types
//!
//! [`CoreError`] covers broken business rules and records the sale aggregate
//! needed but could not find; [`ValidationError`] covers malformed input.
//! tally-db wraps both in `DbError`, and the API turns that into its JSON
//! error body.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The referenced customer does not exist.
    ///
    /// Raised when a sale names a customer id that is not in the directory.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// No item on the sale carries the requested serial number.
    ///
    /// ## When This Occurs
    /// ```text
    /// return_item(sale, "SN-404")
    ///      │
    ///      ▼
    /// items.iter().find(|i| i.serial_number == "SN-404")  → None
    ///      │
    ///      ▼
    /// SaleItemNotFound { sale_id, serial_number: "SN-404" }
    /// ```
    /// The sale is left untouched.
    #[error("Item {serial_number} not found in sale {sale_id}")]
    SaleItemNotFound {
        sale_id: String,
        serial_number: String,
    },

    /// Payment larger than the outstanding balance while overpayment is
    /// disabled.
    #[error("Payment of {attempted} exceeds remaining balance {remaining}")]
    Overpayment { remaining: Money, attempted: Money },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True for the "record does not exist" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::CustomerNotFound(_) | CoreError::SaleItemNotFound { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any state is touched; an operation that fails validation
/// has no side effects.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================
