//! # Validation Module
//!
//! Input validation utilities for Tally POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (axum)                                          │
//! │  └── Type validation (JSON deserialization)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: tally-core                                                   │
//! │  └── THIS MODULE: business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── UNIQUE constraints                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_quantity, validate_serial_number};
//!
//! assert_eq!(validate_serial_number("  SN-001 ").unwrap(), "SN-001");
//! assert!(validate_quantity(0).is_err());
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
pub use crate::error::ValidationResult;

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

const MAX_NAME_LEN: usize = 200;
const MAX_SERIAL_LEN: usize = 100;
const MAX_QUERY_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Trims `value` and rejects it when blank.
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_required;
///
/// assert_eq!(validate_required("createdBy", " op-1 ").unwrap(), "op-1");
/// assert!(validate_required("createdBy", "   ").is_err());
/// ```
pub fn validate_required(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(value.to_string())
}

fn validate_bounded(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = validate_required(field, value)?;
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(value)
}

/// Validates a customer name, returning it trimmed.
pub fn validate_customer_name(name: &str) -> ValidationResult<String> {
    validate_bounded("customerName", name, MAX_NAME_LEN)
}

/// Validates a product name snapshot on a sale item.
pub fn validate_product_name(name: &str) -> ValidationResult<String> {
    validate_bounded("productName", name, MAX_NAME_LEN)
}

/// Validates a serial number, returning it trimmed.
///
/// Serial numbers are free text: no character set is enforced because
/// manufacturers use all sorts of formats.
pub fn validate_serial_number(serial: &str) -> ValidationResult<String> {
    validate_bounded("serialNumber", serial, MAX_SERIAL_LEN)
}

/// Validates a free-text search query.
///
/// Empty is allowed and means "no filter"; `None` is returned for it.
pub fn validate_search_query(query: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
        return Ok(None);
    };

    if query.chars().count() > MAX_QUERY_LEN {
        return Err(ValidationError::TooLong {
            field: "q".to_string(),
            max: MAX_QUERY_LEN,
        });
    }

    Ok(Some(query.to_string()))
}

/// Trims an optional text field, mapping blank to `None`.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line item quantity. Must be at least 1.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 1 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a unit price in cents. Zero is allowed (free items).
///
/// ```rust
/// use tally_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Validates a payment amount in cents. Must be strictly positive.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Listing Validators
// =============================================================================

/// Resolves page and limit, applying defaults.
///
/// ## Rules
/// - page defaults to 1 and must be >= 1
/// - limit defaults to [`DEFAULT_PAGE_SIZE`] and must be 1..=[`MAX_PAGE_SIZE`]
pub fn validate_pagination(page: Option<u32>, limit: Option<u32>) -> ValidationResult<(u32, u32)> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);

    if page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_PAGE_SIZE as i64,
        });
    }

    Ok((page, limit))
}

/// Rejects a window whose start is after its end.
pub fn validate_date_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> ValidationResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ValidationError::InvalidFormat {
                field: "startDate".to_string(),
                reason: "must not be after endDate".to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
