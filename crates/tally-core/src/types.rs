//! # Domain Types
//!
//! Core domain types used throughout Tally POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │      Sale       │   │    Product      │       │
//! │  │  ─────────────  │◄──│  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  customer_id    │   │  sku            │       │
//! │  │  name           │   │  customer_name  │   │  serial_number  │       │
//! │  │  total_spent    │   │  total / paid   │   │  price_cents    │       │
//! │  │  total_purchases│   │  status         │   └─────────────────┘       │
//! │  └─────────────────┘   │  version        │                              │
//! │                        └───┬─────────┬───┘                              │
//! │                            │ owns    │ owns                             │
//! │                  ┌─────────▼──┐  ┌───▼──────────┐                       │
//! │                  │  SaleItem  │  │   Payment    │                       │
//! │                  │  serial #  │  │  amount      │                       │
//! │                  │  returned? │  │  append-only │                       │
//! │                  └────────────┘  └──────────────┘                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A sale copies the customer name and each item's product name and price
//! at the time of sale. Later edits to the customer or inventory never
//! rewrite history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Customer
// =============================================================================

/// A customer known to the point of sale.
///
/// `total_purchases` and `total_spent_cents` are running totals over the
/// customer's sales. They are only ever changed through a [`TotalsDelta`]
/// applied in the same transaction as the sale write.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    /// Stored lower-cased.
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub total_purchases: i64,
    pub total_spent_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn total_spent(&self) -> Money {
        Money::from_cents(self.total_spent_cents)
    }
}

/// Change to a customer's running totals.
///
/// ```text
/// sale created  ──►  TotalsDelta { purchases: +1, spent: +total }
/// sale deleted  ──►  TotalsDelta { purchases: -1, spent: -total }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsDelta {
    pub purchases: i64,
    pub spent: Money,
}

impl TotalsDelta {
    pub fn for_sale_created(total: Money) -> Self {
        TotalsDelta {
            purchases: 1,
            spent: total,
        }
    }

    pub fn for_sale_deleted(total: Money) -> Self {
        TotalsDelta {
            purchases: -1,
            spent: -total,
        }
    }
}

// =============================================================================
// Product (inventory lookup)
// =============================================================================

/// A stocked product, looked up by serial number when building a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    /// Stock Keeping Unit - business identifier.
    pub sku: String,
    /// Manufacturer serial number, unique when present.
    pub serial_number: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: i64,
    /// Whether product is active (soft delete).
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Result of a serial number lookup. A miss is a normal answer, not an
/// error.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SerialLookup {
    pub found: bool,
    pub product: Option<Product>,
}

impl From<Option<Product>> for SerialLookup {
    fn from(product: Option<Product>) -> Self {
        SerialLookup {
            found: product.is_some(),
            product,
        }
    }
}

// =============================================================================
// Statuses
// =============================================================================

/// Combined display status of a sale.
///
/// Derived, never set directly. See [`crate::sale`] for the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Partial,
    Paid,
    /// Every item on the sale has been returned.
    Returned,
}

impl SaleStatus {
    pub const ALL: [SaleStatus; 4] = [
        SaleStatus::Pending,
        SaleStatus::Partial,
        SaleStatus::Paid,
        SaleStatus::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Partial => "partial",
            SaleStatus::Paid => "paid",
            SaleStatus::Returned => "returned",
        }
    }
}

impl std::str::FromStr for SaleStatus {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SaleStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::error::ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: SaleStatus::ALL
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            })
    }
}

/// Money side of a sale: how much of the total has been paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
}

/// Goods side of a sale: how many of its items came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    None,
    Partial,
    All,
}

// =============================================================================
// Sale
// =============================================================================

/// A point-of-sale transaction with its items and payments.
///
/// `paid_cents`, `remaining_cents`, `status`, `payment_status` and
/// `return_status` are derived from `total_cents`, `payments` and `items`
/// and are recomputed after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub customer_id: String,
    /// Customer name at time of sale (frozen).
    pub customer_name: String,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<SaleItem>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub payments: Vec<Payment>,
    /// Σ price × quantity, fixed at creation.
    pub total_cents: i64,
    pub paid_cents: i64,
    /// May be negative when the sale is overpaid.
    pub remaining_cents: i64,
    pub status: SaleStatus,
    pub payment_status: PaymentStatus,
    pub return_status: ReturnStatus,
    pub notes: Option<String>,
    /// Operator who rang up the sale.
    pub created_by: String,
    /// Business date of the sale; reports window on this.
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped on every write.
    pub version: i64,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.remaining_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale, addressed by its position.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub position: i64,
    pub product_id: Option<String>,
    /// Free text; not required to exist in inventory.
    pub serial_number: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub price_cents: i64,
    pub is_returned: bool,
    #[ts(as = "Option<String>")]
    pub return_date: Option<DateTime<Utc>>,
    pub return_reason: Option<String>,
}

impl SaleItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards a sale. Payments are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub position: i64,
    pub amount_cents: i64,
    /// Free text, "cash" unless given.
    pub method: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    /// Builds a page, computing the page count from the total row count.
    pub fn new(items: Vec<T>, total: i64, page: u32, limit: u32) -> Self {
        let pages = if limit == 0 || total <= 0 {
            0
        } else {
            ((total as u64).div_ceil(limit as u64)) as u32
        };
        Page {
            items,
            total,
            page,
            pages,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
