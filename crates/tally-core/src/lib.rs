//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate holds the rules of the point-of-sale module as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    HTTP API (axum)                              │   │
//! │  │    /api/sales, /api/customers, /api/database/sales-stats        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   sale    │  │   money   │  │  report   │  │ validation│  │   │
//! │  │   │ aggregate │  │   Money   │  │  shapes   │  │   rules   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │         SQLite repositories, transactions, migrations           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Customer, Sale, SaleItem, Payment, Product)
//! - [`sale`] - Sale aggregate: create, pay, return, edit, derive status
//! - [`customer`] - Customer input normalization
//! - [`report`] - Report periods and aggregate shapes
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use tally_core::sale::{NewPayment, NewSale, NewSaleItem, PaymentPolicy};
//! use tally_core::{Sale, SaleStatus};
//!
//! let mut sale = Sale::create(
//!     NewSale {
//!         customer_id: "c-1".into(),
//!         customer_name: "Ana".into(),
//!         items: vec![NewSaleItem {
//!             serial_number: "SN-1".into(),
//!             product_name: "Phone".into(),
//!             quantity: 2,
//!             price_cents: 100,
//!             ..Default::default()
//!         }],
//!         created_by: "op-1".into(),
//!         ..Default::default()
//!     },
//!     Utc::now(),
//!     PaymentPolicy::default(),
//! )
//! .unwrap();
//!
//! sale.add_payment(NewPayment::new(50), Utc::now(), PaymentPolicy::default()).unwrap();
//! assert_eq!(sale.remaining_cents, 150);
//! assert_eq!(sale.status, SaleStatus::Partial);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod customer;
pub mod error;
pub mod money;
pub mod report;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError, ValidationResult};
pub use money::Money;
pub use types::*;
