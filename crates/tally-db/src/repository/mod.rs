//! # Repository Module
//!
//! Database repository implementations for Tally POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │  db.sales().add_payment(id, payment)                           │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── load sale (items + payments)                                      │
//! │  ├── apply tally-core rule (Sale::add_payment)                         │
//! │  └── write back in one transaction, version-checked                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`customer::CustomerRepository`] - Customer directory and running totals
//! - [`product::ProductRepository`] - Serial number lookup
//! - [`sale::SaleRepository`] - Sale lifecycle
//! - [`report::ReportRepository`] - Aggregates over a date window

pub mod customer;
pub mod product;
pub mod report;
pub mod sale;

/// Builds a `LIKE` pattern matching `term` anywhere, escaping `%`, `_` and
/// `\`. Use with `ESCAPE '\'`.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Row offset for a 1-based page.
pub(crate) fn offset(page: u32, limit: u32) -> i64 {
    (page.saturating_sub(1) as i64) * limit as i64
}
