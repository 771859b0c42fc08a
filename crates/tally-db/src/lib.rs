//! # tally-db
//!
//! SQLite persistence for customers, inventory and sales, using sqlx.
//!
//! A request such as `POST /api/sales/{id}/payment` reaches this crate as a
//! call on one of the repositories handed out by [`Database`]:
//!
//! ```text
//!   Database (pool.rs, SqlitePool + write settings)
//!     ├── CustomerRepository   search-or-create, running totals
//!     ├── ProductRepository    serial-number lookup
//!     ├── SaleRepository       sale aggregate persistence
//!     └── ReportRepository     window aggregates
//! ```
//!
//! Schema lives in `migrations/sqlite` and is embedded by [`migrations`].
//! Errors from sqlx and from domain rules both surface as [`DbError`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//! use tally_core::sale::NewPayment;
//!
//! let db = Database::new(DbConfig::new("path/to/tally.db")).await?;
//!
//! let lookup = db.products().search_by_serial("SN-A1B2").await?;
//! let sale = db.sales().add_payment(&sale_id, NewPayment::new(5000)).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DatabaseHealth, DbConfig};

pub use repository::customer::{CustomerMatch, CustomerRepository};
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::report::ReportRepository;
pub use repository::sale::{SaleFilter, SaleRepository};
