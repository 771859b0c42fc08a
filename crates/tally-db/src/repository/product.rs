//! # Product Repository
//!
//! Read-mostly access to inventory, keyed by serial number.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cashier scans / types "a1b2"                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  search_by_serial("a1b2")                                               │
//! │       │  serial_number LIKE '%a1b2%'  (ASCII case-insensitive)          │
//! │       │  exact match ranked first, inactive products skipped            │
//! │       ▼                                                                 │
//! │  SerialLookup { found: true, product: "SN-A1B2-77" }                    │
//! │  SerialLookup { found: false, product: None }   ← not an error          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tally_core::validation::{
    normalize_optional, validate_price_cents, validate_product_name, validate_required,
    validate_serial_number,
};
use tally_core::{Product, SerialLookup};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::contains_pattern;

const COLUMNS: &str = "id, sku, serial_number, name, description, price_cents, stock, \
                       is_active, created_at, updated_at";

/// Fields accepted when stocking a product.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub sku: String,
    pub serial_number: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: i64,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Looks up an active product by partial, case-insensitive serial number.
    pub async fn search_by_serial(&self, serial_number: &str) -> DbResult<SerialLookup> {
        let serial_number = validate_serial_number(serial_number)?;
        debug!(serial_number = %serial_number, "Searching product by serial");

        let product: Option<Product> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS} FROM products
            WHERE is_active = 1
              AND serial_number LIKE ?1 ESCAPE '\'
            ORDER BY (serial_number = ?2 COLLATE NOCASE) DESC, serial_number ASC
            LIMIT 1
            "#
        ))
        .bind(contains_pattern(&serial_number))
        .bind(&serial_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product.into())
    }

    /// Stocks a new product.
    pub async fn insert(&self, input: NewProduct) -> DbResult<Product> {
        let now = Utc::now();
        let serial_number = match input.serial_number.as_deref() {
            Some(serial) => Some(validate_serial_number(serial)?),
            None => None,
        };
        validate_price_cents(input.price_cents)?;

        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: validate_required("sku", &input.sku)?,
            serial_number,
            name: validate_product_name(&input.name)?,
            description: normalize_optional(input.description.as_deref()),
            price_cents: input.price_cents,
            stock: input.stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, serial_number, name, description,
                price_cents, stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.serial_number)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as(&format!("SELECT {COLUMNS} FROM products WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Soft-deletes a product so lookups skip it.
    pub async fn deactivate(&self, id: &str) -> DbResult<bool> {
        let result =
            sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
