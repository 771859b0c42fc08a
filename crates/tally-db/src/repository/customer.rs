//! # Customer Repository
//!
//! The customer directory, and the only code that writes the running totals.
//!
//! ## Running Totals
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  customers.total_purchases / total_spent_cents                          │
//! │                                                                         │
//! │  SaleRepository::create  ─┐                                             │
//! │                           ├─► apply_totals_delta(&mut tx, ..)           │
//! │  SaleRepository::delete  ─┘      same transaction as the sale write     │
//! │                                                                         │
//! │  recompute_totals(id)  ──► rebuilds both from the sales table           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tally_core::customer::{CustomerUpdate, NewCustomer};
use tally_core::validation::{validate_pagination, validate_search_query};
use tally_core::{Customer, Page, TotalsDelta};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{contains_pattern, offset};

const COLUMNS: &str = "id, name, phone, email, address, notes, \
                       total_purchases, total_spent_cents, created_at, updated_at";

/// Outcome of [`CustomerRepository::search_or_create`].
#[derive(Debug, Clone)]
pub struct CustomerMatch {
    pub customer: Customer,
    /// True when no existing customer matched and one was inserted.
    pub created: bool,
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Finds a customer by name, or creates one.
    ///
    /// ## Matching
    /// - name: case-insensitive, partial (`"ana"` matches `"Ana Pérez"`)
    /// - phone: when given, must also match exactly
    /// - the oldest matching customer wins
    ///
    /// Lookup and insert share one write transaction, so two cashiers
    /// searching for the same new name at once end up with one record.
    pub async fn search_or_create(&self, input: NewCustomer) -> DbResult<CustomerMatch> {
        let input = input.normalize()?;
        debug!(name = %input.name, phone = ?input.phone, "Customer search-or-create");

        let mut tx = self.pool.begin().await?;

        // Takes the write lock before the lookup
        sqlx::query("UPDATE customers SET updated_at = updated_at WHERE 0")
            .execute(&mut *tx)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM customers WHERE name LIKE "));
        qb.push_bind(contains_pattern(&input.name))
            .push(" ESCAPE '\\'");
        if let Some(phone) = &input.phone {
            qb.push(" AND phone = ").push_bind(phone.clone());
        }
        qb.push(" ORDER BY created_at ASC, id ASC LIMIT 1");

        let existing: Option<Customer> = qb.build_query_as().fetch_optional(&mut *tx).await?;

        if let Some(customer) = existing {
            tx.commit().await?;
            debug!(id = %customer.id, "Matched existing customer");
            return Ok(CustomerMatch {
                customer,
                created: false,
            });
        }

        let customer = input.into_customer(Utc::now());
        insert(&mut tx, &customer).await?;
        tx.commit().await.map_err(DbError::consistency)?;

        info!(id = %customer.id, name = %customer.name, "Customer created");
        Ok(CustomerMatch {
            customer,
            created: true,
        })
    }

    /// Creates a customer without looking for an existing match.
    pub async fn create(&self, input: NewCustomer) -> DbResult<Customer> {
        let customer = input.normalize()?.into_customer(Utc::now());
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, &customer).await?;
        info!(id = %customer.id, "Customer created");
        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as(&format!("SELECT {COLUMNS} FROM customers WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    async fn require(&self, id: &str) -> DbResult<Customer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Lists customers, newest first.
    ///
    /// `query` matches name, phone or email, case-insensitively.
    pub async fn list(
        &self,
        query: Option<&str>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> DbResult<Page<Customer>> {
        let query = validate_search_query(query)?;
        let (page, limit) = validate_pagination(page, limit)?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM customers");
        push_search(&mut count, query.as_deref());
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut rows = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM customers"));
        push_search(&mut rows, query.as_deref());
        rows.push(" ORDER BY created_at DESC, id ASC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset(page, limit));
        let customers: Vec<Customer> = rows.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page::new(customers, total, page, limit))
    }

    /// Edits contact details. Totals are never touched here.
    pub async fn update(&self, id: &str, update: CustomerUpdate) -> DbResult<Customer> {
        let mut customer = self.require(id).await?;
        update.apply_to(&mut customer, Utc::now())?;

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2, phone = ?3, email = ?4, address = ?5, notes = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(&customer.notes)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        // Re-read so concurrently applied totals are reported accurately.
        self.require(id).await
    }

    /// Deletes a customer. Their sales keep the snapshot name.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        info!(id, "Customer deleted");
        Ok(())
    }

    /// Applies a totals delta on its own.
    ///
    /// Sale writes do not go through here; they apply the delta inside their
    /// own transaction.
    pub async fn adjust_totals(&self, id: &str, delta: TotalsDelta) -> DbResult<Customer> {
        let mut conn = self.pool.acquire().await?;
        if !apply_totals_delta(&mut conn, id, delta, Utc::now()).await? {
            return Err(DbError::not_found("Customer", id));
        }
        drop(conn);
        self.require(id).await
    }

    /// Rebuilds the running totals from the customer's sales.
    pub async fn recompute_totals(&self, id: &str) -> DbResult<Customer> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                total_purchases = (SELECT COUNT(*) FROM sales WHERE customer_id = ?1),
                total_spent_cents = (SELECT COALESCE(SUM(total_cents), 0) FROM sales WHERE customer_id = ?1),
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        let customer = self.require(id).await?;
        info!(
            id,
            total_purchases = customer.total_purchases,
            total_spent_cents = customer.total_spent_cents,
            "Customer totals recomputed"
        );
        Ok(customer)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn push_search(qb: &mut QueryBuilder<'_, Sqlite>, query: Option<&str>) {
    let Some(query) = query else {
        return;
    };
    let pattern = contains_pattern(query);
    qb.push(" WHERE (name LIKE ")
        .push_bind(pattern.clone())
        .push(" ESCAPE '\\' OR phone LIKE ")
        .push_bind(pattern.clone())
        .push(" ESCAPE '\\' OR email LIKE ")
        .push_bind(pattern)
        .push(" ESCAPE '\\')");
}

pub(crate) async fn insert(conn: &mut SqliteConnection, customer: &Customer) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO customers (
            id, name, phone, email, address, notes,
            total_purchases, total_spent_cents, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&customer.id)
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(&customer.email)
    .bind(&customer.address)
    .bind(&customer.notes)
    .bind(customer.total_purchases)
    .bind(customer.total_spent_cents)
    .bind(customer.created_at)
    .bind(customer.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Adds `delta` to a customer's running totals on `conn`.
///
/// Returns false when the customer does not exist. Callers decide whether
/// that is an error.
pub(crate) async fn apply_totals_delta(
    conn: &mut SqliteConnection,
    customer_id: &str,
    delta: TotalsDelta,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE customers SET
            total_purchases = total_purchases + ?2,
            total_spent_cents = total_spent_cents + ?3,
            updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(customer_id)
    .bind(delta.purchases)
    .bind(delta.spent.cents())
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Unit Tests
// =============================================================================
