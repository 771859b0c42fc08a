//! # Sale Repository
//!
//! Persists the sale aggregate and keeps customer totals in step with it.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Write Paths                                  │
//! │                                                                         │
//! │  create / delete        one transaction                                 │
//! │  ───────────────        ┌────────────────────────────────────────┐      │
//! │                         │ customers.total_* += delta             │      │
//! │                         │ INSERT / DELETE sales (+ items, pays)  │      │
//! │                         └────────────────────────────────────────┘      │
//! │                         commit fails → DbError::Consistency             │
//! │                                                                         │
//! │  add_payment /          optimistic concurrency                          │
//! │  return_item / update   ┌────────────────────────────────────────┐      │
//! │  ────────────────────   │ load sale @ version N                  │      │
//! │                         │ apply tally-core rule                  │      │
//! │                         │ UPDATE sales .. WHERE version = N      │      │
//! │                         │   0 rows → reload, retry               │      │
//! │                         │ INSERT payment / UPDATE item           │      │
//! │                         └────────────────────────────────────────┘      │
//! │                         retries exhausted → ConcurrencyConflict         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tally_core::sale::{NewPayment, NewSale, PaymentPolicy, SaleUpdate};
use tally_core::validation::{
    validate_date_range, validate_pagination, validate_search_query,
};
use tally_core::{
    CoreError, CoreResult, Money, Page, Payment, Sale, SaleItem, SaleStatus, SerialLookup,
    TotalsDelta,
};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::customer::apply_totals_delta;
use crate::repository::product::ProductRepository;
use crate::repository::{contains_pattern, offset};

const SALE_COLUMNS: &str = "id, customer_id, customer_name, total_cents, paid_cents, \
                            remaining_cents, status, payment_status, return_status, notes, \
                            created_by, sale_date, created_at, updated_at, version";

const ITEM_COLUMNS: &str = "id, sale_id, position, product_id, serial_number, product_name, \
                            quantity, price_cents, is_returned, return_date, return_reason";

const PAYMENT_COLUMNS: &str = "id, sale_id, position, amount_cents, method, notes, paid_at";

/// Filters for [`SaleRepository::list`]. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    /// Matches customer name or any item serial, case-insensitively.
    pub query: Option<String>,
    pub customer_id: Option<String>,
    pub status: Option<SaleStatus>,
    /// Inclusive bounds on `sale_date`.
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// What a version-checked write has to persist besides the sale row.
#[derive(Debug, Clone)]
pub(crate) enum SaleChange {
    Payment(Payment),
    Return(SaleItem),
    Edit,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    payment_policy: PaymentPolicy,
    max_write_retries: u32,
}

impl SaleRepository {
    /// Creates a repository with the default policy (overpayment allowed)
    /// and three write retries.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository {
            pool,
            payment_policy: PaymentPolicy::default(),
            max_write_retries: 3,
        }
    }

    pub fn with_payment_policy(mut self, policy: PaymentPolicy) -> Self {
        self.payment_policy = policy;
        self
    }

    pub fn with_max_write_retries(mut self, retries: u32) -> Self {
        self.max_write_retries = retries;
        self
    }

    // =========================================================================
    // Create / Delete
    // =========================================================================

    /// Rings up a sale and credits the customer's running totals.
    ///
    /// ## Errors
    /// - `Domain(Validation)` for bad input
    /// - `Domain(CustomerNotFound)` if `customer_id` is unknown; nothing is
    ///   written
    /// - `Consistency` if the transaction cannot be committed
    pub async fn create(&self, input: NewSale) -> DbResult<Sale> {
        let sale = Sale::create(input, Utc::now(), self.payment_policy)?;
        self.persist_new(&sale).await?;

        info!(
            id = %sale.id,
            customer_id = %sale.customer_id,
            total_cents = sale.total_cents,
            items = sale.items.len(),
            status = sale.status.as_str(),
            "Sale created"
        );
        Ok(sale)
    }

    pub(crate) async fn persist_new(&self, sale: &Sale) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let delta = TotalsDelta::for_sale_created(sale.total());
        if !apply_totals_delta(&mut tx, &sale.customer_id, delta, sale.created_at).await? {
            tx.rollback().await?;
            return Err(CoreError::CustomerNotFound(sale.customer_id.clone()).into());
        }

        insert_sale(&mut tx, sale).await?;

        tx.commit().await.map_err(DbError::consistency)
    }

    /// Deletes a sale and debits the customer's running totals.
    ///
    /// If the customer no longer exists the sale is still deleted and a
    /// warning is logged.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        // Items and payments go with it (ON DELETE CASCADE).
        let deleted: Option<(String, i64)> =
            sqlx::query_as("DELETE FROM sales WHERE id = ?1 RETURNING customer_id, total_cents")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((customer_id, total_cents)) = deleted else {
            tx.rollback().await?;
            return Err(DbError::not_found("Sale", id));
        };

        let delta = TotalsDelta::for_sale_deleted(Money::from_cents(total_cents));
        if !apply_totals_delta(&mut tx, &customer_id, delta, Utc::now()).await? {
            warn!(
                sale_id = id,
                customer_id = %customer_id,
                "Deleting sale of a customer that no longer exists"
            );
        }

        tx.commit().await.map_err(DbError::consistency)?;

        info!(id, customer_id = %customer_id, total_cents, "Sale deleted");
        Ok(())
    }

    // =========================================================================
    // Version-Checked Mutations
    // =========================================================================

    /// Appends a payment.
    pub async fn add_payment(&self, sale_id: &str, payment: NewPayment) -> DbResult<Sale> {
        let policy = self.payment_policy;
        let sale = self
            .modify(sale_id, |sale, now| {
                sale.add_payment(payment.clone(), now, policy)
                    .map(SaleChange::Payment)
            })
            .await?;

        info!(
            id = %sale.id,
            amount_cents = payment.amount_cents,
            paid_cents = sale.paid_cents,
            remaining_cents = sale.remaining_cents,
            status = sale.status.as_str(),
            "Payment added"
        );
        Ok(sale)
    }

    /// Marks the first item with this exact serial number as returned.
    pub async fn return_item(
        &self,
        sale_id: &str,
        serial_number: &str,
        reason: Option<&str>,
    ) -> DbResult<Sale> {
        let sale = self
            .modify(sale_id, |sale, now| {
                sale.return_item(serial_number, reason, now)
                    .map(SaleChange::Return)
            })
            .await?;

        info!(
            id = %sale.id,
            serial_number,
            status = sale.status.as_str(),
            "Item returned"
        );
        Ok(sale)
    }

    /// Edits customer name, notes or sale date.
    pub async fn update(&self, sale_id: &str, update: SaleUpdate) -> DbResult<Sale> {
        self.modify(sale_id, |sale, now| {
            sale.apply_update(update.clone(), now)
                .map(|_| SaleChange::Edit)
        })
        .await
    }

    /// Load, apply, version-checked write; reload and retry on a lost race.
    async fn modify<F>(&self, sale_id: &str, mut apply: F) -> DbResult<Sale>
    where
        F: FnMut(&mut Sale, DateTime<Utc>) -> CoreResult<SaleChange> + Send,
    {
        for attempt in 0..=self.max_write_retries {
            let mut sale = self.require(sale_id).await?;
            let expected_version = sale.version;
            let change = apply(&mut sale, Utc::now())?;

            if self.write_change(&sale, expected_version, &change).await? {
                sale.version = expected_version + 1;
                return Ok(sale);
            }

            warn!(
                sale_id,
                attempt,
                expected_version,
                "Sale modified concurrently, retrying"
            );
        }

        Err(DbError::conflict("Sale", sale_id))
    }

    /// Writes `sale` back if it is still at `expected_version`.
    ///
    /// Returns false, writing nothing, when another writer got there first.
    pub(crate) async fn write_change(
        &self,
        sale: &Sale,
        expected_version: i64,
        change: &SaleChange,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                customer_name = ?3,
                notes = ?4,
                sale_date = ?5,
                paid_cents = ?6,
                remaining_cents = ?7,
                status = ?8,
                payment_status = ?9,
                return_status = ?10,
                updated_at = ?11,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&sale.id)
        .bind(expected_version)
        .bind(&sale.customer_name)
        .bind(&sale.notes)
        .bind(sale.sale_date)
        .bind(sale.paid_cents)
        .bind(sale.remaining_cents)
        .bind(sale.status)
        .bind(sale.payment_status)
        .bind(sale.return_status)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        match change {
            SaleChange::Payment(payment) => insert_payment(&mut tx, payment).await?,
            SaleChange::Return(item) => update_item_return(&mut tx, item).await?,
            SaleChange::Edit => {}
        }

        tx.commit().await.map_err(DbError::consistency)?;
        Ok(true)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a sale with its items and payments.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        // One read transaction so the sale row and its children agree.
        let mut tx = self.pool.begin().await?;
        let sale = load(&mut tx, id).await?;
        tx.commit().await?;

        if let Some(sale) = &sale {
            if !sale.is_consistent() {
                warn!(id = %sale.id, "Stored sale fields disagree with items and payments");
            }
        }
        Ok(sale)
    }

    async fn require(&self, id: &str) -> DbResult<Sale> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// Lists sales, most recent `sale_date` first.
    pub async fn list(
        &self,
        filter: &SaleFilter,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> DbResult<Page<Sale>> {
        let query = validate_search_query(filter.query.as_deref())?;
        let (page, limit) = validate_pagination(page, limit)?;
        validate_date_range(filter.start_date, filter.end_date)?;

        let mut tx = self.pool.begin().await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sales s WHERE 1 = 1");
        push_filter(&mut count, filter, query.as_deref());
        let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

        let mut rows = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM sales s WHERE 1 = 1",
            prefixed(SALE_COLUMNS, "s")
        ));
        push_filter(&mut rows, filter, query.as_deref());
        rows.push(" ORDER BY s.sale_date DESC, s.id ASC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset(page, limit));

        let mut sales: Vec<Sale> = rows.build_query_as().fetch_all(&mut *tx).await?;
        attach_children(&mut tx, &mut sales).await?;
        tx.commit().await?;

        debug!(total, page, returned = sales.len(), "Listed sales");
        Ok(Page::new(sales, total, page, limit))
    }

    /// Serial number lookup against inventory, for building a sale.
    pub async fn search_product_by_serial(&self, serial_number: &str) -> DbResult<SerialLookup> {
        ProductRepository::new(self.pool.clone())
            .search_by_serial(serial_number)
            .await
    }
}

// =============================================================================
// Row Helpers
// =============================================================================

fn prefixed(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SaleFilter, query: Option<&str>) {
    if let Some(query) = query {
        let pattern = contains_pattern(query);
        qb.push(" AND (s.customer_name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR EXISTS (SELECT 1 FROM sale_items i WHERE i.sale_id = s.id AND i.serial_number LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\'))");
    }
    if let Some(customer_id) = &filter.customer_id {
        qb.push(" AND s.customer_id = ").push_bind(customer_id.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND s.status = ").push_bind(status);
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND s.sale_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND s.sale_date <= ").push_bind(end);
    }
}

async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sale: Option<Sale> = sqlx::query_as(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(mut sale) = sale else {
        return Ok(None);
    };

    sale.items = sqlx::query_as(&format!(
        "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY position"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    sale.payments = sqlx::query_as(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE sale_id = ?1 ORDER BY position"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(sale))
}

/// Loads items and payments for a page of sales in two queries.
async fn attach_children(conn: &mut SqliteConnection, sales: &mut [Sale]) -> DbResult<()> {
    if sales.is_empty() {
        return Ok(());
    }

    let mut items_query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id IN ("
    ));
    let mut ids = items_query.separated(", ");
    for sale in sales.iter() {
        ids.push_bind(sale.id.clone());
    }
    items_query.push(") ORDER BY sale_id, position");
    let items: Vec<SaleItem> = items_query.build_query_as().fetch_all(&mut *conn).await?;

    let mut payments_query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE sale_id IN ("
    ));
    let mut ids = payments_query.separated(", ");
    for sale in sales.iter() {
        ids.push_bind(sale.id.clone());
    }
    payments_query.push(") ORDER BY sale_id, position");
    let payments: Vec<Payment> = payments_query.build_query_as().fetch_all(&mut *conn).await?;

    for sale in sales.iter_mut() {
        sale.items = items.iter().filter(|i| i.sale_id == sale.id).cloned().collect();
        sale.payments = payments
            .iter()
            .filter(|p| p.sale_id == sale.id)
            .cloned()
            .collect();
    }
    Ok(())
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, customer_id, customer_name,
            total_cents, paid_cents, remaining_cents,
            status, payment_status, return_status,
            notes, created_by, sale_date, created_at, updated_at, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.customer_id)
    .bind(&sale.customer_name)
    .bind(sale.total_cents)
    .bind(sale.paid_cents)
    .bind(sale.remaining_cents)
    .bind(sale.status)
    .bind(sale.payment_status)
    .bind(sale.return_status)
    .bind(&sale.notes)
    .bind(&sale.created_by)
    .bind(sale.sale_date)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .bind(sale.version)
    .execute(&mut *conn)
    .await?;

    for item in &sale.items {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, position, product_id, serial_number, product_name,
                quantity, price_cents, is_returned, return_date, return_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(item.position)
        .bind(&item.product_id)
        .bind(&item.serial_number)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.price_cents)
        .bind(item.is_returned)
        .bind(item.return_date)
        .bind(&item.return_reason)
        .execute(&mut *conn)
        .await?;
    }

    for payment in &sale.payments {
        insert_payment(conn, payment).await?;
    }

    Ok(())
}

async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (id, sale_id, position, amount_cents, method, notes, paid_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.sale_id)
    .bind(payment.position)
    .bind(payment.amount_cents)
    .bind(&payment.method)
    .bind(&payment.notes)
    .bind(payment.paid_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn update_item_return(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE sale_items SET
            is_returned = ?2, return_date = ?3, return_reason = ?4
        WHERE id = ?1
        "#,
    )
    .bind(&item.id)
    .bind(item.is_returned)
    .bind(item.return_date)
    .bind(&item.return_reason)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("SaleItem", &item.id));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{Duration, TimeZone};
    use tally_core::customer::NewCustomer;
    use tally_core::sale::NewSaleItem;
    use tally_core::{Customer, PaymentStatus, ReturnStatus, ValidationError};

    async fn setup_with(config: DbConfig) -> (Database, Customer) {
        let db = Database::new(config).await.unwrap();
        let customer = db.customers().create(NewCustomer::named("Ana")).await.unwrap();
        (db, customer)
    }

    async fn setup() -> (Database, Customer) {
        setup_with(DbConfig::in_memory()).await
    }

    fn item(serial: &str, price_cents: i64, quantity: i64) -> NewSaleItem {
        NewSaleItem {
            serial_number: serial.to_string(),
            product_name: format!("Product {serial}"),
            quantity,
            price_cents,
            ..Default::default()
        }
    }

    fn new_sale(customer: &Customer) -> NewSale {
        NewSale {
            customer_id: customer.id.clone(),
            customer_name: customer.name.clone(),
            items: vec![item("SN-A", 100, 2), item("SN-B", 50, 1)],
            created_by: "op-1".to_string(),
            ..Default::default()
        }
    }

    async fn customer_totals(db: &Database, id: &str) -> (i64, i64) {
        let c = db.customers().get_by_id(id).await.unwrap().unwrap();
        (c.total_purchases, c.total_spent_cents)
    }

    #[tokio::test]
    async fn test_create_persists_and_credits_customer() {
        let (db, customer) = setup().await;
        let sale = db.sales().create(new_sale(&customer)).await.unwrap();

        assert_eq!(sale.total_cents, 250);
        assert_eq!(sale.status, SaleStatus::Pending);
        assert_eq!(customer_totals(&db, &customer.id).await, (1, 250));

        let stored = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.items[0].serial_number, "SN-A");
        assert_eq!(stored.total_cents, 250);
        assert_eq!(stored.version, 1);
        assert!(stored.is_consistent());
    }

    #[tokio::test]
    async fn test_create_with_unknown_customer_writes_nothing() {
        let (db, customer) = setup().await;
        let mut input = new_sale(&customer);
        input.customer_id = "missing".to_string();

        let err = db.sales().create(input).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CustomerNotFound(_))));
        assert_eq!(db.health().await.unwrap().sales, 0);
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_totals() {
        let (db, customer) = setup().await;
        let sale = Sale::create(new_sale(&customer), Utc::now(), PaymentPolicy::default()).unwrap();

        db.sales().persist_new(&sale).await.unwrap();
        // Same ids again: the sale insert fails after the totals update.
        let err = db.sales().persist_new(&sale).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        assert_eq!(customer_totals(&db, &customer.id).await, (1, 250));
    }

    #[tokio::test]
    async fn test_payments_update_balance() {
        let (db, customer) = setup().await;
        let repo = db.sales();
        let sale = repo.create(new_sale(&customer)).await.unwrap();

        let sale = repo.add_payment(&sale.id, NewPayment::new(100)).await.unwrap();
        let sale = repo.add_payment(&sale.id, NewPayment::new(50)).await.unwrap();

        assert_eq!(sale.paid_cents, 150);
        assert_eq!(sale.remaining_cents, 100);
        assert_eq!(sale.status, SaleStatus::Partial);
        assert_eq!(sale.version, 3);

        let stored = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.payments.len(), 2);
        assert_eq!(stored.paid_cents, 150);
        assert_eq!(stored.payments[1].amount_cents, 50);
        assert!(stored.is_consistent());
    }

    #[tokio::test]
    async fn test_full_payment_marks_paid() {
        let (db, customer) = setup().await;
        let repo = db.sales();
        let sale = repo.create(new_sale(&customer)).await.unwrap();

        let sale = repo.add_payment(&sale.id, NewPayment::new(250)).await.unwrap();
        assert_eq!(sale.paid_cents, 250);
        assert_eq!(sale.remaining_cents, 0);
        assert_eq!(sale.status, SaleStatus::Paid);
    }

    #[tokio::test]
    async fn test_payment_rejections() {
        let (db, customer) = setup().await;
        let repo = db.sales();
        let sale = repo.create(new_sale(&customer)).await.unwrap();

        assert!(repo
            .add_payment("missing", NewPayment::new(10))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(matches!(
            repo.add_payment(&sale.id, NewPayment::new(0)).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));

        let stored = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert!(stored.payments.is_empty());
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_payment_sum_overflow_is_rejected() {
        let (db, customer) = setup().await;
        let repo = db.sales();
        let sale = repo.create(new_sale(&customer)).await.unwrap();
        let sale = repo
            .add_payment(&sale.id, NewPayment::new(i64::MAX))
            .await
            .unwrap();
        assert_eq!(sale.version, 2);

        let err = repo
            .add_payment(&sale.id, NewPayment::new(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let stored = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.payments.len(), 1);
        assert_eq!(stored.paid_cents, i64::MAX);
        assert_eq!(stored.status, SaleStatus::Paid);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_overpayment_policy() {
        let (db, customer) = setup_with(DbConfig::in_memory().allow_overpayment(false)).await;
        let sale = db.sales().create(new_sale(&customer)).await.unwrap();

        let err = db
            .sales()
            .add_payment(&sale.id, NewPayment::new(300))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Overpayment { .. })));

        let lenient = db.sales().with_payment_policy(PaymentPolicy::default());
        let sale = lenient.add_payment(&sale.id, NewPayment::new(300)).await.unwrap();
        assert_eq!(sale.remaining_cents, -50);
        assert_eq!(sale.status, SaleStatus::Paid);
    }

    #[tokio::test]
    async fn test_return_unknown_serial_leaves_sale_unchanged() {
        let (db, customer) = setup().await;
        let repo = db.sales();
        let sale = repo.create(new_sale(&customer)).await.unwrap();

        let err = repo.return_item(&sale.id, "SN-404", None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::SaleItemNotFound { .. })
        ));
        assert!(err.is_not_found());

        let stored = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.version, sale.version);
        assert!(stored.items.iter().all(|i| !i.is_returned));
    }

    #[tokio::test]
    async fn test_return_twice_is_idempotent() {
        let (db, customer) = setup().await;
        let repo = db.sales();
        let sale = repo.create(new_sale(&customer)).await.unwrap();

        let first = repo.return_item(&sale.id, "SN-A", Some("scratched")).await.unwrap();
        let second = repo.return_item(&sale.id, "SN-A", Some("scratched")).await.unwrap();

        let first_date = first.items[0].return_date.unwrap();
        let second_date = second.items[0].return_date.unwrap();
        assert!(second_date >= first_date);

        let stored = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert!(stored.items[0].is_returned);
        assert_eq!(stored.items[0].return_date, Some(second_date));
        assert_eq!(stored.items[0].return_reason.as_deref(), Some("scratched"));
        assert_eq!(stored.return_status, ReturnStatus::Partial);
    }

    #[tokio::test]
    async fn test_all_returned_overrides_paid() {
        let (db, customer) = setup().await;
        let repo = db.sales();
        let sale = repo.create(new_sale(&customer)).await.unwrap();
        repo.add_payment(&sale.id, NewPayment::new(250)).await.unwrap();
        repo.return_item(&sale.id, "SN-A", None).await.unwrap();
        let sale = repo.return_item(&sale.id, "SN-B", None).await.unwrap();

        assert_eq!(sale.status, SaleStatus::Returned);
        assert_eq!(sale.payment_status, PaymentStatus::Paid);
        assert_eq!(sale.paid_cents, 250);

        let returned = repo
            .list(
                &SaleFilter {
                    status: Some(SaleStatus::Returned),
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(returned.total, 1);
    }

    #[tokio::test]
    async fn test_update_edits_only_editable_fields() {
        let (db, customer) = setup().await;
        let repo = db.sales();
        let sale = repo.create(new_sale(&customer)).await.unwrap();
        let new_date = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();

        let sale = repo
            .update(
                &sale.id,
                SaleUpdate {
                    notes: Some("deliver friday".to_string()),
                    sale_date: Some(new_date),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.notes.as_deref(), Some("deliver friday"));
        assert_eq!(stored.sale_date, new_date);
        assert_eq!(stored.total_cents, 250);
        assert_eq!(stored.customer_name, "Ana");
    }

    #[tokio::test]
    async fn test_delete_debits_customer_exactly() {
        let (db, customer) = setup().await;
        let repo = db.sales();
        let keep = repo.create(new_sale(&customer)).await.unwrap();
        let sale = repo.create(new_sale(&customer)).await.unwrap();
        repo.add_payment(&sale.id, NewPayment::new(100)).await.unwrap();
        assert_eq!(customer_totals(&db, &customer.id).await, (2, 500));

        repo.delete(&sale.id).await.unwrap();

        assert_eq!(customer_totals(&db, &customer.id).await, (1, 250));
        assert!(repo.get_by_id(&sale.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&keep.id).await.unwrap().is_some());

        let orphans: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM sale_items WHERE sale_id = ?1) + (SELECT COUNT(*) FROM payments WHERE sale_id = ?1)",
        )
        .bind(&sale.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(orphans, 0);

        assert!(repo.delete(&sale.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_with_missing_customer_still_deletes() {
        let (db, customer) = setup().await;
        let sale = db.sales().create(new_sale(&customer)).await.unwrap();
        db.customers().delete(&customer.id).await.unwrap();

        db.sales().delete(&sale.id).await.unwrap();
        assert!(db.sales().get_by_id(&sale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_version_write_is_refused() {
        let (db, customer) = setup().await;
        let repo = db.sales();
        let sale = repo.create(new_sale(&customer)).await.unwrap();

        let mut stale = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        repo.add_payment(&sale.id, NewPayment::new(100)).await.unwrap();

        let payment = stale
            .add_payment(NewPayment::new(40), Utc::now(), PaymentPolicy::default())
            .unwrap();
        let written = repo
            .write_change(&stale, stale.version, &SaleChange::Payment(payment))
            .await
            .unwrap();
        assert!(!written);

        let stored = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.payments.len(), 1);
        assert_eq!(stored.paid_cents, 100);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_payments_are_not_lost() {
        let path = std::env::temp_dir().join(format!("tally-test-{}.db", uuid::Uuid::new_v4()));
        let (db, customer) = setup_with(DbConfig::new(&path).max_write_retries(20)).await;
        let sale = db.sales().create(new_sale(&customer)).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = db.sales();
                let id = sale.id.clone();
                tokio::spawn(async move { repo.add_payment(&id, NewPayment::new(10)).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(DbError::ConcurrencyConflict { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let stored = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert!(succeeded > 0);
        assert_eq!(stored.payments.len(), succeeded);
        assert_eq!(stored.paid_cents, 10 * succeeded as i64);
        assert_eq!(stored.version, 1 + succeeded as i64);
        assert!(stored.is_consistent());

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (db, customer) = setup().await;
        let bruno = db.customers().create(NewCustomer::named("Bruno")).await.unwrap();
        let repo = db.sales();
        let now = Utc::now();

        let mut old = new_sale(&customer);
        old.sale_date = Some(now - Duration::days(40));
        repo.create(old).await.unwrap();
        repo.create(new_sale(&customer)).await.unwrap();

        let mut other = new_sale(&bruno);
        other.items = vec![item("IMEI-777", 900, 1)];
        let other = repo.create(other).await.unwrap();

        let all = repo.list(&SaleFilter::default(), None, None).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.items.len(), 3);
        assert!(all.items.windows(2).all(|w| w[0].sale_date >= w[1].sale_date));
        assert!(all.items.iter().all(|s| !s.items.is_empty()));

        let by_serial = repo
            .list(
                &SaleFilter {
                    query: Some("imei-7".to_string()),
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(by_serial.total, 1);
        assert_eq!(by_serial.items[0].id, other.id);

        let by_name = repo
            .list(
                &SaleFilter {
                    query: Some("ANA".to_string()),
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(by_name.total, 2);

        let recent = repo
            .list(
                &SaleFilter {
                    customer_id: Some(customer.id.clone()),
                    start_date: Some(now - Duration::days(30)),
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(recent.total, 1);

        let paged = repo.list(&SaleFilter::default(), Some(2), Some(2)).await.unwrap();
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.pages, 2);
    }

    #[tokio::test]
    async fn test_search_product_by_serial_miss() {
        let (db, _) = setup().await;
        let lookup = db.sales().search_product_by_serial("SN-X").await.unwrap();
        assert!(!lookup.found);
    }
}
