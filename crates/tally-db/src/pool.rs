//! # Connection Pool
//!
//! Opens the SQLite file, applies migrations and hands out repositories.
//!
//! ```text
//!   DbConfig ──► Database::new ──► SqlitePool (1..=max_connections)
//!                     │
//!                     └── migrations::run_migrations
//!
//!   Database ──► customers() | products() | sales() | reports()
//! ```
//!
//! File databases use WAL journaling with a busy timeout, so concurrent
//! writers wait for the lock rather than erroring, and readers keep going.

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tally_core::sale::PaymentPolicy;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::customer::CustomerRepository;
use crate::repository::product::ProductRepository;
use crate::repository::report::ReportRepository;
use crate::repository::sale::SaleRepository;

const MEMORY_PATH: &str = ":memory:";

/// Pool and write-path settings.
///
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/tally.db")
///     .max_connections(5)
///     .allow_overpayment(false);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,

    /// Default: 5
    pub max_connections: u32,

    /// Default: 1
    pub min_connections: u32,

    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Apply pending migrations in `Database::new`.
    pub run_migrations: bool,

    /// How many times a payment, return or edit reloads the sale and tries
    /// again after losing an optimistic concurrency race.
    /// Default: 3
    pub max_write_retries: u32,

    /// Default: overpayment allowed.
    pub payment_policy: PaymentPolicy,
}

impl DbConfig {
    /// Settings for a file database at `path`, created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            max_write_retries: 3,
            payment_policy: PaymentPolicy::default(),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn max_write_retries(mut self, retries: u32) -> Self {
        self.max_write_retries = retries;
        self
    }

    pub fn allow_overpayment(mut self, allow: bool) -> Self {
        self.payment_policy = PaymentPolicy {
            allow_overpayment: allow,
        };
        self
    }

    /// A private in-memory database. Used by tests.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1, // each connection would see its own database
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        if self.is_in_memory() {
            return SqliteConnectOptions::from_str("sqlite::memory:")
                .map(|options| options.foreign_keys(true))
                .map_err(|e| DbError::ConnectionFailed(e.to_string()));
        }

        Ok(SqliteConnectOptions::new()
            .filename(&self.database_path)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // off by default in SQLite
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true))
    }
}

/// Settings every write path needs, handed to repositories.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WriteSettings {
    pub max_write_retries: u32,
    pub payment_policy: PaymentPolicy,
}

/// Row counts and migration state, for the database health endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub healthy: bool,
    pub customers: i64,
    pub sales: i64,
    pub products: i64,
    pub migrations_total: usize,
    pub migrations_applied: usize,
}

/// Shared handle over the pool.
///
/// Cheap to clone: the pool is reference counted. The API keeps one in its
/// shared state and hands out repositories per request.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    settings: WriteSettings,
}

impl Database {
    /// Connects, then migrates unless `run_migrations` is off.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening database"
        );

        let connect_options = config.connect_options()?;

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            allow_overpayment = config.payment_policy.allow_overpayment,
            max_write_retries = config.max_write_retries,
            "Database pool created"
        );

        let db = Database {
            pool,
            settings: WriteSettings {
                max_write_retries: config.max_write_retries,
                payment_policy: config.payment_policy,
            },
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the sale repository, carrying the configured payment policy
    /// and retry budget.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
            .with_payment_policy(self.settings.payment_policy)
            .with_max_write_retries(self.settings.max_write_retries)
    }

    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections, then closes the pool.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    /// `SELECT 1` round trip.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Row counts plus migration status.
    pub async fn health(&self) -> DbResult<DatabaseHealth> {
        let (customers, sales, products): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM customers),
                (SELECT COUNT(*) FROM sales),
                (SELECT COUNT(*) FROM products)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let (migrations_total, migrations_applied) =
            migrations::migration_status(&self.pool).await?;

        Ok(DatabaseHealth {
            healthy: migrations_applied >= migrations_total,
            customers,
            sales,
            products,
            migrations_total,
            migrations_applied,
        })
    }
}
