//! # Report Repository
//!
//! Aggregates over sales whose `sale_date` falls in a window. Every figure is
//! computed by SQLite; nothing is cached.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales WHERE sale_date >= start AND (end IS NULL OR sale_date <= end)   │
//! │       │                                                                 │
//! │       ├── summary            SUM / COUNT / AVG / MAX / MIN              │
//! │       ├── status_breakdown   GROUP BY status                            │
//! │       ├── top_customers      GROUP BY customer_id, top N by spend       │
//! │       └── sales_by_day       GROUP BY substr(sale_date, 1, 10)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All four queries share one read transaction so they see the same data.
//! A window without an end also counts sales dated in the future.

use sqlx::SqlitePool;
use tally_core::report::{
    DailySales, ReportPeriod, ReportWindow, SalesReport, SalesSummary, StatusBreakdown,
    TopCustomer,
};
use tracing::debug;

use crate::error::DbResult;

/// Repository for reporting queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Builds the full report for `window`.
    ///
    /// `period` is only echoed back so clients can label the report.
    pub async fn sales_report(
        &self,
        period: Option<ReportPeriod>,
        window: ReportWindow,
        top_n: u32,
    ) -> DbResult<SalesReport> {
        let mut tx = self.pool.begin().await?;

        let summary: SalesSummary = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(total_cents), 0)                      AS total_sales_cents,
                COALESCE(SUM(paid_cents), 0)                       AS total_paid_cents,
                COALESCE(SUM(remaining_cents), 0)                  AS total_remaining_cents,
                COUNT(*)                                           AS sales_count,
                COALESCE(CAST(ROUND(AVG(total_cents)) AS INTEGER), 0) AS average_sale_cents,
                COALESCE(MAX(total_cents), 0)                      AS max_sale_cents,
                COALESCE(MIN(total_cents), 0)                      AS min_sale_cents
            FROM sales
            WHERE sale_date >= ?1 AND (?2 IS NULL OR sale_date <= ?2)
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&mut *tx)
        .await?;

        let status_breakdown: Vec<StatusBreakdown> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) AS count, SUM(total_cents) AS total_cents
            FROM sales
            WHERE sale_date >= ?1 AND (?2 IS NULL OR sale_date <= ?2)
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&mut *tx)
        .await?;

        // Name comes from the customer's latest sale in the window.
        let top_customers: Vec<TopCustomer> = sqlx::query_as(
            r#"
            SELECT
                s.customer_id,
                (SELECT latest.customer_name FROM sales latest
                 WHERE latest.customer_id = s.customer_id
                   AND latest.sale_date >= ?1 AND (?2 IS NULL OR latest.sale_date <= ?2)
                 ORDER BY latest.sale_date DESC
                 LIMIT 1)                  AS customer_name,
                SUM(s.total_cents)         AS total_spent_cents,
                COUNT(*)                   AS purchase_count
            FROM sales s
            WHERE s.sale_date >= ?1 AND (?2 IS NULL OR s.sale_date <= ?2)
            GROUP BY s.customer_id
            ORDER BY total_spent_cents DESC, s.customer_id ASC
            LIMIT ?3
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .bind(top_n as i64)
        .fetch_all(&mut *tx)
        .await?;

        let sales_by_day: Vec<DailySales> = sqlx::query_as(
            r#"
            SELECT
                substr(sale_date, 1, 10) AS day,
                SUM(total_cents)         AS total_cents,
                COUNT(*)                 AS sales_count
            FROM sales
            WHERE sale_date >= ?1 AND (?2 IS NULL OR sale_date <= ?2)
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            start = %window.start,
            end = ?window.end,
            sales = summary.sales_count,
            "Built sales report"
        );

        Ok(SalesReport {
            period,
            start_date: window.start,
            end_date: window.end,
            summary,
            status_breakdown,
            top_customers,
            sales_by_day,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
