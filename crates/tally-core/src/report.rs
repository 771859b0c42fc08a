//! # Sales Reporting
//!
//! Report shapes and the window they cover.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ReportPeriod ("7d" | "30d" | "90d" | "1y")                             │
//! │        │  window_from(now)                                              │
//! │        ▼                                                                │
//! │  ReportWindow { start, end? }  on Sale.sale_date, inclusive             │
//! │        │                                                                │
//! │        ├──► SalesSummary        sums, average, max, min, count          │
//! │        ├──► StatusBreakdown[]   count + amount per status               │
//! │        ├──► TopCustomer[]       by total spent, top N                   │
//! │        └──► DailySales[]        per YYYY-MM-DD, ascending               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The database computes these with SQL aggregates. [`SalesReport::from_sales`]
//! computes the same figures in memory and is the reference the SQL is
//! tested against.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationResult;
use crate::types::{Sale, SaleStatus};
use crate::validation::validate_date_range;

/// Number of customers in the "top customers" list unless configured.
pub const DEFAULT_TOP_CUSTOMERS: u32 = 10;

// =============================================================================
// Period and Window
// =============================================================================

/// A named look-back period.
///
/// Its window starts `days()` before now and has no upper bound, so sales
/// dated in the future are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ReportPeriod {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "1y")]
    Year,
}

impl ReportPeriod {
    /// Parses a period label. Unknown or missing labels fall back to 30 days.
    pub fn parse_or_default(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some("7d") => ReportPeriod::Week,
            Some("90d") => ReportPeriod::Quarter,
            Some("1y") => ReportPeriod::Year,
            _ => ReportPeriod::Month,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportPeriod::Week => "7d",
            ReportPeriod::Month => "30d",
            ReportPeriod::Quarter => "90d",
            ReportPeriod::Year => "1y",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            ReportPeriod::Week => 7,
            ReportPeriod::Month => 30,
            ReportPeriod::Quarter => 90,
            ReportPeriod::Year => 365,
        }
    }

    pub fn window_from(&self, now: DateTime<Utc>) -> ReportWindow {
        ReportWindow::since(now - Duration::days(self.days()))
    }
}

/// Inclusive range on `sale_date`. `end: None` leaves it open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl ReportWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> ValidationResult<Self> {
        validate_date_range(Some(start), Some(end))?;
        Ok(ReportWindow {
            start,
            end: Some(end),
        })
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        ReportWindow { start, end: None }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && self.end.map_or(true, |end| at <= end)
    }
}

// =============================================================================
// Report Shapes
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub total_sales_cents: i64,
    pub total_paid_cents: i64,
    pub total_remaining_cents: i64,
    pub sales_count: i64,
    /// Mean sale amount, rounded half away from zero.
    pub average_sale_cents: i64,
    pub max_sale_cents: i64,
    pub min_sale_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StatusBreakdown {
    pub status: SaleStatus,
    pub count: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TopCustomer {
    pub customer_id: String,
    /// Name on the customer's most recent sale in the window.
    pub customer_name: String,
    pub total_spent_cents: i64,
    pub purchase_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    /// `YYYY-MM-DD` in UTC.
    pub day: String,
    pub total_cents: i64,
    pub sales_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    /// Set when the window came from a named period.
    pub period: Option<ReportPeriod>,
    #[ts(as = "String")]
    pub start_date: DateTime<Utc>,
    /// Absent for open-ended windows.
    #[ts(as = "Option<String>")]
    pub end_date: Option<DateTime<Utc>>,
    pub summary: SalesSummary,
    pub status_breakdown: Vec<StatusBreakdown>,
    pub top_customers: Vec<TopCustomer>,
    pub sales_by_day: Vec<DailySales>,
}

// =============================================================================
// In-Memory Aggregation
// =============================================================================

fn rounded_mean(sum: i64, count: i64) -> i64 {
    if count == 0 {
        return 0;
    }
    let (sum, count) = (sum as i128, count as i128);
    let half = count / 2;
    let mean = if sum >= 0 {
        (sum + half) / count
    } else {
        (sum - half) / count
    };
    mean as i64
}

impl SalesReport {
    /// Aggregates `sales` that fall inside `window`.
    ///
    /// Ordering matches the SQL implementation: statuses by name, top
    /// customers by spend then id, days ascending.
    pub fn from_sales(
        period: Option<ReportPeriod>,
        window: ReportWindow,
        sales: &[Sale],
        top_n: u32,
    ) -> SalesReport {
        let in_window: Vec<&Sale> = sales
            .iter()
            .filter(|s| window.contains(s.sale_date))
            .collect();

        let count = in_window.len() as i64;
        let total: i64 = in_window.iter().map(|s| s.total_cents).sum();
        let summary = SalesSummary {
            total_sales_cents: total,
            total_paid_cents: in_window.iter().map(|s| s.paid_cents).sum(),
            total_remaining_cents: in_window.iter().map(|s| s.remaining_cents).sum(),
            sales_count: count,
            average_sale_cents: rounded_mean(total, count),
            max_sale_cents: in_window.iter().map(|s| s.total_cents).max().unwrap_or(0),
            min_sale_cents: in_window.iter().map(|s| s.total_cents).min().unwrap_or(0),
        };

        let mut by_status: BTreeMap<&'static str, StatusBreakdown> = BTreeMap::new();
        for sale in &in_window {
            let entry = by_status
                .entry(sale.status.as_str())
                .or_insert(StatusBreakdown {
                    status: sale.status,
                    count: 0,
                    total_cents: 0,
                });
            entry.count += 1;
            entry.total_cents += sale.total_cents;
        }

        let mut by_customer: BTreeMap<&str, (TopCustomer, DateTime<Utc>)> = BTreeMap::new();
        for sale in &in_window {
            let (entry, latest) = by_customer
                .entry(sale.customer_id.as_str())
                .or_insert_with(|| {
                    (
                        TopCustomer {
                            customer_id: sale.customer_id.clone(),
                            customer_name: sale.customer_name.clone(),
                            total_spent_cents: 0,
                            purchase_count: 0,
                        },
                        sale.sale_date,
                    )
                });
            entry.total_spent_cents += sale.total_cents;
            entry.purchase_count += 1;
            if sale.sale_date > *latest {
                *latest = sale.sale_date;
                entry.customer_name = sale.customer_name.clone();
            }
        }
        let mut top_customers: Vec<TopCustomer> =
            by_customer.into_values().map(|(c, _)| c).collect();
        top_customers.sort_by(|a, b| {
            b.total_spent_cents
                .cmp(&a.total_spent_cents)
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });
        top_customers.truncate(top_n as usize);

        let mut by_day: BTreeMap<String, DailySales> = BTreeMap::new();
        for sale in &in_window {
            let day = sale.sale_date.format("%Y-%m-%d").to_string();
            let entry = by_day.entry(day.clone()).or_insert(DailySales {
                day,
                total_cents: 0,
                sales_count: 0,
            });
            entry.total_cents += sale.total_cents;
            entry.sales_count += 1;
        }

        SalesReport {
            period,
            start_date: window.start,
            end_date: window.end,
            summary,
            status_breakdown: by_status.into_values().collect(),
            top_customers,
            sales_by_day: by_day.into_values().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sale::{NewPayment, NewSale, NewSaleItem, PaymentPolicy};
    use chrono::TimeZone;

    fn sale_on(customer: &str, day: u32, price: i64, paid: i64) -> Sale {
        let at = Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap();
        let mut sale = Sale::create(
            NewSale {
                customer_id: customer.to_string(),
                customer_name: format!("Customer {customer}"),
                items: vec![NewSaleItem {
                    serial_number: format!("SN-{customer}-{day}"),
                    product_name: "Phone".to_string(),
                    quantity: 1,
                    price_cents: price,
                    ..Default::default()
                }],
                sale_date: Some(at),
                created_by: "op".to_string(),
                ..Default::default()
            },
            at,
            PaymentPolicy::default(),
        )
        .unwrap();
        if paid > 0 {
            sale.add_payment(NewPayment::new(paid), at, PaymentPolicy::default())
                .unwrap();
        }
        sale
    }

    fn march() -> ReportWindow {
        ReportWindow::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!(ReportPeriod::parse_or_default(Some("7d")), ReportPeriod::Week);
        assert_eq!(ReportPeriod::parse_or_default(Some("1y")), ReportPeriod::Year);
        assert_eq!(ReportPeriod::parse_or_default(Some("2w")), ReportPeriod::Month);
        assert_eq!(ReportPeriod::parse_or_default(None), ReportPeriod::Month);
        assert_eq!(ReportPeriod::Quarter.label(), "90d");
    }

    #[test]
    fn test_period_window_is_open_ended() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap();
        let window = ReportPeriod::Week.window_from(now);
        assert_eq!(window.end, None);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 24, 0, 0, 0).unwrap());
        assert!(window.contains(now + Duration::days(400)));
        assert!(!window.contains(window.start - Duration::seconds(1)));
        assert!(ReportWindow::new(now, window.start).is_err());
        assert!(!march().contains(now + Duration::days(1)));
    }

    #[test]
    fn test_empty_report_is_zeroed() {
        let report = SalesReport::from_sales(None, march(), &[], DEFAULT_TOP_CUSTOMERS);
        assert_eq!(report.summary, SalesSummary::default());
        assert!(report.status_breakdown.is_empty());
        assert!(report.sales_by_day.is_empty());
    }

    #[test]
    fn test_report_aggregates() {
        let sales = vec![
            sale_on("a", 2, 48000, 30000),
            sale_on("a", 2, 25000, 25000),
            sale_on("b", 5, 10001, 0),
            // Outside the window.
            sale_on("c", 1, 1, 0),
        ];
        let mut outside = sales[3].clone();
        outside.sale_date = Utc.with_ymd_and_hms(2026, 2, 28, 0, 0, 0).unwrap();
        let sales = vec![sales[0].clone(), sales[1].clone(), sales[2].clone(), outside];

        let report = SalesReport::from_sales(None, march(), &sales, 1);
        let summary = &report.summary;

        assert_eq!(summary.sales_count, 3);
        assert_eq!(summary.total_sales_cents, 83001);
        assert_eq!(summary.total_paid_cents, 55000);
        assert_eq!(summary.total_remaining_cents, 28001);
        assert_eq!(summary.average_sale_cents, 27667);
        assert_eq!(summary.max_sale_cents, 48000);
        assert_eq!(summary.min_sale_cents, 10001);

        let statuses: Vec<_> = report
            .status_breakdown
            .iter()
            .map(|b| (b.status, b.count))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (SaleStatus::Paid, 1),
                (SaleStatus::Partial, 1),
                (SaleStatus::Pending, 1)
            ]
        );

        assert_eq!(report.top_customers.len(), 1);
        assert_eq!(report.top_customers[0].customer_id, "a");
        assert_eq!(report.top_customers[0].total_spent_cents, 73000);
        assert_eq!(report.top_customers[0].purchase_count, 2);

        let days: Vec<_> = report.sales_by_day.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(days, vec!["2026-03-02", "2026-03-05"]);
        assert_eq!(report.sales_by_day[0].sales_count, 2);
    }

    #[test]
    fn test_rounded_mean() {
        assert_eq!(rounded_mean(5, 2), 3);
        assert_eq!(rounded_mean(4, 3), 1);
        assert_eq!(rounded_mean(-5, 2), -3);
        assert_eq!(rounded_mean(0, 0), 0);
    }
}
