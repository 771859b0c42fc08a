//! Database health and sales statistics.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tally_core::report::{ReportPeriod, ReportWindow, SalesReport};
use tally_db::DatabaseHealth;
use tracing::debug;

use super::{parse_optional_date, DayBound};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesStatsQuery {
    /// `7d`, `30d`, `90d` or `1y`; anything else means `30d`.
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// GET /api/database/health: row counts and migration status.
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<DatabaseHealth>, ApiError> {
    Ok(Json(state.db.health().await?))
}

/// GET /api/database/sales-stats: the sales report over a window.
///
/// Explicit dates win over `period`. A named period, or a `startDate` on its
/// own, leaves the window open so future-dated sales are counted.
#[tracing::instrument(skip(state, query))]
pub async fn sales_stats(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SalesStatsQuery>, QueryRejection>,
) -> Result<Json<SalesReport>, ApiError> {
    let Query(query) = query?;

    let start = parse_optional_date("startDate", query.start_date.as_deref(), DayBound::Start)?;
    let end = parse_optional_date("endDate", query.end_date.as_deref(), DayBound::End)?;

    let (period, window) = match (start, end) {
        (Some(start), Some(end)) => (None, ReportWindow::new(start, end)?),
        (Some(start), None) => (None, ReportWindow::since(start)),
        (None, Some(_)) => return Err(ApiError::validation("endDate requires startDate")),
        (None, None) => {
            let period = ReportPeriod::parse_or_default(query.period.as_deref());
            (Some(period), period.window_from(Utc::now()))
        }
    };

    debug!(?period, start = %window.start, end = ?window.end, "Sales stats requested");

    let report = state
        .db
        .reports()
        .sales_report(period, window, state.top_customers)
        .await?;
    Ok(Json(report))
}
