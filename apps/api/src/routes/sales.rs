//! Sale lifecycle endpoints.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use tally_core::sale::{NewPayment, NewSale, SaleUpdate};
use tally_core::{Page, Sale, SaleStatus, SerialLookup};
use tally_db::SaleFilter;

use super::{parse_optional_date, DayBound};
use crate::error::ApiError;
use crate::state::AppState;

/// Identifies the operator ringing up a sale. Set by the auth layer in front
/// of this service.
pub const OPERATOR_HEADER: &str = "x-operator-id";

// -- Request types --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialQuery {
    pub serial_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSalesQuery {
    pub q: Option<String>,
    pub customer_id: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Body of `POST /api/sales/return-item`.
///
/// `serialNumber` and `reason` are accepted as shorter spellings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnItemRequest {
    pub sale_id: String,
    #[serde(alias = "serialNumber")]
    pub item_serial_number: String,
    #[serde(alias = "reason")]
    pub return_reason: Option<String>,
}

impl ListSalesQuery {
    fn into_filter(self) -> Result<SaleFilter, ApiError> {
        let status = match self.status.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Some(s.parse::<SaleStatus>()?),
            _ => None,
        };

        Ok(SaleFilter {
            query: self.q,
            customer_id: self.customer_id.filter(|id| !id.trim().is_empty()),
            status,
            start_date: parse_optional_date("startDate", self.start_date.as_deref(), DayBound::Start)?,
            end_date: parse_optional_date("endDate", self.end_date.as_deref(), DayBound::End)?,
        })
    }
}

fn operator_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(OPERATOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation("X-Operator-Id header is required"))
}

// -- Handlers --

/// GET /api/sales/search-product?serialNumber=: inventory lookup.
///
/// A miss is `{ "found": false }`, not a 404.
pub async fn search_product(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SerialQuery>, QueryRejection>,
) -> Result<Json<SerialLookup>, ApiError> {
    let Query(query) = query?;
    let serial = query
        .serial_number
        .ok_or_else(|| ApiError::validation("serialNumber is required"))?;

    Ok(Json(state.db.sales().search_product_by_serial(&serial).await?))
}

/// POST /api/sales: ring up a sale and credit the customer.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<NewSale>, JsonRejection>,
) -> Result<(StatusCode, Json<Sale>), ApiError> {
    let created_by = operator_id(&headers)?;
    let Json(mut input) = body?;
    input.created_by = created_by;

    let sale = state.db.sales().create(input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// GET /api/sales: filtered, paged, most recent first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListSalesQuery>, QueryRejection>,
) -> Result<Json<Page<Sale>>, ApiError> {
    let Query(query) = query?;
    let (page, limit) = (query.page, query.limit);
    let filter = query.into_filter()?;

    Ok(Json(state.db.sales().list(&filter, page, limit).await?))
}

/// GET /api/sales/{id}
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Sale>, ApiError> {
    let sale = state
        .db
        .sales()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale", &id))?;
    Ok(Json(sale))
}

/// PUT /api/sales/{id}: edit customer name, notes or sale date.
#[tracing::instrument(skip(state, body))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<SaleUpdate>, JsonRejection>,
) -> Result<Json<Sale>, ApiError> {
    let Json(update) = body?;
    Ok(Json(state.db.sales().update(&id, update).await?))
}

/// DELETE /api/sales/{id}: remove the sale and debit the customer.
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.sales().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sales/{id}/payment
#[tracing::instrument(skip(state, body))]
pub async fn add_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<NewPayment>, JsonRejection>,
) -> Result<Json<Sale>, ApiError> {
    let Json(payment) = body?;
    Ok(Json(state.db.sales().add_payment(&id, payment).await?))
}

/// POST /api/sales/return-item
#[tracing::instrument(skip(state, body))]
pub async fn return_item(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ReturnItemRequest>, JsonRejection>,
) -> Result<Json<Sale>, ApiError> {
    let Json(req) = body?;
    let sale = state
        .db
        .sales()
        .return_item(&req.sale_id, &req.item_serial_number, req.return_reason.as_deref())
        .await?;
    Ok(Json(sale))
}
