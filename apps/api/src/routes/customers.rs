//! Customer directory endpoints.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tally_core::customer::{CustomerUpdate, NewCustomer};
use tally_core::{Customer, Page};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct ListCustomersQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOrCreateResponse {
    pub customer: Customer,
    /// False when an existing customer matched.
    pub created: bool,
}

// -- Handlers --

/// POST /api/customers/search-or-create: find by name (and phone) or add.
///
/// Responds 201 when a customer was created, 200 when one matched.
#[tracing::instrument(skip(state, body))]
pub async fn search_or_create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewCustomer>, JsonRejection>,
) -> Result<(StatusCode, Json<SearchOrCreateResponse>), ApiError> {
    let Json(input) = body?;
    let found = state.db.customers().search_or_create(input).await?;

    let status = if found.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(SearchOrCreateResponse {
            customer: found.customer,
            created: found.created,
        }),
    ))
}

/// GET /api/customers: newest first, optional name/phone/email filter.
pub async fn list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListCustomersQuery>, QueryRejection>,
) -> Result<Json<Page<Customer>>, ApiError> {
    let Query(query) = query?;
    let page = state
        .db
        .customers()
        .list(query.q.as_deref(), query.page, query.limit)
        .await?;
    Ok(Json(page))
}

/// GET /api/customers/{id}
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    let customer = state
        .db
        .customers()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", &id))?;
    Ok(Json(customer))
}

/// PUT /api/customers/{id}: edit contact details.
#[tracing::instrument(skip(state, body))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<CustomerUpdate>, JsonRejection>,
) -> Result<Json<Customer>, ApiError> {
    let Json(update) = body?;
    Ok(Json(state.db.customers().update(&id, update).await?))
}

/// DELETE /api/customers/{id}: sales keep their snapshot name.
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.customers().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/customers/{id}/recompute-totals: rebuild totals from sales.
#[tracing::instrument(skip(state))]
pub async fn recompute_totals(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.db.customers().recompute_totals(&id).await?))
}
