//! # tally-api: HTTP Surface for Tally POS
//!
//! Exposes the customer directory, inventory lookup, sale lifecycle and
//! reporting as JSON endpoints. Bodies are camelCase, amounts are integer
//! cents.
//!
//! ## Module Organization
//! ```text
//! tally_api/
//! ├── lib.rs          ◄─── Router assembly
//! ├── main.rs         ◄─── Startup: tracing, config, database, serve
//! ├── config.rs       ◄─── TOML + TALLY_* environment configuration
//! ├── error.rs        ◄─── ApiError → HTTP status + JSON body
//! ├── state.rs        ◄─── Shared handler state
//! └── routes/
//!     ├── health.rs     ◄─── /health
//!     ├── database.rs   ◄─── /api/database/*
//!     ├── customers.rs  ◄─── /api/customers/*
//!     └── sales.rs      ◄─── /api/sales/*
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::{ApiError, ErrorCode};
pub use state::AppState;

/// Builds the application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::check))
        // Database
        .route("/api/database/health", get(routes::database::health))
        .route("/api/database/sales-stats", get(routes::database::sales_stats))
        // Customers
        .route(
            "/api/customers/search-or-create",
            post(routes::customers::search_or_create),
        )
        .route("/api/customers", get(routes::customers::list))
        .route(
            "/api/customers/{id}",
            get(routes::customers::get)
                .put(routes::customers::update)
                .delete(routes::customers::delete),
        )
        .route(
            "/api/customers/{id}/recompute-totals",
            post(routes::customers::recompute_totals),
        )
        // Sales
        .route("/api/sales/search-product", get(routes::sales::search_product))
        .route("/api/sales/return-item", post(routes::sales::return_item))
        .route(
            "/api/sales",
            get(routes::sales::list).post(routes::sales::create),
        )
        .route(
            "/api/sales/{id}",
            get(routes::sales::get)
                .put(routes::sales::update)
                .delete(routes::sales::delete),
        )
        .route("/api/sales/{id}/payment", post(routes::sales::add_payment))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
