//! Tally API server entry point.
//!
//! ## Startup Sequence
//! ```text
//! 1. Initialize logging    tracing-subscriber, RUST_LOG or the default filter
//! 2. Load configuration    $TALLY_CONFIG or the platform config dir, then TALLY_*
//! 3. Open the database     SQLite (WAL), pending migrations applied
//! 4. Serve                 axum, graceful shutdown on SIGINT / SIGTERM
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tally_api::{AppState, ServerConfig};
use tally_db::Database;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Tally POS API");

    let config_path = std::env::var_os("TALLY_CONFIG").map(PathBuf::from);
    let config = ServerConfig::load(config_path).context("failed to load configuration")?;

    let db_path = config
        .database_path()
        .context("failed to resolve database path")?;
    info!(?db_path, "Database path determined");

    let db = Database::new(config.db_config(db_path))
        .await
        .context("failed to open database")?;
    info!("Database connected and migrations applied");

    let state = Arc::new(AppState::new(db.clone(), config.reports.top_customers));
    let app = tally_api::create_app(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    db.close().await;
    info!("Server shut down gracefully");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tally=trace` - Show trace for tally crates only
/// - Default: INFO, DEBUG for tally crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn,tower_http=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
