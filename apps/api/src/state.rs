//! # Application State
//!
//! Shared by every handler through `State<Arc<AppState>>`.
//!
//! The `Database` handle wraps a `SqlitePool`, which is already safe to
//! share across tasks; no extra locking is needed here.

use tally_db::Database;

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    /// How many customers the sales report ranks.
    pub top_customers: u32,
}

impl AppState {
    pub fn new(db: Database, top_customers: u32) -> Self {
        AppState { db, top_customers }
    }
}
