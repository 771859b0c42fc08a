//! # Database Errors
//!
//! Everything a repository can fail with. sqlx errors are classified in the
//! `From<sqlx::Error>` impl below; domain rule failures from tally-core are
//! wrapped unchanged in [`DbError::Domain`] so the API layer can map them.

use tally_core::CoreError;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU or serial number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A multi-row write could not be committed as a unit.
    ///
    /// ## When This Occurs
    /// - Commit of a sale + customer totals transaction fails
    ///
    /// Nothing from the failed transaction is visible afterwards.
    #[error("Consistency failure: {0}")]
    Consistency(String),

    /// Optimistic concurrency retries exhausted.
    ///
    /// ## When This Occurs
    /// ```text
    /// writer A: read v3 ─────────────── UPDATE .. WHERE version = 3  ✓ (v4)
    /// writer B: read v3 ── UPDATE .. WHERE version = 3 ✗ → reload v4 → retry
    ///                            ... retried max_write_retries times ✗
    ///                            → ConcurrencyConflict
    /// ```
    #[error("Concurrent modification of {entity} {id}, please retry")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Business rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::ConcurrencyConflict {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Wraps a failed commit.
    pub fn consistency(err: sqlx::Error) -> Self {
        DbError::Consistency(err.to_string())
    }

    /// True for both storage-level and domain-level "does not exist".
    pub fn is_not_found(&self) -> bool {
        match self {
            DbError::NotFound { .. } => true,
            DbError::Domain(core) => core.is_not_found(),
            _ => false,
        }
    }
}

impl From<tally_core::ValidationError> for DbError {
    fn from(err: tally_core::ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Constraint failures are recognised from SQLite's message text; anything
/// unclassified becomes [`DbError::Internal`].
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_family() {
        assert!(DbError::not_found("Sale", "s-1").is_not_found());
        assert!(DbError::Domain(CoreError::CustomerNotFound("c-1".into())).is_not_found());
        assert!(!DbError::conflict("Sale", "s-1").is_not_found());
    }

    #[test]
    fn test_row_not_found_maps() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
