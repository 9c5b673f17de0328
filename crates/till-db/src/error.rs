//! # Storage Error Types
//!
//! Every Local Store failure surfaces as a [`StorageError`]. Nothing is
//! swallowed: a sale that cannot be committed is an error the cashier sees.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / MigrateError / serde_json::Error                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StorageError (this module)                                            │
//! │       │                                                                 │
//! │       ├──► Checkout::complete_sale → Err, cart kept                    │
//! │       │                                                                 │
//! │       └──► SyncError::Storage → orchestrator status banner             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Local Store errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entity not found.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - Unknown transaction id in a lookup that requires one
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Same transaction id recorded twice
    /// - Two products with one SKU in a tenant
    #[error("Duplicate {field}")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database file could not be opened or the pool is closed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be decoded (bad timestamp, bad items JSON).
    #[error("Corrupt {column} value: {reason}")]
    CorruptData { column: String, reason: String },

    /// Line items could not be encoded for storage.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StorageError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn corrupt(column: impl Into<String>, reason: impl ToString) -> Self {
        StorageError::CorruptData {
            column: column.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convert sqlx errors to StorageError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → StorageError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → StorageError::PoolExhausted
/// Other                       → StorageError::Internal
/// ```
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    StorageError::UniqueViolation {
                        field: field.to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    StorageError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    StorageError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => StorageError::PoolExhausted,

            sqlx::Error::PoolClosed => {
                StorageError::ConnectionFailed("Pool is closed".to_string())
            }

            _ => StorageError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StorageError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StorageError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type for Local Store operations.
pub type StorageResult<T> = Result<T, StorageError>;
