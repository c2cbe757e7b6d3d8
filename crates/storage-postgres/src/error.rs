//! Error types for the Postgres sink.

use regionsync_core::SyncTable;
use thiserror::Error;

/// Result type alias for sink operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// How a sink failure should be treated by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Payload shape disagrees with the local schema; log the shape and skip.
    Schema,
    /// Connection-level trouble; skip and let CDC redelivery converge.
    Transient,
    Other,
}

/// Errors that can occur while reading or mutating the local store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Table is not materialized in this region
    #[error("table '{0}' is not materialized by the sync core")]
    UnsyncedTable(SyncTable),
}

/// Postgres SQLSTATE codes that indicate a payload/schema disagreement.
const SCHEMA_SQLSTATES: [&str; 5] = [
    "42703", // undefined_column
    "42P01", // undefined_table
    "42804", // datatype_mismatch
    "22P02", // invalid_text_representation
    "23502", // not_null_violation
];

impl StorageError {
    /// Classify for the consumer's error handling.
    pub fn class(&self) -> ErrorClass {
        match self {
            StorageError::UnsyncedTable(_) => ErrorClass::Schema,
            StorageError::Database(err) => match err {
                sqlx::Error::Database(db) => {
                    let code = db.code();
                    if code
                        .as_deref()
                        .is_some_and(|c| SCHEMA_SQLSTATES.contains(&c))
                    {
                        ErrorClass::Schema
                    } else {
                        ErrorClass::Other
                    }
                }
                sqlx::Error::Io(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed => ErrorClass::Transient,
                sqlx::Error::ColumnDecode { .. } | sqlx::Error::TypeNotFound { .. } => {
                    ErrorClass::Schema
                }
                _ => ErrorClass::Other,
            },
        }
    }
}
