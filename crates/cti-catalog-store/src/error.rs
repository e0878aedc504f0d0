//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The backing store cannot be reached right now.
    ///
    /// Distinct from [`StoreError::NotFound`]: callers must never treat an
    /// unreachable store as an empty one.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Document or checkpoint not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Index could not be created.
    #[error("failed to create index {index}: {reason}")]
    IndexCreationFailed { index: String, reason: String },

    /// Document serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the error means the store could not be reached, as opposed
    /// to a logical failure of the request.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::SystemIoFailure
            ),
            StoreError::Io(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
