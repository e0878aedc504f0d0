//! Error types for post-sync content processing.

use cti_catalog_store::StoreError;
use cti_catalog_sync::SyncError;
use thiserror::Error;

/// Errors that can occur while processing synced content.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Reading or writing an index failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The security-analytics sink rejected a request.
    #[error("security analytics error: {0}")]
    Analytics(String),

    /// A stored document lacks a field the processor needs.
    #[error("malformed document {id}: {reason}")]
    Malformed { id: String, reason: String },
}

impl From<ContentError> for SyncError {
    fn from(e: ContentError) -> Self {
        SyncError::PostSyncFailed(e.to_string())
    }
}

/// Result type for content operations.
pub type Result<T> = std::result::Result<T, ContentError>;
