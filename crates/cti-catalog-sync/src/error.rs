//! Error types for the sync module.

use cti_catalog_core::CoreError;
use cti_catalog_store::StoreError;
use thiserror::Error;

/// Errors that can end a sync cycle.
///
/// Every variant is terminal for the current cycle only: the checkpoint is
/// left at the last fully applied chunk and the next scheduled run retries.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network failure, timeout or non-success status from the catalog.
    #[error("remote catalog unavailable: {0}")]
    RemoteUnavailable(String),

    /// The catalog answered with something we cannot use.
    #[error("malformed remote response: {0}")]
    RemoteMalformed(String),

    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A content index could not be created.
    #[error("failed to create index {index}: {reason}")]
    IndexCreationFailed { index: String, reason: String },

    /// A change failed to apply; `applied` offsets of the chunk went through.
    #[error("patch failed at offset {offset} after {applied} applied: {reason}")]
    PatchApplyFailed {
        offset: u64,
        applied: usize,
        reason: String,
    },

    #[error("snapshot download failed: {0}")]
    SnapshotDownloadFailed(String),

    #[error("snapshot parse failed: {0}")]
    SnapshotParseFailed(String),

    /// Another node holds the consumer lock.
    #[error("consumer {key} is locked by {owner}")]
    Busy { key: String, owner: String },

    /// Checkpoint update rejected.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[source] CoreError),

    /// Post-sync processing failed after the checkpoint was written.
    #[error("post-sync failed: {0}")]
    PostSyncFailed(String),

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            e if e.is_unavailable() => SyncError::StoreUnavailable(e.to_string()),
            StoreError::IndexCreationFailed { index, reason } => {
                SyncError::IndexCreationFailed { index, reason }
            }
            e => SyncError::Store(e),
        }
    }
}

impl SyncError {
    /// Whether the cycle was skipped rather than failed.
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncError::Busy { .. })
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_is_kept_distinct() {
        let err: SyncError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, SyncError::StoreUnavailable(_)));

        let err: SyncError = StoreError::NotFound("x".into()).into();
        assert!(matches!(err, SyncError::Store(StoreError::NotFound(_))));
    }

    #[test]
    fn test_index_creation_failure_maps_through() {
        let err: SyncError = StoreError::IndexCreationFailed {
            index: ".a".into(),
            reason: "alias".into(),
        }
        .into();
        assert!(matches!(err, SyncError::IndexCreationFailed { .. }));
    }
}
