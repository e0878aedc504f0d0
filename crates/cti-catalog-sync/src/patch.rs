//! Applying change sets to content indices.
//!
//! Offsets are applied strictly in order. The first failure stops the
//! chunk; nothing after it is attempted.
//!
//! - CREATE upserts the normalised payload under its document id.
//! - UPDATE patches the stored document and re-normalises it.
//! - DELETE removes the document; deleting an absent one is a no-op.

use thiserror::Error;
use tracing::{debug, warn};

use cti_catalog_core::{
    apply_operations, document_id, normalize_payload, ChangeSet, ContentType, CoreError, Offset,
    OperationType, PatchError,
};
use cti_catalog_store::{DocumentStore, DocumentStoreExt, StoreError};

use crate::profile::ConsumerProfile;

/// Why a single offset could not be applied.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("CREATE without payload")]
    MissingPayload,

    #[error("resource {0} not found in any index")]
    MissingResource(String),

    #[error("invalid patch: {0}")]
    Patch(#[from] PatchError),

    #[error("invalid payload: {0}")]
    Payload(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of applying one chunk.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Every offset applied.
    Applied(usize),
    /// `applied` offsets went through, then `offset` failed.
    PartialFailure {
        applied: usize,
        offset: u64,
        error: ApplyError,
    },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(_))
    }
}

/// Applies offsets to the indices of one consumer.
pub struct PatchApplier<'a> {
    store: &'a dyn DocumentStore,
    profile: &'a ConsumerProfile,
}

impl<'a> PatchApplier<'a> {
    pub fn new(store: &'a dyn DocumentStore, profile: &'a ConsumerProfile) -> Self {
        Self { store, profile }
    }

    /// Apply a validated change set in offset order.
    pub async fn apply(&self, changes: &ChangeSet) -> ApplyOutcome {
        let mut applied = 0;
        for offset in changes.offsets() {
            if let Err(error) = self.apply_offset(offset).await {
                return ApplyOutcome::PartialFailure {
                    applied,
                    offset: offset.offset,
                    error,
                };
            }
            applied += 1;
        }
        ApplyOutcome::Applied(applied)
    }

    /// Apply a single offset.
    pub async fn apply_offset(&self, offset: &Offset) -> Result<(), ApplyError> {
        if offset.is_empty() {
            return Ok(());
        }
        match offset.kind {
            OperationType::Create => self.create(offset).await,
            OperationType::Update => self.update(offset).await,
            OperationType::Delete => self.delete(offset).await,
        }
    }

    async fn create(&self, offset: &Offset) -> Result<(), ApplyError> {
        let payload = offset.payload.as_ref().ok_or(ApplyError::MissingPayload)?;

        let Some(content_type) = offset.payload_type().and_then(ContentType::from_payload_type)
        else {
            warn!(
                offset = offset.offset,
                resource = %offset.resource,
                kind = ?offset.payload_type(),
                "skipping resource of unknown type"
            );
            return Ok(());
        };
        let Some(index) = self.profile.index_for(content_type) else {
            warn!(
                offset = offset.offset,
                content_type = content_type.as_str(),
                consumer = self.profile.name(),
                "skipping resource type not handled by this consumer"
            );
            return Ok(());
        };

        let source = normalize_payload(payload, content_type)?;
        let id = document_id(payload).unwrap_or(&offset.resource);
        self.store.put(&index, id, &source).await?;
        debug!(offset = offset.offset, id, index = %index, "created");
        Ok(())
    }

    async fn update(&self, offset: &Offset) -> Result<(), ApplyError> {
        let indices = self.profile.index_names();
        let (index, mut source) = self
            .store
            .locate(&indices, &offset.resource)
            .await?
            .ok_or_else(|| ApplyError::MissingResource(offset.resource.clone()))?;

        apply_operations(&mut source, &offset.operations)?;

        let content_type = self
            .profile
            .content_type_of(&index)
            .ok_or_else(|| ApplyError::MissingResource(offset.resource.clone()))?;
        let source = normalize_payload(&source, content_type)?;
        self.store.put(&index, &offset.resource, &source).await?;
        debug!(offset = offset.offset, id = %offset.resource, index = %index, "updated");
        Ok(())
    }

    async fn delete(&self, offset: &Offset) -> Result<(), ApplyError> {
        let indices = self.profile.index_names();
        for index in &indices {
            if self.store.delete(index, &offset.resource).await? {
                debug!(offset = offset.offset, id = %offset.resource, index = %index, "deleted");
                return Ok(());
            }
        }
        debug!(offset = offset.offset, id = %offset.resource, "delete of absent resource");
        Ok(())
    }
}
