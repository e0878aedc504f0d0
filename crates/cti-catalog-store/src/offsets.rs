//! Consumer checkpoint persistence.
//!
//! Checkpoints are small JSON documents. [`DocumentOffsetStore`] keeps them
//! in the `.cti-consumers` index of any [`DocumentStore`], keyed by the
//! consumer's composite key.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use cti_catalog_core::{ConsumerCheckpoint, ConsumerKey};

use crate::error::{Result, StoreError};
use crate::traits::DocumentStore;

/// Index holding consumer checkpoints.
pub const CONSUMERS_INDEX: &str = ".cti-consumers";

/// Async interface for checkpoint persistence.
///
/// A missing checkpoint is `Ok(None)`. A store that cannot be reached is
/// an error, never `Ok(None)`.
#[async_trait]
pub trait OffsetStore: Send + Sync {
    /// Read the checkpoint for a consumer.
    async fn get_checkpoint(&self, key: &ConsumerKey) -> Result<Option<ConsumerCheckpoint>>;

    /// Write (create or overwrite) a checkpoint.
    async fn set_checkpoint(&self, checkpoint: &ConsumerCheckpoint) -> Result<()>;

    /// Read a checkpoint, failing with [`StoreError::NotFound`] when absent.
    async fn require_checkpoint(&self, key: &ConsumerKey) -> Result<ConsumerCheckpoint> {
        self.get_checkpoint(key)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("checkpoint {}", key)))
    }
}

/// Checkpoints stored as documents.
pub struct DocumentOffsetStore {
    store: Arc<dyn DocumentStore>,
    index: String,
}

impl DocumentOffsetStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_index(store, CONSUMERS_INDEX)
    }

    pub fn with_index(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
        }
    }

    /// Create the checkpoint index if it is missing.
    pub async fn ensure_index(&self) -> Result<()> {
        if !self.store.index_exists(&self.index).await? {
            let mapping = json!({"dynamic": "strict", "properties": {
                "context": {"type": "keyword"},
                "name": {"type": "keyword"},
                "local_offset": {"type": "long"},
                "remote_offset": {"type": "long"},
                "snapshot_link": {"type": "keyword"},
                "snapshot_hash": {"type": "keyword"}
            }});
            self.store.create_index(&self.index, &mapping, None).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl OffsetStore for DocumentOffsetStore {
    async fn get_checkpoint(&self, key: &ConsumerKey) -> Result<Option<ConsumerCheckpoint>> {
        match self.store.get(&self.index, &key.composite()).await? {
            Some(source) => serde_json::from_value(source)
                .map(Some)
                .map_err(|e| StoreError::InvalidData(format!("checkpoint {}: {}", key, e))),
            None => Ok(None),
        }
    }

    async fn set_checkpoint(&self, checkpoint: &ConsumerCheckpoint) -> Result<()> {
        let source = serde_json::to_value(checkpoint)?;
        self.store
            .put(&self.index, &checkpoint.key().composite(), &source)
            .await
    }
}
