//! Consumer profiles.
//!
//! A profile is everything that differs between consumers: which content
//! indices they own, how those are mapped and aliased, and what runs after
//! a cycle that changed something.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use cti_catalog_core::{ConsumerKey, ContentType};
use cti_catalog_store::DocumentStore;

use crate::error::Result;

/// One content index owned by a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub content_type: ContentType,
    pub mapping: Value,
    pub alias: Option<String>,
}

impl IndexSpec {
    pub fn new(content_type: ContentType, mapping: Value) -> Self {
        Self {
            content_type,
            mapping,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Side effects run after a cycle that applied changes.
///
/// Implementations must be idempotent: every node in a cluster may run
/// them for the same consumer.
#[async_trait]
pub trait PostSync: Send + Sync {
    async fn on_sync_complete(&self, store: &dyn DocumentStore, profile: &ConsumerProfile)
        -> Result<()>;
}

/// Post-sync hook that does nothing.
pub struct NoPostSync;

#[async_trait]
impl PostSync for NoPostSync {
    async fn on_sync_complete(&self, _: &dyn DocumentStore, _: &ConsumerProfile) -> Result<()> {
        Ok(())
    }
}

/// Configuration for one consumer's synchronizer.
#[derive(Clone)]
pub struct ConsumerProfile {
    name: String,
    key: ConsumerKey,
    indices: Vec<IndexSpec>,
    post_sync: Arc<dyn PostSync>,
}

impl ConsumerProfile {
    pub fn new(name: impl Into<String>, key: ConsumerKey) -> Self {
        Self {
            name: name.into(),
            key,
            indices: Vec::new(),
            post_sync: Arc::new(NoPostSync),
        }
    }

    pub fn with_index(mut self, spec: IndexSpec) -> Self {
        self.indices.retain(|s| s.content_type != spec.content_type);
        self.indices.push(spec);
        self
    }

    pub fn with_post_sync(mut self, post_sync: Arc<dyn PostSync>) -> Self {
        self.post_sync = post_sync;
        self
    }

    /// Short label used in logs ("rules", "decoders").
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &ConsumerKey {
        &self.key
    }

    pub fn indices(&self) -> &[IndexSpec] {
        &self.indices
    }

    pub fn post_sync(&self) -> &Arc<dyn PostSync> {
        &self.post_sync
    }

    /// Index holding `content_type` documents, if this consumer owns one.
    pub fn index_for(&self, content_type: ContentType) -> Option<String> {
        self.indices
            .iter()
            .any(|s| s.content_type == content_type)
            .then(|| self.key.index_name(content_type))
    }

    /// Names of every index owned by this consumer.
    pub fn index_names(&self) -> Vec<String> {
        self.indices
            .iter()
            .map(|s| self.key.index_name(s.content_type))
            .collect()
    }

    /// Content type stored in an index of this consumer.
    pub fn content_type_of(&self, index: &str) -> Option<ContentType> {
        self.indices
            .iter()
            .map(|s| s.content_type)
            .find(|ct| self.key.index_name(*ct) == index)
    }
}

impl fmt::Debug for ConsumerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerProfile")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("indices", &self.indices.len())
            .finish()
    }
}
