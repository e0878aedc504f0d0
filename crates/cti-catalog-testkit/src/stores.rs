//! Store wrappers for observing and breaking the storage layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use cti_catalog_core::{ConsumerCheckpoint, ConsumerKey};
use cti_catalog_store::{
    CreateIndexResult, DocumentStore, Hit, InsertResult, OffsetStore, Query, Result, StoreError,
};

/// Offset store that records every checkpoint written through it.
pub struct RecordingOffsetStore {
    inner: Arc<dyn OffsetStore>,
    writes: Mutex<Vec<ConsumerCheckpoint>>,
}

impl RecordingOffsetStore {
    pub fn new(inner: Arc<dyn OffsetStore>) -> Self {
        Self {
            inner,
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Every checkpoint written for `key`, oldest first.
    pub fn history(&self, key: &ConsumerKey) -> Vec<ConsumerCheckpoint> {
        self.writes
            .lock()
            .map(|w| w.iter().filter(|c| c.key() == *key).cloned().collect())
            .unwrap_or_default()
    }

    /// Local offsets written for `key`, oldest first.
    pub fn offsets(&self, key: &ConsumerKey) -> Vec<u64> {
        self.history(key).iter().map(|c| c.local_offset).collect()
    }

    /// Number of writes that moved `key`'s local offset forward.
    pub fn advances(&self, key: &ConsumerKey) -> usize {
        let mut last = 0;
        let mut count = 0;
        for offset in self.offsets(key) {
            if offset > last {
                count += 1;
            }
            last = last.max(offset);
        }
        count
    }

    /// Total number of checkpoint writes.
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| w.len()).unwrap_or_default()
    }
}

#[async_trait]
impl OffsetStore for RecordingOffsetStore {
    async fn get_checkpoint(&self, key: &ConsumerKey) -> Result<Option<ConsumerCheckpoint>> {
        self.inner.get_checkpoint(key).await
    }

    async fn set_checkpoint(&self, checkpoint: &ConsumerCheckpoint) -> Result<()> {
        self.inner.set_checkpoint(checkpoint).await?;
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(checkpoint.clone());
        }
        Ok(())
    }
}

/// Document store that can be switched to fail every call with
/// [`StoreError::Unavailable`].
pub struct FaultyStore {
    inner: Arc<dyn DocumentStore>,
    unavailable: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store switched off".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.check()?;
        self.inner.index_exists(index).await
    }

    async fn create_index(
        &self,
        index: &str,
        mapping: &Value,
        alias: Option<&str>,
    ) -> Result<CreateIndexResult> {
        self.check()?;
        self.inner.create_index(index, mapping, alias).await
    }

    async fn refresh(&self, indices: &[String]) -> Result<()> {
        self.check()?;
        self.inner.refresh(indices).await
    }

    async fn clear(&self, index: &str) -> Result<u64> {
        self.check()?;
        self.inner.clear(index).await
    }

    async fn put(&self, index: &str, id: &str, source: &Value) -> Result<()> {
        self.check()?;
        self.inner.put(index, id, source).await
    }

    async fn put_if_absent(&self, index: &str, id: &str, source: &Value) -> Result<InsertResult> {
        self.check()?;
        self.inner.put_if_absent(index, id, source).await
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>> {
        self.check()?;
        self.inner.get(index, id).await
    }

    async fn delete(&self, index: &str, id: &str) -> Result<bool> {
        self.check()?;
        self.inner.delete(index, id).await
    }

    async fn bulk_put(&self, index: &str, docs: &[(String, Value)]) -> Result<()> {
        self.check()?;
        self.inner.bulk_put(index, docs).await
    }

    async fn search(&self, index: &str, query: &Query, size: usize) -> Result<Vec<Hit>> {
        self.check()?;
        self.inner.search(index, query, size).await
    }
}
