//! In-memory implementation of the DocumentStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::traits::{CreateIndexResult, DocumentStore, Hit, InsertResult, Query};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Indices by concrete name.
    indices: HashMap<String, MemoryIndex>,

    /// Alias -> concrete index name.
    aliases: HashMap<String, String>,
}

#[derive(Default)]
struct MemoryIndex {
    mapping: Value,
    docs: BTreeMap<String, Value>,
}

impl MemoryStoreInner {
    fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    fn index(&self, name: &str) -> Option<&MemoryIndex> {
        self.indices.get(self.resolve(name))
    }

    fn index_mut(&mut self, name: &str) -> &mut MemoryIndex {
        let concrete = self.resolve(name).to_owned();
        self.indices.entry(concrete).or_default()
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Number of documents held by an index.
    pub fn document_count(&self, index: &str) -> usize {
        self.read()
            .ok()
            .and_then(|inner| inner.index(index).map(|i| i.docs.len()))
            .unwrap_or(0)
    }

    /// Mapping an index was created with.
    pub fn mapping(&self, index: &str) -> Option<Value> {
        let inner = self.read().ok()?;
        inner.index(index).map(|i| i.mapping.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.read()?.index(index).is_some())
    }

    async fn create_index(
        &self,
        index: &str,
        mapping: &Value,
        alias: Option<&str>,
    ) -> Result<CreateIndexResult> {
        let mut inner = self.write()?;
        if inner.indices.contains_key(index) {
            return Ok(CreateIndexResult::AlreadyExists);
        }
        if let Some(alias) = alias {
            if inner.indices.contains_key(alias) {
                return Err(StoreError::IndexCreationFailed {
                    index: index.to_owned(),
                    reason: format!("alias {} collides with an index", alias),
                });
            }
            inner.aliases.insert(alias.to_owned(), index.to_owned());
        }
        inner.indices.insert(
            index.to_owned(),
            MemoryIndex {
                mapping: mapping.clone(),
                docs: BTreeMap::new(),
            },
        );
        Ok(CreateIndexResult::Created)
    }

    async fn refresh(&self, _indices: &[String]) -> Result<()> {
        // Writes are visible immediately.
        Ok(())
    }

    async fn clear(&self, index: &str) -> Result<u64> {
        let mut inner = self.write()?;
        let concrete = inner.resolve(index).to_owned();
        Ok(inner
            .indices
            .get_mut(&concrete)
            .map(|i| {
                let removed = i.docs.len() as u64;
                i.docs.clear();
                removed
            })
            .unwrap_or(0))
    }

    async fn put(&self, index: &str, id: &str, source: &Value) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .index_mut(index)
            .docs
            .insert(id.to_owned(), source.clone());
        Ok(())
    }

    async fn put_if_absent(&self, index: &str, id: &str, source: &Value) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let docs = &mut inner.index_mut(index).docs;
        if docs.contains_key(id) {
            return Ok(InsertResult::AlreadyExists);
        }
        docs.insert(id.to_owned(), source.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .read()?
            .index(index)
            .and_then(|i| i.docs.get(id).cloned()))
    }

    async fn delete(&self, index: &str, id: &str) -> Result<bool> {
        let mut inner = self.write()?;
        let concrete = inner.resolve(index).to_owned();
        Ok(inner
            .indices
            .get_mut(&concrete)
            .map(|i| i.docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn bulk_put(&self, index: &str, docs: &[(String, Value)]) -> Result<()> {
        let mut inner = self.write()?;
        let target = &mut inner.index_mut(index).docs;
        for (id, source) in docs {
            target.insert(id.clone(), source.clone());
        }
        Ok(())
    }

    async fn search(&self, index: &str, query: &Query, size: usize) -> Result<Vec<Hit>> {
        let inner = self.read()?;
        let Some(idx) = inner.index(index) else {
            return Ok(Vec::new());
        };
        Ok(idx
            .docs
            .iter()
            .filter(|(_, source)| query.matches(source))
            .take(size)
            .map(|(id, source)| Hit {
                id: id.clone(),
                source: source.clone(),
            })
            .collect())
    }
}
