//! DocumentStore trait: the abstract interface for indexed content.
//!
//! Documents live in named indices and are addressed by id. An index may
//! carry one alias; every operation that takes an index name also accepts
//! that alias.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, StoreError};

/// Result of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Document was written.
    Inserted,
    /// A document with this id already exists (left untouched).
    AlreadyExists,
}

/// Result of creating an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateIndexResult {
    Created,
    AlreadyExists,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub source: Value,
}

/// Search query over document sources.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Every document in the index.
    MatchAll,
    /// Documents whose field (dotted path) equals `value`, or contains it
    /// when the field is an array.
    Term { field: String, value: Value },
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluate the query against a document source.
    pub fn matches(&self, source: &Value) -> bool {
        match self {
            Query::MatchAll => true,
            Query::Term { field, value } => {
                let pointer = format!("/{}", field.replace('.', "/"));
                match source.pointer(&pointer) {
                    Some(Value::Array(items)) => items.contains(value),
                    Some(found) => found == value,
                    None => false,
                }
            }
        }
    }
}

/// Async interface for document persistence.
///
/// Writes to an index that does not exist create it with an empty mapping.
/// Reads from a missing index behave as reads from an empty one.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Index Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Check whether an index (or alias) exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Create an index with a mapping and an optional alias.
    async fn create_index(
        &self,
        index: &str,
        mapping: &Value,
        alias: Option<&str>,
    ) -> Result<CreateIndexResult>;

    /// Make recent writes visible to searches.
    async fn refresh(&self, indices: &[String]) -> Result<()>;

    /// Delete every document in an index, keeping the index. Returns the
    /// number of documents removed.
    async fn clear(&self, index: &str) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Document Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a document.
    async fn put(&self, index: &str, id: &str, source: &Value) -> Result<()>;

    /// Insert a document only if no document with this id exists.
    async fn put_if_absent(&self, index: &str, id: &str, source: &Value) -> Result<InsertResult>;

    /// Get a document by id.
    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, index: &str, id: &str) -> Result<bool>;

    /// Insert or replace many documents in one request.
    async fn bulk_put(&self, index: &str, docs: &[(String, Value)]) -> Result<()>;

    /// Search an index. Hits are ordered by id and capped at `size`.
    async fn search(&self, index: &str, query: &Query, size: usize) -> Result<Vec<Hit>>;
}

/// Extension methods for DocumentStore.
pub trait DocumentStoreExt: DocumentStore {
    /// Get a document, failing with [`StoreError::NotFound`] when absent.
    fn get_required(
        &self,
        index: &str,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Value>> + Send;

    /// Find the first of `indices` holding a document with this id.
    fn locate(
        &self,
        indices: &[String],
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<(String, Value)>>> + Send;
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {
    async fn get_required(&self, index: &str, id: &str) -> Result<Value> {
        self.get(index, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", index, id)))
    }

    async fn locate(&self, indices: &[String], id: &str) -> Result<Option<(String, Value)>> {
        for index in indices {
            if let Some(source) = self.get(index, id).await? {
                return Ok(Some((index.clone(), source)));
            }
        }
        Ok(None)
    }
}
