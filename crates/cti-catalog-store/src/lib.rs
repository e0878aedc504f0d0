//! # CTI Catalog Store
//!
//! Storage abstraction for CTI catalog sync. Provides trait-based interfaces
//! for indexed content documents and consumer checkpoints, with SQLite and
//! in-memory implementations.
//!
//! ## Overview
//!
//! Content is kept in named indices of JSON documents, addressed by id, in
//! the shape a search engine would hold them. The sync engine only talks to
//! the [`DocumentStore`] and [`OffsetStore`] traits, so it is
//! storage-agnostic. The primary implementation is [`SqliteStore`], with
//! [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`DocumentStore`] - The async trait for index and document operations
//! - [`OffsetStore`] - The async trait for consumer checkpoints
//! - [`DocumentOffsetStore`] - Checkpoints kept as documents in `.cti-consumers`
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`Query`] / [`Hit`] - Minimal search over document sources
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cti_catalog_store::{DocumentOffsetStore, DocumentStore, OffsetStore, SqliteStore};
//! use cti_catalog_core::ConsumerKey;
//!
//! async fn example() {
//!     let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open("catalog.db").unwrap());
//!     let offsets = DocumentOffsetStore::new(store.clone());
//!
//!     let key = ConsumerKey::new("rules_development_0.0.1", "rules_development_0.0.1_test");
//!     let checkpoint = offsets.get_checkpoint(&key).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Unavailable is not empty**: an unreachable store is an error, never `None`
//! - **Aliases**: every operation accepts an index alias in place of its name
//! - **Implicit indices**: writes to a missing index create it; reads see it empty

pub mod error;
pub mod memory;
pub mod migration;
pub mod offsets;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use offsets::{DocumentOffsetStore, OffsetStore, CONSUMERS_INDEX};
pub use sqlite::SqliteStore;
pub use traits::{CreateIndexResult, DocumentStore, DocumentStoreExt, Hit, InsertResult, Query};
