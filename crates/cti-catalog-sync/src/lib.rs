//! # CTI Catalog Sync
//!
//! Incremental synchronization of catalog consumers into local indices.
//!
//! ## Overview
//!
//! A [`Synchronizer`] runs one cycle for one consumer: it makes sure the
//! consumer's indices exist, compares the stored checkpoint with what the
//! catalog reports, then either loads a full snapshot (cold start) or
//! replays the change log in bounded chunks, persisting the checkpoint after
//! each chunk. Consumer-specific behaviour lives in a [`ConsumerProfile`].
//!
//! ## Key Properties
//!
//! - **Resumable**: the checkpoint always names the last fully applied chunk
//! - **Idempotent**: CREATE/UPDATE are upserts and DELETE of an absent id is a no-op
//! - **Fail-fast**: the first failure ends the cycle; the next run retries
//! - **Isolated**: a consumer's cycle touches only its own indices and checkpoint
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cti_catalog_core::ConsumerKey;
//! use cti_catalog_store::{DocumentOffsetStore, DocumentStore, SqliteStore};
//! use cti_catalog_sync::{
//!     ConsumerProfile, HttpCatalogClient, HttpSnapshotFetcher, SyncConfig, Synchronizer,
//! };
//!
//! async fn example() {
//!     let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open("catalog.db").unwrap());
//!     let http = reqwest::Client::new();
//!     let client = HttpCatalogClient::new(
//!         http.clone(),
//!         "https://cti-pre.wazuh.com/api/v1",
//!         Duration::from_secs(10),
//!     );
//!     let fetcher = HttpSnapshotFetcher::new(http, Duration::from_secs(120));
//!
//!     let key = ConsumerKey::new("rules_development_0.0.1", "rules_development_0.0.1_test");
//!     let sync = Synchronizer::new(
//!         ConsumerProfile::new("rules", key),
//!         store.clone(),
//!         Arc::new(DocumentOffsetStore::new(store)),
//!         Arc::new(client),
//!         Arc::new(fetcher),
//!         SyncConfig::default(),
//!     );
//!     let outcome = sync.sync().await.unwrap();
//!     println!("updated={} offset={}", outcome.updated, outcome.new_offset);
//! }
//! ```
//!
//! ## Cycle
//!
//! ```text
//! consumer_info ──> cold start? ──yes──> snapshot ─────────────┐
//!                        │                                     │
//!                        no ──> up to date? ──yes──> done      │
//!                                    │                         v
//!                                    no ──> for each chunk: changes, apply,
//!                                           advance checkpoint ──> post-sync
//! ```

pub mod client;
pub mod error;
pub mod lock;
pub mod patch;
pub mod profile;
pub mod snapshot;
pub mod synchronizer;

pub use client::{memory::ScriptedCatalog, CatalogClient, HttpCatalogClient};
pub use error::{Result, SyncError};
pub use lock::{ConsumerLock, LockGuard, LOCKS_INDEX};
pub use patch::{ApplyError, ApplyOutcome, PatchApplier};
pub use profile::{ConsumerProfile, IndexSpec, NoPostSync, PostSync};
pub use snapshot::{memory::StaticSnapshots, HttpSnapshotFetcher, SnapshotFetcher, SnapshotLoader};
pub use synchronizer::{decide, SyncConfig, SyncOutcome, SyncState, Synchronizer};
