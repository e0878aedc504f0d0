//! # CTI Catalog
//!
//! Keeps local content indices in step with the Wazuh CTI catalog.
//!
//! ## Overview
//!
//! The catalog publishes content (rules, decoders, kvdbs, integrations,
//! policies) as per-consumer change logs. This crate ties the component
//! crates into a running service:
//!
//! - **Settings**: TOML configuration with defaults for every key
//! - **Profiles**: the built-in `rules` and `decoders` consumers
//! - **Job**: a scheduled, non-overlapping run over every consumer
//! - **Service**: on-demand sync and checkpoint status queries
//!
//! ## Key Concepts
//!
//! - **Checkpoint**: the last durably applied offset of a consumer. It only
//!   moves forward, one fully applied chunk at a time.
//! - **Cold start**: a consumer with nothing applied loads the catalog
//!   snapshot instead of replaying history.
//! - **Post-sync**: idempotent work run after a cycle that changed
//!   something. Every node of a cluster may run it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cti_catalog::{Backends, CatalogService, Settings};
//! use cti_catalog::content::MemorySecurityAnalytics;
//! use cti_catalog::store::SqliteStore;
//! use cti_catalog::sync::{HttpCatalogClient, HttpSnapshotFetcher};
//!
//! async fn example() -> cti_catalog::Result<()> {
//!     let settings = Settings::load("cti-catalog.toml")?;
//!     let http = reqwest::Client::new();
//!
//!     let backends = Backends {
//!         store: Arc::new(SqliteStore::open(&settings.store.path)?),
//!         client: Arc::new(HttpCatalogClient::new(
//!             http.clone(),
//!             settings.cti.base_uri.clone(),
//!             settings.client_timeout(),
//!         )),
//!         fetcher: Arc::new(HttpSnapshotFetcher::new(http, settings.snapshot_timeout())),
//!         sink: Arc::new(MemorySecurityAnalytics::new()),
//!     };
//!
//!     let service = CatalogService::from_settings(&settings, backends)?;
//!     let outcome = service.sync_now().await;
//!     let status = service.status("rules_development_0.0.1", "rules_development_0.0.1_test").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `cti_catalog::core` - Checkpoints, change sets, JSON patch, hashing
//! - `cti_catalog::store` - Document and offset stores
//! - `cti_catalog::sync` - The synchronizer and its remote clients
//! - `cti_catalog::content` - Post-sync processing

pub mod error;
pub mod job;
pub mod profiles;
pub mod service;
pub mod settings;

pub use cti_catalog_content as content;
pub use cti_catalog_core as core;
pub use cti_catalog_store as store;
pub use cti_catalog_sync as sync;

pub use error::{CatalogError, Result};
pub use job::{display_name, ConsumerReport, JobOutcome, RunSummary, SyncJob, JOB_TYPE};
pub use profiles::{decoders_profile, rules_profile, DECODERS_PROFILE, RULES_PROFILE};
pub use service::{Backends, CatalogService};
pub use settings::Settings;

pub use cti_catalog_core::{ConsumerCheckpoint, ConsumerKey};
pub use cti_catalog_sync::{SyncOutcome, Synchronizer};
