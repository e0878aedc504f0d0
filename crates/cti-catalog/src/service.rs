//! The catalog service: wiring, on-demand sync and status queries.

use std::sync::Arc;

use serde_json::Value;

use cti_catalog_content::SecurityAnalytics;
use cti_catalog_core::ConsumerKey;
use cti_catalog_store::{DocumentOffsetStore, DocumentStore, OffsetStore};
use cti_catalog_sync::{
    CatalogClient, ConsumerLock, ConsumerProfile, SnapshotFetcher, SyncOutcome, Synchronizer,
};

use crate::error::{CatalogError, Result};
use crate::job::{JobOutcome, SyncJob};
use crate::profiles::{decoders_profile, rules_profile};
use crate::settings::Settings;

/// External services the catalog service talks to.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn DocumentStore>,
    pub client: Arc<dyn CatalogClient>,
    pub fetcher: Arc<dyn SnapshotFetcher>,
    pub sink: Arc<dyn SecurityAnalytics>,
}

/// Owns the sync job and answers status queries.
pub struct CatalogService {
    job: Arc<SyncJob>,
    offsets: Arc<dyn OffsetStore>,
}

impl CatalogService {
    pub fn new(job: SyncJob, offsets: Arc<dyn OffsetStore>) -> Self {
        Self {
            job: Arc::new(job),
            offsets,
        }
    }

    /// Build the rules and decoders synchronizers described by `settings`.
    pub fn from_settings(settings: &Settings, backends: Backends) -> Result<Self> {
        let config = settings.sync_config();
        let offsets: Arc<dyn OffsetStore> =
            Arc::new(DocumentOffsetStore::new(backends.store.clone()));
        let lock = ConsumerLock::new(backends.store.clone(), config.lock_ttl);

        let profiles = [
            rules_profile(
                settings.consumers.rules.key(),
                backends.sink.clone(),
                settings.sync.create_detectors,
            )?,
            decoders_profile(settings.consumers.decoders.key())?,
        ];
        let synchronizers = profiles
            .into_iter()
            .map(|profile: ConsumerProfile| {
                Synchronizer::new(
                    profile,
                    backends.store.clone(),
                    offsets.clone(),
                    backends.client.clone(),
                    backends.fetcher.clone(),
                    config.clone(),
                )
                .with_lock(lock.clone())
            })
            .collect();

        Ok(Self::new(SyncJob::new(synchronizers), offsets))
    }

    pub fn job(&self) -> &Arc<SyncJob> {
        &self.job
    }

    /// Run every consumer now.
    pub async fn sync_now(&self) -> JobOutcome {
        self.job.trigger().await
    }

    /// Run one consumer now, outside the job.
    pub async fn sync_consumer(&self, context: &str, consumer: &str) -> Result<SyncOutcome> {
        let key = ConsumerKey::new(context, consumer);
        let synchronizer = self
            .job
            .synchronizers()
            .iter()
            .find(|s| *s.profile().key() == key)
            .ok_or_else(|| CatalogError::NotFound(key.to_string()))?;
        Ok(synchronizer.sync().await?)
    }

    /// The stored checkpoint of a consumer, as JSON.
    pub async fn status(&self, context: &str, consumer: &str) -> Result<Value> {
        let key = ConsumerKey::new(context, consumer);
        let checkpoint = self
            .offsets
            .get_checkpoint(&key)
            .await?
            .ok_or_else(|| CatalogError::NotFound(key.to_string()))?;
        Ok(serde_json::to_value(&checkpoint)?)
    }
}
