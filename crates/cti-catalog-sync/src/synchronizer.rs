//! Consumer synchronizer: one full sync cycle for one consumer.
//!
//! ```text
//! INIT -> ENSURE_INDICES -> { COLD_START | INCREMENTAL | UP_TO_DATE }
//!      -> APPLYING -> ADVANCING_OFFSET -> POST_SYNC -> DONE
//! ```
//!
//! Any error ends the cycle. The checkpoint is persisted after every
//! applied chunk, so it always names the last fully applied offset.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use cti_catalog_core::{chunk_ranges, ChangeSet, ConsumerCheckpoint, RemoteConsumer};
use cti_catalog_store::{CreateIndexResult, DocumentStore, OffsetStore};

use crate::client::CatalogClient;
use crate::error::{Result, SyncError};
use crate::lock::ConsumerLock;
use crate::patch::{ApplyError, ApplyOutcome, PatchApplier};
use crate::profile::ConsumerProfile;
use crate::snapshot::{SnapshotFetcher, SnapshotLoader};

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Offsets per changes request.
    pub max_changes: u64,
    /// Documents per bulk write when loading a snapshot.
    pub max_docs: usize,
    /// Advisory lock lifetime.
    pub lock_ttl: Duration,
    /// Where snapshot archives are downloaded.
    pub scratch_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_changes: 1000,
            max_docs: 1000,
            lock_ttl: Duration::from_secs(300),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Result of a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Whether a snapshot or at least one chunk was applied.
    pub updated: bool,
    /// Local offset after the cycle.
    pub new_offset: u64,
}

/// Synchronizer state, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Init,
    EnsureIndices,
    ColdStart,
    Incremental,
    UpToDate,
    Applying,
    AdvancingOffset,
    PostSync,
    Done,
}

impl SyncState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncState::Init => "INIT",
            SyncState::EnsureIndices => "ENSURE_INDICES",
            SyncState::ColdStart => "COLD_START",
            SyncState::Incremental => "INCREMENTAL",
            SyncState::UpToDate => "UP_TO_DATE",
            SyncState::Applying => "APPLYING",
            SyncState::AdvancingOffset => "ADVANCING_OFFSET",
            SyncState::PostSync => "POST_SYNC",
            SyncState::Done => "DONE",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the path for a cycle.
///
/// A snapshot is used only when nothing has been applied yet and the
/// catalog offers one; otherwise the change log is replayed.
pub fn decide(stored: Option<&ConsumerCheckpoint>, remote: &RemoteConsumer) -> SyncState {
    let fresh = stored.map_or(true, ConsumerCheckpoint::is_fresh);
    let local = stored.map_or(0, |c| c.local_offset);
    if fresh && remote.snapshot_link().is_some() {
        SyncState::ColdStart
    } else if local >= remote.offset {
        SyncState::UpToDate
    } else {
        SyncState::Incremental
    }
}

/// Runs sync cycles for one consumer.
pub struct Synchronizer {
    profile: ConsumerProfile,
    store: Arc<dyn DocumentStore>,
    offsets: Arc<dyn OffsetStore>,
    client: Arc<dyn CatalogClient>,
    snapshots: SnapshotLoader,
    lock: ConsumerLock,
    config: SyncConfig,
}

impl Synchronizer {
    pub fn new(
        profile: ConsumerProfile,
        store: Arc<dyn DocumentStore>,
        offsets: Arc<dyn OffsetStore>,
        client: Arc<dyn CatalogClient>,
        fetcher: Arc<dyn SnapshotFetcher>,
        config: SyncConfig,
    ) -> Self {
        let snapshots = SnapshotLoader::new(fetcher, config.scratch_dir.clone(), config.max_docs);
        let lock = ConsumerLock::new(store.clone(), config.lock_ttl);
        Self {
            profile,
            store,
            offsets,
            client,
            snapshots,
            lock,
            config,
        }
    }

    /// Use a specific lock handle (e.g. one shared by every consumer of a node).
    pub fn with_lock(mut self, lock: ConsumerLock) -> Self {
        self.lock = lock;
        self
    }

    pub fn profile(&self) -> &ConsumerProfile {
        &self.profile
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one sync cycle.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        let key = self.profile.key();
        self.enter(SyncState::Init);

        let guard = match self.lock.acquire(key).await {
            Ok(guard) => guard,
            Err(e) => {
                if e.is_busy() {
                    warn!(consumer = self.profile.name(), %key, error = %e, "sync skipped");
                } else {
                    error!(consumer = self.profile.name(), %key, error = %e, "sync failed");
                }
                return Err(e);
            }
        };

        let result = self.run_cycle().await;

        if let Err(e) = guard.release().await {
            warn!(consumer = self.profile.name(), error = %e, "failed to release consumer lock");
        }

        match &result {
            Ok(outcome) => info!(
                consumer = self.profile.name(),
                updated = outcome.updated,
                offset = outcome.new_offset,
                "sync finished"
            ),
            Err(e) => error!(consumer = self.profile.name(), %key, error = %e, "sync failed"),
        }
        result
    }

    async fn run_cycle(&self) -> Result<SyncOutcome> {
        let key = self.profile.key();

        self.enter(SyncState::EnsureIndices);
        self.ensure_indices().await?;

        let stored = self.offsets.get_checkpoint(key).await?;
        let remote = self.client.consumer_info(key).await?;

        let state = decide(stored.as_ref(), &remote);
        let mut checkpoint = stored
            .clone()
            .unwrap_or_else(|| ConsumerCheckpoint::new(key));
        checkpoint.observe_remote(&remote);
        info!(
            consumer = self.profile.name(),
            local = checkpoint.local_offset,
            remote = remote.offset,
            path = %state,
            "sync path selected"
        );
        self.enter(state);

        let updated = match state {
            SyncState::ColdStart => {
                self.cold_start(&mut checkpoint, &remote).await?;
                if checkpoint.local_offset < checkpoint.remote_offset {
                    self.enter(SyncState::Incremental);
                    self.incremental(&mut checkpoint).await?;
                }
                true
            }
            SyncState::UpToDate => {
                if stored.as_ref() != Some(&checkpoint) {
                    self.offsets.set_checkpoint(&checkpoint).await?;
                }
                false
            }
            _ => self.incremental(&mut checkpoint).await?,
        };

        if updated {
            self.enter(SyncState::PostSync);
            self.profile
                .post_sync()
                .on_sync_complete(self.store.as_ref(), &self.profile)
                .await
                .map_err(|e| match e {
                    e @ SyncError::PostSyncFailed(_) => e,
                    other => SyncError::PostSyncFailed(other.to_string()),
                })?;
        }

        self.enter(SyncState::Done);
        Ok(SyncOutcome {
            updated,
            new_offset: checkpoint.local_offset,
        })
    }

    /// Create every configured index that does not exist yet.
    async fn ensure_indices(&self) -> Result<()> {
        for spec in self.profile.indices() {
            let index = self.profile.key().index_name(spec.content_type);
            if self.store.index_exists(&index).await? {
                continue;
            }
            match self
                .store
                .create_index(&index, &spec.mapping, spec.alias.as_deref())
                .await
            {
                Ok(CreateIndexResult::Created) => info!(index = %index, "index created"),
                Ok(CreateIndexResult::AlreadyExists) => debug!(index = %index, "index exists"),
                Err(e) if e.is_unavailable() => return Err(e.into()),
                Err(e) => {
                    return Err(SyncError::IndexCreationFailed {
                        index,
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    async fn cold_start(
        &self,
        checkpoint: &mut ConsumerCheckpoint,
        remote: &RemoteConsumer,
    ) -> Result<()> {
        self.enter(SyncState::Applying);
        self.snapshots
            .load(self.store.as_ref(), &self.profile, remote)
            .await?;

        self.enter(SyncState::AdvancingOffset);
        checkpoint
            .advance_to(remote.snapshot_target())
            .map_err(SyncError::Checkpoint)?;
        self.offsets.set_checkpoint(checkpoint).await?;
        Ok(())
    }

    /// Replay `(local, remote]` chunk by chunk. Returns whether anything
    /// was applied.
    async fn incremental(&self, checkpoint: &mut ConsumerCheckpoint) -> Result<bool> {
        let key = self.profile.key();
        let applier = PatchApplier::new(self.store.as_ref(), &self.profile);
        let ranges = chunk_ranges(
            checkpoint.local_offset,
            checkpoint.remote_offset,
            self.config.max_changes,
        );

        let mut updated = false;
        for (from, to) in ranges {
            debug!(consumer = self.profile.name(), from, to, "fetching changes");
            let offsets = self.client.changes(key, from, to).await?;
            let changes = ChangeSet::new(from, to, offsets).map_err(|e| {
                SyncError::RemoteMalformed(format!("changes ({}, {}]: {}", from, to, e))
            })?;

            self.enter(SyncState::Applying);
            match applier.apply(&changes).await {
                ApplyOutcome::Applied(count) => {
                    debug!(consumer = self.profile.name(), from, to, count, "chunk applied")
                }
                ApplyOutcome::PartialFailure {
                    applied,
                    offset,
                    error,
                } => {
                    return Err(match error {
                        ApplyError::Store(e) if e.is_unavailable() => e.into(),
                        error => SyncError::PatchApplyFailed {
                            offset,
                            applied,
                            reason: error.to_string(),
                        },
                    })
                }
            }

            self.enter(SyncState::AdvancingOffset);
            checkpoint.advance_to(to).map_err(SyncError::Checkpoint)?;
            self.offsets.set_checkpoint(checkpoint).await?;
            updated = true;
            info!(consumer = self.profile.name(), from, to, "offset advanced");
        }
        Ok(updated)
    }

    fn enter(&self, state: SyncState) {
        debug!(consumer = self.profile.name(), state = %state, "state");
    }
}
