//! Consumer checkpoints and remote consumer metadata.
//!
//! A checkpoint is the only durable state the sync engine owns for a
//! consumer. `local_offset` only moves forward, and never past the last
//! remote offset observed.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::ConsumerKey;

/// Persisted sync state for one consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerCheckpoint {
    pub context: String,
    /// Consumer name.
    pub name: String,
    /// Last offset whose changes are durably applied.
    #[serde(default)]
    pub local_offset: u64,
    /// Last offset known to exist upstream.
    #[serde(default)]
    pub remote_offset: u64,
    #[serde(default)]
    pub snapshot_link: Option<String>,
    #[serde(default)]
    pub snapshot_hash: Option<String>,
}

impl ConsumerCheckpoint {
    /// A fresh checkpoint with nothing applied.
    pub fn new(key: &ConsumerKey) -> Self {
        Self {
            context: key.context.clone(),
            name: key.consumer.clone(),
            local_offset: 0,
            remote_offset: 0,
            snapshot_link: None,
            snapshot_hash: None,
        }
    }

    pub fn key(&self) -> ConsumerKey {
        ConsumerKey::new(&self.context, &self.name)
    }

    /// Whether nothing has been applied yet.
    pub fn is_fresh(&self) -> bool {
        self.local_offset == 0
    }

    /// Record what the catalog reported.
    ///
    /// The remote offset is clamped so that `local_offset <= remote_offset`
    /// keeps holding even if the catalog reports a lower offset than what
    /// was already applied.
    pub fn observe_remote(&mut self, remote: &RemoteConsumer) {
        self.remote_offset = remote.offset.max(self.local_offset);
        self.snapshot_link = remote.snapshot_link().map(str::to_owned);
        self.snapshot_hash = remote.snapshot_hash.clone();
    }

    /// Move `local_offset` forward to `offset`.
    pub fn advance_to(&mut self, offset: u64) -> Result<(), CoreError> {
        if offset < self.local_offset {
            return Err(CoreError::Regression {
                current: self.local_offset,
                offset,
            });
        }
        if offset > self.remote_offset {
            return Err(CoreError::BeyondRemote {
                offset,
                remote: self.remote_offset,
            });
        }
        self.local_offset = offset;
        Ok(())
    }
}

/// Consumer metadata as returned by the catalog API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConsumer {
    /// Latest offset available upstream.
    #[serde(alias = "last_offset", default)]
    pub offset: u64,
    #[serde(alias = "last_snapshot_link", default)]
    pub snapshot_link: Option<String>,
    #[serde(default)]
    pub snapshot_hash: Option<String>,
    /// Offset the snapshot was taken at, when the catalog reports it.
    #[serde(alias = "last_snapshot_offset", default)]
    pub snapshot_offset: Option<u64>,
}

impl RemoteConsumer {
    pub fn new(offset: u64) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    pub fn with_snapshot(mut self, link: impl Into<String>) -> Self {
        self.snapshot_link = Some(link.into());
        self
    }

    /// The snapshot link, treating an empty string as absent.
    pub fn snapshot_link(&self) -> Option<&str> {
        self.snapshot_link.as_deref().filter(|l| !l.is_empty())
    }

    /// Offset the local checkpoint lands on after loading the snapshot.
    pub fn snapshot_target(&self) -> u64 {
        self.snapshot_offset
            .filter(|&o| o <= self.offset)
            .unwrap_or(self.offset)
    }
}
