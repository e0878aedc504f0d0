//! Advisory per-consumer lock.
//!
//! Keeps two cycles of the same consumer from running at once, on one node
//! or across nodes.
//! The lock is a document in `.cti-locks` written with `put_if_absent`; it
//! expires after a TTL so a crashed holder cannot block the consumer forever.
//! Correctness never depends on it: every applied operation is idempotent.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cti_catalog_core::{now_millis, ConsumerKey};
use cti_catalog_store::{DocumentStore, InsertResult};

use crate::error::{Result, SyncError};

/// Index holding lock documents.
pub const LOCKS_INDEX: &str = ".cti-locks";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LockRecord {
    owner: String,
    /// Identifies one acquisition; two cycles of the same node never share it.
    #[serde(default)]
    token: String,
    expires_at_ms: i64,
}

/// Acquires consumer locks on behalf of one node.
#[derive(Clone)]
pub struct ConsumerLock {
    store: Arc<dyn DocumentStore>,
    owner: String,
    ttl: Duration,
}

impl ConsumerLock {
    /// Create a lock handle with a random owner id.
    pub fn new(store: Arc<dyn DocumentStore>, ttl: Duration) -> Self {
        Self::with_owner(store, random_id(), ttl)
    }

    pub fn with_owner(store: Arc<dyn DocumentStore>, owner: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            owner: owner.into(),
            ttl,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn lock_id(key: &ConsumerKey) -> String {
        format!("lock:{}", key.composite())
    }

    /// Take the lock for a consumer, or fail with [`SyncError::Busy`].
    ///
    /// Any unexpired lock is busy, including one held by another cycle of
    /// this node.
    pub async fn acquire(&self, key: &ConsumerKey) -> Result<LockGuard> {
        let id = Self::lock_id(key);
        let now = now_millis();
        let record = LockRecord {
            owner: self.owner.clone(),
            token: random_id(),
            expires_at_ms: now.saturating_add(self.ttl.as_millis() as i64),
        };
        let source = serde_json::to_value(&record)
            .map_err(|e| SyncError::Store(e.into()))?;

        if self.store.put_if_absent(LOCKS_INDEX, &id, &source).await? == InsertResult::Inserted {
            debug!(%key, owner = %self.owner, "lock acquired");
            return Ok(self.guard(id, record.token));
        }

        let held: Option<LockRecord> = self
            .store
            .get(LOCKS_INDEX, &id)
            .await?
            .and_then(|v| serde_json::from_value(v).ok());

        match held {
            Some(held) if held.expires_at_ms > now => Err(SyncError::Busy {
                key: key.composite(),
                owner: held.owner,
            }),
            previous => {
                if let Some(previous) = previous {
                    info!(%key, previous = %previous.owner, "taking over expired lock");
                }
                self.store.put(LOCKS_INDEX, &id, &source).await?;
                Ok(self.guard(id, record.token))
            }
        }
    }

    fn guard(&self, id: String, token: String) -> LockGuard {
        LockGuard {
            store: self.store.clone(),
            id,
            token,
        }
    }
}

fn random_id() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

/// A held consumer lock. Call [`LockGuard::release`] when the cycle ends.
#[must_use = "the lock stays held until released or expired"]
pub struct LockGuard {
    store: Arc<dyn DocumentStore>,
    id: String,
    token: String,
}

impl LockGuard {
    /// Release the lock unless another acquisition has replaced it.
    pub async fn release(self) -> Result<()> {
        let current: Option<LockRecord> = self
            .store
            .get(LOCKS_INDEX, &self.id)
            .await?
            .and_then(|v| serde_json::from_value(v).ok());

        if current.is_some_and(|c| c.token == self.token) {
            self.store.delete(LOCKS_INDEX, &self.id).await?;
        }
        Ok(())
    }
}
