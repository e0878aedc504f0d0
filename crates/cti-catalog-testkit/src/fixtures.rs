//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an in-memory store, a scripted
//! catalog and a recording offset store wired into synchronizers.

use std::io::{self, Write};
use std::ops::RangeInclusive;
use std::sync::Arc;

use serde_json::{json, Value};

use cti_catalog_core::{ConsumerCheckpoint, ConsumerKey, ContentType, Offset, PatchOperation};
use cti_catalog_store::{DocumentOffsetStore, DocumentStore, MemoryStore, OffsetStore};
use cti_catalog_sync::{
    ConsumerLock, ConsumerProfile, IndexSpec, ScriptedCatalog, StaticSnapshots, SyncConfig,
    Synchronizer,
};

use crate::stores::RecordingOffsetStore;

/// Shared backends for one simulated node (or several sharing a store).
pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub catalog: Arc<ScriptedCatalog>,
    pub snapshots: Arc<StaticSnapshots>,
    pub offsets: Arc<RecordingOffsetStore>,
    pub config: SyncConfig,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let offsets = Arc::new(RecordingOffsetStore::new(Arc::new(DocumentOffsetStore::new(
            store.clone(),
        ))));
        Self {
            store,
            catalog: Arc::new(ScriptedCatalog::new()),
            snapshots: Arc::new(StaticSnapshots::new()),
            offsets,
            config,
        }
    }

    /// A synchronizer over this fixture's backends.
    pub fn synchronizer(&self, profile: ConsumerProfile) -> Synchronizer {
        self.synchronizer_over(profile, self.store.clone())
    }

    /// A synchronizer whose lock identifies as `owner`, to simulate another
    /// node sharing the same store.
    pub fn synchronizer_with_owner(&self, profile: ConsumerProfile, owner: &str) -> Synchronizer {
        let lock = ConsumerLock::with_owner(self.store.clone(), owner, self.config.lock_ttl);
        self.synchronizer(profile).with_lock(lock)
    }

    /// A synchronizer that writes documents through `store` but keeps its
    /// checkpoints in this fixture's offset store.
    pub fn synchronizer_over(
        &self,
        profile: ConsumerProfile,
        store: Arc<dyn DocumentStore>,
    ) -> Synchronizer {
        Synchronizer::new(
            profile,
            store,
            self.offsets.clone(),
            self.catalog.clone(),
            self.snapshots.clone(),
            self.config.clone(),
        )
    }

    /// The stored checkpoint of `key`, if any.
    pub async fn checkpoint(&self, key: &ConsumerKey) -> Option<ConsumerCheckpoint> {
        self.offsets.get_checkpoint(key).await.ok().flatten()
    }

    /// The stored source of a document, if any.
    pub async fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.store.get(index, id).await.ok().flatten()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A profile with one unmapped index per content type and no post-sync.
pub fn content_profile(name: &str, key: ConsumerKey, types: &[ContentType]) -> ConsumerProfile {
    types.iter().fold(ConsumerProfile::new(name, key), |profile, ct| {
        profile.with_index(IndexSpec::new(*ct, json!({"properties": {}})))
    })
}

/// A rule payload as the catalog sends it.
pub fn rule_payload(id: &str, title: &str) -> Value {
    json!({
        "type": "rule",
        "document": {
            "id": id,
            "title": title,
            "level": "medium",
            "logsource": {"product": "linux"}
        }
    })
}

/// A decoder payload as the catalog sends it.
pub fn decoder_payload(id: &str, name: &str) -> Value {
    json!({
        "type": "decoder",
        "document": {
            "id": id,
            "name": name,
            "parents": ["decoder/root/0"]
        }
    })
}

/// An integration payload referencing `rules` and `decoders`.
pub fn integration_payload(id: &str, title: &str, rules: &[&str], decoders: &[&str]) -> Value {
    json!({
        "type": "integration",
        "document": {
            "id": id,
            "title": title,
            "description": format!("{} integration", title),
            "category": "cloud-services-aws",
            "rules": rules,
            "decoders": decoders,
            "kvdbs": []
        }
    })
}

/// Builds a contiguous change log starting after a given offset.
#[derive(Debug, Clone)]
pub struct ChangeLogBuilder {
    next: u64,
    offsets: Vec<Offset>,
}

impl ChangeLogBuilder {
    /// Start a log whose first offset is `after + 1`.
    pub fn after(after: u64) -> Self {
        Self {
            next: after + 1,
            offsets: Vec::new(),
        }
    }

    pub fn create(mut self, resource: &str, payload: Value) -> Self {
        self.offsets.push(Offset::create(self.next, resource, payload));
        self.next += 1;
        self
    }

    pub fn update(mut self, resource: &str, operations: Vec<PatchOperation>) -> Self {
        self.offsets.push(Offset::update(self.next, resource, operations));
        self.next += 1;
        self
    }

    pub fn delete(mut self, resource: &str) -> Self {
        self.offsets.push(Offset::delete(self.next, resource));
        self.next += 1;
        self
    }

    /// An offset with no work, as emitted for removed history.
    pub fn empty(mut self) -> Self {
        self.offsets.push(Offset::delete(self.next, ""));
        self.next += 1;
        self
    }

    /// The last offset written so far.
    pub fn last(&self) -> u64 {
        self.next - 1
    }

    pub fn build(self) -> Vec<Offset> {
        self.offsets
    }
}

/// One rule create per offset in `range`, with resource ids `r-{offset}`.
pub fn rule_creates(range: RangeInclusive<u64>) -> Vec<Offset> {
    range
        .map(|o| {
            let id = format!("r-{}", o);
            let payload = rule_payload(&id, &format!("rule {}", o));
            Offset::create(o, id, payload)
        })
        .collect()
}

/// Build a snapshot archive: one `*.json` entry per `(name, payloads)`,
/// one `{"payload": ..}` record per line.
pub fn snapshot_archive(entries: &[(&str, Vec<Value>)]) -> io::Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, payloads) in entries {
        writer.start_file(*name, options).map_err(io::Error::other)?;
        for payload in payloads {
            writeln!(writer, "{}", json!({ "payload": payload }))?;
        }
    }
    Ok(writer.finish().map_err(io::Error::other)?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_log_is_contiguous() {
        let log = ChangeLogBuilder::after(10)
            .create("r1", rule_payload("r1", "a"))
            .update("r1", vec![PatchOperation::replace("/document/title", json!("b"))])
            .empty()
            .delete("r1");
        assert_eq!(log.last(), 14);

        let offsets = log.build();
        let numbers: Vec<u64> = offsets.iter().map(|o| o.offset).collect();
        assert_eq!(numbers, vec![11, 12, 13, 14]);
        assert!(offsets[2].is_empty());
        assert!(!offsets[3].is_empty());
    }

    #[test]
    fn test_rule_creates() {
        let offsets = rule_creates(5..=7);
        assert_eq!(offsets.len(), 3);
        assert_eq!(offsets[0].resource, "r-5");
        assert_eq!(offsets[2].payload_type(), Some("rule"));
    }

    #[test]
    fn test_content_profile_indices() {
        let key = ConsumerKey::new("ctx", "dec");
        let profile = content_profile("decoders", key, &[ContentType::Decoder, ContentType::Kvdb]);
        assert_eq!(profile.indices().len(), 2);
        assert_eq!(
            profile.index_for(ContentType::Decoder).as_deref(),
            Some(".ctx-dec-decoder")
        );
        assert!(profile.index_for(ContentType::Rule).is_none());
    }

    #[test]
    fn test_snapshot_archive_is_zip() {
        let bytes = snapshot_archive(&[("rules.json", vec![rule_payload("r1", "a")])]).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[tokio::test]
    async fn test_fixture_starts_empty() {
        let fixture = TestFixture::new();
        assert!(fixture.checkpoint(&ConsumerKey::new("a", "b")).await.is_none());
        assert!(fixture.document(".x", "y").await.is_none());
    }
}
