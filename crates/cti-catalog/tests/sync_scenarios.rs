//! End-to-end sync cycles against in-memory backends.

use std::sync::Arc;

use serde_json::json;

use cti_catalog::core::{ConsumerKey, ContentType, Offset, PatchOperation, RemoteConsumer};
use cti_catalog::store::{DocumentOffsetStore, DocumentStore, OffsetStore, Query};
use cti_catalog::sync::{ConsumerLock, SyncConfig, SyncError, Synchronizer};
use cti_catalog_testkit::{
    content_profile, rule_creates, rule_payload, snapshot_archive, ChangeLogBuilder, FaultyStore,
    TestFixture,
};

fn key() -> ConsumerKey {
    ConsumerKey::new("ctx", "rules")
}

fn rules_index() -> String {
    key().index_name(ContentType::Rule)
}

fn fixture(max_changes: u64) -> TestFixture {
    TestFixture::with_config(SyncConfig {
        max_changes,
        ..SyncConfig::default()
    })
}

async fn count(store: &dyn DocumentStore, index: &str) -> usize {
    store.search(index, &Query::MatchAll, 100_000).await.unwrap().len()
}

#[tokio::test]
async fn test_failed_chunk_keeps_earlier_chunks() {
    let fx = fixture(1000);
    fx.catalog.push_offsets(&key(), rule_creates(1..=3999)).await;
    fx.catalog.fail_changes_from(&key(), 1999).await;

    let sync = fx.synchronizer(content_profile("rules", key(), &[ContentType::Rule]));
    let err = sync.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteUnavailable(_)));

    assert_eq!(fx.offsets.offsets(&key()), vec![999, 1999]);
    assert_eq!(fx.offsets.advances(&key()), 2);
    assert_eq!(fx.checkpoint(&key()).await.unwrap().local_offset, 1999);
    assert_eq!(count(fx.store.as_ref(), &rules_index()).await, 1999);
    assert_eq!(
        fx.catalog.change_requests(&key()).await,
        vec![(0, 999), (999, 1999), (1999, 2999)]
    );
}

#[tokio::test]
async fn test_failed_apply_in_third_chunk_keeps_second_checkpoint() {
    let fx = fixture(1000);
    let mut log = rule_creates(1..=3999);
    log[2499] = Offset::update(2500, "ghost", vec![PatchOperation::remove("/document/title")]);
    fx.catalog.push_offsets(&key(), log).await;

    let sync = fx.synchronizer(content_profile("rules", key(), &[ContentType::Rule]));
    let err = sync.sync().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::PatchApplyFailed { offset: 2500, applied: 500, .. }
    ));

    assert_eq!(fx.offsets.offsets(&key()), vec![999, 1999]);
    assert_eq!(fx.offsets.advances(&key()), 2);
    assert_eq!(fx.checkpoint(&key()).await.unwrap().local_offset, 1999);
    assert_eq!(
        fx.catalog.change_requests(&key()).await,
        vec![(0, 999), (999, 1999), (1999, 2999)]
    );
}

#[tokio::test]
async fn test_cold_start_replays_offsets_past_snapshot() {
    let fx = fixture(1000);
    let link = "https://cti.example/snapshots/rules-40.zip";
    let archive = snapshot_archive(&[(
        "rules.json",
        vec![rule_payload("s-1", "a"), rule_payload("s-2", "b")],
    )])
    .unwrap();
    fx.snapshots.insert(link, archive);

    let mut remote = RemoteConsumer::new(42).with_snapshot(link);
    remote.snapshot_offset = Some(40);
    fx.catalog.set_consumer(&key(), remote).await;
    let log = ChangeLogBuilder::after(40)
        .create("r-41", rule_payload("r-41", "c"))
        .create("r-42", rule_payload("r-42", "d"))
        .build();
    fx.catalog.push_offsets(&key(), log).await;

    let sync = fx.synchronizer(content_profile("rules", key(), &[ContentType::Rule]));
    let outcome = sync.sync().await.unwrap();

    assert!(outcome.updated);
    assert_eq!(outcome.new_offset, 42);
    assert_eq!(fx.catalog.change_requests(&key()).await, vec![(40, 42)]);
    assert_eq!(fx.offsets.offsets(&key()), vec![40, 42]);
    assert!(fx.document(&rules_index(), "s-2").await.is_some());
    assert!(fx.document(&rules_index(), "r-42").await.is_some());
}

#[tokio::test]
async fn test_resume_after_failed_chunk() {
    let fx = fixture(10);
    fx.catalog.push_offsets(&key(), rule_creates(1..=35)).await;
    fx.catalog.fail_changes_from(&key(), 19).await;

    let sync = fx.synchronizer(content_profile("rules", key(), &[ContentType::Rule]));
    assert!(sync.sync().await.is_err());
    assert_eq!(fx.checkpoint(&key()).await.unwrap().local_offset, 19);

    // A fresh catalog script without the failure, same log.
    let fx2 = TestFixture {
        catalog: Arc::new(cti_catalog::sync::ScriptedCatalog::new()),
        ..fx
    };
    fx2.catalog.push_offsets(&key(), rule_creates(1..=35)).await;
    let sync = fx2.synchronizer(content_profile("rules", key(), &[ContentType::Rule]));
    let outcome = sync.sync().await.unwrap();

    assert!(outcome.updated);
    assert_eq!(outcome.new_offset, 35);
    assert_eq!(
        fx2.catalog.change_requests(&key()).await,
        vec![(19, 29), (29, 35)]
    );
    assert_eq!(count(fx2.store.as_ref(), &rules_index()).await, 35);
}

#[tokio::test]
async fn test_cold_start_loads_snapshot_then_replays() {
    let fx = fixture(1000);
    let link = "https://cti.example/snapshots/rules-40.zip";
    let archive = snapshot_archive(&[(
        "rules.json",
        vec![rule_payload("s-1", "a"), rule_payload("s-2", "b"), rule_payload("s-3", "c")],
    )])
    .unwrap();
    fx.snapshots.insert(link, archive);
    fx.catalog
        .set_consumer(&key(), RemoteConsumer::new(40).with_snapshot(link))
        .await;

    let sync = fx.synchronizer(content_profile("rules", key(), &[ContentType::Rule]));
    let outcome = sync.sync().await.unwrap();
    assert!(outcome.updated);
    assert_eq!(outcome.new_offset, 40);
    assert_eq!(count(fx.store.as_ref(), &rules_index()).await, 3);
    assert!(fx.catalog.change_requests(&key()).await.is_empty());

    let checkpoint = fx.checkpoint(&key()).await.unwrap();
    assert_eq!(checkpoint.snapshot_link.as_deref(), Some(link));

    // Once something is applied, the log is replayed instead.
    let log = ChangeLogBuilder::after(40)
        .create("r-41", rule_payload("r-41", "d"))
        .delete("s-1")
        .build();
    fx.catalog.push_offsets(&key(), log).await;

    let outcome = sync.sync().await.unwrap();
    assert_eq!(outcome.new_offset, 42);
    assert_eq!(fx.catalog.change_requests(&key()).await, vec![(40, 42)]);
    assert!(fx.document(&rules_index(), "s-1").await.is_none());
    assert!(fx.document(&rules_index(), "s-2").await.is_some());
    assert!(fx.document(&rules_index(), "r-41").await.is_some());
}

#[tokio::test]
async fn test_missing_snapshot_link_replays_from_zero() {
    let fx = fixture(1000);
    fx.catalog.push_offsets(&key(), rule_creates(1..=5)).await;

    let sync = fx.synchronizer(content_profile("rules", key(), &[ContentType::Rule]));
    let outcome = sync.sync().await.unwrap();

    assert_eq!(outcome.new_offset, 5);
    assert_eq!(fx.catalog.change_requests(&key()).await, vec![(0, 5)]);
}

#[tokio::test]
async fn test_up_to_date_is_a_no_op() {
    let fx = fixture(1000);
    fx.catalog.push_offsets(&key(), rule_creates(1..=8)).await;
    let sync = fx.synchronizer(content_profile("rules", key(), &[ContentType::Rule]));
    sync.sync().await.unwrap();
    let writes = fx.offsets.write_count();

    let outcome = sync.sync().await.unwrap();
    assert!(!outcome.updated);
    assert_eq!(outcome.new_offset, 8);
    assert_eq!(fx.catalog.change_requests(&key()).await.len(), 1);
    assert_eq!(fx.offsets.write_count(), writes);
}

#[tokio::test]
async fn test_consumers_are_isolated() {
    let fx = fixture(1000);
    let healthy = ConsumerKey::new("ctx", "decoders");
    fx.catalog.push_offsets(&key(), rule_creates(1..=3)).await;
    fx.catalog.fail_consumer_info(&key()).await;
    let log = ChangeLogBuilder::after(0)
        .create("d-1", cti_catalog_testkit::decoder_payload("d-1", "decoder/a/0"))
        .build();
    fx.catalog.push_offsets(&healthy, log).await;

    let failing = fx.synchronizer(content_profile("rules", key(), &[ContentType::Rule]));
    let working =
        fx.synchronizer(content_profile("decoders", healthy.clone(), &[ContentType::Decoder]));

    assert!(failing.sync().await.is_err());
    let outcome = working.sync().await.unwrap();

    assert_eq!(outcome.new_offset, 1);
    assert!(fx.checkpoint(&key()).await.is_none());
    let stored = fx
        .document(&healthy.index_name(ContentType::Decoder), "d-1")
        .await
        .unwrap();
    assert!(stored["decoder"].as_str().unwrap().contains("decoder/a/0"));
}

#[tokio::test]
async fn test_replay_converges() {
    let fx = fixture(3);
    let log = ChangeLogBuilder::after(0)
        .create("r-1", rule_payload("r-1", "first"))
        .create("r-2", rule_payload("r-2", "second"))
        .update("r-1", vec![PatchOperation::replace("/document/title", json!("renamed"))])
        .empty()
        .delete("r-2")
        .create("r-3", rule_payload("r-3", "third"))
        .build();
    fx.catalog.push_offsets(&key(), log).await;

    let sync = fx.synchronizer(content_profile("rules", key(), &[ContentType::Rule]));
    sync.sync().await.unwrap();
    let first = fx.store.search(&rules_index(), &Query::MatchAll, 100).await.unwrap();

    // Forget the checkpoint and replay the whole log over the same data.
    let offsets = DocumentOffsetStore::new(fx.store.clone());
    let mut checkpoint = offsets.get_checkpoint(&key()).await.unwrap().unwrap();
    checkpoint.local_offset = 0;
    offsets.set_checkpoint(&checkpoint).await.unwrap();
    sync.sync().await.unwrap();
    let second = fx.store.search(&rules_index(), &Query::MatchAll, 100).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    let renamed = fx.document(&rules_index(), "r-1").await.unwrap();
    assert_eq!(renamed["document"]["title"], "renamed");
}

#[tokio::test]
async fn test_store_outage_is_not_a_cold_start() {
    let fx = fixture(1000);
    let link = "https://cti.example/snapshots/rules.zip";
    fx.catalog
        .set_consumer(&key(), RemoteConsumer::new(0).with_snapshot(link))
        .await;
    fx.catalog.push_offsets(&key(), rule_creates(1..=5)).await;

    let faulty = Arc::new(FaultyStore::new(fx.store.clone()));
    let offsets = Arc::new(DocumentOffsetStore::new(faulty.clone()));
    let profile = content_profile("rules", key(), &[ContentType::Rule]);
    let sync = Synchronizer::new(
        profile,
        faulty.clone(),
        offsets.clone(),
        fx.catalog.clone(),
        fx.snapshots.clone(),
        fx.config.clone(),
    )
    .with_lock(ConsumerLock::with_owner(fx.store.clone(), "node-a", fx.config.lock_ttl));

    // Land on a non-zero checkpoint without a snapshot.
    let mut checkpoint = cti_catalog::ConsumerCheckpoint::new(&key());
    checkpoint.local_offset = 5;
    offsets.set_checkpoint(&checkpoint).await.unwrap();
    fx.catalog.push_offsets(&key(), rule_creates(6..=7)).await;

    faulty.set_unavailable(true);
    let err = sync.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::StoreUnavailable(_)));

    faulty.set_unavailable(false);
    assert_eq!(offsets.get_checkpoint(&key()).await.unwrap().unwrap().local_offset, 5);

    let outcome = sync.sync().await.unwrap();
    assert_eq!(outcome.new_offset, 7);
    assert_eq!(fx.catalog.change_requests(&key()).await, vec![(5, 7)]);
}

#[tokio::test]
async fn test_held_lock_makes_other_node_busy() {
    let fx = fixture(1000);
    fx.catalog.push_offsets(&key(), rule_creates(1..=4)).await;

    let holder = ConsumerLock::with_owner(fx.store.clone(), "node-a", fx.config.lock_ttl);
    let guard = holder.acquire(&key()).await.unwrap();

    let other =
        fx.synchronizer_with_owner(content_profile("rules", key(), &[ContentType::Rule]), "node-b");
    let err = other.sync().await.unwrap_err();
    assert!(err.is_busy());
    assert!(fx.checkpoint(&key()).await.is_none());

    guard.release().await.unwrap();
    assert_eq!(other.sync().await.unwrap().new_offset, 4);
}
