//! Post-sync behaviour across consumers and nodes.

use std::sync::Arc;

use cti_catalog::content::MemorySecurityAnalytics;
use cti_catalog::core::{extract_hash, ConsumerKey, ContentType, Sha256Hash};
use cti_catalog::store::{DocumentStore, Query};
use cti_catalog::sync::SyncConfig;
use cti_catalog::{decoders_profile, rules_profile};
use cti_catalog_testkit::{
    decoder_payload, integration_payload, rule_payload, ChangeLogBuilder, TestFixture,
};

fn decoders_key() -> ConsumerKey {
    ConsumerKey::new("decoders_development_0.0.1", "decoders_development_0.0.1")
}

fn rules_key() -> ConsumerKey {
    ConsumerKey::new("rules_development_0.0.1", "rules_development_0.0.1_test")
}

async fn policies(store: &dyn DocumentStore, key: &ConsumerKey) -> Vec<cti_catalog::store::Hit> {
    store
        .search(&key.index_name(ContentType::Policy), &Query::MatchAll, 100)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_post_sync_on_two_nodes_keeps_one_policy_per_space() {
    let fx = TestFixture::with_config(SyncConfig::default());
    let key = decoders_key();
    fx.catalog
        .push_offsets(
            &key,
            ChangeLogBuilder::after(0)
                .create("d-1", decoder_payload("d-1", "decoder/syslog/0"))
                .build(),
        )
        .await;

    let node_a = fx.synchronizer_with_owner(decoders_profile(key.clone()).unwrap(), "node-a");
    let node_b = fx.synchronizer_with_owner(decoders_profile(key.clone()).unwrap(), "node-b");

    assert!(node_a.sync().await.unwrap().updated);
    assert_eq!(policies(fx.store.as_ref(), &key).await.len(), 3);

    fx.catalog
        .push_offsets(
            &key,
            ChangeLogBuilder::after(1)
                .create("d-2", decoder_payload("d-2", "decoder/json/0"))
                .build(),
        )
        .await;
    assert!(node_b.sync().await.unwrap().updated);

    let hits = policies(fx.store.as_ref(), &key).await;
    let mut spaces: Vec<&str> = hits
        .iter()
        .filter_map(|h| h.source.pointer("/space/name").and_then(|v| v.as_str()))
        .collect();
    spaces.sort_unstable();
    assert_eq!(spaces, vec!["custom", "draft", "test"]);
}

#[tokio::test]
async fn test_standard_policy_hash_covers_integration_content() {
    let fx = TestFixture::new();
    let key = decoders_key();
    let integration = integration_payload("i-1", "AWS", &[], &["d-1"]);
    let policy = serde_json::json!({
        "type": "policy",
        "document": {
            "id": "p-std",
            "title": "Standard",
            "integrations": ["i-1"]
        },
        "space": {"name": "standard"}
    });

    let log = ChangeLogBuilder::after(0)
        .create("d-1", decoder_payload("d-1", "decoder/syslog/0"))
        .create("i-1", integration)
        .create("p-std", policy)
        .build();
    fx.catalog.push_offsets(&key, log).await;

    let sync = fx.synchronizer(decoders_profile(key.clone()).unwrap());
    sync.sync().await.unwrap();

    let policy_index = key.index_name(ContentType::Policy);
    let stored = fx.document(&policy_index, "p-std").await.unwrap();
    let decoder = fx
        .document(&key.index_name(ContentType::Decoder), "d-1")
        .await
        .unwrap();
    let integration = fx
        .document(&key.index_name(ContentType::Integration), "i-1")
        .await
        .unwrap();

    let own = extract_hash(&stored).unwrap();
    let expected = Sha256Hash::of_hashes([
        own,
        extract_hash(&integration).unwrap(),
        extract_hash(&decoder).unwrap(),
    ]);
    assert_eq!(
        stored.pointer("/space/hash/sha256").and_then(|v| v.as_str()),
        Some(expected.to_hex().as_str())
    );
}

#[tokio::test]
async fn test_rules_post_sync_feeds_sink() {
    let fx = TestFixture::new();
    let key = rules_key();
    let sink = Arc::new(MemorySecurityAnalytics::new());

    let log = ChangeLogBuilder::after(0)
        .create("r-1", rule_payload("r-1", "Suspicious login"))
        .create("r-2", rule_payload("r-2", "Brute force"))
        .create("i-1", integration_payload("i-1", "Linux auth", &["r-1", "r-2"], &[]))
        .build();
    fx.catalog.push_offsets(&key, log).await;

    let profile = rules_profile(key.clone(), sink.clone(), true).unwrap();
    let outcome = fx.synchronizer(profile).sync().await.unwrap();
    assert!(outcome.updated);

    let rules = sink.rules();
    assert_eq!(rules.len(), 2);
    assert!(rules.iter().all(|r| r.product == "linux"));

    let integrations = sink.integrations();
    assert_eq!(integrations.len(), 1);
    assert_eq!(integrations[0].category, "Cloud Services");
    assert_eq!(integrations[0].rules, vec!["r-1", "r-2"]);

    let detectors = sink.detectors();
    assert_eq!(detectors.len(), 1);
    assert_eq!(detectors[0].id, "i-1");
    assert_eq!(detectors[0].category, "cloud-services-aws");
}

#[tokio::test]
async fn test_rules_post_sync_skips_detectors_when_disabled() {
    let fx = TestFixture::new();
    let key = rules_key();
    let sink = Arc::new(MemorySecurityAnalytics::new());
    fx.catalog
        .push_offsets(
            &key,
            ChangeLogBuilder::after(0)
                .create("i-1", integration_payload("i-1", "Linux auth", &["r-1"], &[]))
                .build(),
        )
        .await;

    let profile = rules_profile(key, sink.clone(), false).unwrap();
    fx.synchronizer(profile).sync().await.unwrap();

    assert_eq!(sink.integrations().len(), 1);
    assert!(sink.detectors().is_empty());
}
