//! Post-sync hooks for the built-in consumers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use cti_catalog_core::ContentType;
use cti_catalog_store::DocumentStore;
use cti_catalog_sync::{ConsumerProfile, PostSync};

use crate::analytics::SecurityAnalytics;
use crate::error::Result;
use crate::policy_hash::PolicyHasher;
use crate::processors::SigmaProcessor;
use crate::spaces::SpaceInitializer;

async fn refresh_and_init_spaces(store: &dyn DocumentStore, profile: &ConsumerProfile) -> Result<()> {
    store.refresh(&profile.index_names()).await?;
    if let Some(policy_index) = profile.index_for(ContentType::Policy) {
        SpaceInitializer::new(store).initialize(&policy_index).await?;
    }
    Ok(())
}

/// Rules consumer: spaces, then integrations, rules and detectors to the sink.
pub struct RulesPostSync {
    sink: Arc<dyn SecurityAnalytics>,
    create_detectors: bool,
}

impl RulesPostSync {
    pub fn new(sink: Arc<dyn SecurityAnalytics>) -> Self {
        Self {
            sink,
            create_detectors: true,
        }
    }

    pub fn with_detectors(mut self, enabled: bool) -> Self {
        self.create_detectors = enabled;
        self
    }

    async fn run(&self, store: &dyn DocumentStore, profile: &ConsumerProfile) -> Result<()> {
        refresh_and_init_spaces(store, profile).await?;

        let processor = SigmaProcessor::new(store, self.sink.as_ref());
        let integrations = profile.index_for(ContentType::Integration);
        if let Some(index) = &integrations {
            processor.sync_integrations(index).await?;
        }
        if let Some(index) = profile.index_for(ContentType::Rule) {
            processor.sync_rules(&index).await?;
        }
        if self.create_detectors {
            if let Some(index) = &integrations {
                processor.sync_detectors(index).await?;
            }
        }
        info!(consumer = %profile.key(), "Rules post-sync complete");
        Ok(())
    }
}

#[async_trait]
impl PostSync for RulesPostSync {
    async fn on_sync_complete(
        &self,
        store: &dyn DocumentStore,
        profile: &ConsumerProfile,
    ) -> cti_catalog_sync::Result<()> {
        Ok(self.run(store, profile).await?)
    }
}

/// Decoders consumer: spaces, then policy space hashes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecodersPostSync;

impl DecodersPostSync {
    async fn run(&self, store: &dyn DocumentStore, profile: &ConsumerProfile) -> Result<()> {
        refresh_and_init_spaces(store, profile).await?;
        let changed = PolicyHasher::new(store, profile).update_all().await?;
        info!(consumer = %profile.key(), changed, "Decoders post-sync complete");
        Ok(())
    }
}

#[async_trait]
impl PostSync for DecodersPostSync {
    async fn on_sync_complete(
        &self,
        store: &dyn DocumentStore,
        profile: &ConsumerProfile,
    ) -> cti_catalog_sync::Result<()> {
        Ok(self.run(store, profile).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MemorySecurityAnalytics;
    use crate::spaces::default_policy_id;
    use cti_catalog_core::{ConsumerKey, Sha256Hash};
    use cti_catalog_store::{MemoryStore, Query};
    use cti_catalog_sync::IndexSpec;
    use serde_json::json;

    fn decoders_profile() -> ConsumerProfile {
        let mut profile = ConsumerProfile::new("decoders", ConsumerKey::new("ctx", "dec"))
            .with_post_sync(Arc::new(DecodersPostSync));
        for ct in [
            ContentType::Decoder,
            ContentType::Kvdb,
            ContentType::Integration,
            ContentType::Policy,
        ] {
            profile = profile.with_index(IndexSpec::new(ct, json!({})));
        }
        profile
    }

    #[tokio::test]
    async fn test_two_nodes_leave_three_policies() {
        let store = MemoryStore::new();
        let profile = decoders_profile();

        // Two nodes run the same hook against the shared store.
        for _ in 0..2 {
            profile.post_sync().on_sync_complete(&store, &profile).await.unwrap();
        }

        let hits = store.search(".ctx-dec-policy", &Query::MatchAll, 100).await.unwrap();
        assert_eq!(hits.len(), 3);
        for h in &hits {
            assert_eq!(h.source["document"]["id"], default_policy_id());
        }

        let custom = store.get(".ctx-dec-policy", "policy-custom").await.unwrap().unwrap();
        let own = custom["hash"]["sha256"].as_str().unwrap();
        assert_eq!(
            custom["space"]["hash"]["sha256"],
            Sha256Hash::of_hashes([own]).to_hex()
        );
        let draft = store.get(".ctx-dec-policy", "policy-draft").await.unwrap().unwrap();
        assert_eq!(draft["space"]["hash"], draft["hash"]);
    }

    #[tokio::test]
    async fn test_rules_hook_pushes_to_sink() {
        let store = MemoryStore::new();
        let sink = Arc::new(MemorySecurityAnalytics::new());
        let profile = ConsumerProfile::new("rules", ConsumerKey::new("ctx", "rules"))
            .with_index(IndexSpec::new(ContentType::Rule, json!({})))
            .with_index(IndexSpec::new(ContentType::Integration, json!({})));
        store
            .put(".ctx-rules-integration", "i1", &json!({
                "document": {"id": "i1", "title": "Web", "category": "web", "rules": ["r1"]}
            }))
            .await
            .unwrap();
        store
            .put(".ctx-rules-rule", "r1", &json!({"document": {"id": "r1", "logsource": {"product": "apache"}}}))
            .await
            .unwrap();

        let hook = RulesPostSync::new(sink.clone()).with_detectors(false);
        hook.on_sync_complete(&store, &profile).await.unwrap();

        assert_eq!(sink.integrations().len(), 1);
        assert_eq!(sink.rules()[0].product, "apache");
        assert!(sink.detectors().is_empty());
        assert!(!store.index_exists(".ctx-rules-policy").await.unwrap());
    }
}
