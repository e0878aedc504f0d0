//! Aggregate policy hashes.
//!
//! A policy's space hash covers the policy itself and everything it pulls
//! in: for each referenced integration, the integration followed by its
//! decoders, kvdbs and rules, in document order.
//!
//! ```text
//! space.hash.sha256 = sha256(policy ‖ int₁ ‖ dec… ‖ kvdb… ‖ rule… ‖ int₂ ‖ …)
//! ```
//!
//! where each term is the referenced document's hex `hash.sha256`.
//! References that do not resolve are skipped.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use cti_catalog_core::{extract_hash, payload_space, ContentType, Sha256Hash};
use cti_catalog_store::{DocumentStore, Query};
use cti_catalog_sync::ConsumerProfile;

use crate::error::Result;
use crate::SEARCH_SIZE;

/// Integration fields listing referenced resources, in hashing order.
const REFERENCE_FIELDS: [(&str, ContentType); 3] = [
    ("decoders", ContentType::Decoder),
    ("kvdbs", ContentType::Kvdb),
    ("rules", ContentType::Rule),
];

/// Recomputes `space.hash.sha256` for a consumer's policies.
pub struct PolicyHasher<'a> {
    store: &'a dyn DocumentStore,
    profile: &'a ConsumerProfile,
}

impl<'a> PolicyHasher<'a> {
    pub fn new(store: &'a dyn DocumentStore, profile: &'a ConsumerProfile) -> Self {
        Self { store, profile }
    }

    /// Update every policy outside the editable spaces.
    ///
    /// Returns the number of policies whose stored hash changed.
    pub async fn update_all(&self) -> Result<usize> {
        let Some(policy_index) = self.profile.index_for(ContentType::Policy) else {
            return Ok(0);
        };
        if !self.store.index_exists(&policy_index).await? {
            warn!(index = %policy_index, "Policy index missing, skipping hash calculation");
            return Ok(0);
        }

        let hits = self
            .store
            .search(&policy_index, &Query::MatchAll, SEARCH_SIZE)
            .await?;
        let mut changed = 0;

        for hit in hits {
            let space = payload_space(&hit.source);
            if space.is_editable() {
                debug!(policy = %hit.id, space = %space, "Skipping editable space");
                continue;
            }
            if !hit.source.is_object() {
                warn!(policy = %hit.id, "Policy source is not an object");
                continue;
            }

            let hash = self.space_hash(&hit.source).await?;
            let current = hit.source.pointer("/space/hash/sha256").and_then(Value::as_str);
            if current == Some(hash.as_str()) {
                continue;
            }

            let mut source = hit.source;
            set_space_hash(&mut source, &hash);
            self.store.put(&policy_index, &hit.id, &source).await?;
            changed += 1;
        }

        if changed > 0 {
            self.store.refresh(&[policy_index.clone()]).await?;
            info!(index = %policy_index, changed, "Updated policy space hashes");
        }
        Ok(changed)
    }

    /// Compute the space hash of one policy source.
    pub async fn space_hash(&self, policy: &Value) -> Result<String> {
        let mut hashes: Vec<String> = extract_hash(policy).map(str::to_owned).into_iter().collect();

        let integration_index = self.profile.index_for(ContentType::Integration);
        for integration_id in string_list(policy.pointer("/document/integrations")) {
            let Some(index) = integration_index.as_deref() else {
                break;
            };
            let Some(integration) = self.store.get(index, integration_id).await? else {
                continue;
            };
            hashes.extend(extract_hash(&integration).map(str::to_owned));

            for (field, content_type) in REFERENCE_FIELDS {
                let Some(index) = self.profile.index_for(content_type) else {
                    continue;
                };
                let refs = integration.get("document").and_then(|d| d.get(field));
                for id in string_list(refs) {
                    if let Some(doc) = self.store.get(&index, id).await? {
                        hashes.extend(extract_hash(&doc).map(str::to_owned));
                    }
                }
            }
        }

        Ok(Sha256Hash::of_hashes(hashes.iter().map(String::as_str)).to_hex())
    }
}

fn string_list(value: Option<&Value>) -> impl Iterator<Item = &str> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn set_space_hash(source: &mut Value, hash: &str) {
    if !source["space"].is_object() {
        source["space"] = json!({});
    }
    source["space"]["hash"] = json!({ "sha256": hash });
}
