//! Default policies for the user spaces.
//!
//! After a content update every node makes sure the `draft`, `test` and
//! `custom` spaces each hold one policy. Nodes race on this, so the write
//! is a conditional insert under a fixed id and the document id is derived
//! from a constant seed: whichever node wins, the result is the same.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use cti_catalog_core::{Sha256Hash, Space};
use cti_catalog_store::{DocumentStore, InsertResult, Query};

use crate::error::Result;

/// Seed for the document id shared by the default policies.
pub const DEFAULT_POLICY_SEED: &str = "wazuh-default-policy";

const DEFAULT_POLICY_TITLE: &str = "Custom policy";
const DEFAULT_POLICY_AUTHOR: &str = "Wazuh Inc.";
const DEFAULT_POLICY_REFERENCE: &str = "https://wazuh.com";

/// Document id shared by every default policy.
pub fn default_policy_id() -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, DEFAULT_POLICY_SEED.as_bytes()).to_string()
}

/// Store id of the default policy for a space.
pub fn default_policy_key(space: Space) -> String {
    format!("policy-{}", space)
}

/// Build the indexed source of a default policy.
///
/// Both `hash.sha256` and `space.hash.sha256` are the hash of the policy
/// document; the space hash is recomputed later for spaces that aggregate
/// referenced content.
pub fn default_policy(space: Space, document_id: &str, date: &str) -> Value {
    let document = json!({
        "id": document_id,
        "title": DEFAULT_POLICY_TITLE,
        "description": DEFAULT_POLICY_TITLE,
        "author": DEFAULT_POLICY_AUTHOR,
        "root_decoder": "",
        "documentation": "",
        "integrations": [],
        "filters": [],
        "enrichments": [],
        "references": [DEFAULT_POLICY_REFERENCE],
        "date": date,
        "modified": date,
    });
    let hash = Sha256Hash::of_json(&document).to_hex();

    json!({
        "document": document,
        "hash": { "sha256": hash },
        "space": { "name": space.as_str(), "hash": { "sha256": hash } },
    })
}

/// Creates missing default policies.
pub struct SpaceInitializer<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> SpaceInitializer<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Ensure each user space has a policy in `policy_index`.
    ///
    /// Returns the number of policies this call created.
    pub async fn initialize(&self, policy_index: &str) -> Result<usize> {
        let document_id = default_policy_id();
        let date = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut created = 0;

        for space in Space::USER_SPACES {
            let existing = self
                .store
                .search(policy_index, &Query::term("space.name", space.as_str()), 1)
                .await?;
            if !existing.is_empty() {
                debug!(space = %space, "Space already has a policy");
                continue;
            }

            let source = default_policy(space, &document_id, &date);
            match self
                .store
                .put_if_absent(policy_index, &default_policy_key(space), &source)
                .await?
            {
                InsertResult::Inserted => {
                    info!(space = %space, index = policy_index, "Created default policy");
                    created += 1;
                }
                InsertResult::AlreadyExists => {
                    debug!(space = %space, "Default policy created concurrently");
                }
            }
        }

        if created > 0 {
            self.store.refresh(&[policy_index.to_owned()]).await?;
        }
        Ok(created)
    }
}
