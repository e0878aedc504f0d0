//! Built-in consumer profiles.
//!
//! | Profile    | Indices (alias)                                                              | Post-sync |
//! |------------|------------------------------------------------------------------------------|-----------|
//! | `rules`    | rule (`.cti-rules`), integration (`.cti-integration-rules`)                  | spaces, analytics fan-out |
//! | `decoders` | decoder (`.cti-decoders`), kvdb (`.cti-kvdbs`), integration (`.cti-integration-decoders`), policy (`.cti-policies`) | spaces, policy hashes |

use std::sync::Arc;

use serde_json::Value;

use cti_catalog_content::{DecodersPostSync, RulesPostSync, SecurityAnalytics};
use cti_catalog_core::{ConsumerKey, ContentType};
use cti_catalog_sync::{ConsumerProfile, IndexSpec};

use crate::error::{CatalogError, Result};

pub const RULES_PROFILE: &str = "rules";
pub const DECODERS_PROFILE: &str = "decoders";

const RULES_MAPPING: &str = include_str!("../mappings/cti-rules-mappings.json");
const DECODERS_MAPPING: &str = include_str!("../mappings/cti-decoders-mappings.json");
const KVDBS_MAPPING: &str = include_str!("../mappings/cti-kvdbs-mappings.json");
const INTEGRATIONS_MAPPING: &str = include_str!("../mappings/cti-integrations-mappings.json");
const POLICIES_MAPPING: &str = include_str!("../mappings/cti-policies-mappings.json");

fn index(content_type: ContentType, name: &'static str, raw: &str, alias: &str) -> Result<IndexSpec> {
    let mapping: Value = serde_json::from_str(raw)
        .map_err(|source| CatalogError::InvalidMapping { name, source })?;
    Ok(IndexSpec::new(content_type, mapping).with_alias(alias))
}

/// Sigma rules and the integrations that group them.
pub fn rules_profile(
    key: ConsumerKey,
    sink: Arc<dyn SecurityAnalytics>,
    create_detectors: bool,
) -> Result<ConsumerProfile> {
    let post_sync = RulesPostSync::new(sink).with_detectors(create_detectors);
    Ok(ConsumerProfile::new(RULES_PROFILE, key)
        .with_index(index(ContentType::Rule, "rules", RULES_MAPPING, ".cti-rules")?)
        .with_index(index(
            ContentType::Integration,
            "integrations",
            INTEGRATIONS_MAPPING,
            ".cti-integration-rules",
        )?)
        .with_post_sync(Arc::new(post_sync)))
}

/// Decoders, key-value databases, their integrations and policies.
pub fn decoders_profile(key: ConsumerKey) -> Result<ConsumerProfile> {
    Ok(ConsumerProfile::new(DECODERS_PROFILE, key)
        .with_index(index(ContentType::Decoder, "decoders", DECODERS_MAPPING, ".cti-decoders")?)
        .with_index(index(ContentType::Kvdb, "kvdbs", KVDBS_MAPPING, ".cti-kvdbs")?)
        .with_index(index(
            ContentType::Integration,
            "integrations",
            INTEGRATIONS_MAPPING,
            ".cti-integration-decoders",
        )?)
        .with_index(index(ContentType::Policy, "policies", POLICIES_MAPPING, ".cti-policies")?)
        .with_post_sync(Arc::new(DecodersPostSync)))
}
