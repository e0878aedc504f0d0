//! # CTI Catalog Content
//!
//! What happens after a sync cycle changed something.
//!
//! ## Overview
//!
//! Synced content is raw catalog data. Before it is useful locally, a few
//! derived artefacts have to exist:
//!
//! - **Space policies**: the `draft`, `test` and `custom` spaces each hold
//!   one default policy, created once and shared by every node.
//! - **Policy hashes**: a policy's `space.hash.sha256` summarises the policy
//!   and every integration, decoder, kvdb and rule it references.
//! - **Security analytics**: integrations, rules and threat detectors from
//!   the rules stream are pushed to a detection engine.
//!
//! Each of these is an idempotent pass over the consumer's own indices.
//! [`RulesPostSync`] and [`DecodersPostSync`] wire them into the
//! synchronizer as [`PostSync`](cti_catalog_sync::PostSync) hooks.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cti_catalog_content::{DecodersPostSync, MemorySecurityAnalytics, RulesPostSync};
//! use cti_catalog_core::ConsumerKey;
//! use cti_catalog_sync::ConsumerProfile;
//!
//! let sink = Arc::new(MemorySecurityAnalytics::new());
//! let rules = ConsumerProfile::new("rules", ConsumerKey::new("rules_ctx", "rules"))
//!     .with_post_sync(Arc::new(RulesPostSync::new(sink)));
//! let decoders = ConsumerProfile::new("decoders", ConsumerKey::new("dec_ctx", "decoders"))
//!     .with_post_sync(Arc::new(DecodersPostSync));
//! ```

pub mod analytics;
pub mod error;
pub mod policy_hash;
pub mod post_sync;
pub mod processors;
pub mod spaces;

pub use analytics::{
    DetectorRecord, IntegrationRecord, MemorySecurityAnalytics, RuleRecord, SecurityAnalytics,
};
pub use error::{ContentError, Result};
pub use policy_hash::PolicyHasher;
pub use post_sync::{DecodersPostSync, RulesPostSync};
pub use processors::{rule_product, SigmaProcessor};
pub use spaces::{default_policy, default_policy_id, SpaceInitializer};

/// Upper bound on documents read from one index in a post-sync pass.
pub const SEARCH_SIZE: usize = 10_000;
