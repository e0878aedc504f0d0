//! # CTI Catalog Testkit
//!
//! Testing utilities for the CTI catalog sync engine.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known documents and their content hashes
//! - **Generators**: Proptest strategies for change logs, windows and documents
//! - **Fixtures**: In-memory backends wired into synchronizers
//! - **Stores**: Wrappers that record checkpoint writes or simulate outages
//!
//! ## Golden Vectors
//!
//! ```rust
//! use cti_catalog_testkit::vectors::verify_all_vectors;
//!
//! assert!(verify_all_vectors().is_empty());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use cti_catalog_testkit::generators::change_log;
//!
//! proptest! {
//!     #[test]
//!     fn replay_is_idempotent(log in change_log(5, 50)) {
//!         // apply `log` twice and compare the indices
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use cti_catalog_core::{ConsumerKey, ContentType};
//! use cti_catalog_testkit::fixtures::{content_profile, rule_creates, TestFixture};
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let key = ConsumerKey::new("ctx", "rules");
//!     fixture.catalog.push_offsets(&key, rule_creates(1..=10)).await;
//!
//!     let sync = fixture.synchronizer(content_profile("rules", key.clone(), &[ContentType::Rule]));
//!     let outcome = sync.sync().await.unwrap();
//!     assert_eq!(outcome.new_offset, 10);
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod stores;
pub mod vectors;

pub use fixtures::{
    content_profile, decoder_payload, integration_payload, rule_creates, rule_payload,
    snapshot_archive, ChangeLogBuilder, TestFixture,
};
pub use stores::{FaultyStore, RecordingOffsetStore};
