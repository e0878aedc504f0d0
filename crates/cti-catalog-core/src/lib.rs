//! # CTI Catalog Core
//!
//! Pure model for the CTI catalog sync engine: consumer checkpoints, change
//! sets, JSON patch, content types and payload normalisation.
//!
//! This crate contains no I/O, no storage, no networking. Everything here is
//! computation over JSON documents and offsets.
//!
//! ## Key Types
//!
//! - [`ConsumerKey`] - `(context, consumer)` pair identifying a content stream
//! - [`ConsumerCheckpoint`] - Persisted local/remote offsets for one consumer
//! - [`RemoteConsumer`] - Consumer metadata as reported by the catalog
//! - [`ChangeSet`] - Validated, contiguous run of [`Offset`] records
//! - [`PatchOperation`] - A single JSON patch mutation
//! - [`ContentType`] / [`Space`] - Resource kinds and policy scopes
//!
//! ## Offsets
//!
//! Change sets cover the half-open range `(from, to]`. Offsets inside one
//! change set are strictly increasing and contiguous; see [`validation`].

pub mod canonical;
pub mod category;
pub mod changes;
pub mod checkpoint;
pub mod error;
pub mod hash;
pub mod patch;
pub mod types;
pub mod validation;

pub use canonical::{
    decoder_yaml, document_id, normalize_payload, payload_space, sanitize_document,
    DECODER_KEY_ORDER,
};
pub use category::format_category;
pub use changes::{chunk_ranges, ChangeSet, Changes, Offset, OperationType};
pub use checkpoint::{ConsumerCheckpoint, RemoteConsumer};
pub use error::{CoreError, PatchError};
pub use hash::{extract_hash, Sha256Hash};
pub use patch::{apply_operation, apply_operations, PatchOp, PatchOperation};
pub use types::{ConsumerKey, ContentType, Space};
pub use validation::validate_offsets;

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
