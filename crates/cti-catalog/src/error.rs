//! Error types for the catalog service.

use cti_catalog_content::ContentError;
use cti_catalog_core::CoreError;
use cti_catalog_store::StoreError;
use cti_catalog_sync::SyncError;
use thiserror::Error;

/// Errors that can occur in catalog service operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Core model error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Post-sync content error.
    #[error("content error: {0}")]
    Content(#[from] ContentError),

    /// Settings file could not be parsed.
    #[error("invalid settings file: {0}")]
    SettingsParse(#[from] toml::de::Error),

    /// Settings parsed but failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A built-in index mapping is not valid JSON.
    #[error("invalid index mapping {name}: {source}")]
    InvalidMapping {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No checkpoint for the requested consumer.
    #[error("consumer not found: {0}")]
    NotFound(String),

    /// A consumer's sync task panicked or was cancelled.
    #[error("sync task failed: {0}")]
    TaskFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for catalog service operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
