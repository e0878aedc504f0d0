//! Service settings.
//!
//! Settings are read from a TOML file. Every key has a default, so an empty
//! file (or no file at all) yields a working configuration:
//!
//! ```toml
//! [cti]
//! base_uri = "https://cti-pre.wazuh.com/api/v1"
//! client_timeout_secs = 10
//! snapshot_timeout_secs = 120
//!
//! [sync]
//! max_changes = 1000
//! max_docs = 1000
//! interval_secs = 3600
//! lock_ttl_secs = 300
//! create_detectors = true
//!
//! [consumers.rules]
//! context = "rules_development_0.0.1"
//! consumer = "rules_development_0.0.1_test"
//!
//! [store]
//! path = "cti-catalog.db"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cti_catalog_core::ConsumerKey;
use cti_catalog_sync::SyncConfig;

use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cti: CtiSettings,
    pub sync: SyncSettings,
    pub consumers: ConsumerSettings,
    pub store: StoreSettings,
}

/// Remote catalog access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtiSettings {
    pub base_uri: String,
    /// Timeout for consumer info and changes requests.
    pub client_timeout_secs: u64,
    /// Timeout for snapshot downloads.
    pub snapshot_timeout_secs: u64,
}

impl Default for CtiSettings {
    fn default() -> Self {
        Self {
            base_uri: "https://cti-pre.wazuh.com/api/v1".into(),
            client_timeout_secs: 10,
            snapshot_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub max_changes: u64,
    pub max_docs: usize,
    pub interval_secs: u64,
    pub lock_ttl_secs: u64,
    /// Defaults to the OS temp dir.
    pub scratch_dir: Option<PathBuf>,
    /// Push threat detectors after a rules update.
    pub create_detectors: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_changes: 1000,
            max_docs: 1000,
            interval_secs: 3600,
            lock_ttl_secs: 300,
            scratch_dir: None,
            create_detectors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerEntry {
    pub context: String,
    pub consumer: String,
}

impl ConsumerEntry {
    pub fn key(&self) -> ConsumerKey {
        ConsumerKey::new(&self.context, &self.consumer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    pub rules: ConsumerEntry,
    pub decoders: ConsumerEntry,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            rules: ConsumerEntry {
                context: "rules_development_0.0.1".into(),
                consumer: "rules_development_0.0.1_test".into(),
            },
            decoders: ConsumerEntry {
                context: "decoders_development_0.0.1".into(),
                consumer: "decoders_development_0.0.1".into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cti-catalog.db"),
        }
    }
}

impl Settings {
    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.sync.max_changes == 0, "sync.max_changes must be > 0"),
            (self.sync.max_docs == 0, "sync.max_docs must be > 0"),
            (self.sync.interval_secs == 0, "sync.interval_secs must be > 0"),
            (self.cti.client_timeout_secs == 0, "cti.client_timeout_secs must be > 0"),
            (self.cti.snapshot_timeout_secs == 0, "cti.snapshot_timeout_secs must be > 0"),
            (self.cti.base_uri.trim().is_empty(), "cti.base_uri must not be empty"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, msg)) => Err(CatalogError::InvalidSettings((*msg).into())),
            None => Ok(()),
        }
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.cti.client_timeout_secs)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.cti.snapshot_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    /// Synchronizer configuration derived from these settings.
    pub fn sync_config(&self) -> SyncConfig {
        let defaults = SyncConfig::default();
        SyncConfig {
            max_changes: self.sync.max_changes,
            max_docs: self.sync.max_docs,
            lock_ttl: Duration::from_secs(self.sync.lock_ttl_secs),
            scratch_dir: self.sync.scratch_dir.clone().unwrap_or(defaults.scratch_dir),
        }
    }
}
