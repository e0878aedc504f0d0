//! Snapshot download and bulk load.
//!
//! A snapshot is a zip archive of `*.json` files. Each non-empty line is a
//! record of the form `{"payload": {...}}`, where the payload has the same
//! shape as a CREATE offset's payload.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use cti_catalog_core::{document_id, normalize_payload, ContentType, RemoteConsumer, Sha256Hash};
use cti_catalog_store::DocumentStore;

use crate::error::{Result, SyncError};
use crate::profile::ConsumerProfile;

/// Downloads a snapshot artifact to a local file.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Download `url` into `dest`, returning the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Fetches snapshots over HTTP with a dedicated (long) timeout.
#[derive(Clone)]
pub struct HttpSnapshotFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSnapshotFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let failed = |e: String| SyncError::SnapshotDownloadFailed(format!("{}: {}", url, e));

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("status {}", response.status())));
        }
        let body = response.bytes().await.map_err(|e| failed(e.to_string()))?;

        tokio::fs::write(dest, &body)
            .await
            .map_err(|e| failed(e.to_string()))?;
        Ok(body.len() as u64)
    }
}

/// In-memory snapshot sources for tests.
pub mod memory {
    use super::*;
    use bytes::Bytes;
    use std::sync::Mutex;

    /// Serves archives registered by URL.
    #[derive(Default)]
    pub struct StaticSnapshots {
        archives: Mutex<HashMap<String, Bytes>>,
    }

    impl StaticSnapshots {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, url: impl Into<String>, archive: impl Into<Bytes>) {
            if let Ok(mut archives) = self.archives.lock() {
                archives.insert(url.into(), archive.into());
            }
        }
    }

    #[async_trait]
    impl SnapshotFetcher for StaticSnapshots {
        async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
            let bytes = self
                .archives
                .lock()
                .ok()
                .and_then(|a| a.get(url).cloned())
                .ok_or_else(|| SyncError::SnapshotDownloadFailed(format!("{}: not found", url)))?;
            tokio::fs::write(dest, &bytes)
                .await
                .map_err(|e| SyncError::SnapshotDownloadFailed(e.to_string()))?;
            Ok(bytes.len() as u64)
        }
    }
}

/// Downloads, verifies, extracts and bulk-loads snapshots.
#[derive(Clone)]
pub struct SnapshotLoader {
    fetcher: Arc<dyn SnapshotFetcher>,
    scratch_dir: PathBuf,
    max_docs: usize,
}

impl SnapshotLoader {
    pub fn new(fetcher: Arc<dyn SnapshotFetcher>, scratch_dir: impl Into<PathBuf>, max_docs: usize) -> Self {
        Self {
            fetcher,
            scratch_dir: scratch_dir.into(),
            max_docs: max_docs.max(1),
        }
    }

    /// Replace the consumer's indices with the snapshot's content.
    ///
    /// Returns the number of documents written. Nothing is cleared unless
    /// the archive downloaded, verified and parsed.
    pub async fn load(
        &self,
        store: &dyn DocumentStore,
        profile: &ConsumerProfile,
        remote: &RemoteConsumer,
    ) -> Result<usize> {
        let link = remote
            .snapshot_link()
            .ok_or_else(|| SyncError::SnapshotDownloadFailed("no snapshot link".into()))?;

        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| SyncError::SnapshotDownloadFailed(format!("scratch dir: {}", e)))?;
        let scratch = tempfile::Builder::new()
            .prefix("cti-snapshot-")
            .tempdir_in(&self.scratch_dir)
            .map_err(|e| SyncError::SnapshotDownloadFailed(format!("scratch dir: {}", e)))?;

        let result = self.load_in(store, profile, remote, link, scratch.path()).await;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "failed to remove snapshot scratch directory");
        }
        result
    }

    async fn load_in(
        &self,
        store: &dyn DocumentStore,
        profile: &ConsumerProfile,
        remote: &RemoteConsumer,
        link: &str,
        dir: &Path,
    ) -> Result<usize> {
        let archive = dir.join("snapshot.zip");
        info!(consumer = profile.name(), link, "downloading snapshot");
        let size = self.fetcher.fetch(link, &archive).await?;
        if size == 0 {
            return Err(SyncError::SnapshotDownloadFailed(format!("{}: empty body", link)));
        }

        if let Some(expected) = remote.snapshot_hash.as_deref().filter(|h| !h.is_empty()) {
            let bytes = tokio::fs::read(&archive)
                .await
                .map_err(|e| SyncError::SnapshotDownloadFailed(e.to_string()))?;
            let actual = Sha256Hash::hash(&bytes).to_hex();
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(SyncError::SnapshotDownloadFailed(format!(
                    "hash mismatch: expected {}, got {}",
                    expected, actual
                )));
            }
        }

        let payloads = tokio::task::spawn_blocking(move || read_archive(&archive))
            .await
            .map_err(|e| SyncError::SnapshotParseFailed(format!("extract task: {}", e)))??;

        let batches = self.route(profile, &payloads)?;

        for index in profile.index_names() {
            store.clear(&index).await?;
        }

        let mut loaded = 0;
        for (index, docs) in &batches {
            for batch in docs.chunks(self.max_docs) {
                store.bulk_put(index, batch).await?;
                loaded += batch.len();
                debug!(index = %index, count = batch.len(), "bulk loaded");
            }
        }
        info!(consumer = profile.name(), loaded, "snapshot loaded");
        Ok(loaded)
    }

    /// Normalise payloads and group them by target index.
    fn route(
        &self,
        profile: &ConsumerProfile,
        payloads: &[Value],
    ) -> Result<HashMap<String, Vec<(String, Value)>>> {
        let mut batches: HashMap<String, Vec<(String, Value)>> = HashMap::new();
        let mut skipped = 0usize;

        for payload in payloads {
            let content_type = payload
                .get("type")
                .and_then(Value::as_str)
                .and_then(ContentType::from_payload_type);
            let target = content_type
                .filter(|ct| *ct != ContentType::Policy)
                .and_then(|ct| profile.index_for(ct).map(|index| (ct, index)));
            let (Some((content_type, index)), Some(id)) = (target, document_id(payload)) else {
                skipped += 1;
                continue;
            };

            let source = normalize_payload(payload, content_type)
                .map_err(|e| SyncError::SnapshotParseFailed(format!("{}: {}", id, e)))?;
            batches.entry(index).or_default().push((id.to_owned(), source));
        }

        if skipped > 0 {
            warn!(consumer = profile.name(), skipped, "skipped snapshot records of unhandled type");
        }
        Ok(batches)
    }
}

/// Extract every `payload` from the `*.json` entries of a zip archive.
fn read_archive(path: &Path) -> Result<Vec<Value>> {
    let file = std::fs::File::open(path).map_err(parse_failed)?;
    let mut archive = zip::ZipArchive::new(file).map_err(parse_failed)?;

    let mut payloads = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(parse_failed)?;
        if entry.is_dir() || !entry.name().ends_with(".json") {
            continue;
        }
        let name = entry.name().to_owned();

        for (n, line) in BufReader::new(entry).lines().enumerate() {
            let at = || format!("{}:{}", name, n + 1);
            let line = line.map_err(|e| parse_failed(format!("{}: {}", at(), e)))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut record: Value = serde_json::from_str(line)
                .map_err(|e| parse_failed(format!("{}: {}", at(), e)))?;
            match record.get_mut("payload").map(Value::take) {
                Some(payload @ Value::Object(_)) => payloads.push(payload),
                _ => return Err(parse_failed(format!("{}: missing payload", at()))),
            }
        }
    }
    Ok(payloads)
}

fn parse_failed(e: impl std::fmt::Display) -> SyncError {
    SyncError::SnapshotParseFailed(e.to_string())
}
