//! Remote catalog client.
//!
//! The catalog exposes consumer metadata and an offset-indexed change log:
//!
//! ```text
//! GET {base}/catalog/contexts/{context}/consumers/{consumer}
//! GET {base}/catalog/contexts/{context}/consumers/{consumer}/changes
//!     ?from_offset={from}&to_offset={to}&with_empties=true
//! ```
//!
//! Clients never retry. A failed request surfaces as an error and the
//! synchronizer gives up on the cycle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;

use cti_catalog_core::{Changes, ConsumerKey, Offset, RemoteConsumer};

use crate::error::{Result, SyncError};

/// Read access to the remote catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch consumer metadata (latest offset, snapshot link).
    async fn consumer_info(&self, key: &ConsumerKey) -> Result<RemoteConsumer>;

    /// Fetch the offsets in `(from, to]`.
    async fn changes(&self, key: &ConsumerKey, from: u64, to: u64) -> Result<Vec<Offset>>;
}

/// HTTP implementation over a shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_uri: String,
    timeout: Duration,
}

impl HttpCatalogClient {
    pub fn new(client: reqwest::Client, base_uri: impl Into<String>, timeout: Duration) -> Self {
        let base_uri = base_uri.into().trim_end_matches('/').to_owned();
        Self {
            client,
            base_uri,
            timeout,
        }
    }

    /// `{base}/catalog/contexts/{context}/consumers/{consumer}/{tail..}`, with
    /// every identifier encoded as a single path segment.
    fn consumer_url(&self, key: &ConsumerKey, tail: &[&str]) -> Result<Url> {
        let invalid = || SyncError::RemoteUnavailable(format!("invalid base URI {}", self.base_uri));
        let mut url = Url::parse(&self.base_uri).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["catalog", "contexts", key.context.as_str()])
            .extend(["consumers", key.consumer.as_str()])
            .extend(tail);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .client
            .get(url.clone())
            .query(query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::RemoteUnavailable(format!(
                "GET {} returned {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(format!("GET {}: {}", url, e)))?;

        serde_json::from_slice(&body)
            .map_err(|e| SyncError::RemoteMalformed(format!("GET {}: {}", url, e)))
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn consumer_info(&self, key: &ConsumerKey) -> Result<RemoteConsumer> {
        let url = self.consumer_url(key, &[])?;
        self.get_json(url, &[]).await
    }

    async fn changes(&self, key: &ConsumerKey, from: u64, to: u64) -> Result<Vec<Offset>> {
        let url = self.consumer_url(key, &["changes"])?;
        let query = [
            ("from_offset", from.to_string()),
            ("to_offset", to.to_string()),
            ("with_empties", "true".to_owned()),
        ];
        let changes: Changes = self.get_json(url, &query).await?;
        Ok(changes.data)
    }
}

/// A scripted catalog for tests.
pub mod memory {
    use super::*;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Script {
        consumers: HashMap<String, RemoteConsumer>,
        logs: HashMap<String, BTreeMap<u64, Offset>>,
        failing_info: HashSet<String>,
        /// Fail `changes` for ranges starting at these offsets.
        failing_chunks: HashMap<String, HashSet<u64>>,
        requests: Vec<(String, u64, u64)>,
    }

    /// In-memory catalog with a scripted change log and injectable failures.
    #[derive(Default)]
    pub struct ScriptedCatalog {
        script: Mutex<Script>,
    }

    impl ScriptedCatalog {
        pub fn new() -> Self {
            Self::default()
        }

        /// Set the metadata reported for a consumer.
        pub async fn set_consumer(&self, key: &ConsumerKey, remote: RemoteConsumer) {
            self.script
                .lock()
                .await
                .consumers
                .insert(key.composite(), remote);
        }

        /// Append offsets to a consumer's log and raise its reported offset.
        pub async fn push_offsets(&self, key: &ConsumerKey, offsets: Vec<Offset>) {
            let mut script = self.script.lock().await;
            let composite = key.composite();
            let log = script.logs.entry(composite.clone()).or_default();
            for offset in offsets {
                log.insert(offset.offset, offset);
            }
            let last = log.keys().next_back().copied().unwrap_or(0);
            let remote = script.consumers.entry(composite).or_default();
            remote.offset = remote.offset.max(last);
        }

        /// Make `consumer_info` fail for this consumer.
        pub async fn fail_consumer_info(&self, key: &ConsumerKey) {
            self.script.lock().await.failing_info.insert(key.composite());
        }

        /// Make `changes` fail for the chunk starting at `from`.
        pub async fn fail_changes_from(&self, key: &ConsumerKey, from: u64) {
            self.script
                .lock()
                .await
                .failing_chunks
                .entry(key.composite())
                .or_default()
                .insert(from);
        }

        /// Ranges requested through `changes`, in order.
        pub async fn change_requests(&self, key: &ConsumerKey) -> Vec<(u64, u64)> {
            let composite = key.composite();
            self.script
                .lock()
                .await
                .requests
                .iter()
                .filter(|(k, _, _)| *k == composite)
                .map(|(_, from, to)| (*from, *to))
                .collect()
        }
    }

    #[async_trait]
    impl CatalogClient for ScriptedCatalog {
        async fn consumer_info(&self, key: &ConsumerKey) -> Result<RemoteConsumer> {
            let script = self.script.lock().await;
            let composite = key.composite();
            if script.failing_info.contains(&composite) {
                return Err(SyncError::RemoteUnavailable(format!(
                    "scripted failure for {}",
                    composite
                )));
            }
            Ok(script.consumers.get(&composite).cloned().unwrap_or_default())
        }

        async fn changes(&self, key: &ConsumerKey, from: u64, to: u64) -> Result<Vec<Offset>> {
            let mut script = self.script.lock().await;
            let composite = key.composite();
            script.requests.push((composite.clone(), from, to));

            let failing = script
                .failing_chunks
                .get(&composite)
                .is_some_and(|starts| starts.contains(&from));
            if failing {
                return Err(SyncError::RemoteUnavailable(format!(
                    "scripted failure for {} ({}, {}]",
                    composite, from, to
                )));
            }

            Ok(script
                .logs
                .get(&composite)
                .map(|log| {
                    log.range(from.saturating_add(1)..=to)
                        .map(|(_, o)| o.clone())
                        .collect()
                })
                .unwrap_or_default())
        }
    }
}
