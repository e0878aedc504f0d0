//! Security-analytics sink.
//!
//! Rules, integrations and threat detectors derived from the rules stream
//! are pushed to a detection engine through [`SecurityAnalytics`]. Every
//! request is an upsert keyed by id, so replaying post-sync is harmless.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ContentError, Result};

/// Source label attached to every integration pushed to the sink.
pub const INTEGRATION_SOURCE: &str = "Sigma";

/// An integration (log source family) and the rules that belong to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Display category, e.g. `"Cloud Services"`.
    pub category: String,
    pub source: String,
    pub rules: Vec<String>,
}

/// A detection rule for one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleRecord {
    pub id: String,
    pub product: String,
    /// The rule document as stored.
    pub body: Value,
}

/// A threat detector grouping an integration's rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorRecord {
    pub id: String,
    pub name: String,
    /// Raw category, e.g. `"cloud-services-aws"`.
    pub category: String,
    pub rules: Vec<String>,
}

/// Target for derived detection content.
#[async_trait]
pub trait SecurityAnalytics: Send + Sync {
    async fn index_integration(&self, integration: &IntegrationRecord) -> Result<()>;

    async fn index_rule(&self, rule: &RuleRecord) -> Result<()>;

    async fn index_detector(&self, detector: &DetectorRecord) -> Result<()>;
}

/// In-memory sink. Records the latest version of every item.
#[derive(Default)]
pub struct MemorySecurityAnalytics {
    inner: RwLock<Recorded>,
}

#[derive(Default)]
struct Recorded {
    integrations: BTreeMap<String, IntegrationRecord>,
    rules: BTreeMap<String, RuleRecord>,
    detectors: BTreeMap<String, DetectorRecord>,
    rejected: BTreeSet<String>,
}

impl MemorySecurityAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request for `id` fail.
    pub fn reject(&self, id: impl Into<String>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.rejected.insert(id.into());
        }
    }

    pub fn integrations(&self) -> Vec<IntegrationRecord> {
        self.read(|r| r.integrations.values().cloned().collect())
    }

    pub fn rules(&self) -> Vec<RuleRecord> {
        self.read(|r| r.rules.values().cloned().collect())
    }

    pub fn detectors(&self) -> Vec<DetectorRecord> {
        self.read(|r| r.detectors.values().cloned().collect())
    }

    fn read<T: Default>(&self, f: impl FnOnce(&Recorded) -> T) -> T {
        self.inner.read().map(|r| f(&*r)).unwrap_or_default()
    }

    fn record(&self, id: &str, f: impl FnOnce(&mut Recorded)) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ContentError::Analytics("sink lock poisoned".into()))?;
        if inner.rejected.contains(id) {
            return Err(ContentError::Analytics(format!("rejected {}", id)));
        }
        f(&mut *inner);
        Ok(())
    }
}

#[async_trait]
impl SecurityAnalytics for MemorySecurityAnalytics {
    async fn index_integration(&self, integration: &IntegrationRecord) -> Result<()> {
        self.record(&integration.id, |r| {
            r.integrations
                .insert(integration.id.clone(), integration.clone());
        })
    }

    async fn index_rule(&self, rule: &RuleRecord) -> Result<()> {
        self.record(&rule.id, |r| {
            r.rules.insert(rule.id.clone(), rule.clone());
        })
    }

    async fn index_detector(&self, detector: &DetectorRecord) -> Result<()> {
        self.record(&detector.id, |r| {
            r.detectors.insert(detector.id.clone(), detector.clone());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(id: &str, product: &str) -> RuleRecord {
        RuleRecord {
            id: id.into(),
            product: product.into(),
            body: json!({"id": id}),
        }
    }

    #[tokio::test]
    async fn test_requests_are_upserts() {
        let sink = MemorySecurityAnalytics::new();
        sink.index_rule(&rule("r1", "linux")).await.unwrap();
        sink.index_rule(&rule("r1", "windows")).await.unwrap();

        let rules = sink.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].product, "windows");
    }

    #[tokio::test]
    async fn test_rejected_id_fails() {
        let sink = MemorySecurityAnalytics::new();
        sink.reject("r2");
        assert!(sink.index_rule(&rule("r2", "linux")).await.is_err());
        assert!(sink.index_rule(&rule("r3", "linux")).await.is_ok());
        assert_eq!(sink.rules().len(), 1);
    }
}
