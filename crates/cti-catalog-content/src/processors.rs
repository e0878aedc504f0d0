//! Fan-out of synced rules content to the security-analytics sink.
//!
//! Each processor reads one index and pushes one request per document.
//! A document or request that fails is logged and skipped; only store
//! failures abort the pass.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{info, warn};

use cti_catalog_core::{format_category, payload_space, Space};
use cti_catalog_store::{DocumentStore, Hit, Query};

use crate::analytics::{
    DetectorRecord, IntegrationRecord, RuleRecord, SecurityAnalytics, INTEGRATION_SOURCE,
};
use crate::error::{ContentError, Result};
use crate::SEARCH_SIZE;

/// Product used for rules whose log source names neither product nor category.
pub const DEFAULT_PRODUCT: &str = "linux";

/// Product a rule is registered under.
pub fn rule_product(document: &Value) -> String {
    let logsource = document.get("logsource");
    logsource
        .and_then(|l| l.get("product"))
        .or_else(|| logsource.and_then(|l| l.get("category")))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PRODUCT)
        .to_owned()
}

/// Build the integration record for a stored integration, or `None` if it
/// references no rules.
pub fn integration_record(hit: &Hit) -> Result<Option<IntegrationRecord>> {
    let doc = document(hit)?;
    let rules = string_field(doc, "rules");
    if rules.is_empty() {
        return Ok(None);
    }
    Ok(Some(IntegrationRecord {
        id: required_str(hit, doc, "id")?.to_owned(),
        name: optional_str(doc, "title"),
        description: optional_str(doc, "description"),
        category: format_category(required_str(hit, doc, "category")?),
        source: INTEGRATION_SOURCE.to_owned(),
        rules,
    }))
}

/// Build the detector record for a stored integration.
pub fn detector_record(hit: &Hit) -> Result<DetectorRecord> {
    let doc = document(hit)?;
    Ok(DetectorRecord {
        id: hit.id.clone(),
        name: optional_str(doc, "title"),
        category: required_str(hit, doc, "category")?.to_owned(),
        rules: string_field(doc, "rules"),
    })
}

fn document(hit: &Hit) -> Result<&Value> {
    hit.source
        .get("document")
        .filter(|d| d.is_object())
        .ok_or_else(|| ContentError::Malformed {
            id: hit.id.clone(),
            reason: "missing document".into(),
        })
}

fn required_str<'v>(hit: &Hit, doc: &'v Value, field: &str) -> Result<&'v str> {
    doc.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ContentError::Malformed {
            id: hit.id.clone(),
            reason: format!("missing {}", field),
        })
}

fn optional_str(doc: &Value, field: &str) -> String {
    doc.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn string_field(doc: &Value, field: &str) -> Vec<String> {
    doc.get(field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect()
}

/// Pushes rules-stream content to a [`SecurityAnalytics`] sink.
pub struct SigmaProcessor<'a> {
    store: &'a dyn DocumentStore,
    sink: &'a dyn SecurityAnalytics,
}

impl<'a> SigmaProcessor<'a> {
    pub fn new(store: &'a dyn DocumentStore, sink: &'a dyn SecurityAnalytics) -> Self {
        Self { store, sink }
    }

    async fn hits(&self, index: &str, kind: &str) -> Result<Vec<Hit>> {
        if !self.store.index_exists(index).await? {
            warn!(index, "{} index missing, skipping", kind);
            return Ok(Vec::new());
        }
        Ok(self.store.search(index, &Query::MatchAll, SEARCH_SIZE).await?)
    }

    /// Push integrations that reference rules.
    ///
    /// Returns integration name to rule ids for every integration pushed.
    pub async fn sync_integrations(&self, index: &str) -> Result<BTreeMap<String, Vec<String>>> {
        let mut synced = BTreeMap::new();
        for hit in self.hits(index, "Integration").await? {
            let record = match integration_record(&hit) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(id = %hit.id, error = %e, "Skipping integration");
                    continue;
                }
            };
            match self.sink.index_integration(&record).await {
                Ok(()) => {
                    synced.insert(record.name, record.rules);
                }
                Err(e) => warn!(id = %record.id, error = %e, "Failed to sync integration"),
            }
        }
        info!(index, count = synced.len(), "Integrations synced");
        Ok(synced)
    }

    /// Push every rule. Returns how many were accepted.
    pub async fn sync_rules(&self, index: &str) -> Result<usize> {
        let mut count = 0;
        for hit in self.hits(index, "Rule").await? {
            let record = match document(&hit).and_then(|doc| {
                Ok(RuleRecord {
                    id: required_str(&hit, doc, "id")?.to_owned(),
                    product: rule_product(doc),
                    body: doc.clone(),
                })
            }) {
                Ok(record) => record,
                Err(e) => {
                    warn!(id = %hit.id, error = %e, "Skipping rule");
                    continue;
                }
            };
            match self.sink.index_rule(&record).await {
                Ok(()) => count += 1,
                Err(e) => warn!(id = %record.id, error = %e, "Failed to sync rule"),
            }
        }
        info!(index, count, "Rules synced");
        Ok(count)
    }

    /// Push one detector per standard-space integration.
    pub async fn sync_detectors(&self, index: &str) -> Result<usize> {
        let mut count = 0;
        for hit in self.hits(index, "Integration").await? {
            if payload_space(&hit.source) != Space::Standard {
                continue;
            }
            let record = match detector_record(&hit) {
                Ok(record) => record,
                Err(e) => {
                    warn!(id = %hit.id, error = %e, "Skipping detector");
                    continue;
                }
            };
            match self.sink.index_detector(&record).await {
                Ok(()) => count += 1,
                Err(e) => warn!(id = %record.id, error = %e, "Failed to sync detector"),
            }
        }
        info!(index, count, "Detectors synced");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MemorySecurityAnalytics;
    use cti_catalog_store::MemoryStore;
    use serde_json::json;

    const INTEGRATIONS: &str = ".ctx-rules-integration";
    const RULES: &str = ".ctx-rules-rule";

    fn hit(id: &str, source: Value) -> Hit {
        Hit {
            id: id.into(),
            source,
        }
    }

    #[test]
    fn test_rule_product_fallbacks() {
        assert_eq!(rule_product(&json!({"logsource": {"product": "windows", "category": "x"}})), "windows");
        assert_eq!(rule_product(&json!({"logsource": {"category": "firewall"}})), "firewall");
        assert_eq!(rule_product(&json!({"logsource": {}})), "linux");
        assert_eq!(rule_product(&json!({"title": "no logsource"})), "linux");
    }

    #[test]
    fn test_integration_record_formats_category() {
        let h = hit("i1", json!({"document": {
            "id": "i1", "title": "AWS", "category": "cloud-services-aws", "rules": ["r1"]
        }}));
        let record = integration_record(&h).unwrap().unwrap();
        assert_eq!(record.category, "Cloud Services");
        assert_eq!(record.source, "Sigma");
        assert_eq!(record.name, "AWS");
        assert_eq!(record.description, "");
    }

    #[test]
    fn test_integration_without_rules_is_dropped() {
        let h = hit("i2", json!({"document": {"id": "i2", "category": "security", "rules": []}}));
        assert!(integration_record(&h).unwrap().is_none());
    }

    #[test]
    fn test_detector_keeps_raw_category() {
        let h = hit("i1", json!({"document": {"title": "AWS", "category": "cloud-services-aws"}}));
        let record = detector_record(&h).unwrap();
        assert_eq!(record.category, "cloud-services-aws");
        assert!(record.rules.is_empty());
    }

    #[tokio::test]
    async fn test_sync_pushes_and_skips_failures() {
        let store = MemoryStore::new();
        let sink = MemorySecurityAnalytics::new();
        let integration = |id: &str, space: &str| {
            json!({
                "document": {"id": id, "title": id, "category": "network-activity", "rules": ["r1"]},
                "space": {"name": space}
            })
        };
        store.put(INTEGRATIONS, "a", &integration("a", "standard")).await.unwrap();
        store.put(INTEGRATIONS, "b", &integration("b", "custom")).await.unwrap();
        store.put(INTEGRATIONS, "c", &json!({"document": {"id": "c", "rules": ["r1"]}})).await.unwrap();
        store.put(RULES, "r1", &json!({"document": {"id": "r1"}})).await.unwrap();
        store.put(RULES, "r2", &json!({"document": {"id": "r2"}})).await.unwrap();
        sink.reject("r2");

        let processor = SigmaProcessor::new(&store, &sink);
        let integrations = processor.sync_integrations(INTEGRATIONS).await.unwrap();
        assert_eq!(integrations.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(processor.sync_rules(RULES).await.unwrap(), 1);
        assert_eq!(processor.sync_detectors(INTEGRATIONS).await.unwrap(), 1);

        assert_eq!(sink.rules()[0].product, "linux");
        assert_eq!(sink.detectors()[0].id, "a");
        assert_eq!(sink.integrations()[0].category, "Network Activity");
    }

    #[tokio::test]
    async fn test_missing_index_is_skipped() {
        let store = MemoryStore::new();
        let sink = MemorySecurityAnalytics::new();
        let processor = SigmaProcessor::new(&store, &sink);
        assert!(processor.sync_integrations(INTEGRATIONS).await.unwrap().is_empty());
        assert_eq!(processor.sync_rules(RULES).await.unwrap(), 0);
    }
}
