//! Payload normalisation.
//!
//! Every document is rewritten into the same indexed shape before it is
//! stored, whether it arrived in a snapshot, a CREATE offset or as the
//! result of an UPDATE patch:
//!
//! ```text
//! {
//!   "document": { ...sanitised resource... },
//!   "decoder":  "...yaml...",            // decoders only
//!   "hash":     { "sha256": "<hex>" },   // of the sanitised document
//!   "space":    { "name": "standard" }
//! }
//! ```

use serde_json::{json, Map, Value};

use crate::error::CoreError;
use crate::hash::Sha256Hash;
use crate::types::{ContentType, Space};

/// Keys rendered first, in this order, in a decoder's YAML form.
pub const DECODER_KEY_ORDER: [&str; 8] = [
    "name",
    "metadata",
    "parents",
    "definitions",
    "check",
    "parse|event.original",
    "parse|message",
    "normalize",
];

/// Remove non-indexable metadata and normalise `related` references.
pub fn sanitize_document(document: &mut Value) {
    if let Some(metadata) = document.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.remove("custom_fields");
        metadata.remove("dataset");
    }

    match document.get_mut("related") {
        Some(Value::Object(related)) => rename_sigma_id(related),
        Some(Value::Array(items)) => {
            for item in items.iter_mut().filter_map(Value::as_object_mut) {
                rename_sigma_id(item);
            }
        }
        _ => {}
    }
}

fn rename_sigma_id(related: &mut Map<String, Value>) {
    if let Some(id) = related.remove("sigma_id") {
        related.insert("id".to_owned(), id);
    }
}

/// Id of the resource carried in a payload (`document.id`).
pub fn document_id(payload: &Value) -> Option<&str> {
    payload.pointer("/document/id").and_then(Value::as_str)
}

/// Space named by a payload, defaulting to [`Space::Standard`].
pub fn payload_space(payload: &Value) -> Space {
    payload
        .pointer("/space/name")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

/// Rewrite a payload into its indexed form.
pub fn normalize_payload(payload: &Value, content_type: ContentType) -> Result<Value, CoreError> {
    let mut document = payload
        .get("document")
        .filter(|d| d.is_object())
        .cloned()
        .ok_or_else(|| CoreError::MalformedPayload("missing document object".into()))?;

    sanitize_document(&mut document);
    let hash = Sha256Hash::of_json(&document);
    let space = payload_space(payload);

    let mut source = json!({
        "document": document,
        "hash": { "sha256": hash.to_hex() },
        "space": { "name": space.as_str() },
    });

    if content_type == ContentType::Decoder {
        let yaml = decoder_yaml(&source["document"])?;
        source["decoder"] = Value::String(yaml);
    }

    Ok(source)
}

/// Render a decoder document as YAML with the conventional key order.
pub fn decoder_yaml(document: &Value) -> Result<String, CoreError> {
    let fields = document
        .as_object()
        .ok_or_else(|| CoreError::MalformedPayload("decoder document is not an object".into()))?;

    let mut mapping = serde_yaml::Mapping::new();
    let ordered = DECODER_KEY_ORDER
        .iter()
        .filter_map(|k| fields.get_key_value(*k));
    let rest = fields
        .iter()
        .filter(|(k, _)| !DECODER_KEY_ORDER.contains(&k.as_str()));

    for (key, value) in ordered.chain(rest) {
        let value = serde_yaml::to_value(value)
            .map_err(|e| CoreError::MalformedPayload(e.to_string()))?;
        mapping.insert(serde_yaml::Value::String(key.clone()), value);
    }

    serde_yaml::to_string(&serde_yaml::Value::Mapping(mapping))
        .map_err(|e| CoreError::MalformedPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_metadata_and_renames_related() {
        let mut doc = json!({
            "id": "r1",
            "metadata": {"author": "w", "custom_fields": {"x": 1}, "dataset": "d"},
            "related": [{"sigma_id": "s1", "type": "similar"}, "not-an-object"]
        });
        sanitize_document(&mut doc);
        assert_eq!(doc["metadata"], json!({"author": "w"}));
        assert_eq!(doc["related"][0], json!({"id": "s1", "type": "similar"}));
        assert_eq!(doc["related"][1], "not-an-object");
    }

    #[test]
    fn test_sanitize_related_object() {
        let mut doc = json!({"related": {"sigma_id": "s9"}});
        sanitize_document(&mut doc);
        assert_eq!(doc["related"], json!({"id": "s9"}));
    }

    #[test]
    fn test_normalize_rebuilds_source() {
        let payload = json!({
            "type": "rule",
            "extra": "dropped",
            "document": {"id": "r1", "metadata": {"dataset": "x"}}
        });
        let source = normalize_payload(&payload, ContentType::Rule).unwrap();
        let expected_hash = Sha256Hash::of_json(&json!({"id": "r1", "metadata": {}}));

        assert_eq!(source["document"], json!({"id": "r1", "metadata": {}}));
        assert_eq!(source["hash"]["sha256"], expected_hash.to_hex());
        assert_eq!(source["space"]["name"], "standard");
        assert!(source.get("extra").is_none());
        assert!(source.get("decoder").is_none());
    }

    #[test]
    fn test_normalize_is_stable_on_its_own_output() {
        let payload = json!({"document": {"id": "d1", "name": "decoder/x/0"}, "space": {"name": "custom"}});
        let once = normalize_payload(&payload, ContentType::Decoder).unwrap();
        let twice = normalize_payload(&once, ContentType::Decoder).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice["space"]["name"], "custom");
    }

    #[test]
    fn test_normalize_requires_document() {
        assert!(normalize_payload(&json!({"type": "rule"}), ContentType::Rule).is_err());
    }

    #[test]
    fn test_decoder_yaml_key_order() {
        let doc = json!({
            "zeta": 1,
            "normalize": [{"map": []}],
            "name": "decoder/test/0",
            "check": "x",
        });
        let yaml = decoder_yaml(&doc).unwrap();
        let name = yaml.find("name:").unwrap();
        let check = yaml.find("check:").unwrap();
        let normalize = yaml.find("normalize:").unwrap();
        let zeta = yaml.find("zeta:").unwrap();
        assert!(name < check && check < normalize && normalize < zeta);
    }

    #[test]
    fn test_document_id_and_space() {
        let payload = json!({"document": {"id": "abc"}, "space": {"name": "draft"}});
        assert_eq!(document_id(&payload), Some("abc"));
        assert_eq!(payload_space(&payload), Space::Draft);
        assert_eq!(payload_space(&json!({})), Space::Standard);
    }
}
