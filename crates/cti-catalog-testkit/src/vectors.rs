//! Golden test vectors for deterministic verification.
//!
//! Content hashes are compared across nodes and against the catalog, so the
//! compact JSON encoding and the aggregate hash must never drift.

use serde_json::Value;

use cti_catalog_core::{format_category, Sha256Hash};

/// A document and the `hash.sha256` it must produce.
#[derive(Debug, Clone)]
pub struct HashVector {
    pub name: &'static str,
    /// Document JSON, in any key order.
    pub document: &'static str,
    /// Expected digest (lowercase hex).
    pub expected: &'static str,
}

/// An ordered list of hex digests and their aggregate hash.
#[derive(Debug, Clone)]
pub struct AggregateVector {
    pub name: &'static str,
    pub parts: Vec<String>,
    pub expected: &'static str,
}

/// A raw category and its display name.
#[derive(Debug, Clone, Copy)]
pub struct CategoryVector {
    pub raw: &'static str,
    pub expected: &'static str,
}

pub fn hash_vectors() -> Vec<HashVector> {
    vec![
        HashVector {
            name: "rule document",
            document: r#"{"id":"r-001","title":"Suspicious login","level":"high","logsource":{"product":"linux"}}"#,
            expected: "e0a20017ad5fde6bd4076e5c5f0e98763a3de9062257ecf82e0d75a9648909e6",
        },
        HashVector {
            name: "decoder document",
            document: r#"{"id":"d-001","name":"decoder/syslog/0","parents":["decoder/root/0"]}"#,
            expected: "050cbdd8a128349d0f92445dad403867e8fed251cf071f756ba0569dd1dc7f83",
        },
        HashVector {
            name: "empty document",
            document: "{}",
            expected: "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a",
        },
        HashVector {
            // Keys are sorted at every depth; array order is kept.
            name: "nested unsorted document",
            document: r#"{"b":[1,2,{"z":true,"a":null}],"a":"x"}"#,
            expected: "8265c7e912f3e8e48c4d2a6b301209cbcb03ee87fd300ce4eee997b19d3ad710",
        },
    ]
}

pub fn aggregate_vectors() -> Vec<AggregateVector> {
    vec![
        AggregateVector {
            name: "two parts",
            parts: vec!["a".repeat(64), "b".repeat(64)],
            expected: "fa0dafbf43f1f551e536353e9d1a942a8e86e41a0b58dfeaf264ef217f6b862a",
        },
        AggregateVector {
            name: "no parts",
            parts: Vec::new(),
            expected: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        },
        AggregateVector {
            name: "single part",
            parts: vec!["c".repeat(64)],
            expected: "52b6419d27bd7f547cee3b92f8c17a908b8a49601ecbec161e5030de1dfe9e0a",
        },
    ]
}

pub fn category_vectors() -> Vec<CategoryVector> {
    vec![
        CategoryVector { raw: "cloud-services-aws", expected: "Cloud Services" },
        CategoryVector { raw: "security", expected: "Security" },
        CategoryVector { raw: "network-activity", expected: "Network Activity" },
        CategoryVector { raw: "", expected: "" },
    ]
}

/// Hash a vector's document. Panics on invalid vector JSON.
pub fn hash_of(vector: &HashVector) -> String {
    let document: Value = serde_json::from_str(vector.document)
        .unwrap_or_else(|e| panic!("vector {:?} is not JSON: {}", vector.name, e));
    Sha256Hash::of_json(&document).to_hex()
}

pub fn aggregate_of(vector: &AggregateVector) -> String {
    Sha256Hash::of_hashes(vector.parts.iter().map(String::as_str)).to_hex()
}

/// Check every vector, returning the names of those that fail.
pub fn verify_all_vectors() -> Vec<&'static str> {
    let hashes = hash_vectors()
        .into_iter()
        .filter(|v| hash_of(v) != v.expected)
        .map(|v| v.name);
    let aggregates = aggregate_vectors()
        .into_iter()
        .filter(|v| aggregate_of(v) != v.expected)
        .map(|v| v.name);
    let categories = category_vectors()
        .into_iter()
        .filter(|v| format_category(v.raw) != v.expected)
        .map(|v| v.raw);
    hashes.chain(aggregates).chain(categories).collect()
}
