//! Change records fetched from the catalog.
//!
//! The catalog returns one [`Offset`] per position in a consumer's history.
//! A [`ChangeSet`] is a validated run of them covering `(from, to]`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::patch::PatchOperation;
use crate::validation::validate_offsets;

/// What an offset does to its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

impl OperationType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "CREATE",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(OperationType::Create),
            "UPDATE" => Ok(OperationType::Update),
            "DELETE" => Ok(OperationType::Delete),
            _ => Err(CoreError::UnknownOperation(s.to_owned())),
        }
    }
}

impl Serialize for OperationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OperationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One position in a consumer's change history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    #[serde(default)]
    pub context: String,
    pub offset: u64,
    /// Id of the resource this offset touches.
    #[serde(default)]
    pub resource: String,
    #[serde(rename = "type")]
    pub kind: OperationType,
    #[serde(default)]
    pub version: u64,
    /// Patch list, used by [`OperationType::Update`].
    #[serde(default)]
    pub operations: Vec<PatchOperation>,
    /// Full resource body, used by [`OperationType::Create`].
    #[serde(default)]
    pub payload: Option<Value>,
}

impl Offset {
    pub fn create(offset: u64, resource: impl Into<String>, payload: Value) -> Self {
        Self {
            context: String::new(),
            offset,
            resource: resource.into(),
            kind: OperationType::Create,
            version: 1,
            operations: Vec::new(),
            payload: Some(payload),
        }
    }

    pub fn update(
        offset: u64,
        resource: impl Into<String>,
        operations: Vec<PatchOperation>,
    ) -> Self {
        Self {
            context: String::new(),
            offset,
            resource: resource.into(),
            kind: OperationType::Update,
            version: 1,
            operations,
            payload: None,
        }
    }

    pub fn delete(offset: u64, resource: impl Into<String>) -> Self {
        Self {
            context: String::new(),
            offset,
            resource: resource.into(),
            kind: OperationType::Delete,
            version: 1,
            operations: Vec::new(),
            payload: None,
        }
    }

    /// The `type` field of the payload, if any.
    pub fn payload_type(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
    }

    /// An offset that carries no work (emitted for removed history).
    pub fn is_empty(&self) -> bool {
        self.resource.is_empty() && self.payload.is_none() && self.operations.is_empty()
    }
}

/// Wire shape of a changes response: `{"data": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Changes {
    #[serde(default)]
    pub data: Vec<Offset>,
}

/// A contiguous run of offsets covering `(from, to]`.
///
/// Only constructible through [`ChangeSet::new`], which enforces ordering
/// and contiguity.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    from: u64,
    to: u64,
    offsets: Vec<Offset>,
}

impl ChangeSet {
    pub fn new(from: u64, to: u64, offsets: Vec<Offset>) -> Result<Self, CoreError> {
        validate_offsets(from, to, &offsets)?;
        Ok(Self { from, to, offsets })
    }

    pub fn from_offset(&self) -> u64 {
        self.from
    }

    pub fn to_offset(&self) -> u64 {
        self.to
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Split `(from, to]` into request ranges of at most `size` offsets.
///
/// Range ends fall on multiples of `size` minus one, capped at `to`.
pub fn chunk_ranges(from: u64, to: u64, size: u64) -> Vec<(u64, u64)> {
    let size = size.max(1);
    let mut ranges = Vec::new();
    let mut start = from;
    while start < to {
        let boundary = ((start + 1) / size)
            .saturating_add(1)
            .saturating_mul(size)
            .saturating_sub(1);
        let end = boundary.min(to);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_changes_response() {
        let body = json!({
            "data": [
                {"context": "ctx", "offset": 1, "resource": "r1", "type": "create", "version": 1,
                 "payload": {"type": "rule", "document": {"id": "r1"}}},
                {"context": "ctx", "offset": 2, "resource": "r1", "type": "UPDATE", "version": 2,
                 "operations": [{"op": "replace", "path": "/document/title", "value": "t"}]},
                {"context": "ctx", "offset": 3, "resource": "r1", "type": "Delete", "version": 3}
            ]
        });
        let changes: Changes = serde_json::from_value(body).unwrap();
        let kinds: Vec<_> = changes.data.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![OperationType::Create, OperationType::Update, OperationType::Delete]
        );
        assert_eq!(changes.data[0].payload_type(), Some("rule"));
        assert_eq!(changes.data[1].operations.len(), 1);
    }

    #[test]
    fn test_unknown_operation_type_is_rejected() {
        let err = serde_json::from_value::<Offset>(json!({"offset": 1, "type": "MERGE"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_chunk_ranges_from_zero() {
        assert_eq!(
            chunk_ranges(0, 3999, 1000),
            vec![(0, 999), (999, 1999), (1999, 2999), (2999, 3999)]
        );
    }

    #[test]
    fn test_chunk_ranges_resume_mid_block() {
        assert_eq!(chunk_ranges(1500, 2100, 1000), vec![(1500, 1999), (1999, 2100)]);
        assert!(chunk_ranges(7, 7, 1000).is_empty());
    }

    #[test]
    fn test_change_set_rejects_gap() {
        let offsets = vec![Offset::delete(1, "a"), Offset::delete(3, "b")];
        assert!(ChangeSet::new(0, 3, offsets).is_err());
    }

    #[test]
    fn test_change_set_accepts_contiguous_run() {
        let offsets = vec![Offset::delete(11, "a"), Offset::delete(12, "b")];
        let set = ChangeSet::new(10, 12, offsets).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.from_offset(), 10);
        assert_eq!(set.to_offset(), 12);
    }
}
