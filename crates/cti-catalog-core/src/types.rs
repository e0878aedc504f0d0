//! Identifier types for consumers, content types and spaces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one content stream: a consumer inside a context.
///
/// The composite key `context + "_" + consumer` is what every persisted
/// record for the consumer is keyed by, so two consumers never share a row.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConsumerKey {
    pub context: String,
    pub consumer: String,
}

impl ConsumerKey {
    pub fn new(context: impl Into<String>, consumer: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            consumer: consumer.into(),
        }
    }

    /// The composite storage key.
    pub fn composite(&self) -> String {
        format!("{}_{}", self.context, self.consumer)
    }

    /// Name of the index holding `content_type` documents for this consumer.
    pub fn index_name(&self, content_type: ContentType) -> String {
        format!(".{}-{}-{}", self.context, self.consumer, content_type.as_str())
    }
}

impl fmt::Debug for ConsumerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsumerKey({}/{})", self.context, self.consumer)
    }
}

impl fmt::Display for ConsumerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.context, self.consumer)
    }
}

/// Kind of catalog resource. Each kind lives in its own index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Rule,
    Decoder,
    Kvdb,
    Integration,
    Policy,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::Rule,
        ContentType::Decoder,
        ContentType::Kvdb,
        ContentType::Integration,
        ContentType::Policy,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ContentType::Rule => "rule",
            ContentType::Decoder => "decoder",
            ContentType::Kvdb => "kvdb",
            ContentType::Integration => "integration",
            ContentType::Policy => "policy",
        }
    }

    /// Resolve a payload `type` field. Matching is case-insensitive.
    pub fn from_payload_type(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named policy scope.
///
/// Catalog content lands in [`Space::Standard`]. The user spaces each hold
/// exactly one policy document once post-sync has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    #[default]
    Standard,
    Custom,
    Draft,
    Test,
}

impl Space {
    /// Spaces that receive a default policy document.
    pub const USER_SPACES: [Space; 3] = [Space::Draft, Space::Test, Space::Custom];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Space::Standard => "standard",
            Space::Custom => "custom",
            Space::Draft => "draft",
            Space::Test => "test",
        }
    }

    /// Policies in these spaces are edited locally and never re-hashed.
    pub const fn is_editable(&self) -> bool {
        matches!(self, Space::Draft | Space::Test)
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Space {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Space::Standard),
            "custom" => Ok(Space::Custom),
            "draft" => Ok(Space::Draft),
            "test" | "testing" => Ok(Space::Test),
            other => Err(format!("unknown space: {}", other)),
        }
    }
}
