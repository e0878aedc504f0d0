//! SHA-256 content hashing.
//!
//! Content hashes are stored as lowercase hex under `hash.sha256` in every
//! indexed document, and aggregated into policy space hashes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// Hash raw bytes.
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hash the compact JSON encoding of a value.
    pub fn of_json(value: &Value) -> Self {
        Self::hash(value.to_string().as_bytes())
    }

    /// Hash the concatenation of hex digests, in order.
    ///
    /// This is how aggregate hashes (a policy and everything it references)
    /// are formed.
    pub fn of_hashes<'a, I>(hashes: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hasher = Sha256::new();
        for h in hashes {
            hasher.update(h.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Read `hash.sha256` from an indexed source document.
pub fn extract_hash(source: &Value) -> Option<&str> {
    source.pointer("/hash/sha256").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            Sha256Hash::hash(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_of_hashes_matches_concatenation() {
        let joined = Sha256Hash::hash(b"aabb");
        assert_eq!(Sha256Hash::of_hashes(["aa", "bb"]), joined);
    }

    #[test]
    fn test_hex_roundtrip() {
        let h = Sha256Hash::hash(b"payload");
        assert_eq!(Sha256Hash::from_hex(&h.to_hex()).unwrap(), h);
        assert!(Sha256Hash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_extract_hash() {
        let source = json!({"hash": {"sha256": "deadbeef"}});
        assert_eq!(extract_hash(&source), Some("deadbeef"));
        assert_eq!(extract_hash(&json!({})), None);
    }
}
