// crates/reelgraph-core/src/core/hashing.rs
// ============================================================================
// Module: Reelgraph Hashing
// Description: Content hashes and canonical JSON serialization.
// Purpose: Give every blob, event, and manifest a deterministic, content-
//          addressed digest.
// Dependencies: sha2, serde_jcs, serde_json
// ============================================================================

//! ## Overview
//! Every piece of persisted state is addressed by the SHA-256 digest of its
//! canonical byte representation. Canonical JSON is RFC 8785 JSON
//! Canonicalization Scheme (JCS) form via `serde_jcs`: object keys sorted
//! recursively, no insignificant whitespace, no trailing newline, so that
//! two semantically equal values always hash identically.

use std::fmt;

use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

/// The only hash algorithm currently supported.
///
/// # Invariants
/// - Reserved for future algorithm agility; today always `Sha256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    /// SHA-256, the default and only supported algorithm.
    #[default]
    Sha256,
}

impl HashAlgorithm {
    /// The algorithm used when none is specified.
    pub const DEFAULT: Self = Self::Sha256;
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

/// A lower-case hex-encoded content digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashDigest(String);

impl HashDigest {
    /// Wraps an already-computed lower-case hex digest.
    #[must_use]
    pub fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    /// Returns the digest as a lower-case hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first two hex characters, used as the blob store's shard prefix.
    ///
    /// # Panics
    ///
    /// Never: every digest produced by [`hash_bytes`] is at least two bytes
    /// of hex.
    #[must_use]
    pub fn shard_prefix(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hashes raw bytes with the default algorithm.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> HashDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    HashDigest::from_hex(hex_encode(&hasher.finalize()))
}

/// Serializes a JSON value to its canonical byte form per RFC 8785 (JCS):
/// object keys sorted recursively, compact separators, UTF-8, no trailing
/// newline.
#[must_use]
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    // JCS serialization of a `serde_json::Value` never fails for values
    // built purely from JSON-native data.
    serde_jcs::to_string(value).unwrap_or_default().into_bytes()
}

/// Hashes the canonical byte form of a JSON value.
#[must_use]
pub fn hash_canonical_json(value: &Value) -> HashDigest {
    hash_bytes(&canonical_json_bytes(value))
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys() {
        let a = canonical_json_bytes(&json!({"b": 1, "a": 2}));
        let b = canonical_json_bytes(&json!({"a": 2, "b": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_json_has_no_trailing_newline() {
        let bytes = canonical_json_bytes(&json!({"a": 1}));
        assert_ne!(bytes.last(), Some(&b'\n'));
    }

    #[test]
    fn hash_bytes_is_deterministic() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn shard_prefix_is_first_two_hex_chars() {
        let digest = hash_bytes(b"hello");
        assert_eq!(digest.shard_prefix().len(), 2);
        assert!(digest.as_str().starts_with(digest.shard_prefix()));
    }
}
