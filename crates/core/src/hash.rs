//! Content hashing for entity tags.

use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 digest of a rendered thumbnail.
///
/// Identical bytes always hash to the same tag, so the tag is stable across
/// re-renders and across storage backends.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute the SHA-256 hash of data.
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Entity tag for a body: lowercase hex SHA-256, unquoted.
pub fn content_etag(data: &[u8]) -> String {
    ContentHash::compute(data).to_hex()
}
