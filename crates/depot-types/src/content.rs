use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Indirection identifier from the content-defined chunking layer.
///
/// A `ContentId` names a logical piece of content that the dedup layer has
/// split into one or more blobs. Resolution to the underlying [`BlobId`]s is
/// a lookup against the chunking layer's mapping, not a computation, and the
/// mapping may be absent.
///
/// [`BlobId`]: crate::BlobId
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId([u8; 32]);

impl ContentId {
    /// Compute a `ContentId` from the logical content bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"depot-content-v1:");
        hasher.update(data);
        Self(*hasher.finalize().as_bytes())
    }

    /// Create a `ContentId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.short_hex())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_is_deterministic() {
        assert_eq!(
            ContentId::from_bytes(b"chunked content"),
            ContentId::from_bytes(b"chunked content")
        );
    }

    #[test]
    fn domain_separated_from_blob_hash() {
        // A ContentId never collides with the plain BLAKE3 blob hash of the
        // same bytes.
        let content = ContentId::from_bytes(b"same data");
        let blob = crate::BlobId::from_bytes(b"same data");
        assert_ne!(content.as_bytes(), blob.as_bytes());
    }

    #[test]
    fn hex_roundtrip() {
        let id = ContentId::from_bytes(b"roundtrip");
        assert_eq!(ContentId::from_hex(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(ContentId::from_bytes(b"x").short_hex().len(), 8);
    }
}
