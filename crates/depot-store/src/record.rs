use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_types::{BlobId, RecordKey};

/// A reference record: a `(bucket, key)` entry pointing at its payload blob.
///
/// Created by `Put` in the uploading state, flipped to finalized once the
/// payload's entire reference closure is present, and removed by explicit
/// deletion or by expiry cleanup. Records never own the blobs they reference;
/// blob lifetime is the garbage collector's concern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Addressing within the namespace.
    pub key: RecordKey,
    /// Content hash of the record's own encoded payload.
    pub payload_blob: BlobId,
    /// Payload bytes stored inline in the record document, when small enough
    /// for the backend. `Get` serves from here before falling back to a blob
    /// fetch.
    #[serde(with = "inline_bytes")]
    pub inline_payload: Option<Bytes>,
    /// Set once the full reference closure has been verified present.
    pub finalized: bool,
    /// Refreshed on every read; drives expiry cleanup.
    pub last_access: DateTime<Utc>,
}

impl ObjectRecord {
    /// Create a fresh, non-finalized record as `Put` writes it.
    pub fn uploading(
        key: RecordKey,
        payload_blob: BlobId,
        inline_payload: Option<Bytes>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            payload_blob,
            inline_payload,
            finalized: false,
            last_access: now,
        }
    }
}

/// serde adapter: `Bytes` as an optional byte vector.
mod inline_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Bytes>, s: S) -> Result<S::Ok, S::Error> {
        v.as_ref().map(|b| b.as_ref()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Bytes>, D::Error> {
        let v: Option<Vec<u8>> = Option::deserialize(d)?;
        Ok(v.map(Bytes::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_types::{BucketId, KeyId};

    fn record_key() -> RecordKey {
        RecordKey::new(BucketId::new("b").unwrap(), KeyId::new("k").unwrap())
    }

    #[test]
    fn uploading_starts_unfinalized() {
        let rec = ObjectRecord::uploading(
            record_key(),
            BlobId::from_bytes(b"payload"),
            Some(Bytes::from_static(b"payload")),
            Utc::now(),
        );
        assert!(!rec.finalized);
        assert!(rec.inline_payload.is_some());
    }

    #[test]
    fn serde_roundtrip_with_inline_payload() {
        let rec = ObjectRecord::uploading(
            record_key(),
            BlobId::from_bytes(b"x"),
            Some(Bytes::from_static(b"x")),
            Utc::now(),
        );
        let json = serde_json::to_string(&rec).unwrap();
        let parsed: ObjectRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, parsed);
    }

    #[test]
    fn serde_roundtrip_without_inline_payload() {
        let rec = ObjectRecord::uploading(record_key(), BlobId::from_bytes(b"y"), None, Utc::now());
        let json = serde_json::to_string(&rec).unwrap();
        let parsed: ObjectRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, parsed);
    }
}
