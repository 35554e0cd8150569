//! Record addressing: namespaces, buckets, and keys.
//!
//! A reference record is addressed by `(namespace, bucket, key)`. Namespaces
//! partition tenants; buckets and keys are caller-chosen names. Names must be
//! non-empty and must not contain `/` (used as a path separator by storage
//! backends) or whitespace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Characters that are forbidden anywhere in a namespace, bucket, or key name.
const FORBIDDEN_CHARS: &[char] = &['/', ' ', '\t', '\n', '\r'];

fn validate_name(kind: &'static str, name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(TypeError::InvalidName {
            kind,
            reason: "must not be empty".into(),
        });
    }
    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(TypeError::InvalidName {
                kind,
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
    }
    Ok(())
}

macro_rules! name_id {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Create a validated identifier.
            pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
                let name = name.into();
                validate_name($kind, &name)?;
                Ok(Self(name))
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

name_id!(
    /// Tenant/partition identifier. All store and GC operations are scoped to
    /// one namespace; blobs may be physically shared across namespaces.
    NamespaceId,
    "namespace"
);

name_id!(
    /// Groups reference records within a namespace.
    BucketId,
    "bucket"
);

name_id!(
    /// Identifies a reference record within a bucket.
    KeyId,
    "key"
);

/// The `(bucket, key)` pair addressing a reference record within a namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub bucket: BucketId,
    pub key: KeyId,
}

impl RecordKey {
    pub fn new(bucket: BucketId, key: KeyId) -> Self {
        Self { bucket, key }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}
