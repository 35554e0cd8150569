use depot_payload::PayloadError;
use depot_resolve::ResolveError;
use depot_store::StoreError;
use depot_types::{BlobId, RecordKey};
use thiserror::Error;

/// Errors produced by the object service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObjectError {
    /// Resolution failed in one of the two typed, client-recoverable ways,
    /// or the walk itself broke. Callers branch on the inner variant.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("record {key} not found")]
    RecordNotFound { key: RecordKey },

    #[error("payload hash mismatch for {key}: expected {expected}, got {actual}")]
    PayloadMismatch {
        key: RecordKey,
        expected: BlobId,
        actual: BlobId,
    },

    /// The record exists but its own payload blob is gone from blob
    /// storage. Distinct from `RecordNotFound`: the record is structurally
    /// live even though a read cannot be served.
    #[error("payload blob {blob} for record {key} is missing from blob storage")]
    MissingPayloadBlob { key: RecordKey, blob: BlobId },
}

pub type ObjectResult<T> = Result<T, ObjectError>;
