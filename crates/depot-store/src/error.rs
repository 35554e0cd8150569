use depot_types::BlobId;
use thiserror::Error;

/// Errors produced by storage collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("blob hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: BlobId, actual: BlobId },

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
