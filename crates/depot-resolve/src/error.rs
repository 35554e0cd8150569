use depot_payload::PayloadError;
use depot_store::StoreError;
use depot_types::{BlobId, ContentId};
use thiserror::Error;

/// Errors produced by reference resolution.
///
/// The first two variants are the *expected* partial-failure outcomes of the
/// upload protocol and carry what the caller needs to remediate: re-request a
/// content-ID mapping vs. re-upload blobs. The remaining variants mean the
/// walk itself broke.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{} content id(s) could not be resolved", contents.len())]
    UnresolvedContentIds { contents: Vec<ContentId> },

    #[error("{} referenced blob(s) are missing", blobs.len())]
    MissingBlobs { blobs: Vec<BlobId> },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("object attachment {blob} is not a decodable payload: {source}")]
    CorruptAttachment {
        blob: BlobId,
        #[source]
        source: PayloadError,
    },
}

pub type ResolveResult<T> = Result<T, ResolveError>;
