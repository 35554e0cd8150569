use depot_store::StoreError;
use depot_types::NamespaceId;
use thiserror::Error;

/// Errors that abort an entire cleanup run.
///
/// Per-record and per-blob failures are *not* represented here; those are
/// logged, counted, and skipped so one bad item never aborts a scan. A run
/// fails outright only when it cannot establish the global state it needs to
/// delete anything safely.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GcError {
    /// A namespace's mark phase failed, so no root set exists for it. With
    /// one namespace unaccounted for, no blob anywhere is provably orphaned.
    #[error("mark phase failed for namespace {namespace}: {source}")]
    MarkFailed {
        namespace: NamespaceId,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type GcResult<T> = Result<T, GcError>;
