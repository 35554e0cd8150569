//! Garbage collection for the depot artifact store.
//!
//! Two kinds of reclamation run here, both destructive and therefore both
//! driven only on the elected cluster leader:
//!
//! - [`RefCleanup`] deletes reference records whose last access is past a
//!   configured expiry, tombstoning each deletion in the transaction log.
//! - Orphan-blob cleanup removes blobs no live record reaches. Two
//!   independent strategies implement the shared [`BlobCleanupTask`]
//!   capability: [`LogReplayBlobCleanup`] computes GC roots by replaying
//!   each namespace's transaction log, and [`IndexedBlobCleanup`] consults a
//!   maintained blob→record back-index. Both may run in one deployment.
//!
//! Every deletion path is biased toward under-deletion: an I/O error never
//! reads as "therefore orphaned", per-item failures are logged and skipped,
//! and a blob survives unless it is provably absent from every namespace's
//! root set and past the upload grace window.

pub mod cancel;
pub mod config;
pub mod error;
pub mod index_cleanup;
pub mod log_replay;
pub mod ref_cleanup;
pub mod roots;
pub mod task;

pub use cancel::Cancellation;
pub use config::{BlobCleanupConfig, IndexCleanupConfig, RefCleanupConfig};
pub use error::{GcError, GcResult};
pub use index_cleanup::IndexedBlobCleanup;
pub use log_replay::LogReplayBlobCleanup;
pub use ref_cleanup::{RefCleanup, RefCleanupReport};
pub use roots::{determine_gc_roots, GcRootState};
pub use task::{BlobCleanupTask, CleanupStats};
