//! Storage collaborator contracts for the depot artifact store.
//!
//! The depot core treats physical storage as a set of black-box
//! collaborators, each behind an async trait:
//!
//! - [`BlobStore`] — content-addressed blob bytes, per namespace
//! - [`RecordStore`] — reference-record documents, per namespace
//! - [`TransactionLog`] — append-only per-namespace event log, the sole
//!   input to the log-replay GC mark phase
//! - [`ContentResolver`] — content-ID → blob mapping from the chunking layer
//! - [`BlobReferenceIndex`] — blob → referencing-records back-index
//! - [`LeaderElection`] — cluster leadership query
//!
//! Each call is individually atomic; the core never assumes multi-call
//! transactions across collaborators. In-memory implementations of every
//! contract live in [`memory`] for tests and embedding.

pub mod error;
pub mod log;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use log::{EventStream, LogGeneration, LogPointer, SequencedEvent, TransactionEvent};
pub use memory::{
    MemoryBlobStore, MemoryContentResolver, MemoryRecordStore, MemoryReferenceIndex,
    MemoryTransactionLog, StaticLeader,
};
pub use record::ObjectRecord;
pub use traits::{
    BlobEntry, BlobReferenceIndex, BlobStore, ContentResolver, LeaderElection, RecordStore,
    TransactionLog,
};
