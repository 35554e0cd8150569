//! The depot object service: upload protocol over reference records.
//!
//! A record moves through three states per `(namespace, bucket, key)`:
//!
//! 1. **Uploading** — `put` writes the record document and its payload blob
//!    concurrently, unconditionally.
//! 2. **PendingReferences** — the payload references blobs that are not all
//!    present yet; `put` returned the missing set and the client is expected
//!    to upload them and call `finalize`.
//! 3. **Finalized** — the entire reference closure is present. Exactly one
//!    Add event is appended to the transaction log per transition into this
//!    state; that event is the sole input to the log-replay GC mark phase.
//!
//! Deletion paths (`delete`, `delete_bucket`, `drop_namespace`) remove
//! records only. Blob removal belongs to the garbage collector, which is the
//! only component with the cross-record view needed to know a blob is
//! unreachable.

pub mod error;
pub mod service;

pub use error::{ObjectError, ObjectResult};
pub use service::{FetchedObject, FinalizeOutcome, ObjectService, PutOutcome};
