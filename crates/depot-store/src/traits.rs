use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use depot_types::{BlobId, BucketId, ContentId, NamespaceId, RecordKey};

use crate::error::StoreResult;
use crate::log::{EventStream, LogPointer};
use crate::record::ObjectRecord;

/// A blob listed by [`BlobStore::list_older_than`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlobEntry {
    pub id: BlobId,
    pub last_modified: DateTime<Utc>,
}

/// Content-addressed blob byte store, scoped per namespace.
///
/// All implementations must satisfy these invariants:
/// - Blobs are immutable once written; re-writing the same hash refreshes
///   the modification time but never changes the bytes.
/// - `put` verifies the supplied hash against the bytes before storing.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store blob bytes under their content hash.
    async fn put(&self, ns: &NamespaceId, id: BlobId, bytes: Bytes) -> StoreResult<()>;

    /// Read blob bytes. Returns `Ok(None)` if the blob is not present.
    async fn get(&self, ns: &NamespaceId, id: BlobId) -> StoreResult<Option<Bytes>>;

    /// Check whether a blob exists in this namespace's area.
    async fn exists(&self, ns: &NamespaceId, id: BlobId) -> StoreResult<bool>;

    /// Delete a blob from this namespace's area. Returns `true` if it
    /// existed. Intended for garbage collection only.
    async fn delete(&self, ns: &NamespaceId, id: BlobId) -> StoreResult<bool>;

    /// Stream blobs whose last modification is strictly older than `cutoff`.
    async fn list_older_than(
        &self,
        ns: &NamespaceId,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<BoxStream<'static, StoreResult<BlobEntry>>>;

    /// Of `ids`, return those *not* present in this namespace's area.
    ///
    /// Default implementation checks `exists` per id. Backends may override
    /// with a batched lookup.
    async fn filter_unknown(&self, ns: &NamespaceId, ids: &[BlobId]) -> StoreResult<Vec<BlobId>> {
        let mut unknown = Vec::new();
        for id in ids {
            if !self.exists(ns, *id).await? {
                unknown.push(*id);
            }
        }
        Ok(unknown)
    }
}

/// Reference-record document store, scoped per namespace.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read a record. Returns `Ok(None)` if it does not exist.
    async fn get(&self, ns: &NamespaceId, key: &RecordKey) -> StoreResult<Option<ObjectRecord>>;

    /// Write (create or replace) a record.
    async fn put(&self, ns: &NamespaceId, record: ObjectRecord) -> StoreResult<()>;

    /// Mark a record finalized. Returns `true` if the record existed.
    async fn finalize(&self, ns: &NamespaceId, key: &RecordKey) -> StoreResult<bool>;

    /// Refresh a record's last-access time. Returns `true` if it existed.
    async fn touch(&self, ns: &NamespaceId, key: &RecordKey, at: DateTime<Utc>)
        -> StoreResult<bool>;

    /// Delete a record. Returns `true` if it existed. Never touches blob
    /// storage; blob reclamation is the garbage collector's job.
    async fn delete(&self, ns: &NamespaceId, key: &RecordKey) -> StoreResult<bool>;

    /// Delete every record in a bucket. Returns the number removed.
    async fn delete_bucket(&self, ns: &NamespaceId, bucket: &BucketId) -> StoreResult<u64>;

    /// Delete every record in a namespace. Returns the number removed.
    async fn drop_namespace(&self, ns: &NamespaceId) -> StoreResult<u64>;

    /// All namespaces known to the record store.
    async fn namespaces(&self) -> StoreResult<Vec<NamespaceId>>;

    /// Stream records whose last access is strictly older than `cutoff`.
    async fn old_records(
        &self,
        ns: &NamespaceId,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<BoxStream<'static, StoreResult<ObjectRecord>>>;
}

/// Append-only replication log, per namespace.
///
/// Contract invariant: events are never compacted away within a generation.
/// A log that resets or rotates must hand out a new generation token, or the
/// GC sweep's replay-from-pointer re-check loses its safety argument.
#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// Append an Add event: `key` became finalized referencing `blobs`.
    async fn insert_add_event(
        &self,
        ns: &NamespaceId,
        key: &RecordKey,
        blobs: &[BlobId],
    ) -> StoreResult<()>;

    /// Append a Remove tombstone for `key`.
    async fn insert_remove_event(&self, ns: &NamespaceId, key: &RecordKey) -> StoreResult<()>;

    /// Open the event stream at `from`. The stream's generation token is
    /// consistent across everything it yields.
    async fn read_events(&self, ns: &NamespaceId, from: LogPointer) -> StoreResult<EventStream>;
}

/// Content-ID resolution against the chunking/dedup layer.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Look up the blobs a content ID maps to. Returns `Ok(None)` when the
    /// mapping is absent; resolution is a lookup, never a computation.
    async fn resolve(&self, ns: &NamespaceId, content: ContentId)
        -> StoreResult<Option<Vec<BlobId>>>;
}

/// Blob → referencing-records back-index, maintained by the record write
/// path of the surrounding service. Used by the index GC strategy.
#[async_trait]
pub trait BlobReferenceIndex: Send + Sync {
    /// The record keys that reference `id`. Returns `Ok(None)` when the
    /// index has no entry for the blob at all.
    async fn references(&self, ns: &NamespaceId, id: BlobId)
        -> StoreResult<Option<Vec<RecordKey>>>;
}

/// Cluster leadership query. Leadership is process-wide singleton-like
/// state; modeling it as a passed-in collaborator lets tests simulate
/// leadership transitions deterministically.
pub trait LeaderElection: Send + Sync {
    /// Returns `true` if this instance currently holds cluster leadership.
    fn is_leader(&self) -> bool;
}
