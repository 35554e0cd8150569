//! In-memory implementations of every storage collaborator.
//!
//! Intended for tests and embedding. All state is held behind `RwLock`ed
//! maps; critical sections are plain map operations and never held across an
//! await point. Streams are materialized snapshots of the state at call
//! time, which matches the eventual-consistency the core already assumes of
//! real backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};

use depot_types::{BlobId, BucketId, ContentId, NamespaceId, RecordKey};

use crate::error::{StoreError, StoreResult};
use crate::log::{EventStream, LogGeneration, LogPointer, SequencedEvent, TransactionEvent};
use crate::record::ObjectRecord;
use crate::traits::{
    BlobEntry, BlobReferenceIndex, BlobStore, ContentResolver, LeaderElection, RecordStore,
    TransactionLog,
};

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct StoredBlob {
    bytes: Bytes,
    last_modified: DateTime<Utc>,
}

/// In-memory, HashMap-based blob store.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<(NamespaceId, BlobId), StoredBlob>>,
}

impl MemoryBlobStore {
    /// Create a new empty blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored across all namespaces.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Backdate (or forward-date) a blob's modification time. Returns `true`
    /// if the blob existed. Test hook for exercising grace-window behavior.
    pub fn set_last_modified(&self, ns: &NamespaceId, id: BlobId, at: DateTime<Utc>) -> bool {
        let mut map = self.blobs.write().expect("lock poisoned");
        match map.get_mut(&(ns.clone(), id)) {
            Some(blob) => {
                blob.last_modified = at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, ns: &NamespaceId, id: BlobId, bytes: Bytes) -> StoreResult<()> {
        let actual = BlobId::from_bytes(&bytes);
        if actual != id {
            return Err(StoreError::HashMismatch {
                expected: id,
                actual,
            });
        }
        let mut map = self.blobs.write().expect("lock poisoned");
        map.insert(
            (ns.clone(), id),
            StoredBlob {
                bytes,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, ns: &NamespaceId, id: BlobId) -> StoreResult<Option<Bytes>> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.get(&(ns.clone(), id)).map(|b| b.bytes.clone()))
    }

    async fn exists(&self, ns: &NamespaceId, id: BlobId) -> StoreResult<bool> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.contains_key(&(ns.clone(), id)))
    }

    async fn delete(&self, ns: &NamespaceId, id: BlobId) -> StoreResult<bool> {
        let mut map = self.blobs.write().expect("lock poisoned");
        Ok(map.remove(&(ns.clone(), id)).is_some())
    }

    async fn list_older_than(
        &self,
        ns: &NamespaceId,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<BoxStream<'static, StoreResult<BlobEntry>>> {
        let map = self.blobs.read().expect("lock poisoned");
        let mut entries: Vec<BlobEntry> = map
            .iter()
            .filter(|((entry_ns, _), blob)| entry_ns == ns && blob.last_modified < cutoff)
            .map(|((_, id), blob)| BlobEntry {
                id: *id,
                last_modified: blob.last_modified,
            })
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(stream::iter(entries.into_iter().map(Ok)).boxed())
    }
}

impl std::fmt::Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MemoryRecordStore
// ---------------------------------------------------------------------------

/// In-memory, HashMap-based reference-record store.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<(NamespaceId, RecordKey), ObjectRecord>>,
}

impl MemoryRecordStore {
    /// Create a new empty record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all namespaces.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }

    /// Backdate a record's last-access time. Returns `true` if it existed.
    /// Test hook for exercising expiry cleanup.
    pub fn set_last_access(&self, ns: &NamespaceId, key: &RecordKey, at: DateTime<Utc>) -> bool {
        let mut map = self.records.write().expect("lock poisoned");
        match map.get_mut(&(ns.clone(), key.clone())) {
            Some(rec) => {
                rec.last_access = at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, ns: &NamespaceId, key: &RecordKey) -> StoreResult<Option<ObjectRecord>> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map.get(&(ns.clone(), key.clone())).cloned())
    }

    async fn put(&self, ns: &NamespaceId, record: ObjectRecord) -> StoreResult<()> {
        let mut map = self.records.write().expect("lock poisoned");
        map.insert((ns.clone(), record.key.clone()), record);
        Ok(())
    }

    async fn finalize(&self, ns: &NamespaceId, key: &RecordKey) -> StoreResult<bool> {
        let mut map = self.records.write().expect("lock poisoned");
        match map.get_mut(&(ns.clone(), key.clone())) {
            Some(rec) => {
                rec.finalized = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch(
        &self,
        ns: &NamespaceId,
        key: &RecordKey,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut map = self.records.write().expect("lock poisoned");
        match map.get_mut(&(ns.clone(), key.clone())) {
            Some(rec) => {
                rec.last_access = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, ns: &NamespaceId, key: &RecordKey) -> StoreResult<bool> {
        let mut map = self.records.write().expect("lock poisoned");
        Ok(map.remove(&(ns.clone(), key.clone())).is_some())
    }

    async fn delete_bucket(&self, ns: &NamespaceId, bucket: &BucketId) -> StoreResult<u64> {
        let mut map = self.records.write().expect("lock poisoned");
        let before = map.len();
        map.retain(|(entry_ns, key), _| !(entry_ns == ns && &key.bucket == bucket));
        Ok((before - map.len()) as u64)
    }

    async fn drop_namespace(&self, ns: &NamespaceId) -> StoreResult<u64> {
        let mut map = self.records.write().expect("lock poisoned");
        let before = map.len();
        map.retain(|(entry_ns, _), _| entry_ns != ns);
        Ok((before - map.len()) as u64)
    }

    async fn namespaces(&self) -> StoreResult<Vec<NamespaceId>> {
        let map = self.records.read().expect("lock poisoned");
        let mut namespaces: Vec<NamespaceId> =
            map.keys().map(|(ns, _)| ns.clone()).collect();
        namespaces.sort();
        namespaces.dedup();
        Ok(namespaces)
    }

    async fn old_records(
        &self,
        ns: &NamespaceId,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<BoxStream<'static, StoreResult<ObjectRecord>>> {
        let map = self.records.read().expect("lock poisoned");
        let mut records: Vec<ObjectRecord> = map
            .iter()
            .filter(|((entry_ns, _), rec)| entry_ns == ns && rec.last_access < cutoff)
            .map(|(_, rec)| rec.clone())
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(stream::iter(records.into_iter().map(Ok)).boxed())
    }
}

impl std::fmt::Debug for MemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRecordStore")
            .field("record_count", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MemoryTransactionLog
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct NamespaceLog {
    generation: u64,
    next_pointer: u64,
    events: Vec<SequencedEvent>,
}

impl NamespaceLog {
    fn append(&mut self, event: TransactionEvent) {
        let pointer = LogPointer(self.next_pointer);
        self.next_pointer += 1;
        self.events.push(SequencedEvent { pointer, event });
    }
}

/// In-memory append-only transaction log.
///
/// Pointers increase monotonically per namespace and events are never
/// compacted; [`reset`] models a log rotation by clearing events and bumping
/// the generation token.
///
/// [`reset`]: MemoryTransactionLog::reset
#[derive(Default)]
pub struct MemoryTransactionLog {
    logs: RwLock<HashMap<NamespaceId, NamespaceLog>>,
}

impl MemoryTransactionLog {
    /// Create a new empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total events recorded for a namespace.
    pub fn event_count(&self, ns: &NamespaceId) -> usize {
        let map = self.logs.read().expect("lock poisoned");
        map.get(ns).map(|log| log.events.len()).unwrap_or(0)
    }

    /// Number of Add events recorded for a specific record key.
    pub fn add_event_count(&self, ns: &NamespaceId, key: &RecordKey) -> usize {
        let map = self.logs.read().expect("lock poisoned");
        map.get(ns)
            .map(|log| {
                log.events
                    .iter()
                    .filter(|e| matches!(&e.event, TransactionEvent::Add { key: k, .. } if k == key))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Rotate the namespace's log: clear all events and bump the generation.
    pub fn reset(&self, ns: &NamespaceId) {
        let mut map = self.logs.write().expect("lock poisoned");
        let log = map.entry(ns.clone()).or_default();
        log.generation += 1;
        log.next_pointer = 0;
        log.events.clear();
    }
}

#[async_trait]
impl TransactionLog for MemoryTransactionLog {
    async fn insert_add_event(
        &self,
        ns: &NamespaceId,
        key: &RecordKey,
        blobs: &[BlobId],
    ) -> StoreResult<()> {
        let mut map = self.logs.write().expect("lock poisoned");
        map.entry(ns.clone()).or_default().append(TransactionEvent::Add {
            key: key.clone(),
            blobs: blobs.to_vec(),
        });
        Ok(())
    }

    async fn insert_remove_event(&self, ns: &NamespaceId, key: &RecordKey) -> StoreResult<()> {
        let mut map = self.logs.write().expect("lock poisoned");
        map.entry(ns.clone())
            .or_default()
            .append(TransactionEvent::Remove { key: key.clone() });
        Ok(())
    }

    async fn read_events(&self, ns: &NamespaceId, from: LogPointer) -> StoreResult<EventStream> {
        let map = self.logs.read().expect("lock poisoned");
        let (generation, events) = match map.get(ns) {
            Some(log) => (
                LogGeneration(log.generation),
                log.events
                    .iter()
                    .filter(|e| e.pointer >= from)
                    .cloned()
                    .collect::<Vec<_>>(),
            ),
            None => (LogGeneration::default(), Vec::new()),
        };
        Ok(EventStream {
            generation,
            events: stream::iter(events.into_iter().map(Ok)).boxed(),
        })
    }
}

impl std::fmt::Debug for MemoryTransactionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.logs.read().expect("lock poisoned");
        f.debug_struct("MemoryTransactionLog")
            .field("namespace_count", &map.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MemoryContentResolver
// ---------------------------------------------------------------------------

/// In-memory content-ID → blobs mapping.
#[derive(Default)]
pub struct MemoryContentResolver {
    mappings: RwLock<HashMap<(NamespaceId, ContentId), Vec<BlobId>>>,
}

impl MemoryContentResolver {
    /// Create a new empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a content-ID mapping.
    pub fn register(&self, ns: &NamespaceId, content: ContentId, blobs: Vec<BlobId>) {
        let mut map = self.mappings.write().expect("lock poisoned");
        map.insert((ns.clone(), content), blobs);
    }

    /// Remove a content-ID mapping. Returns `true` if it existed.
    pub fn unregister(&self, ns: &NamespaceId, content: ContentId) -> bool {
        let mut map = self.mappings.write().expect("lock poisoned");
        map.remove(&(ns.clone(), content)).is_some()
    }
}

#[async_trait]
impl ContentResolver for MemoryContentResolver {
    async fn resolve(
        &self,
        ns: &NamespaceId,
        content: ContentId,
    ) -> StoreResult<Option<Vec<BlobId>>> {
        let map = self.mappings.read().expect("lock poisoned");
        Ok(map.get(&(ns.clone(), content)).cloned())
    }
}

impl std::fmt::Debug for MemoryContentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.mappings.read().expect("lock poisoned");
        f.debug_struct("MemoryContentResolver")
            .field("mapping_count", &map.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MemoryReferenceIndex
// ---------------------------------------------------------------------------

/// In-memory blob → referencing-records back-index.
#[derive(Default)]
pub struct MemoryReferenceIndex {
    index: RwLock<HashMap<(NamespaceId, BlobId), Vec<RecordKey>>>,
}

impl MemoryReferenceIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` references `id`.
    pub fn register(&self, ns: &NamespaceId, id: BlobId, key: RecordKey) {
        let mut map = self.index.write().expect("lock poisoned");
        let refs = map.entry((ns.clone(), id)).or_default();
        if !refs.contains(&key) {
            refs.push(key);
        }
    }
}

#[async_trait]
impl BlobReferenceIndex for MemoryReferenceIndex {
    async fn references(
        &self,
        ns: &NamespaceId,
        id: BlobId,
    ) -> StoreResult<Option<Vec<RecordKey>>> {
        let map = self.index.read().expect("lock poisoned");
        Ok(map.get(&(ns.clone(), id)).cloned())
    }
}

impl std::fmt::Debug for MemoryReferenceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.index.read().expect("lock poisoned");
        f.debug_struct("MemoryReferenceIndex")
            .field("entry_count", &map.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// StaticLeader
// ---------------------------------------------------------------------------

/// Leadership stub with a settable flag, for tests and single-node
/// deployments.
#[derive(Debug)]
pub struct StaticLeader {
    leader: AtomicBool,
}

impl StaticLeader {
    /// Create with an initial leadership state.
    pub fn new(leader: bool) -> Self {
        Self {
            leader: AtomicBool::new(leader),
        }
    }

    /// Flip the leadership state (simulates an election transition).
    pub fn set(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }
}

impl LeaderElection for StaticLeader {
    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }
}
