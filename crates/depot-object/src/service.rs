use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info};

use depot_payload::PayloadObject;
use depot_resolve::{ReferenceResolver, ResolveError, ResolveOutcome};
use depot_store::{BlobStore, ContentResolver, ObjectRecord, RecordStore, TransactionLog};
use depot_types::{BlobId, BucketId, NamespaceId, RecordKey};

use crate::error::{ObjectError, ObjectResult};

/// Result of a `put`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// The payload's full reference closure was present; the record is
    /// finalized and the Add event has been appended.
    Finalized,
    /// The record was stored but references blobs that are absent. The
    /// caller uploads these and then calls `finalize`.
    MissingBlobs(Vec<BlobId>),
}

/// Result of a `finalize`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The closure is now complete; the record transitioned to finalized.
    Finalized,
    /// The record was already finalized; nothing changed and no second Add
    /// event was appended.
    AlreadyFinalized,
    /// Blobs are still missing; the record stays pending. The set may be
    /// smaller than the one `put` reported.
    MissingBlobs(Vec<BlobId>),
}

/// A record served by `get`, with its payload bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedObject {
    pub record: ObjectRecord,
    pub payload: Bytes,
}

/// The object service: implements the upload protocol over the storage
/// collaborators.
pub struct ObjectService {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    log: Arc<dyn TransactionLog>,
    resolver: ReferenceResolver,
}

impl ObjectService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        log: Arc<dyn TransactionLog>,
        contents: Arc<dyn ContentResolver>,
    ) -> Self {
        let resolver = ReferenceResolver::new(Arc::clone(&blobs), contents);
        Self {
            records,
            blobs,
            log,
            resolver,
        }
    }

    // -----------------------------------------------------------------------
    // Put / Finalize
    // -----------------------------------------------------------------------

    /// Store a payload under `key`.
    ///
    /// The record document and the payload blob are written concurrently and
    /// unconditionally. If the payload has no attachments the record is
    /// finalized immediately; otherwise the reference closure is resolved
    /// and the record either finalizes or stays pending with the missing set
    /// returned to the caller.
    pub async fn put(
        &self,
        ns: &NamespaceId,
        key: RecordKey,
        payload: &PayloadObject,
    ) -> ObjectResult<PutOutcome> {
        let encoded = Bytes::from(payload.encode()?);
        let payload_blob = BlobId::from_bytes(&encoded);
        let record = ObjectRecord::uploading(
            key.clone(),
            payload_blob,
            Some(encoded.clone()),
            Utc::now(),
        );

        tokio::try_join!(
            self.records.put(ns, record),
            self.blobs.put(ns, payload_blob, encoded),
        )?;

        if payload.has_no_attachments() {
            self.transition_to_finalized(ns, &key, payload_blob, &[]).await?;
            return Ok(PutOutcome::Finalized);
        }

        let outcome = self.resolver.resolve(ns, payload).await?;
        let closure = require_contents_resolved(outcome)?;
        let missing = self.missing_from_store(ns, &closure).await?;
        if missing.is_empty() {
            self.transition_to_finalized(ns, &key, payload_blob, &closure.resolved)
                .await?;
            Ok(PutOutcome::Finalized)
        } else {
            debug!(
                namespace = %ns,
                key = %key,
                missing = missing.len(),
                "record pending references"
            );
            Ok(PutOutcome::MissingBlobs(missing))
        }
    }

    /// Attempt to finalize a pending record after its missing blobs were
    /// uploaded.
    ///
    /// Re-fetches the stored payload and re-runs resolution. Idempotent for
    /// already-finalized records. `expected_payload` guards against
    /// finalizing a record the caller is not actually looking at.
    pub async fn finalize(
        &self,
        ns: &NamespaceId,
        key: &RecordKey,
        expected_payload: BlobId,
    ) -> ObjectResult<FinalizeOutcome> {
        let record = self
            .records
            .get(ns, key)
            .await?
            .ok_or_else(|| ObjectError::RecordNotFound { key: key.clone() })?;

        if record.payload_blob != expected_payload {
            return Err(ObjectError::PayloadMismatch {
                key: key.clone(),
                expected: expected_payload,
                actual: record.payload_blob,
            });
        }
        if record.finalized {
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }

        let payload_bytes = self.payload_bytes(ns, &record).await?;
        let payload = PayloadObject::decode(&payload_bytes)?;

        let closure = if payload.has_no_attachments() {
            ResolveOutcome::default()
        } else {
            let outcome = self.resolver.resolve(ns, &payload).await?;
            require_contents_resolved(outcome)?
        };

        let missing = self.missing_from_store(ns, &closure).await?;
        if missing.is_empty() {
            self.transition_to_finalized(ns, key, record.payload_blob, &closure.resolved)
                .await?;
            Ok(FinalizeOutcome::Finalized)
        } else {
            Ok(FinalizeOutcome::MissingBlobs(missing))
        }
    }

    // -----------------------------------------------------------------------
    // Get / Delete
    // -----------------------------------------------------------------------

    /// Read a record and its payload bytes, refreshing its last-access time.
    ///
    /// Returns `Ok(None)` if the record does not exist. A record whose own
    /// payload blob has vanished from blob storage is an error, not absence.
    pub async fn get(
        &self,
        ns: &NamespaceId,
        key: &RecordKey,
    ) -> ObjectResult<Option<FetchedObject>> {
        let fetched = self.peek(ns, key).await?;
        if fetched.is_some() {
            self.records.touch(ns, key, Utc::now()).await?;
        }
        Ok(fetched)
    }

    /// Like [`get`], but without the last-access refresh. Liveness probes
    /// (the index GC strategy) use this so that probing a record never
    /// extends its lifetime under expiry cleanup.
    ///
    /// [`get`]: ObjectService::get
    pub async fn peek(
        &self,
        ns: &NamespaceId,
        key: &RecordKey,
    ) -> ObjectResult<Option<FetchedObject>> {
        let Some(record) = self.records.get(ns, key).await? else {
            return Ok(None);
        };
        let payload = self.payload_bytes(ns, &record).await?;
        Ok(Some(FetchedObject { record, payload }))
    }

    /// Delete a record and append its Remove tombstone. Blob storage is
    /// untouched; a blob referenced from other records stays reachable.
    pub async fn delete(&self, ns: &NamespaceId, key: &RecordKey) -> ObjectResult<bool> {
        let existed = self.records.delete(ns, key).await?;
        if existed {
            self.log.insert_remove_event(ns, key).await?;
            info!(namespace = %ns, key = %key, "record deleted");
        }
        Ok(existed)
    }

    /// Delete every record in a bucket. Returns the number removed.
    pub async fn delete_bucket(&self, ns: &NamespaceId, bucket: &BucketId) -> ObjectResult<u64> {
        let removed = self.records.delete_bucket(ns, bucket).await?;
        info!(namespace = %ns, bucket = %bucket, removed, "bucket deleted");
        Ok(removed)
    }

    /// Delete every record in a namespace. Returns the number removed.
    pub async fn drop_namespace(&self, ns: &NamespaceId) -> ObjectResult<u64> {
        let removed = self.records.drop_namespace(ns).await?;
        info!(namespace = %ns, removed, "namespace dropped");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Payload bytes for a record: inline copy if present, blob fetch
    /// otherwise.
    async fn payload_bytes(&self, ns: &NamespaceId, record: &ObjectRecord) -> ObjectResult<Bytes> {
        if let Some(inline) = &record.inline_payload {
            return Ok(inline.clone());
        }
        self.blobs
            .get(ns, record.payload_blob)
            .await?
            .ok_or_else(|| ObjectError::MissingPayloadBlob {
                key: record.key.clone(),
                blob: record.payload_blob,
            })
    }

    /// Which of the closure's blobs are absent from blob storage, unioned
    /// with the blobs the resolver itself could not fetch.
    async fn missing_from_store(
        &self,
        ns: &NamespaceId,
        closure: &ResolveOutcome,
    ) -> ObjectResult<Vec<BlobId>> {
        let present_candidates: Vec<BlobId> = closure.unique_blobs().into_iter().collect();
        let mut missing = self.blobs.filter_unknown(ns, &present_candidates).await?;
        missing.extend(closure.missing_blobs.iter().copied());
        missing.sort();
        missing.dedup();
        Ok(missing)
    }

    /// The single place a record becomes finalized: flip the record flag and
    /// append exactly one Add event naming the payload blob plus the
    /// resolved closure.
    async fn transition_to_finalized(
        &self,
        ns: &NamespaceId,
        key: &RecordKey,
        payload_blob: BlobId,
        closure: &[BlobId],
    ) -> ObjectResult<()> {
        let mut referenced: Vec<BlobId> = Vec::with_capacity(closure.len() + 1);
        referenced.push(payload_blob);
        referenced.extend_from_slice(closure);
        referenced.sort();
        referenced.dedup();

        self.records.finalize(ns, key).await?;
        self.log.insert_add_event(ns, key, &referenced).await?;
        info!(
            namespace = %ns,
            key = %key,
            blobs = referenced.len(),
            "record finalized"
        );
        Ok(())
    }
}

/// Unresolved content IDs abort the protocol with the typed partial-resolve
/// failure; everything else flows through as the closure.
fn require_contents_resolved(outcome: ResolveOutcome) -> ObjectResult<ResolveOutcome> {
    if !outcome.unresolved_contents.is_empty() {
        return Err(ResolveError::UnresolvedContentIds {
            contents: outcome.unresolved_contents,
        }
        .into());
    }
    Ok(outcome)
}
