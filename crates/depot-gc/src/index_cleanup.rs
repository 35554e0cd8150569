use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, info, warn};

use depot_object::{ObjectError, ObjectService};
use depot_store::{BlobReferenceIndex, BlobStore, RecordStore};
use depot_types::{BlobId, NamespaceId, RecordKey};

use crate::cancel::Cancellation;
use crate::config::IndexCleanupConfig;
use crate::error::GcResult;
use crate::task::{BlobCleanupTask, CleanupStats};

/// Orphan-blob cleanup via the blob→record back-index.
///
/// An alternative mark phase to log replay: instead of computing root sets,
/// each grace-expired blob's index entry is checked and every indexed
/// reference is validated against the live record store. A blob is deleted
/// only when it has no index entry at all, or when none of its indexed
/// references resolves to a live record.
///
/// Liveness reads the record through [`ObjectService::peek`]: "record not
/// found" marks the reference stale, while a record that exists (even one
/// whose own payload blob has gone missing) keeps the blob, as does any
/// I/O failure. This strategy is independently correct, not a fallback; it
/// may run alongside log replay in the same deployment, restricted to the
/// configured namespace allow-list whose indexes are maintained.
pub struct IndexedBlobCleanup {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    index: Arc<dyn BlobReferenceIndex>,
    objects: Arc<ObjectService>,
    config: IndexCleanupConfig,
}

impl IndexedBlobCleanup {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        index: Arc<dyn BlobReferenceIndex>,
        objects: Arc<ObjectService>,
        config: IndexCleanupConfig,
    ) -> Self {
        Self {
            records,
            blobs,
            index,
            objects,
            config,
        }
    }

    /// Execute one cleanup cycle over the allow-listed namespaces.
    pub async fn run_cycle(&self, cancel: &Cancellation) -> GcResult<CleanupStats> {
        let started = Instant::now();
        let mut stats = CleanupStats::default();
        let cutoff = Utc::now() - self.config.grace_window;

        let namespaces: Vec<NamespaceId> = self
            .records
            .namespaces()
            .await?
            .into_iter()
            .filter(|ns| self.config.namespaces.contains(ns))
            .collect();

        for ns in &namespaces {
            let mut blobs = match self.blobs.list_older_than(ns, cutoff).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(namespace = %ns, error = %err, "blob listing failed, namespace left unswept");
                    stats.failed += 1;
                    continue;
                }
            };

            while let Some(next) = blobs.next().await {
                if cancel.is_cancelled() {
                    debug!("index cleanup cancelled");
                    stats.elapsed = started.elapsed();
                    return Ok(stats);
                }
                let entry = match next {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(namespace = %ns, error = %err, "unreadable blob entry");
                        stats.failed += 1;
                        continue;
                    }
                };
                stats.scanned += 1;
                self.judge_blob(ns, entry.id, &mut stats).await;
            }
        }

        stats.elapsed = started.elapsed();
        info!(
            scanned = stats.scanned,
            removed = stats.removed,
            skipped = stats.skipped,
            failed = stats.failed,
            "index cleanup complete"
        );
        Ok(stats)
    }

    /// Decide one blob's fate from its index entry and delete if orphaned.
    async fn judge_blob(&self, ns: &NamespaceId, blob: BlobId, stats: &mut CleanupStats) {
        let references = match self.index.references(ns, blob).await {
            Ok(refs) => refs,
            Err(err) => {
                warn!(blob = %blob.short_hex(), error = %err, "back-index lookup failed");
                stats.failed += 1;
                return;
            }
        };

        let orphaned = match references {
            // No index entry at all: nothing ever referenced this blob.
            None => true,
            Some(refs) => {
                let mut any_live = false;
                for key in &refs {
                    if self.reference_is_live(ns, key).await {
                        any_live = true;
                        break;
                    }
                }
                !any_live
            }
        };

        if !orphaned {
            stats.skipped += 1;
            return;
        }

        match self.blobs.delete(ns, blob).await {
            Ok(_) => {
                debug!(blob = %blob.short_hex(), "orphan blob removed via index");
                stats.removed += 1;
            }
            Err(err) => {
                warn!(blob = %blob.short_hex(), error = %err, "blob delete failed");
                stats.failed += 1;
            }
        }
    }

    /// A reference is stale only on a clean "record not found". A record
    /// that exists keeps its blobs even when its own payload blob is
    /// missing, and an I/O failure means "not provably safe".
    async fn reference_is_live(&self, ns: &NamespaceId, key: &RecordKey) -> bool {
        match self.objects.peek(ns, key).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(ObjectError::MissingPayloadBlob { .. }) => true,
            Err(err) => {
                warn!(namespace = %ns, key = %key, error = %err, "liveness probe failed");
                true
            }
        }
    }
}

#[async_trait]
impl BlobCleanupTask for IndexedBlobCleanup {
    fn name(&self) -> &'static str {
        "back-index"
    }

    async fn run(&self, cancel: &Cancellation) -> GcResult<CleanupStats> {
        self.run_cycle(cancel).await
    }
}
