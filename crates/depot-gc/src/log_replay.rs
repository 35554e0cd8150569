use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use depot_store::{BlobStore, RecordStore, TransactionEvent, TransactionLog};
use depot_types::{BlobId, NamespaceId};

use crate::cancel::Cancellation;
use crate::config::BlobCleanupConfig;
use crate::error::GcResult;
use crate::roots::{determine_gc_roots, GcRootState};
use crate::task::{BlobCleanupTask, CleanupStats};

/// Orphan-blob cleanup by transaction-log replay.
///
/// One cycle is a global mark-then-sweep:
///
/// 1. **Mark** — every namespace's log is replayed from the beginning into a
///    [`GcRootState`], with bounded parallelism across namespaces. The mark
///    must complete for *all* namespaces before any sweeping starts, because
///    blobs are physically shared and only the union of root sets can
///    condemn one.
/// 2. **Sweep** — blobs older than the grace window are checked against
///    every namespace's roots, then re-verified by replaying each log from
///    its recorded pointer forward (an upload's Add event may land between
///    mark and sweep). Only a blob absent from every root set and every
///    post-mark tail is deleted, from every namespace's blob area.
///
/// Root state is derived and discarded per cycle. Any failure downgrades to
/// "not provably safe": the item survives until a later cycle.
pub struct LogReplayBlobCleanup {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    log: Arc<dyn TransactionLog>,
    config: BlobCleanupConfig,
}

impl LogReplayBlobCleanup {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        log: Arc<dyn TransactionLog>,
        config: BlobCleanupConfig,
    ) -> Self {
        Self {
            records,
            blobs,
            log,
            config,
        }
    }

    /// Execute one mark-and-sweep cycle.
    pub async fn run_cycle(&self, cancel: &Cancellation) -> GcResult<CleanupStats> {
        let started = Instant::now();
        let mut stats = CleanupStats::default();
        // The grace cutoff anchors to the sweep start, captured once so a
        // long sweep cannot creep its own window forward.
        let cutoff = Utc::now() - self.config.grace_window;

        let namespaces = self.records.namespaces().await?;
        let root_states = self.mark(&namespaces, cancel).await?;

        if cancel.is_cancelled() {
            debug!("cleanup cancelled after mark; skipping sweep");
            stats.elapsed = started.elapsed();
            return Ok(stats);
        }

        info!(
            namespaces = namespaces.len(),
            roots = root_states.iter().map(|s| s.roots.len()).sum::<usize>(),
            "mark complete, sweeping"
        );

        self.sweep(&namespaces, &root_states, cutoff, cancel, &mut stats)
            .await?;

        stats.elapsed = started.elapsed();
        info!(
            scanned = stats.scanned,
            removed = stats.removed,
            skipped = stats.skipped,
            failed = stats.failed,
            "sweep complete"
        );
        Ok(stats)
    }

    /// Mark phase: replay every namespace's log, bounded-parallel.
    async fn mark(
        &self,
        namespaces: &[NamespaceId],
        cancel: &Cancellation,
    ) -> GcResult<Vec<GcRootState>> {
        stream::iter(namespaces.iter().cloned().map(|ns| {
            let log = Arc::clone(&self.log);
            let cancel = cancel.clone();
            async move { determine_gc_roots(log.as_ref(), &ns, &cancel).await }
        }))
        .buffer_unordered(self.config.mark_parallelism.max(1))
        .try_collect()
        .await
    }

    /// Sweep phase: judge and delete grace-expired blobs.
    async fn sweep(
        &self,
        namespaces: &[NamespaceId],
        root_states: &[GcRootState],
        cutoff: chrono::DateTime<Utc>,
        cancel: &Cancellation,
        stats: &mut CleanupStats,
    ) -> GcResult<()> {
        // A blob may be listed by several namespaces; judge it once per
        // cycle.
        let mut seen: HashSet<BlobId> = HashSet::new();

        for ns in namespaces {
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
                    debug!("sweep cancelled");
                    return Ok(());
                }
                let entry = match next {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(namespace = %ns, error = %err, "unreadable blob entry");
                        stats.failed += 1;
                        continue;
                    }
                };
                if !seen.insert(entry.id) {
                    continue;
                }
                stats.scanned += 1;

                if root_states.iter().any(|s| s.is_root(entry.id)) {
                    stats.skipped += 1;
                    continue;
                }

                match self.added_since_mark(root_states, entry.id).await {
                    Ok(true) => {
                        debug!(blob = %entry.id.short_hex(), "blob appeared after mark, kept");
                        stats.skipped += 1;
                    }
                    Ok(false) => {
                        if self.delete_everywhere(namespaces, entry.id).await {
                            stats.removed += 1;
                        } else {
                            stats.failed += 1;
                        }
                    }
                    Err(err) => {
                        // Not provably safe; survives until a later cycle.
                        warn!(blob = %entry.id.short_hex(), error = %err, "post-mark verification failed");
                        stats.failed += 1;
                    }
                }
            }
        }

        Ok(())
    }

    /// Race-closing re-check: replay every namespace's log from its recorded
    /// pointer and report whether anything (re-)added the blob after the
    /// mark captured its state. A generation change also reads as "added":
    /// the recorded roots no longer describe that log.
    async fn added_since_mark(
        &self,
        root_states: &[GcRootState],
        blob: BlobId,
    ) -> GcResult<bool> {
        for state in root_states {
            let stream = self.log.read_events(&state.namespace, state.pointer).await?;
            if stream.generation != state.generation {
                return Ok(true);
            }
            let mut events = stream.events;
            while let Some(event) = events.next().await {
                let sequenced = event?;
                if let TransactionEvent::Add { blobs, .. } = &sequenced.event {
                    if blobs.contains(&blob) {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Delete a blob from every namespace's blob area. The blob counts as
    /// removed only if deletion succeeded everywhere it was attempted.
    async fn delete_everywhere(&self, namespaces: &[NamespaceId], blob: BlobId) -> bool {
        let mut all_ok = true;
        for ns in namespaces {
            if let Err(err) = self.blobs.delete(ns, blob).await {
                warn!(namespace = %ns, blob = %blob.short_hex(), error = %err, "blob delete failed");
                all_ok = false;
            }
        }
        if all_ok {
            debug!(blob = %blob.short_hex(), "orphan blob removed");
        }
        all_ok
    }
}

#[async_trait]
impl BlobCleanupTask for LogReplayBlobCleanup {
    fn name(&self) -> &'static str {
        "log-replay"
    }

    async fn run(&self, cancel: &Cancellation) -> GcResult<CleanupStats> {
        self.run_cycle(cancel).await
    }
}
