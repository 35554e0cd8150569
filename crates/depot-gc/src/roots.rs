use std::collections::{HashMap, HashSet};

use futures::StreamExt;
use tracing::debug;

use depot_store::{LogGeneration, LogPointer, TransactionEvent, TransactionLog};
use depot_types::{BlobId, NamespaceId, RecordKey};

use crate::cancel::Cancellation;
use crate::error::{GcError, GcResult};

/// The mark-phase result for one namespace: everything the sweep needs to
/// judge blobs against this namespace.
///
/// Derived and disposable: rebuilt by full log replay each GC cycle, never
/// persisted, never shared across concurrent sweeps.
#[derive(Clone, Debug)]
pub struct GcRootState {
    pub namespace: NamespaceId,
    /// The log incarnation the replay observed. A different generation at
    /// sweep time invalidates this root set.
    pub generation: LogGeneration,
    /// The resume point for the sweep's race-closing re-check: one past the
    /// last event applied here.
    pub pointer: LogPointer,
    /// Every blob referenced by a live record in this namespace.
    pub roots: HashSet<BlobId>,
}

impl GcRootState {
    /// Returns `true` if `blob` is reachable from a live record.
    pub fn is_root(&self, blob: BlobId) -> bool {
        self.roots.contains(&blob)
    }
}

/// Replay a namespace's transaction log from the beginning into its GC root
/// set.
///
/// Events are folded in order into a map keyed by record key: an Add
/// overwrites the key's blob list, a Remove deletes the key. The root set is
/// the union of blobs referenced by the surviving map; replay order makes
/// the latest event per key authoritative, so duplicate Add events are
/// harmless.
pub async fn determine_gc_roots(
    log: &dyn TransactionLog,
    ns: &NamespaceId,
    cancel: &Cancellation,
) -> GcResult<GcRootState> {
    let stream = log
        .read_events(ns, LogPointer::START)
        .await
        .map_err(|source| GcError::MarkFailed {
            namespace: ns.clone(),
            source,
        })?;

    let generation = stream.generation;
    let mut events = stream.events;
    let mut live: HashMap<RecordKey, Vec<BlobId>> = HashMap::new();
    let mut pointer = LogPointer::START;

    while let Some(event) = events.next().await {
        if cancel.is_cancelled() {
            debug!(namespace = %ns, "mark cancelled mid-replay");
            break;
        }
        let sequenced = event.map_err(|source| GcError::MarkFailed {
            namespace: ns.clone(),
            source,
        })?;
        pointer = sequenced.pointer.next();
        match sequenced.event {
            TransactionEvent::Add { key, blobs } => {
                live.insert(key, blobs);
            }
            TransactionEvent::Remove { key } => {
                live.remove(&key);
            }
        }
    }

    let roots: HashSet<BlobId> = live.into_values().flatten().collect();
    debug!(
        namespace = %ns,
        roots = roots.len(),
        pointer = pointer.0,
        generation = generation.0,
        "gc roots determined"
    );

    Ok(GcRootState {
        namespace: ns.clone(),
        generation,
        pointer,
        roots,
    })
}
