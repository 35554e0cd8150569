use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use depot_types::{BlobId, RecordKey};

use crate::error::StoreResult;

/// Position in a namespace's transaction log. Pointers are opaque to the
/// core except for ordering; `LogPointer::START` reads from the beginning.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LogPointer(pub u64);

impl LogPointer {
    /// The beginning of the log.
    pub const START: LogPointer = LogPointer(0);

    /// The pointer immediately after this event.
    pub fn next(self) -> LogPointer {
        LogPointer(self.0 + 1)
    }
}

/// Identifies one incarnation of a namespace's log. A log may reset or
/// rotate; when it does, the generation changes and any root set accumulated
/// from the previous generation is invalid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogGeneration(pub u64);

/// A single replication-log event. Replay order determines the live mapping:
/// for the same record key, later events override earlier ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEvent {
    /// A record transitioned into the finalized state referencing `blobs`.
    Add { key: RecordKey, blobs: Vec<BlobId> },
    /// A record was deleted (tombstone).
    Remove { key: RecordKey },
}

impl TransactionEvent {
    /// The record key this event concerns.
    pub fn key(&self) -> &RecordKey {
        match self {
            TransactionEvent::Add { key, .. } => key,
            TransactionEvent::Remove { key } => key,
        }
    }
}

/// An event paired with its position in the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub pointer: LogPointer,
    pub event: TransactionEvent,
}

/// An open read of a namespace's log.
///
/// The `generation` token is consistent for the lifetime of the stream: all
/// yielded events belong to that single log incarnation. Log implementations
/// must not compact away events without changing the generation; the GC
/// sweep's race-closing re-check is sound only under this contract.
pub struct EventStream {
    pub generation: LogGeneration,
    pub events: BoxStream<'static, StoreResult<SequencedEvent>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_types::{BucketId, KeyId};

    #[test]
    fn pointer_next_increments() {
        assert_eq!(LogPointer::START.next(), LogPointer(1));
        assert_eq!(LogPointer(41).next(), LogPointer(42));
    }

    #[test]
    fn event_key_for_both_variants() {
        let key = RecordKey::new(BucketId::new("b").unwrap(), KeyId::new("k").unwrap());
        let add = TransactionEvent::Add {
            key: key.clone(),
            blobs: vec![BlobId::from_bytes(b"a")],
        };
        let remove = TransactionEvent::Remove { key: key.clone() };
        assert_eq!(add.key(), &key);
        assert_eq!(remove.key(), &key);
    }
}
