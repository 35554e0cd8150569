use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, info, warn};

use depot_store::{RecordStore, TransactionLog};
use depot_types::{NamespaceId, RecordKey};

use crate::cancel::Cancellation;
use crate::config::RefCleanupConfig;
use crate::error::GcResult;
use crate::task::CleanupStats;

/// What a cleanup pass over one or more namespaces removed.
#[derive(Clone, Debug, Default)]
pub struct RefCleanupReport {
    /// The records deleted, for metrics and logging.
    pub removed: Vec<(NamespaceId, RecordKey)>,
    pub stats: CleanupStats,
}

/// Deletes reference records whose last access is past the configured
/// expiry, appending a Remove tombstone to the transaction log for each.
///
/// Record deletion and tombstone append run concurrently per record and
/// fail independently: one record's failure is logged and the scan moves
/// on. Blob storage is never touched here.
pub struct RefCleanup {
    records: Arc<dyn RecordStore>,
    log: Arc<dyn TransactionLog>,
    config: RefCleanupConfig,
}

impl RefCleanup {
    pub fn new(
        records: Arc<dyn RecordStore>,
        log: Arc<dyn TransactionLog>,
        config: RefCleanupConfig,
    ) -> Self {
        Self {
            records,
            log,
            config,
        }
    }

    /// Run expiry cleanup over every known namespace.
    pub async fn run(&self, cancel: &Cancellation) -> GcResult<RefCleanupReport> {
        let started = Instant::now();
        let mut report = RefCleanupReport::default();

        for ns in self.records.namespaces().await? {
            if cancel.is_cancelled() {
                break;
            }
            self.clean_namespace(&ns, cancel, &mut report).await?;
        }

        report.stats.elapsed = started.elapsed();
        info!(
            removed = report.removed.len(),
            failed = report.stats.failed,
            "reference cleanup finished"
        );
        Ok(report)
    }

    /// Expire records in a single namespace.
    async fn clean_namespace(
        &self,
        ns: &NamespaceId,
        cancel: &Cancellation,
        report: &mut RefCleanupReport,
    ) -> GcResult<()> {
        let cutoff = Utc::now() - self.config.record_expiry;
        let mut stream = self.records.old_records(ns, cutoff).await?;

        while let Some(next) = stream.next().await {
            if cancel.is_cancelled() {
                debug!(namespace = %ns, "reference cleanup cancelled");
                break;
            }
            let record = match next {
                Ok(record) => record,
                Err(err) => {
                    warn!(namespace = %ns, error = %err, "skipping unreadable record");
                    report.stats.failed += 1;
                    continue;
                }
            };
            report.stats.scanned += 1;

            let key = record.key.clone();
            let (deleted, tombstoned) = tokio::join!(
                self.records.delete(ns, &key),
                self.log.insert_remove_event(ns, &key),
            );

            let mut ok = true;
            if let Err(err) = &deleted {
                warn!(namespace = %ns, key = %key, error = %err, "record delete failed");
                ok = false;
            }
            if let Err(err) = &tombstoned {
                warn!(namespace = %ns, key = %key, error = %err, "tombstone append failed");
                ok = false;
            }

            if ok {
                report.stats.removed += 1;
                report.removed.push((ns.clone(), key));
            } else {
                report.stats.failed += 1;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use depot_store::{
        LogPointer, MemoryRecordStore, MemoryTransactionLog, ObjectRecord, StoreError,
        StoreResult, TransactionEvent,
    };
    use depot_types::{BlobId, BucketId, KeyId};
    use futures::stream::BoxStream;
    use std::collections::HashSet;

    fn ns(name: &str) -> NamespaceId {
        NamespaceId::new(name).unwrap()
    }

    fn record_key(name: &str) -> RecordKey {
        RecordKey::new(BucketId::new("b").unwrap(), KeyId::new(name).unwrap())
    }

    fn record(name: &str) -> ObjectRecord {
        ObjectRecord::uploading(
            record_key(name),
            BlobId::from_bytes(name.as_bytes()),
            None,
            Utc::now(),
        )
    }

    async fn seed_expired(records: &MemoryRecordStore, namespace: &NamespaceId, name: &str) {
        let rec = record(name);
        let key = rec.key.clone();
        records.put(namespace, rec).await.unwrap();
        records.set_last_access(namespace, &key, Utc::now() - Duration::days(30));
    }

    fn cleanup(
        records: Arc<dyn RecordStore>,
        log: Arc<MemoryTransactionLog>,
    ) -> RefCleanup {
        RefCleanup::new(
            records,
            log as Arc<dyn TransactionLog>,
            RefCleanupConfig::default(),
        )
    }

    #[tokio::test]
    async fn expired_records_are_removed_with_tombstones() {
        let records = Arc::new(MemoryRecordStore::new());
        let log = Arc::new(MemoryTransactionLog::new());
        let namespace = ns("test");
        seed_expired(&records, &namespace, "old").await;
        records.put(&namespace, record("fresh")).await.unwrap();

        let task = cleanup(Arc::clone(&records) as Arc<dyn RecordStore>, Arc::clone(&log));
        let report = task.run(&Cancellation::new()).await.unwrap();

        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.removed[0].1, record_key("old"));
        assert!(records.get(&namespace, &record_key("old")).await.unwrap().is_none());
        assert!(records.get(&namespace, &record_key("fresh")).await.unwrap().is_some());

        let stream = log.read_events(&namespace, LogPointer::START).await.unwrap();
        let events: Vec<TransactionEvent> = stream
            .events
            .map(|e| e.unwrap().event)
            .collect::<Vec<_>>()
            .await;
        assert!(matches!(
            events.as_slice(),
            [TransactionEvent::Remove { key }] if key == &record_key("old")
        ));
    }

    #[tokio::test]
    async fn second_run_with_nothing_expired_removes_nothing() {
        let records = Arc::new(MemoryRecordStore::new());
        let log = Arc::new(MemoryTransactionLog::new());
        let namespace = ns("test");
        seed_expired(&records, &namespace, "old").await;

        let task = cleanup(Arc::clone(&records) as Arc<dyn RecordStore>, Arc::clone(&log));
        let first = task.run(&Cancellation::new()).await.unwrap();
        assert_eq!(first.removed.len(), 1);

        let second = task.run(&Cancellation::new()).await.unwrap();
        assert!(second.removed.is_empty());
        assert_eq!(second.stats.removed, 0);
        assert_eq!(log.event_count(&namespace), 1);
    }

    #[tokio::test]
    async fn cleanup_spans_all_namespaces() {
        let records = Arc::new(MemoryRecordStore::new());
        let log = Arc::new(MemoryTransactionLog::new());
        seed_expired(&records, &ns("a"), "one").await;
        seed_expired(&records, &ns("b"), "two").await;

        let task = cleanup(Arc::clone(&records) as Arc<dyn RecordStore>, log);
        let report = task.run(&Cancellation::new()).await.unwrap();

        let touched: HashSet<NamespaceId> =
            report.removed.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(touched, HashSet::from([ns("a"), ns("b")]));
    }

    #[tokio::test]
    async fn cancelled_run_deletes_nothing() {
        let records = Arc::new(MemoryRecordStore::new());
        let log = Arc::new(MemoryTransactionLog::new());
        let namespace = ns("test");
        seed_expired(&records, &namespace, "old").await;

        let cancel = Cancellation::new();
        cancel.cancel();
        let task = cleanup(Arc::clone(&records) as Arc<dyn RecordStore>, log);
        let report = task.run(&cancel).await.unwrap();

        assert!(report.removed.is_empty());
        assert!(records.get(&namespace, &record_key("old")).await.unwrap().is_some());
    }

    // -----------------------------------------------------------------------
    // Per-record failure tolerance
    // -----------------------------------------------------------------------

    /// Record store whose `delete` fails for chosen keys.
    struct FlakyDeleteStore {
        inner: Arc<MemoryRecordStore>,
        failing: HashSet<RecordKey>,
    }

    #[async_trait]
    impl RecordStore for FlakyDeleteStore {
        async fn get(&self, ns: &NamespaceId, key: &RecordKey) -> StoreResult<Option<ObjectRecord>> {
            self.inner.get(ns, key).await
        }
        async fn put(&self, ns: &NamespaceId, record: ObjectRecord) -> StoreResult<()> {
            self.inner.put(ns, record).await
        }
        async fn finalize(&self, ns: &NamespaceId, key: &RecordKey) -> StoreResult<bool> {
            self.inner.finalize(ns, key).await
        }
        async fn touch(
            &self,
            ns: &NamespaceId,
            key: &RecordKey,
            at: DateTime<Utc>,
        ) -> StoreResult<bool> {
            self.inner.touch(ns, key, at).await
        }
        async fn delete(&self, ns: &NamespaceId, key: &RecordKey) -> StoreResult<bool> {
            if self.failing.contains(key) {
                return Err(StoreError::Backend("injected delete failure".into()));
            }
            self.inner.delete(ns, key).await
        }
        async fn delete_bucket(&self, ns: &NamespaceId, bucket: &BucketId) -> StoreResult<u64> {
            self.inner.delete_bucket(ns, bucket).await
        }
        async fn drop_namespace(&self, ns: &NamespaceId) -> StoreResult<u64> {
            self.inner.drop_namespace(ns).await
        }
        async fn namespaces(&self) -> StoreResult<Vec<NamespaceId>> {
            self.inner.namespaces().await
        }
        async fn old_records(
            &self,
            ns: &NamespaceId,
            cutoff: DateTime<Utc>,
        ) -> StoreResult<BoxStream<'static, StoreResult<ObjectRecord>>> {
            self.inner.old_records(ns, cutoff).await
        }
    }

    #[tokio::test]
    async fn one_failing_record_does_not_abort_the_scan() {
        let inner = Arc::new(MemoryRecordStore::new());
        let log = Arc::new(MemoryTransactionLog::new());
        let namespace = ns("test");
        seed_expired(&inner, &namespace, "aa-fails").await;
        seed_expired(&inner, &namespace, "bb-succeeds").await;

        let flaky = Arc::new(FlakyDeleteStore {
            inner: Arc::clone(&inner),
            failing: HashSet::from([record_key("aa-fails")]),
        });

        let task = cleanup(flaky as Arc<dyn RecordStore>, log);
        let report = task.run(&Cancellation::new()).await.unwrap();

        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.removed, vec![(namespace.clone(), record_key("bb-succeeds"))]);
        // The failed record is still there for the next cycle.
        assert!(inner.get(&namespace, &record_key("aa-fails")).await.unwrap().is_some());
    }
}
