use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use depot_gc::{BlobCleanupTask, Cancellation, CleanupStats, RefCleanup};

use crate::gate::{Gated, LeaderGate};
use crate::scheduler::{PolledTask, TickOutcome};

/// Shared knobs for a polled cleanup service.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Fixed poll interval.
    pub interval: Duration,
    /// Live feature flag, re-read at every tick so operators can disable a
    /// service without a restart.
    pub enabled: Arc<AtomicBool>,
}

impl ServiceConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

// ---------------------------------------------------------------------------
// RefCleanupService
// ---------------------------------------------------------------------------

/// Drives [`RefCleanup`] under the leader gate.
pub struct RefCleanupService {
    gate: Arc<LeaderGate>,
    cleanup: Arc<RefCleanup>,
    config: ServiceConfig,
}

impl RefCleanupService {
    pub fn new(gate: Arc<LeaderGate>, cleanup: Arc<RefCleanup>, config: ServiceConfig) -> Self {
        Self {
            gate,
            cleanup,
            config,
        }
    }

    /// The configured poll interval, for wiring into a scheduler.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}

#[async_trait]
impl PolledTask for RefCleanupService {
    fn name(&self) -> &'static str {
        "ref-cleanup"
    }

    fn enabled(&self) -> bool {
        self.config.enabled.load(Ordering::SeqCst)
    }

    async fn tick(&self, cancel: &Cancellation) -> TickOutcome {
        let gated = self
            .gate
            .execute(self.name(), || self.cleanup.run(cancel))
            .await;
        match gated {
            Gated::SkippedNotLeader => TickOutcome::SkippedNotLeader,
            Gated::Executed(Ok(report)) => {
                info!(removed = report.removed.len(), "reference cleanup tick done");
                TickOutcome::Completed
            }
            Gated::Executed(Err(err)) => {
                warn!(error = %err, "reference cleanup tick failed");
                TickOutcome::Failed
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BlobCleanupService
// ---------------------------------------------------------------------------

/// Drives the configured orphan-blob strategies, in order, under the leader
/// gate.
///
/// Strategies are peers behind [`BlobCleanupTask`]; a deployment enables
/// whichever set fits it (log replay, back-index, or both).
pub struct BlobCleanupService {
    gate: Arc<LeaderGate>,
    strategies: Vec<Arc<dyn BlobCleanupTask>>,
    config: ServiceConfig,
}

impl BlobCleanupService {
    pub fn new(
        gate: Arc<LeaderGate>,
        strategies: Vec<Arc<dyn BlobCleanupTask>>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            gate,
            strategies,
            config,
        }
    }

    /// The configured poll interval, for wiring into a scheduler.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    async fn run_strategies(&self, cancel: &Cancellation) -> TickOutcome {
        let mut total = CleanupStats::default();
        let mut any_failed = false;

        for strategy in &self.strategies {
            if cancel.is_cancelled() {
                break;
            }
            match strategy.run(cancel).await {
                Ok(stats) => {
                    info!(
                        strategy = strategy.name(),
                        removed = stats.removed,
                        skipped = stats.skipped,
                        failed = stats.failed,
                        "blob cleanup strategy done"
                    );
                    total.merge(&stats);
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), error = %err, "blob cleanup strategy failed");
                    any_failed = true;
                }
            }
        }

        info!(removed = total.removed, "blob cleanup tick done");
        if any_failed {
            TickOutcome::Failed
        } else {
            TickOutcome::Completed
        }
    }
}

#[async_trait]
impl PolledTask for BlobCleanupService {
    fn name(&self) -> &'static str {
        "blob-cleanup"
    }

    fn enabled(&self) -> bool {
        self.config.enabled.load(Ordering::SeqCst)
    }

    async fn tick(&self, cancel: &Cancellation) -> TickOutcome {
        match self
            .gate
            .execute(self.name(), || self.run_strategies(cancel))
            .await
        {
            Gated::SkippedNotLeader => TickOutcome::SkippedNotLeader,
            Gated::Executed(outcome) => outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PollingScheduler;
    use chrono::{Duration as ChronoDuration, Utc};
    use depot_gc::{GcError, GcResult, RefCleanupConfig};
    use depot_store::{
        LeaderElection, MemoryRecordStore, MemoryTransactionLog, ObjectRecord, RecordStore,
        StaticLeader, TransactionLog,
    };
    use depot_types::{BlobId, BucketId, KeyId, NamespaceId, RecordKey};
    use std::sync::atomic::AtomicUsize;

    fn ns(name: &str) -> NamespaceId {
        NamespaceId::new(name).unwrap()
    }

    fn record_key(name: &str) -> RecordKey {
        RecordKey::new(BucketId::new("b").unwrap(), KeyId::new(name).unwrap())
    }

    struct Fixture {
        records: Arc<MemoryRecordStore>,
        log: Arc<MemoryTransactionLog>,
        election: Arc<StaticLeader>,
        service: RefCleanupService,
        ns: NamespaceId,
    }

    async fn fixture(leader: bool) -> Fixture {
        let records = Arc::new(MemoryRecordStore::new());
        let log = Arc::new(MemoryTransactionLog::new());
        let election = Arc::new(StaticLeader::new(leader));

        let namespace = ns("test");
        let rec = ObjectRecord::uploading(
            record_key("expired"),
            BlobId::from_bytes(b"x"),
            None,
            Utc::now(),
        );
        records.put(&namespace, rec).await.unwrap();
        records.set_last_access(
            &namespace,
            &record_key("expired"),
            Utc::now() - ChronoDuration::days(60),
        );

        let cleanup = Arc::new(RefCleanup::new(
            Arc::clone(&records) as Arc<dyn RecordStore>,
            Arc::clone(&log) as Arc<dyn TransactionLog>,
            RefCleanupConfig::default(),
        ));
        let gate = Arc::new(LeaderGate::new(
            Arc::clone(&election) as Arc<dyn LeaderElection>
        ));
        let service = RefCleanupService::new(gate, cleanup, ServiceConfig::default());

        Fixture {
            records,
            log,
            election,
            service,
            ns: namespace,
        }
    }

    // -----------------------------------------------------------------------
    // Leader gating
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn non_leader_tick_performs_zero_mutations() {
        let fx = fixture(false).await;

        let outcome = fx.service.tick(&Cancellation::new()).await;
        assert_eq!(outcome, TickOutcome::SkippedNotLeader);

        // Nothing was deleted, nothing was tombstoned.
        assert!(fx
            .records
            .get(&fx.ns, &record_key("expired"))
            .await
            .unwrap()
            .is_some());
        assert_eq!(fx.log.event_count(&fx.ns), 0);
    }

    #[tokio::test]
    async fn leader_tick_runs_the_cleanup() {
        let fx = fixture(true).await;

        let outcome = fx.service.tick(&Cancellation::new()).await;
        assert_eq!(outcome, TickOutcome::Completed);
        assert!(fx
            .records
            .get(&fx.ns, &record_key("expired"))
            .await
            .unwrap()
            .is_none());
        assert_eq!(fx.log.event_count(&fx.ns), 1);
    }

    #[tokio::test]
    async fn leadership_transition_takes_effect_next_tick() {
        let fx = fixture(false).await;
        assert_eq!(
            fx.service.tick(&Cancellation::new()).await,
            TickOutcome::SkippedNotLeader
        );

        fx.election.set(true);
        assert_eq!(
            fx.service.tick(&Cancellation::new()).await,
            TickOutcome::Completed
        );
    }

    #[tokio::test]
    async fn disabled_service_skips_via_scheduler() {
        let fx = fixture(true).await;
        fx.service.config.enabled.store(false, Ordering::SeqCst);

        let scheduler = PollingScheduler::new(
            Arc::new(fx.service) as Arc<dyn PolledTask>,
            Duration::from_secs(60),
        );
        assert_eq!(
            scheduler.tick(&Cancellation::new()).await,
            TickOutcome::SkippedDisabled
        );
    }

    // -----------------------------------------------------------------------
    // Strategy orchestration
    // -----------------------------------------------------------------------

    struct CountingStrategy {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl BlobCleanupTask for CountingStrategy {
        fn name(&self) -> &'static str {
            "counting"
        }
        async fn run(&self, _cancel: &Cancellation) -> GcResult<CleanupStats> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GcError::Store(depot_store::StoreError::Backend(
                    "injected".into(),
                )))
            } else {
                Ok(CleanupStats::default())
            }
        }
    }

    fn blob_service(
        leader: bool,
        strategies: Vec<Arc<dyn BlobCleanupTask>>,
    ) -> BlobCleanupService {
        let gate = Arc::new(LeaderGate::new(
            Arc::new(StaticLeader::new(leader)) as Arc<dyn LeaderElection>
        ));
        BlobCleanupService::new(gate, strategies, ServiceConfig::default())
    }

    #[tokio::test]
    async fn all_configured_strategies_run_in_order() {
        let first = Arc::new(CountingStrategy {
            runs: AtomicUsize::new(0),
            fail: false,
        });
        let second = Arc::new(CountingStrategy {
            runs: AtomicUsize::new(0),
            fail: false,
        });
        let service = blob_service(
            true,
            vec![
                Arc::clone(&first) as Arc<dyn BlobCleanupTask>,
                Arc::clone(&second) as Arc<dyn BlobCleanupTask>,
            ],
        );

        assert_eq!(service.tick(&Cancellation::new()).await, TickOutcome::Completed);
        assert_eq!(first.runs.load(Ordering::SeqCst), 1);
        assert_eq!(second.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_failing_strategy_does_not_stop_the_others() {
        let failing = Arc::new(CountingStrategy {
            runs: AtomicUsize::new(0),
            fail: true,
        });
        let healthy = Arc::new(CountingStrategy {
            runs: AtomicUsize::new(0),
            fail: false,
        });
        let service = blob_service(
            true,
            vec![
                Arc::clone(&failing) as Arc<dyn BlobCleanupTask>,
                Arc::clone(&healthy) as Arc<dyn BlobCleanupTask>,
            ],
        );

        assert_eq!(service.tick(&Cancellation::new()).await, TickOutcome::Failed);
        assert_eq!(failing.runs.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_leader_blob_tick_runs_no_strategy() {
        let strategy = Arc::new(CountingStrategy {
            runs: AtomicUsize::new(0),
            fail: false,
        });
        let service = blob_service(false, vec![Arc::clone(&strategy) as Arc<dyn BlobCleanupTask>]);

        assert_eq!(
            service.tick(&Cancellation::new()).await,
            TickOutcome::SkippedNotLeader
        );
        assert_eq!(strategy.runs.load(Ordering::SeqCst), 0);
    }
}
