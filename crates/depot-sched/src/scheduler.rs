use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use depot_gc::Cancellation;

/// What a single scheduler tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick's work ran to completion (per-item failures are handled and
    /// logged inside the task).
    Completed,
    /// The task's start predicate returned false this tick.
    SkippedDisabled,
    /// This instance does not hold cluster leadership.
    SkippedNotLeader,
    /// A previous tick of the same task is still in flight.
    SkippedAlreadyRunning,
    /// The tick's work started but failed outright. Details are logged by
    /// the task; the next tick retries from scratch.
    Failed,
}

/// A task driven by the [`PollingScheduler`].
#[async_trait]
pub trait PolledTask: Send + Sync {
    /// Task name for logs.
    fn name(&self) -> &'static str;

    /// Start predicate, re-evaluated at every tick.
    fn enabled(&self) -> bool;

    /// One tick's work. The scheduler guarantees no two invocations of the
    /// same task overlap.
    async fn tick(&self, cancel: &Cancellation) -> TickOutcome;
}

/// Periodic runner with a reentrancy guard.
///
/// State is Idle → Running → Idle per tick; a tick arriving while the flag
/// is set returns [`TickOutcome::SkippedAlreadyRunning`] without error. The
/// guard makes in-process locks unnecessary in the tasks themselves.
pub struct PollingScheduler {
    task: Arc<dyn PolledTask>,
    interval: Duration,
    running: AtomicBool,
}

impl PollingScheduler {
    pub fn new(task: Arc<dyn PolledTask>, interval: Duration) -> Self {
        Self {
            task,
            interval,
            running: AtomicBool::new(false),
        }
    }

    /// The configured poll interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Execute one tick now. Exposed for tests and manual triggering; the
    /// reentrancy guard applies here exactly as it does to timed ticks.
    pub async fn tick(&self, cancel: &Cancellation) -> TickOutcome {
        if !self.task.enabled() {
            debug!(task = self.task.name(), "disabled, skipping tick");
            return TickOutcome::SkippedDisabled;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(task = self.task.name(), "previous tick still running");
            return TickOutcome::SkippedAlreadyRunning;
        }

        let outcome = self.task.tick(cancel).await;
        self.running.store(false, Ordering::SeqCst);
        debug!(task = self.task.name(), ?outcome, "tick finished");
        outcome
    }

    /// Spawn the timed loop. Runs until `cancel` fires; the task also
    /// receives the signal so an in-flight scan can stop early.
    pub fn spawn(self: Arc<Self>, cancel: Cancellation) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick fires immediately; consume it so the
            // first run happens one full interval after startup.
            timer.tick().await;
            loop {
                timer.tick().await;
                if cancel.is_cancelled() {
                    debug!(task = self.task.name(), "scheduler stopped");
                    break;
                }
                self.tick(&cancel).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    struct CountingTask {
        enabled: AtomicBool,
        runs: AtomicUsize,
    }

    impl CountingTask {
        fn new(enabled: bool) -> Self {
            Self {
                enabled: AtomicBool::new(enabled),
                runs: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PolledTask for CountingTask {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
        async fn tick(&self, _cancel: &Cancellation) -> TickOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            TickOutcome::Completed
        }
    }

    #[tokio::test]
    async fn tick_runs_enabled_task() {
        let task = Arc::new(CountingTask::new(true));
        let scheduler = PollingScheduler::new(
            Arc::clone(&task) as Arc<dyn PolledTask>,
            Duration::from_secs(60),
        );

        assert_eq!(
            scheduler.tick(&Cancellation::new()).await,
            TickOutcome::Completed
        );
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_task_is_skipped_and_predicate_is_reevaluated() {
        let task = Arc::new(CountingTask::new(false));
        let scheduler = PollingScheduler::new(
            Arc::clone(&task) as Arc<dyn PolledTask>,
            Duration::from_secs(60),
        );

        assert_eq!(
            scheduler.tick(&Cancellation::new()).await,
            TickOutcome::SkippedDisabled
        );
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);

        task.enabled.store(true, Ordering::SeqCst);
        assert_eq!(
            scheduler.tick(&Cancellation::new()).await,
            TickOutcome::Completed
        );
    }

    /// Task that blocks inside `tick` until released, to hold the
    /// reentrancy flag open.
    struct BlockingTask {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PolledTask for BlockingTask {
        fn name(&self) -> &'static str {
            "blocking"
        }
        fn enabled(&self) -> bool {
            true
        }
        async fn tick(&self, _cancel: &Cancellation) -> TickOutcome {
            self.entered.notify_one();
            self.release.notified().await;
            TickOutcome::Completed
        }
    }

    #[tokio::test]
    async fn overlapping_tick_returns_immediately() {
        let task = Arc::new(BlockingTask {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let scheduler = Arc::new(PollingScheduler::new(
            Arc::clone(&task) as Arc<dyn PolledTask>,
            Duration::from_secs(60),
        ));

        let first = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.tick(&Cancellation::new()).await })
        };
        // Wait until the first tick is inside the task body.
        task.entered.notified().await;

        assert_eq!(
            scheduler.tick(&Cancellation::new()).await,
            TickOutcome::SkippedAlreadyRunning
        );

        task.release.notify_one();
        assert_eq!(first.await.unwrap(), TickOutcome::Completed);

        // Guard is clear again after the first tick finished.
        let second = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.tick(&Cancellation::new()).await })
        };
        task.entered.notified().await;
        task.release.notify_one();
        assert_eq!(second.await.unwrap(), TickOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_ticks_on_the_interval() {
        let task = Arc::new(CountingTask::new(true));
        let scheduler = Arc::new(PollingScheduler::new(
            Arc::clone(&task) as Arc<dyn PolledTask>,
            Duration::from_secs(10),
        ));

        let cancel = Cancellation::new();
        let handle = Arc::clone(&scheduler).spawn(cancel.clone());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);

        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.await.unwrap();
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
    }
}
