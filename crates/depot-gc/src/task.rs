use std::time::Duration;

use async_trait::async_trait;

use crate::cancel::Cancellation;
use crate::error::GcResult;

/// Counters a cleanup run reports for logging and metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Items examined.
    pub scanned: u64,
    /// Items deleted everywhere they were attempted.
    pub removed: u64,
    /// Items skipped as live, in-grace, or not provably safe.
    pub skipped: u64,
    /// Items whose deletion or safety check failed.
    pub failed: u64,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

impl CleanupStats {
    /// Fold another run's counters into this one.
    pub fn merge(&mut self, other: &CleanupStats) {
        self.scanned += other.scanned;
        self.removed += other.removed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.elapsed += other.elapsed;
    }
}

/// An orphan-blob cleanup strategy.
///
/// Strategies are independent implementations of the same capability; the
/// orchestrator iterates a configured list of them, so deployments can
/// enable either or both without an inheritance hierarchy.
#[async_trait]
pub trait BlobCleanupTask: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Execute one full cleanup cycle. Implementations must check `cancel`
    /// between items and bias toward under-deletion on any failure.
    async fn run(&self, cancel: &Cancellation) -> GcResult<CleanupStats>;
}
