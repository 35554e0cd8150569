use chrono::Duration;

use depot_types::NamespaceId;

/// Configuration for reference-record expiry cleanup.
#[derive(Clone, Debug)]
pub struct RefCleanupConfig {
    /// Records not accessed within this window are expired.
    pub record_expiry: Duration,
}

impl Default for RefCleanupConfig {
    fn default() -> Self {
        Self {
            record_expiry: Duration::days(14),
        }
    }
}

/// Configuration for the log-replay orphan-blob strategy.
#[derive(Clone, Debug)]
pub struct BlobCleanupConfig {
    /// Blobs modified within this window before the sweep start are never
    /// deleted, covering in-flight uploads whose Add event has not landed.
    /// Must be at least an hour.
    pub grace_window: Duration,
    /// Upper bound on concurrently marked namespaces. Each mark replays a
    /// full log; unbounded fan-out here multiplies into unbounded blob
    /// listing streams.
    pub mark_parallelism: usize,
}

impl Default for BlobCleanupConfig {
    fn default() -> Self {
        Self {
            grace_window: Duration::hours(1),
            mark_parallelism: 4,
        }
    }
}

/// Configuration for the back-index orphan-blob strategy.
#[derive(Clone, Debug)]
pub struct IndexCleanupConfig {
    /// Same meaning as [`BlobCleanupConfig::grace_window`].
    pub grace_window: Duration,
    /// Only namespaces on this allow-list are eligible; the strategy relies
    /// on the back-index being maintained for them.
    pub namespaces: Vec<NamespaceId>,
}

impl Default for IndexCleanupConfig {
    fn default() -> Self {
        Self {
            grace_window: Duration::hours(1),
            namespaces: Vec::new(),
        }
    }
}
