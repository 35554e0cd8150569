//! Scheduling for depot's background cleanup.
//!
//! [`PollingScheduler`] runs a [`PolledTask`] on a fixed interval with a
//! reentrancy guard: a tick that finds the previous tick still in flight
//! returns immediately without starting duplicate work. Each task exposes a
//! start predicate re-evaluated every tick.
//!
//! [`LeaderGate`] wraps the destructive tick bodies: when this instance is
//! not the elected cluster leader the work is skipped entirely, which keeps
//! at most one instance in the cluster running reference or blob cleanup at
//! a time. Leadership loss *during* a tick is not detected; an in-flight
//! tick finishes (deletions are individually idempotent) and the next tick's
//! gate check stops further scheduling.

pub mod gate;
pub mod scheduler;
pub mod services;

pub use gate::{Gated, LeaderGate};
pub use scheduler::{PolledTask, PollingScheduler, TickOutcome};
pub use services::{BlobCleanupService, RefCleanupService, ServiceConfig};
