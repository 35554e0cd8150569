use std::future::Future;
use std::sync::Arc;

use tracing::info;

use depot_store::LeaderElection;

/// The result of leader-gated work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gated<T> {
    /// This instance held leadership; the work ran.
    Executed(T),
    /// This instance is not the leader; the work was skipped entirely.
    SkippedNotLeader,
}

impl<T> Gated<T> {
    /// Returns `true` if the work actually ran.
    pub fn executed(&self) -> bool {
        matches!(self, Gated::Executed(_))
    }
}

/// Guards destructive cluster-wide operations behind leadership.
///
/// Leadership is queried fresh for every execution; the gate holds no state
/// of its own beyond the election collaborator.
pub struct LeaderGate {
    election: Arc<dyn LeaderElection>,
}

impl LeaderGate {
    pub fn new(election: Arc<dyn LeaderElection>) -> Self {
        Self { election }
    }

    /// Run `work` only if this instance currently holds leadership.
    pub async fn execute<T, F, Fut>(&self, label: &str, work: F) -> Gated<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.election.is_leader() {
            info!(task = label, "not the cluster leader, skipping");
            return Gated::SkippedNotLeader;
        }
        Gated::Executed(work().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_store::StaticLeader;

    #[tokio::test]
    async fn gate_skips_work_without_leadership() {
        let election = Arc::new(StaticLeader::new(false));
        let gate = LeaderGate::new(Arc::clone(&election) as Arc<dyn LeaderElection>);

        let outcome = gate.execute("test", || async { 42 }).await;
        assert_eq!(outcome, Gated::SkippedNotLeader);
        assert!(!outcome.executed());
    }

    #[tokio::test]
    async fn gate_runs_work_when_leader() {
        let election = Arc::new(StaticLeader::new(true));
        let gate = LeaderGate::new(election as Arc<dyn LeaderElection>);

        let outcome = gate.execute("test", || async { 42 }).await;
        assert_eq!(outcome, Gated::Executed(42));
    }

    #[tokio::test]
    async fn leadership_is_reevaluated_per_execution() {
        let election = Arc::new(StaticLeader::new(true));
        let gate = LeaderGate::new(Arc::clone(&election) as Arc<dyn LeaderElection>);

        assert!(gate.execute("test", || async {}).await.executed());
        election.set(false);
        assert!(!gate.execute("test", || async {}).await.executed());
    }
}
