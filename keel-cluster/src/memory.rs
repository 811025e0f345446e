//! In-memory [`OrchestrationClient`] with fault injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use keel_core::{ComponentName, LiveState, Operation, OperationKind, ReleaseName};

use crate::{OrchestrationClient, OrchestrationError};

#[derive(Debug, Clone)]
struct Fault {
    component: ComponentName,
    kind: Option<OperationKind>,
    reason: String,
}

impl Fault {
    fn matches(&self, op: &Operation) -> bool {
        op.target() == &self.component && self.kind.map_or(true, |k| k == op.kind())
    }
}

/// A fake cluster that keeps live state in memory.
///
/// Every successful `apply` is appended to an ordered log, see
/// [`MemoryCluster::applied`].
#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: Mutex<HashMap<ReleaseName, LiveState>>,
    faults: Mutex<Vec<Fault>>,
    applied: Mutex<Vec<(ReleaseName, Operation)>>,
    latency: Option<Duration>,
    unreachable: AtomicBool,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `apply` by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Reject operations targeting `component`; `kind = None` rejects all of them.
    pub fn fail_on(&self, component: impl Into<ComponentName>, kind: Option<OperationKind>) {
        let component = component.into();
        lock(&self.faults).push(Fault {
            reason: format!("injected failure for {component}"),
            component,
            kind,
        });
    }

    /// While unreachable, every call fails with `Unavailable`.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), OrchestrationError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(OrchestrationError::Unavailable(
                "memory cluster is unreachable".to_string(),
            ));
        }
        Ok(())
    }

    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    /// Replace the live state of a release, e.g. to simulate out-of-band drift.
    pub fn set_live_state(&self, state: LiveState) {
        lock(&self.state).insert(state.release.clone(), state);
    }

    /// Every operation applied so far, in order.
    pub fn applied(&self) -> Vec<(ReleaseName, Operation)> {
        lock(&self.applied).clone()
    }

    /// Operations applied to `release` so far, in order.
    pub fn applied_to(&self, release: &ReleaseName) -> Vec<Operation> {
        lock(&self.applied)
            .iter()
            .filter(|(name, _)| name == release)
            .map(|(_, op)| op.clone())
            .collect()
    }

    pub fn clear_log(&self) {
        lock(&self.applied).clear();
    }
}

#[async_trait]
impl OrchestrationClient for MemoryCluster {
    async fn apply(&self, release: &ReleaseName, op: &Operation) -> Result<(), OrchestrationError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.check_reachable()?;

        if let Some(fault) = lock(&self.faults).iter().find(|f| f.matches(op)) {
            return Err(OrchestrationError::Rejected {
                component: fault.component.0.clone(),
                reason: fault.reason.clone(),
            });
        }

        {
            let mut state = lock(&self.state);
            let live = state
                .entry(release.clone())
                .or_insert_with(|| LiveState::empty(release.clone()));
            live.apply(op)?;
        }
        lock(&self.applied).push((release.clone(), op.clone()));
        tracing::trace!(release = %release, op = %op, "memory cluster applied");
        Ok(())
    }

    async fn read_live_state(&self, release: &ReleaseName) -> Result<LiveState, OrchestrationError> {
        self.check_reachable()?;
        Ok(lock(&self.state)
            .get(release)
            .cloned()
            .unwrap_or_else(|| LiveState::empty(release.clone())))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use keel_core::ComponentSpec;

    use super::*;

    fn create(name: &str) -> Operation {
        Operation::CreateComponent {
            component: ComponentSpec::new(name, format!("{name}:1"), 1),
        }
    }

    #[tokio::test]
    async fn apply_records_log_and_state() {
        let cluster = MemoryCluster::new();
        let release = ReleaseName::from("webapp");
        cluster.apply(&release, &create("backend")).await.unwrap();
        cluster.apply(&release, &create("frontend")).await.unwrap();

        let live = cluster.read_live_state(&release).await.unwrap();
        let names: Vec<_> = live.components.iter().map(|c| c.name.0.as_str()).collect();
        assert_eq!(names, ["backend", "frontend"]);
        assert_eq!(cluster.applied_to(&release).len(), 2);
    }

    #[tokio::test]
    async fn injected_fault_rejects_matching_kind_only() {
        let cluster = MemoryCluster::new();
        let release = ReleaseName::from("webapp");
        cluster.fail_on("backend", Some(OperationKind::Scale));

        cluster.apply(&release, &create("backend")).await.unwrap();
        let err = cluster
            .apply(
                &release,
                &Operation::ScaleReplicas {
                    component: ComponentName::from("backend"),
                    replicas: 3,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Rejected { .. }));
        assert_eq!(cluster.applied().len(), 1, "rejected ops are not logged");

        cluster.clear_faults();
        cluster
            .apply(
                &release,
                &Operation::ScaleReplicas {
                    component: ComponentName::from("backend"),
                    replicas: 3,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_release_reads_empty() {
        let cluster = MemoryCluster::new();
        let live = cluster
            .read_live_state(&ReleaseName::from("nothing"))
            .await
            .unwrap();
        assert!(live.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_apply() {
        let cluster = MemoryCluster::new().with_latency(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        cluster
            .apply(&ReleaseName::from("webapp"), &create("db"))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
