//! Release lifecycle orchestration.
//!
//! ## Deploy path (install, upgrade, rollback, scale)
//!
//! 1. Read the latest record; its revision is the base for the append.
//! 2. Check the lifecycle transition for the requested action.
//! 3. Validate the desired spec.
//! 4. Read live state (install starts from an empty one) and reconcile.
//! 5. Apply each operation in plan order, each bounded by `apply_timeout`.
//! 6. Append the outcome record on top of the base revision.
//!
//! A failing operation stops the plan. Operations already applied stay
//! applied; a Failed record is appended and the caller decides whether to
//! roll back. The conditional append in step 6 is the only serialization
//! between concurrent callers of the same release.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use keel_cluster::{OrchestrationClient, OrchestrationError};
use keel_core::{
    ComponentName, FailureInfo, KeelConfig, LiveState, Operation, ReleaseName, ReleaseRecord,
    ReleaseSpec, ReleaseStatus, Revision,
};
use keel_store::{StateStore, StoreError};
use serde::Serialize;

use crate::diff::{spec_diff, ReleaseDiff};
use crate::error::ReleaseError;
use crate::phase::{Action, ReleasePhase};
use crate::reconcile::Plan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Upper bound for one `apply` call; on expiry the outcome is unknown.
    pub apply_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            apply_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&KeelConfig> for ManagerConfig {
    fn from(config: &KeelConfig) -> Self {
        Self {
            apply_timeout: config.apply_timeout(),
        }
    }
}

/// Snapshot returned by [`ReleaseManager::status`].
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseStatusReport {
    pub phase: ReleasePhase,
    pub record: ReleaseRecord,
    pub live: LiveState,
    /// What it would take to bring the cluster back to the recorded spec.
    pub drift: Plan,
}

impl ReleaseStatusReport {
    pub fn is_converged(&self) -> bool {
        self.drift.is_empty() && self.live.components.iter().all(|c| c.is_ready())
    }
}

/// In-flight phases of releases currently being worked on by this manager.
#[derive(Debug, Default)]
struct InFlight {
    phases: Mutex<HashMap<ReleaseName, (ReleasePhase, usize)>>,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashMap<ReleaseName, (ReleasePhase, usize)>> {
        self.phases.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get(&self, release: &ReleaseName) -> Option<ReleasePhase> {
        self.lock().get(release).map(|(phase, _)| *phase)
    }

    fn enter(&self, release: &ReleaseName, phase: ReleasePhase) -> InFlightGuard<'_> {
        let mut phases = self.lock();
        let entry = phases.entry(release.clone()).or_insert((phase, 0));
        entry.0 = phase;
        entry.1 += 1;
        InFlightGuard {
            in_flight: self,
            release: release.clone(),
        }
    }
}

struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    release: ReleaseName,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut phases = self.in_flight.lock();
        if let Some(entry) = phases.get_mut(&self.release) {
            entry.1 -= 1;
            if entry.1 == 0 {
                phases.remove(&self.release);
            }
        }
    }
}

/// Public entry point: install, upgrade, rollback and scale releases.
///
/// Cheap to share behind an `Arc`; calls for different releases run fully in
/// parallel.
pub struct ReleaseManager<S, C> {
    store: Arc<S>,
    cluster: Arc<C>,
    config: ManagerConfig,
    in_flight: InFlight,
}

impl<S, C> ReleaseManager<S, C>
where
    S: StateStore,
    C: OrchestrationClient,
{
    pub fn new(store: Arc<S>, cluster: Arc<C>, config: ManagerConfig) -> Self {
        Self {
            store,
            cluster,
            config,
            in_flight: InFlight::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Current lifecycle phase: in-flight if this manager is working on the
    /// release, otherwise derived from the latest record.
    pub fn phase(&self, release: &ReleaseName) -> Result<ReleasePhase, ReleaseError> {
        if let Some(phase) = self.in_flight.get(release) {
            return Ok(phase);
        }
        Ok(ReleasePhase::from_record(self.latest(release)?.as_ref()))
    }

    /// Create a release that does not exist yet.
    pub async fn install(&self, spec: ReleaseSpec) -> Result<ReleaseRecord, ReleaseError> {
        let base = self.latest(&spec.name)?;
        self.deploy(spec, Action::Install, base, "Install complete".to_string())
            .await
    }

    /// Move an existing release to a new desired spec.
    pub async fn upgrade(&self, spec: ReleaseSpec) -> Result<ReleaseRecord, ReleaseError> {
        let base = self.latest(&spec.name)?;
        self.deploy(spec, Action::Upgrade, base, "Upgrade complete".to_string())
            .await
    }

    /// Re-deploy the spec recorded at `target`. History is never rewound:
    /// the result is a new RolledBack revision.
    pub async fn rollback(
        &self,
        release: &ReleaseName,
        target: Revision,
    ) -> Result<ReleaseRecord, ReleaseError> {
        let base = self.latest(release)?;
        if base.is_none() {
            return Err(ReleaseError::ReleaseNotFound {
                release: release.clone(),
            });
        }
        let spec = self.store.revision(release, target)?.spec;
        self.deploy(spec, Action::Rollback, base, format!("Rollback to {target}"))
            .await
    }

    /// Change one component's replica count, leaving everything else as
    /// recorded in the latest revision.
    pub async fn scale(
        &self,
        release: &ReleaseName,
        component: &ComponentName,
        replicas: u32,
    ) -> Result<ReleaseRecord, ReleaseError> {
        let current = self.store.current(release)?;
        let spec = current.spec.with_replicas(component, replicas).ok_or_else(|| {
            ReleaseError::ComponentNotFound {
                release: release.clone(),
                component: component.clone(),
            }
        })?;
        self.deploy(
            spec,
            Action::Scale,
            Some(current),
            format!("Scaled {component} to {replicas}"),
        )
        .await
    }

    /// Dry run: the operations an upgrade (or install) to `spec` would apply.
    pub async fn plan(&self, spec: &ReleaseSpec) -> Result<Plan, ReleaseError> {
        spec.validate()?;
        let live = self.read_live_state(&spec.name).await?;
        let plan = Plan::compute(spec, &live);
        tracing::debug!(release = %spec.name, operations = plan.len(), "computed plan");
        Ok(plan)
    }

    /// Plan plus a unified diff of the latest recorded spec against `spec`.
    pub async fn diff(&self, spec: &ReleaseSpec) -> Result<ReleaseDiff, ReleaseError> {
        let plan = self.plan(spec).await?;
        let base = self.latest(&spec.name)?;
        let unified_diff = spec_diff(base.as_ref(), spec)?;
        Ok(ReleaseDiff {
            base_revision: base.map(|r| r.revision),
            plan,
            unified_diff,
        })
    }

    pub async fn status(&self, release: &ReleaseName) -> Result<ReleaseStatusReport, ReleaseError> {
        let record = self.store.current(release)?;
        let live = self.read_live_state(release).await?;
        let drift = Plan::compute(&record.spec, &live);
        Ok(ReleaseStatusReport {
            phase: self.phase(release)?,
            record,
            live,
            drift,
        })
    }

    /// Records of `release`, most recent first.
    pub fn history(
        &self,
        release: &ReleaseName,
        limit: Option<usize>,
    ) -> Result<Vec<ReleaseRecord>, ReleaseError> {
        // Existence comes from the latest record; a limit of 0 is still an
        // existing release with nothing to show.
        self.store.current(release)?;
        Ok(self.store.history(release, limit)?)
    }

    // -----------------------------------------------------------------------
    // Deploy path
    // -----------------------------------------------------------------------

    async fn deploy(
        &self,
        spec: ReleaseSpec,
        action: Action,
        base: Option<ReleaseRecord>,
        description: String,
    ) -> Result<ReleaseRecord, ReleaseError> {
        let release = spec.name.clone();
        let in_flight = ReleasePhase::from_record(base.as_ref()).begin(&release, action)?;
        spec.validate()?;

        let _guard = self.in_flight.enter(&release, in_flight);
        let base_revision = base.as_ref().map(|r| r.revision);
        tracing::info!(release = %release, %action, base = ?base_revision.map(|r| r.0), "starting");

        let live = match action {
            Action::Install => LiveState::empty(release.clone()),
            _ => self.read_live_state(&release).await?,
        };
        let plan = Plan::compute(&spec, &live);
        tracing::debug!(release = %release, "plan:\n{plan}");

        for op in &plan.operations {
            if let Err(source) = self.apply(&release, op).await {
                return Err(self.record_failure(spec, action, base_revision, op, source));
            }
        }

        let status = match action {
            Action::Rollback => ReleaseStatus::RolledBack,
            _ => ReleaseStatus::Applied,
        };
        let mut record = ReleaseRecord::new(spec, claim(base_revision), status, description);
        record.revision = self.store.append(record.clone(), base_revision)?;
        tracing::info!(
            release = %release,
            revision = %record.revision,
            phase = %in_flight.finish(true),
            operations = plan.len(),
            "{}",
            record.description
        );
        Ok(record)
    }

    async fn apply(&self, release: &ReleaseName, op: &Operation) -> Result<(), OrchestrationError> {
        let after = self.config.apply_timeout;
        match tokio::time::timeout(after, self.cluster.apply(release, op)).await {
            Ok(Ok(())) => {
                tracing::info!(release = %release, component = %op.target(), "applied {op}");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => Err(OrchestrationError::Timeout { after }),
        }
    }

    /// Append a Failed record for a plan that stopped at `op` and build the
    /// error reported to the caller.
    fn record_failure(
        &self,
        spec: ReleaseSpec,
        action: Action,
        base_revision: Option<Revision>,
        op: &Operation,
        source: OrchestrationError,
    ) -> ReleaseError {
        let release = spec.name.clone();
        let failure = FailureInfo {
            operation: op.to_string(),
            component: op.target().clone(),
            error: source.to_string(),
        };
        let description = format!("{} failed: {}", capitalize(action), source);
        let record = ReleaseRecord::new(
            spec,
            claim(base_revision),
            ReleaseStatus::Failed,
            description,
        )
        .with_failure(failure);

        let revision = match self.store.append(record, base_revision) {
            Ok(revision) => Some(revision),
            Err(e) => {
                tracing::warn!(release = %release, "could not record failure: {e}");
                None
            }
        };
        tracing::warn!(
            release = %release,
            revision = ?revision.map(|r| r.0),
            component = %op.target(),
            "{action} failed at `{op}`: {source}"
        );

        ReleaseError::Orchestration {
            release,
            revision,
            operation: op.clone(),
            component: op.target().clone(),
            source,
        }
    }

    async fn read_live_state(&self, release: &ReleaseName) -> Result<LiveState, ReleaseError> {
        self.cluster
            .read_live_state(release)
            .await
            .map_err(|source| ReleaseError::LiveState {
                release: release.clone(),
                source,
            })
    }

    fn latest(&self, release: &ReleaseName) -> Result<Option<ReleaseRecord>, ReleaseError> {
        match self.store.current(release) {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn claim(base: Option<Revision>) -> Revision {
    base.map_or(Revision::FIRST, Revision::next)
}

fn capitalize(action: Action) -> String {
    let text = action.to_string();
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => text,
    }
}
