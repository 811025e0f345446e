//! Desired-vs-live diff.
//!
//! Operations are emitted in five groups, each in a fixed order:
//!
//! 1. `CreateComponent`: desired but not live, declaration order.
//! 2. `UpdateImage`: image differs, declaration order.
//! 3. `UpdateConfig`: ports, env or exposure differ, declaration order.
//! 4. `ScaleReplicas`: replica count differs, declaration order. Always after
//!    the same component's image update so no stale-image instances are added.
//! 5. `DeleteComponent`: live but not desired, reverse live order, so
//!    dependencies declared first are removed last.
//!
//! Dependency graphs are not inferred: declaration order is the only
//! ordering signal.

use std::collections::BTreeMap;
use std::fmt;

use keel_core::{LiveState, Operation, OperationKind, ReleaseName, ReleaseSpec};
use serde::Serialize;

/// Operations that transform `live` into `desired` when applied in order.
///
/// Identical states yield an empty sequence.
pub fn reconcile(desired: &ReleaseSpec, live: &LiveState) -> Vec<Operation> {
    let mut creates = Vec::new();
    let mut images = Vec::new();
    let mut configs = Vec::new();
    let mut scales = Vec::new();

    for component in &desired.components {
        let Some(current) = live.get(&component.name) else {
            creates.push(Operation::CreateComponent {
                component: component.clone(),
            });
            continue;
        };

        if current.image != component.image {
            images.push(Operation::UpdateImage {
                component: component.name.clone(),
                image: component.image.clone(),
            });
        }
        if current.ports != component.ports
            || current.env != component.env
            || current.exposure != component.exposure
        {
            configs.push(Operation::UpdateConfig {
                component: component.name.clone(),
                ports: component.ports.clone(),
                env: component.env.clone(),
                exposure: component.exposure,
            });
        }
        if current.replicas != component.replicas {
            scales.push(Operation::ScaleReplicas {
                component: component.name.clone(),
                replicas: component.replicas,
            });
        }
    }

    let deletes = live
        .components
        .iter()
        .rev()
        .filter(|c| desired.component(&c.name).is_none())
        .map(|c| Operation::DeleteComponent {
            component: c.name.clone(),
        });

    creates
        .into_iter()
        .chain(images)
        .chain(configs)
        .chain(scales)
        .chain(deletes)
        .collect()
}

/// An ordered, not-yet-applied reconciliation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub release: ReleaseName,
    pub operations: Vec<Operation>,
}

impl Plan {
    pub fn compute(desired: &ReleaseSpec, live: &LiveState) -> Self {
        Self {
            release: desired.name.clone(),
            operations: reconcile(desired, live),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.operations.iter().filter(|op| op.kind() == kind).count()
    }

    /// Operation counts per kind, for summaries.
    pub fn summary(&self) -> BTreeMap<OperationKind, usize> {
        let mut counts = BTreeMap::new();
        for op in &self.operations {
            *counts.entry(op.kind()).or_insert(0) += 1;
        }
        counts
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "release '{}' is up to date", self.release);
        }
        writeln!(
            f,
            "release '{}': {} operation(s)",
            self.release,
            self.operations.len()
        )?;
        for (i, op) in self.operations.iter().enumerate() {
            writeln!(f, "  {:>2}. {op}", i + 1)?;
        }
        Ok(())
    }
}
