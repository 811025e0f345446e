//! Orchestration operations and the observed cluster state they act on.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UnknownComponent;
use crate::types::{ComponentName, ComponentSpec, Exposure, ReleaseName, ReleaseSpec};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// A single atomic orchestration action against one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateComponent {
        component: ComponentSpec,
    },
    UpdateImage {
        component: ComponentName,
        image: String,
    },
    /// Ports, env or exposure drifted from the desired spec.
    UpdateConfig {
        component: ComponentName,
        ports: Vec<u16>,
        env: BTreeMap<String, String>,
        exposure: Exposure,
    },
    ScaleReplicas {
        component: ComponentName,
        replicas: u32,
    },
    DeleteComponent {
        component: ComponentName,
    },
}

/// Discriminant of an [`Operation`], used for counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    UpdateImage,
    UpdateConfig,
    Scale,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::UpdateImage => write!(f, "update-image"),
            OperationKind::UpdateConfig => write!(f, "update-config"),
            OperationKind::Scale => write!(f, "scale"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

impl Operation {
    /// Name of the component this operation acts on.
    pub fn target(&self) -> &ComponentName {
        match self {
            Operation::CreateComponent { component } => &component.name,
            Operation::UpdateImage { component, .. }
            | Operation::UpdateConfig { component, .. }
            | Operation::ScaleReplicas { component, .. }
            | Operation::DeleteComponent { component } => component,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::CreateComponent { .. } => OperationKind::Create,
            Operation::UpdateImage { .. } => OperationKind::UpdateImage,
            Operation::UpdateConfig { .. } => OperationKind::UpdateConfig,
            Operation::ScaleReplicas { .. } => OperationKind::Scale,
            Operation::DeleteComponent { .. } => OperationKind::Delete,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateComponent { component } => write!(
                f,
                "create {} ({} × {})",
                component.name, component.image, component.replicas
            ),
            Operation::UpdateImage { component, image } => {
                write!(f, "update-image {component} → {image}")
            }
            Operation::UpdateConfig {
                component,
                ports,
                env,
                exposure,
            } => write!(
                f,
                "update-config {component} (ports {ports:?}, {} env, {exposure})",
                env.len()
            ),
            Operation::ScaleReplicas {
                component,
                replicas,
            } => write!(f, "scale {component} → {replicas}"),
            Operation::DeleteComponent { component } => write!(f, "delete {component}"),
        }
    }
}

// ---------------------------------------------------------------------------
// LiveState
// ---------------------------------------------------------------------------

/// What the cluster reports for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveComponent {
    pub name: ComponentName,
    pub image: String,
    pub replicas: u32,
    pub ready_replicas: u32,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub exposure: Exposure,
}

impl LiveComponent {
    pub fn is_ready(&self) -> bool {
        self.ready_replicas == self.replicas
    }

    fn from_spec(spec: &ComponentSpec) -> Self {
        Self {
            name: spec.name.clone(),
            image: spec.image.clone(),
            replicas: spec.replicas,
            ready_replicas: spec.replicas,
            ports: spec.ports.clone(),
            env: spec.env.clone(),
            exposure: spec.exposure,
        }
    }
}

/// The observed state of one release, components in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveState {
    pub release: ReleaseName,
    #[serde(default)]
    pub components: Vec<LiveComponent>,
}

impl LiveState {
    pub fn empty(release: ReleaseName) -> Self {
        Self {
            release,
            components: vec![],
        }
    }

    /// The state a fully converged cluster reports for `spec`.
    pub fn from_spec(spec: &ReleaseSpec) -> Self {
        Self {
            release: spec.name.clone(),
            components: spec.components.iter().map(LiveComponent::from_spec).collect(),
        }
    }

    pub fn get(&self, name: &ComponentName) -> Option<&LiveComponent> {
        self.components.iter().find(|c| &c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Apply `op` with upsert semantics.
    ///
    /// Re-applying an already applied operation is a no-op; creating an
    /// existing component replaces it in place; deleting an absent component
    /// succeeds. Updates of an absent component are rejected.
    pub fn apply(&mut self, op: &Operation) -> Result<(), UnknownComponent> {
        match op {
            Operation::CreateComponent { component } => {
                let live = LiveComponent::from_spec(component);
                match self.components.iter_mut().find(|c| c.name == component.name) {
                    Some(existing) => *existing = live,
                    None => self.components.push(live),
                }
            }
            Operation::UpdateImage { component, image } => {
                self.get_mut(component)?.image = image.clone();
            }
            Operation::UpdateConfig {
                component,
                ports,
                env,
                exposure,
            } => {
                let live = self.get_mut(component)?;
                live.ports = ports.clone();
                live.env = env.clone();
                live.exposure = *exposure;
            }
            Operation::ScaleReplicas {
                component,
                replicas,
            } => {
                let live = self.get_mut(component)?;
                live.replicas = *replicas;
                live.ready_replicas = *replicas;
            }
            Operation::DeleteComponent { component } => {
                self.components.retain(|c| &c.name != component);
            }
        }
        Ok(())
    }

    fn get_mut(&mut self, name: &ComponentName) -> Result<&mut LiveComponent, UnknownComponent> {
        self.components
            .iter_mut()
            .find(|c| &c.name == name)
            .ok_or_else(|| UnknownComponent {
                component: name.0.clone(),
            })
    }
}
