//! Domain types for keel releases.
//!
//! All types are serializable via serde: release descriptions arrive as YAML,
//! release records are persisted as JSON.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SpecError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed release name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseName(pub String);

impl fmt::Display for ReleaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ReleaseName {
    /// Release names are RFC 1123 labels. They become directory and file
    /// names under `~/.keel/`, so nothing else may reach the filesystem.
    pub fn check(&self) -> Result<(), SpecError> {
        if self.0.trim().is_empty() {
            return Err(SpecError::invalid("release name must not be empty"));
        }
        if !is_dns_label(&self.0, MAX_RELEASE_NAME_LEN) {
            return Err(SpecError::invalid(format!(
                "release name '{}' must be lowercase alphanumerics or '-', \
                 start and end alphanumeric, at most {MAX_RELEASE_NAME_LEN} characters",
                self.0
            )));
        }
        Ok(())
    }
}

impl From<String> for ReleaseName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReleaseName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed component name, unique within one release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentName(pub String);

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ComponentName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ComponentName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Revision number of a release. The first recorded revision is 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl Revision {
    pub const FIRST: Revision = Revision(1);

    pub fn next(self) -> Revision {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for Revision {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a component's service is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Exposure {
    /// Cluster-internal service only.
    #[default]
    Internal,
    /// Exposed through an external load balancer.
    LoadBalanced,
}

impl fmt::Display for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exposure::Internal => write!(f, "internal"),
            Exposure::LoadBalanced => write!(f, "loadbalanced"),
        }
    }
}

impl FromStr for Exposure {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "internal" | "clusterip" => Ok(Exposure::Internal),
            "loadbalanced" | "loadbalancer" => Ok(Exposure::LoadBalanced),
            other => Err(SpecError::invalid(format!(
                "unknown exposure '{other}'; expected: internal, loadbalanced"
            ))),
        }
    }
}

/// Outcome recorded for one revision of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    #[default]
    Pending,
    Applied,
    Failed,
    #[serde(rename = "rolledback")]
    RolledBack,
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseStatus::Pending => write!(f, "pending"),
            ReleaseStatus::Applied => write!(f, "applied"),
            ReleaseStatus::Failed => write!(f, "failed"),
            ReleaseStatus::RolledBack => write!(f, "rolled back"),
        }
    }
}

// ---------------------------------------------------------------------------
// Desired state
// ---------------------------------------------------------------------------

/// Desired state of one Deployment/Service-shaped workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: ComponentName,
    /// Opaque `registry/repo:tag` reference.
    pub image: String,
    pub replicas: u32,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub exposure: Exposure,
}

impl ComponentSpec {
    pub fn new(name: impl Into<ComponentName>, image: impl Into<String>, replicas: u32) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            replicas,
            ports: vec![],
            env: BTreeMap::new(),
            exposure: Exposure::Internal,
        }
    }
}

/// Desired state of a whole release. Never mutated once recorded; every
/// upgrade builds a fresh value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSpec {
    pub name: ReleaseName,
    /// Declaration order is significant: it is the create order.
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
}

impl ReleaseSpec {
    pub fn new(name: impl Into<ReleaseName>, components: Vec<ComponentSpec>) -> Self {
        Self {
            name: name.into(),
            components,
        }
    }

    pub fn component(&self, name: &ComponentName) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| &c.name == name)
    }

    /// Check the structural invariants of the spec.
    pub fn validate(&self) -> Result<(), SpecError> {
        self.name.check()?;

        let mut seen = HashSet::new();
        for component in &self.components {
            if component.name.0.trim().is_empty() {
                return Err(SpecError::invalid(format!(
                    "release '{}' has a component with an empty name",
                    self.name
                )));
            }
            if !is_dns_label(&component.name.0, MAX_COMPONENT_NAME_LEN) {
                return Err(SpecError::invalid(format!(
                    "component name '{}' must be lowercase alphanumerics or '-', \
                     start and end alphanumeric, at most {MAX_COMPONENT_NAME_LEN} characters",
                    component.name
                )));
            }
            if !seen.insert(&component.name) {
                return Err(SpecError::invalid(format!(
                    "duplicate component name '{}'",
                    component.name
                )));
            }
            if component.image.trim().is_empty() {
                return Err(SpecError::invalid(format!(
                    "component '{}' has an empty image reference",
                    component.name
                )));
            }
            let mut ports = HashSet::new();
            for port in &component.ports {
                if *port == 0 {
                    return Err(SpecError::invalid(format!(
                        "component '{}': port 0 is out of range 1-65535",
                        component.name
                    )));
                }
                if !ports.insert(port) {
                    return Err(SpecError::invalid(format!(
                        "component '{}': port {port} declared twice",
                        component.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// A copy of this spec with one component's replica count replaced.
    ///
    /// Returns `None` if the component is not part of the release.
    pub fn with_replicas(&self, component: &ComponentName, replicas: u32) -> Option<ReleaseSpec> {
        self.component(component)?;
        let mut next = self.clone();
        for c in &mut next.components {
            if &c.name == component {
                c.replicas = replicas;
            }
        }
        Some(next)
    }

    /// Hex SHA-256 of the canonical JSON encoding of the spec.
    pub fn checksum(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut h = Sha256::new();
        h.update(&bytes);
        hex::encode(h.finalize())
    }
}

/// Release names end up in resource names with suffixes appended.
const MAX_RELEASE_NAME_LEN: usize = 53;
const MAX_COMPONENT_NAME_LEN: usize = 63;

/// RFC 1123 label: `[a-z0-9]([-a-z0-9]*[a-z0-9])?`.
fn is_dns_label(name: &str, max_len: usize) -> bool {
    let bytes = name.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    bytes.len() <= max_len
        && first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Which operation broke a release, kept on Failed records for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Rendered operation, e.g. `update-image frontend → web:2`.
    pub operation: String,
    pub component: ComponentName,
    pub error: String,
}

/// One entry in a release's append-only history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub spec: ReleaseSpec,
    pub revision: Revision,
    pub status: ReleaseStatus,
    pub timestamp: DateTime<Utc>,
    pub checksum: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,
}

impl ReleaseRecord {
    pub fn new(
        spec: ReleaseSpec,
        revision: Revision,
        status: ReleaseStatus,
        description: impl Into<String>,
    ) -> Self {
        let checksum = spec.checksum();
        Self {
            spec,
            revision,
            status,
            timestamp: Utc::now(),
            checksum,
            description: description.into(),
            failure: None,
        }
    }

    pub fn with_failure(mut self, failure: FailureInfo) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn release(&self) -> &ReleaseName {
        &self.spec.name
    }

    /// True when this revision's spec was fully applied to the cluster.
    pub fn is_deployed(&self) -> bool {
        matches!(
            self.status,
            ReleaseStatus::Applied | ReleaseStatus::RolledBack
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn webapp() -> ReleaseSpec {
        ReleaseSpec::new(
            "webapp",
            vec![
                ComponentSpec::new("frontend", "registry.local/web:1.0", 2),
                ComponentSpec::new("backend", "registry.local/api:1.0", 2),
                ComponentSpec::new("database", "postgres:16", 1),
            ],
        )
    }

    #[test]
    fn newtype_display() {
        assert_eq!(ReleaseName::from("webapp").to_string(), "webapp");
        assert_eq!(ComponentName::from("db").to_string(), "db");
        assert_eq!(Revision(4).to_string(), "4");
    }

    #[test]
    fn dns_label_rules() {
        assert!(is_dns_label("webapp", 53));
        assert!(is_dns_label("web-2", 53));
        assert!(!is_dns_label("Web", 53));
        assert!(!is_dns_label("-web", 53));
        assert!(!is_dns_label("web-", 53));
        assert!(!is_dns_label("../etc", 53));
        assert!(!is_dns_label(&"a".repeat(54), 53));
    }

    #[test]
    fn revision_next_increments() {
        assert_eq!(Revision::FIRST.next(), Revision(2));
    }

    #[test]
    fn exposure_parses_aliases() {
        assert_eq!("LoadBalancer".parse::<Exposure>().unwrap(), Exposure::LoadBalanced);
        assert_eq!("load_balanced".parse::<Exposure>().unwrap(), Exposure::LoadBalanced);
        assert_eq!("Internal".parse::<Exposure>().unwrap(), Exposure::Internal);
        assert!("nodeport".parse::<Exposure>().is_err());
    }

    #[test]
    fn valid_spec_passes() {
        webapp().validate().expect("valid");
    }

    #[test]
    fn with_replicas_changes_only_target() {
        let spec = webapp();
        let scaled = spec
            .with_replicas(&ComponentName::from("backend"), 5)
            .expect("component exists");
        assert_eq!(scaled.components[1].replicas, 5);
        assert_eq!(scaled.components[0], spec.components[0]);
        assert_eq!(scaled.components[2], spec.components[2]);
        assert_eq!(spec.components[1].replicas, 2, "original is untouched");
    }

    #[test]
    fn with_replicas_unknown_component_is_none() {
        assert!(webapp()
            .with_replicas(&ComponentName::from("cache"), 1)
            .is_none());
    }

    #[test]
    fn checksum_is_stable_and_content_sensitive() {
        let a = webapp();
        assert_eq!(a.checksum(), webapp().checksum());
        let b = a.with_replicas(&ComponentName::from("database"), 3).unwrap();
        assert_ne!(a.checksum(), b.checksum());
        assert_eq!(a.checksum().len(), 64);
    }

    #[test]
    fn record_serde_roundtrip() {
        let record = ReleaseRecord::new(webapp(), Revision(3), ReleaseStatus::RolledBack, "Rollback to 1");
        let json = serde_json::to_string(&record).expect("serialize");
        assert!(json.contains("\"rolledback\""));
        let back: ReleaseRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, record);
        assert!(back.is_deployed());
    }
}
