//! Per-release lifecycle state machine.
//!
//! ```text
//!   from            action              in flight      success   failure
//!   Absent          install          →  Installing  →  Active    Failed
//!   Active, Failed  upgrade, scale   →  Upgrading   →  Active    Failed
//!   Active, Failed  rollback         →  RollingBack →  Active    Failed
//! ```
//!
//! The resting states (Absent, Active, Failed) are derived from the latest
//! stored record; the in-flight states exist only while a manager call runs.

use std::fmt;

use keel_core::{ReleaseName, ReleaseRecord, ReleaseStatus};
use serde::Serialize;

use crate::error::ReleaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleasePhase {
    Absent,
    Installing,
    Active,
    Upgrading,
    #[serde(rename = "rollingback")]
    RollingBack,
    Failed,
}

impl fmt::Display for ReleasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleasePhase::Absent => write!(f, "absent"),
            ReleasePhase::Installing => write!(f, "installing"),
            ReleasePhase::Active => write!(f, "active"),
            ReleasePhase::Upgrading => write!(f, "upgrading"),
            ReleasePhase::RollingBack => write!(f, "rolling back"),
            ReleasePhase::Failed => write!(f, "failed"),
        }
    }
}

/// A manager entry point that moves a release through the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Upgrade,
    Rollback,
    Scale,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Install => write!(f, "install"),
            Action::Upgrade => write!(f, "upgrade"),
            Action::Rollback => write!(f, "roll back"),
            Action::Scale => write!(f, "scale"),
        }
    }
}

impl ReleasePhase {
    /// Resting phase implied by the latest stored record.
    pub fn from_record(record: Option<&ReleaseRecord>) -> Self {
        match record.map(|r| r.status) {
            None => ReleasePhase::Absent,
            Some(ReleaseStatus::Applied | ReleaseStatus::RolledBack) => ReleasePhase::Active,
            // A Pending record was never confirmed applied.
            Some(ReleaseStatus::Failed | ReleaseStatus::Pending) => ReleasePhase::Failed,
        }
    }

    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            ReleasePhase::Installing | ReleasePhase::Upgrading | ReleasePhase::RollingBack
        )
    }

    /// Start `action` from this resting phase; returns the in-flight phase.
    pub fn begin(self, release: &ReleaseName, action: Action) -> Result<ReleasePhase, ReleaseError> {
        let next = match (self, action) {
            (ReleasePhase::Absent, Action::Install) => Some(ReleasePhase::Installing),
            (ReleasePhase::Active | ReleasePhase::Failed, Action::Upgrade | Action::Scale) => {
                Some(ReleasePhase::Upgrading)
            }
            (ReleasePhase::Active | ReleasePhase::Failed, Action::Rollback) => {
                Some(ReleasePhase::RollingBack)
            }
            _ => None,
        };
        next.ok_or_else(|| match self {
            ReleasePhase::Absent => ReleaseError::ReleaseNotFound {
                release: release.clone(),
            },
            phase => ReleaseError::InvalidTransition {
                release: release.clone(),
                action,
                phase,
            },
        })
    }

    /// Resting phase after an in-flight phase completes.
    pub fn finish(self, succeeded: bool) -> ReleasePhase {
        debug_assert!(self.is_in_flight(), "finish called on resting phase {self}");
        if succeeded {
            ReleasePhase::Active
        } else {
            ReleasePhase::Failed
        }
    }
}
