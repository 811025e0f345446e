//! Error types for keel-release.

use keel_cluster::OrchestrationError;
use keel_core::{ComponentName, Operation, ReleaseName, Revision, SpecError};
use keel_store::StoreError;
use thiserror::Error;

use crate::phase::{Action, ReleasePhase};

/// Coarse classification of a [`ReleaseError`], one per CLI exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidSpec,
    NotFound,
    Conflict,
    Orchestration,
    Other,
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Other => 1,
            ErrorKind::InvalidSpec => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::Conflict => 4,
            ErrorKind::Orchestration => 5,
        }
    }
}

/// All errors that can arise from release management.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The desired state was rejected before anything was applied.
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("release name mismatch: description declares '{declared}', command targets '{requested}'")]
    NameMismatch {
        requested: ReleaseName,
        declared: ReleaseName,
    },

    #[error("release '{release}' not found")]
    ReleaseNotFound { release: ReleaseName },

    #[error("release '{release}' has no revision {revision}")]
    RevisionNotFound {
        release: ReleaseName,
        revision: Revision,
    },

    #[error("release '{release}' has no component '{component}'")]
    ComponentNotFound {
        release: ReleaseName,
        component: ComponentName,
    },

    /// The release's lifecycle state does not allow the requested action.
    #[error("cannot {action} release '{release}' while it is {phase}")]
    InvalidTransition {
        release: ReleaseName,
        action: Action,
        phase: ReleasePhase,
    },

    /// A concurrent writer recorded a revision first; retry against the new state.
    #[error("release '{release}' was modified concurrently (expected base revision {expected}, found {actual}); retry")]
    Conflict {
        release: ReleaseName,
        expected: String,
        actual: String,
    },

    /// An operation failed mid-plan. Earlier operations stay applied.
    #[error(
        "operation `{operation}` on component '{component}' of release '{release}' failed: {source}"
    )]
    Orchestration {
        release: ReleaseName,
        /// Revision of the Failed record, if it could be recorded.
        revision: Option<Revision>,
        operation: Operation,
        component: ComponentName,
        #[source]
        source: OrchestrationError,
    },

    #[error("cannot read live state of release '{release}': {source}")]
    LiveState {
        release: ReleaseName,
        #[source]
        source: OrchestrationError,
    },

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("YAML rendering error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ReleaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            // An unreadable description file is an I/O problem, not a bad spec.
            ReleaseError::Spec(SpecError::Io { .. }) => ErrorKind::Other,
            ReleaseError::Spec(_) | ReleaseError::NameMismatch { .. } => ErrorKind::InvalidSpec,
            ReleaseError::ReleaseNotFound { .. }
            | ReleaseError::RevisionNotFound { .. }
            | ReleaseError::ComponentNotFound { .. } => ErrorKind::NotFound,
            ReleaseError::InvalidTransition { .. } | ReleaseError::Conflict { .. } => {
                ErrorKind::Conflict
            }
            ReleaseError::Orchestration { .. } | ReleaseError::LiveState { .. } => {
                ErrorKind::Orchestration
            }
            ReleaseError::Store(_) | ReleaseError::Yaml(_) => ErrorKind::Other,
        }
    }
}

impl From<StoreError> for ReleaseError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound {
                release,
                revision: None,
            } => ReleaseError::ReleaseNotFound { release },
            StoreError::NotFound {
                release,
                revision: Some(revision),
            } => ReleaseError::RevisionNotFound { release, revision },
            StoreError::Conflict {
                release,
                expected,
                actual,
            } => ReleaseError::Conflict {
                release,
                expected: display_revision(expected),
                actual: display_revision(actual),
            },
            other => ReleaseError::Store(other),
        }
    }
}

fn display_revision(revision: Option<Revision>) -> String {
    revision.map_or_else(|| "none".to_string(), |r| r.to_string())
}
