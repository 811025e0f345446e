use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures reported by a cluster binding.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The cluster refused the operation.
    #[error("cluster rejected operation on '{component}': {reason}")]
    Rejected { component: String, reason: String },

    /// No answer within the deadline; the operation may or may not have
    /// taken effect.
    #[error("cluster did not answer within {after:?}; outcome unknown")]
    Timeout { after: Duration },

    #[error("cluster unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cluster state JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<keel_core::UnknownComponent> for OrchestrationError {
    fn from(e: keel_core::UnknownComponent) -> Self {
        OrchestrationError::Rejected {
            reason: e.to_string(),
            component: e.component,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> OrchestrationError {
    OrchestrationError::Io {
        path: path.into(),
        source,
    }
}
