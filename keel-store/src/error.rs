//! Error types for keel-store.

use std::path::PathBuf;

use keel_core::{ReleaseName, Revision};
use thiserror::Error;

/// All errors that can arise from state store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unknown release, or a revision absent from its history.
    #[error("{}", not_found_message(.release, .revision))]
    NotFound {
        release: ReleaseName,
        revision: Option<Revision>,
    },

    /// Another writer appended to the release since `expected` was read.
    #[error(
        "conflicting update to release '{release}': expected base revision {}, found {}",
        display_base(.expected),
        display_base(.actual)
    )]
    Conflict {
        release: ReleaseName,
        expected: Option<Revision>,
        actual: Option<Revision>,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record file exists but is not a valid record.
    #[error("corrupt release record at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error on the write path.
    #[error("release record JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn release_not_found(release: &ReleaseName) -> Self {
        StoreError::NotFound {
            release: release.clone(),
            revision: None,
        }
    }

    pub fn revision_not_found(release: &ReleaseName, revision: Revision) -> Self {
        StoreError::NotFound {
            release: release.clone(),
            revision: Some(revision),
        }
    }
}

fn not_found_message(release: &ReleaseName, revision: &Option<Revision>) -> String {
    match revision {
        Some(rev) => format!("release '{release}' has no revision {rev}"),
        None => format!("release '{release}' not found"),
    }
}

fn display_base(revision: &Option<Revision>) -> String {
    match revision {
        Some(rev) => rev.to_string(),
        None => "none".to_string(),
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
