//! Error types for keel-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or validating a release description.
///
/// Every variant is caught before any cluster mutation happens.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The description is well-formed YAML but describes an impossible release.
    #[error("invalid release spec: {reason}")]
    InvalidSpec { reason: String },

    /// The description file could not be read.
    #[error("cannot read release description {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax error in a description file — includes the file path.
    #[error("failed to parse release description {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML syntax error in an in-memory description.
    #[error("failed to parse release description: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SpecError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        SpecError::InvalidSpec {
            reason: reason.into(),
        }
    }
}

/// Errors raised while loading `~/.keel/config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.keel/`.
    #[error("cannot determine home directory; set $HOME or pass --home")]
    HomeNotFound,
}

/// An update targeted a component that does not exist in the live state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("component '{component}' does not exist")]
pub struct UnknownComponent {
    pub component: String,
}
