//! On-disk layout under `<home>/.keel/`.
//!
//! ```text
//! ~/.keel/
//!   config.yaml
//!   releases/
//!     <release>/
//!       00000001.json   (one record per revision, never rewritten)
//!   cluster/
//!     <release>.json    (local cluster driver state)
//! ```

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "config.yaml";

pub fn keel_root(home: &Path) -> PathBuf {
    home.join(".keel")
}

pub fn config_path(home: &Path) -> PathBuf {
    keel_root(home).join(CONFIG_FILE)
}

pub fn releases_root(home: &Path) -> PathBuf {
    keel_root(home).join("releases")
}

pub fn cluster_root(home: &Path) -> PathBuf {
    keel_root(home).join("cluster")
}

/// The user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
