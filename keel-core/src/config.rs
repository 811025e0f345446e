//! User configuration at `<home>/.keel/config.yaml`.
//!
//! Every field is optional; a missing file yields [`KeelConfig::default`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths;

/// Which cluster binding the CLI drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterDriver {
    /// File-backed simulated cluster under `~/.keel/cluster/`.
    #[default]
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeelConfig {
    /// Upper bound for a single `apply` call against the cluster.
    pub apply_timeout_secs: u64,
    /// Default number of revisions shown by `keel history`.
    pub history_max: usize,
    pub cluster: ClusterDriver,
}

impl Default for KeelConfig {
    fn default() -> Self {
        Self {
            apply_timeout_secs: 30,
            history_max: 10,
            cluster: ClusterDriver::Local,
        }
    }
}

impl KeelConfig {
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }
}

/// Load `<home>/.keel/config.yaml`, falling back to defaults if absent.
pub fn load_at(home: &Path) -> Result<KeelConfig, ConfigError> {
    let path = paths::config_path(home);
    if !path.exists() {
        return Ok(KeelConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(KeelConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().unwrap();
        let config = load_at(home.path()).unwrap();
        assert_eq!(config, KeelConfig::default());
        assert_eq!(config.apply_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let home = TempDir::new().unwrap();
        let path = paths::config_path(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "apply_timeout_secs: 5\n").unwrap();

        let config = load_at(home.path()).unwrap();
        assert_eq!(config.apply_timeout_secs, 5);
        assert_eq!(config.history_max, 10);
    }

    #[test]
    fn malformed_file_reports_path() {
        let home = TempDir::new().unwrap();
        let path = paths::config_path(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "apply_timeout_secs: [nope").unwrap();

        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }
}
