pub mod diff;
pub mod history;
pub mod install;
pub mod rollback;
pub mod scale;
pub mod status;
pub mod upgrade;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;

use keel_cluster::LocalCluster;
use keel_core::{config, paths, ClusterDriver, KeelConfig, ReleaseName, ReleaseRecord, ReleaseSpec};
use keel_release::{ManagerConfig, ReleaseError, ReleaseManager};
use keel_store::FileStore;

pub type Manager = ReleaseManager<FileStore, LocalCluster>;

/// Resolved home directory and configuration shared by every command.
#[derive(Debug, Clone)]
pub struct Session {
    pub home: PathBuf,
    pub config: KeelConfig,
}

impl Session {
    pub fn load(home: Option<PathBuf>) -> Result<Self> {
        let home = match home {
            Some(home) => home,
            None => paths::home()?,
        };
        let config = config::load_at(&home)
            .with_context(|| format!("failed to load {}", paths::config_path(&home).display()))?;
        tracing::debug!(home = %home.display(), ?config, "session loaded");
        Ok(Self { home, config })
    }

    pub fn manager(&self) -> Manager {
        let cluster = match self.config.cluster {
            ClusterDriver::Local => LocalCluster::at_home(&self.home),
        };
        ReleaseManager::new(
            Arc::new(FileStore::at_home(&self.home)),
            Arc::new(cluster),
            ManagerConfig::from(&self.config),
        )
    }
}

/// clap value parser for `<release>` arguments. Rejects anything that is not
/// a valid release name, so no argument can point outside `~/.keel/`.
pub fn parse_release_name(s: &str) -> Result<ReleaseName, String> {
    let name = ReleaseName::from(s);
    name.check().map_err(|e| e.to_string())?;
    Ok(name)
}

/// Load a description file. With `expected`, its `name` must match.
pub fn load_spec(path: &Path, expected: Option<&ReleaseName>) -> Result<ReleaseSpec, ReleaseError> {
    let spec = keel_core::spec::load_file(path)?;
    match expected {
        Some(requested) if *requested != spec.name => Err(ReleaseError::NameMismatch {
            requested: requested.clone(),
            declared: spec.name,
        }),
        _ => Ok(spec),
    }
}

pub fn print_recorded(verb: &str, record: &ReleaseRecord) {
    println!(
        "{} release '{}' {verb} (revision {})",
        "✓".green().bold(),
        record.spec.name,
        record.revision
    );
    if !record.description.is_empty() {
        println!("  {}", record.description.bright_black());
    }
}

pub fn format_age(at: DateTime<Utc>) -> String {
    let secs = (Utc::now() - at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn age_buckets() {
        assert_eq!(format_age(Utc::now()), "0s ago");
        assert_eq!(format_age(Utc::now() - Duration::minutes(5)), "5m ago");
        assert_eq!(format_age(Utc::now() - Duration::hours(3)), "3h ago");
        assert_eq!(format_age(Utc::now() - Duration::days(2)), "2d ago");
    }

    #[test]
    fn release_arguments_must_be_valid_names() {
        assert_eq!(parse_release_name("webapp").unwrap(), ReleaseName::from("webapp"));
        for bad in ["..", "../x", "a/b", "WebApp", ""] {
            assert!(parse_release_name(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn mismatched_name_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("webapp.yaml");
        std::fs::write(
            &path,
            "name: webapp\ncomponents:\n  - name: web\n    image: web:1\n",
        )
        .unwrap();

        let err = load_spec(&path, Some(&ReleaseName::from("other"))).unwrap_err();
        assert!(matches!(err, ReleaseError::NameMismatch { .. }));
        assert!(load_spec(&path, Some(&ReleaseName::from("webapp"))).is_ok());
    }
}
