//! File-backed simulated cluster.
//!
//! Keeps each release's live state at `<home>/.keel/cluster/<release>.json`
//! so the CLI can run install → upgrade → rollback end to end without a real
//! cluster. Replicas become ready as soon as an operation is applied.
//! Writes go to a uniquely named `.tmp` sibling and are renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use keel_core::{paths, LiveState, Operation, ReleaseName};
use tokio::sync::Mutex;

use crate::error::io_err;
use crate::{OrchestrationClient, OrchestrationError};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
pub struct LocalCluster {
    root: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl LocalCluster {
    /// Cluster rooted at `<home>/.keel/cluster/`.
    pub fn at_home(home: &Path) -> Self {
        Self::new(paths::cluster_root(home))
    }

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `<root>/<release>.json`
    pub fn state_path(&self, release: &ReleaseName) -> PathBuf {
        self.root.join(format!("{}.json", release.0))
    }

    async fn load(&self, release: &ReleaseName) -> Result<LiveState, OrchestrationError> {
        let path = self.state_path(release);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LiveState::empty(release.clone())),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    async fn save(&self, state: &LiveState) -> Result<(), OrchestrationError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_err(&self.root, e))?;

        let path = self.state_path(&state.release);
        let tmp = self.root.join(format!(
            ".{}.{}.{}.tmp",
            state.release.0,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let json = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(&path, e));
        }
        Ok(())
    }
}

#[async_trait]
impl OrchestrationClient for LocalCluster {
    async fn apply(&self, release: &ReleaseName, op: &Operation) -> Result<(), OrchestrationError> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load(release).await?;
        state.apply(op)?;
        self.save(&state).await?;
        tracing::debug!(release = %release, op = %op, "local cluster applied");
        Ok(())
    }

    async fn read_live_state(&self, release: &ReleaseName) -> Result<LiveState, OrchestrationError> {
        self.load(release).await
    }
}

#[cfg(test)]
mod tests {
    use keel_core::{ComponentName, ComponentSpec};
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn state_persists_across_instances() {
        let home = TempDir::new().unwrap();
        let release = ReleaseName::from("webapp");
        {
            let cluster = LocalCluster::at_home(home.path());
            cluster
                .apply(
                    &release,
                    &Operation::CreateComponent {
                        component: ComponentSpec::new("database", "postgres:16", 1),
                    },
                )
                .await
                .unwrap();
        }

        let reopened = LocalCluster::at_home(home.path());
        let live = reopened.read_live_state(&release).await.unwrap();
        assert_eq!(live.components.len(), 1);
        assert_eq!(live.components[0].image, "postgres:16");
        assert!(reopened.state_path(&release).ends_with(".keel/cluster/webapp.json"));
    }

    #[tokio::test]
    async fn update_of_missing_component_is_rejected() {
        let home = TempDir::new().unwrap();
        let cluster = LocalCluster::at_home(home.path());
        let err = cluster
            .apply(
                &ReleaseName::from("webapp"),
                &Operation::UpdateImage {
                    component: ComponentName::from("frontend"),
                    image: "web:2".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Rejected { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn tmp_file_cleaned_up_after_save() {
        let home = TempDir::new().unwrap();
        let cluster = LocalCluster::at_home(home.path());
        let release = ReleaseName::from("webapp");
        cluster
            .apply(
                &release,
                &Operation::CreateComponent {
                    component: ComponentSpec::new("web", "web:1", 2),
                },
            )
            .await
            .unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(paths::cluster_root(home.path()))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_instances_never_share_a_tmp_file() {
        let home = TempDir::new().unwrap();
        let release = ReleaseName::from("webapp");
        // Two instances have independent write locks, like two processes.
        let writers: Vec<_> = (0..2)
            .map(|w| {
                let cluster = LocalCluster::at_home(home.path());
                let release = release.clone();
                tokio::spawn(async move {
                    for i in 0..25 {
                        cluster
                            .apply(
                                &release,
                                &Operation::CreateComponent {
                                    component: ComponentSpec::new("web", format!("web:{w}.{i}"), 1),
                                },
                            )
                            .await?;
                    }
                    Ok::<_, OrchestrationError>(())
                })
            })
            .collect();

        for writer in writers {
            writer.await.unwrap().expect("every save succeeds");
        }
        let live = LocalCluster::at_home(home.path())
            .read_live_state(&release)
            .await
            .unwrap();
        assert_eq!(live.components.len(), 1);
    }
}
