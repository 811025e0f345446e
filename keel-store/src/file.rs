//! File-backed [`StateStore`].
//!
//! # Storage layout
//!
//! ```text
//! ~/.keel/releases/
//!   <release>/              (mode 0700)
//!     00000001.json         (one ReleaseRecord per revision — mode 0600)
//!     00000002.json
//! ```
//!
//! # Append protocol
//!
//! 1. Scan the release directory for the latest revision.
//! 2. Compare with the caller's base revision → `Conflict` if different.
//! 3. Serialize the record to a uniquely named `.tmp` sibling.
//! 4. `hard_link` the `.tmp` to `<revision>.json`. The link fails with
//!    `AlreadyExists` if another writer claimed the revision first → `Conflict`.
//! 5. Remove the `.tmp`.
//!
//! Record files are never rewritten or removed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use keel_core::{paths, ReleaseName, ReleaseRecord, Revision};

use crate::error::{io_err, StoreError};
use crate::{claimed_revision, StateStore};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// History persisted as one JSON file per revision.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Store rooted at `<home>/.keel/releases/`.
    pub fn at_home(home: &Path) -> Self {
        Self::new(paths::releases_root(home))
    }

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<release>/`
    pub fn release_dir(&self, release: &ReleaseName) -> PathBuf {
        self.root.join(&release.0)
    }

    /// `<root>/<release>/<revision:08>.json` — pure, no I/O.
    pub fn record_path(&self, release: &ReleaseName, revision: Revision) -> PathBuf {
        self.release_dir(release)
            .join(format!("{:08}.json", revision.0))
    }

    /// All stored revisions of `release`, ascending.
    fn revisions(&self, release: &ReleaseName) -> Result<Vec<Revision>, StoreError> {
        let dir = self.release_dir(release);
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut revisions: Vec<Revision> = std::fs::read_dir(&dir)
            .map_err(|e| io_err(&dir, e))?
            .filter_map(|e| e.ok())
            .filter_map(|e| parse_record_file_name(&e.file_name().to_string_lossy()))
            .collect();
        revisions.sort();
        Ok(revisions)
    }

    fn latest(&self, release: &ReleaseName) -> Result<Option<Revision>, StoreError> {
        Ok(self.revisions(release)?.last().copied())
    }

    fn load(&self, release: &ReleaseName, revision: Revision) -> Result<ReleaseRecord, StoreError> {
        let path = self.record_path(release, revision);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::revision_not_found(release, revision))
            }
            Err(e) => return Err(io_err(&path, e)),
        };
        serde_json::from_str(&contents).map_err(|source| StoreError::Parse { path, source })
    }

    fn ensure_release_dir(&self, release: &ReleaseName) -> Result<PathBuf, StoreError> {
        let dir = self.release_dir(release);
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
            set_dir_permissions(&dir)?;
        }
        Ok(dir)
    }
}

impl StateStore for FileStore {
    fn current(&self, release: &ReleaseName) -> Result<ReleaseRecord, StoreError> {
        match self.latest(release)? {
            Some(revision) => self.load(release, revision),
            None => Err(StoreError::release_not_found(release)),
        }
    }

    fn append(
        &self,
        mut record: ReleaseRecord,
        expected_base: Option<Revision>,
    ) -> Result<Revision, StoreError> {
        let release = record.release().clone();
        let dir = self.ensure_release_dir(&release)?;

        let actual = self.latest(&release)?;
        if actual != expected_base {
            return Err(StoreError::Conflict {
                release,
                expected: expected_base,
                actual,
            });
        }

        let revision = claimed_revision(expected_base);
        record.revision = revision;
        let json = serde_json::to_string_pretty(&record)?;

        let tmp = dir.join(format!(
            ".{:08}.{}.{}.tmp",
            revision.0,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        let published = set_file_permissions(&tmp).and_then(|()| {
            let path = self.record_path(&release, revision);
            std::fs::hard_link(&tmp, &path).map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StoreError::Conflict {
                    release: release.clone(),
                    expected: expected_base,
                    actual: Some(revision),
                },
                _ => io_err(&path, e),
            })
        });
        let _ = std::fs::remove_file(&tmp);
        published?;

        tracing::debug!(release = %release, revision = %revision, "appended record");
        Ok(revision)
    }

    fn history(
        &self,
        release: &ReleaseName,
        limit: Option<usize>,
    ) -> Result<Vec<ReleaseRecord>, StoreError> {
        self.revisions(release)?
            .into_iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .map(|revision| self.load(release, revision))
            .collect()
    }

    fn revision(
        &self,
        release: &ReleaseName,
        revision: Revision,
    ) -> Result<ReleaseRecord, StoreError> {
        self.load(release, revision)
    }

    fn releases(&self) -> Result<Vec<ReleaseName>, StoreError> {
        if !self.root.exists() {
            return Ok(vec![]);
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(|e| io_err(&self.root, e))? {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let name = ReleaseName::from(entry.file_name().to_string_lossy().into_owned());
            if self.latest(&name)?.is_some() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// `00000042.json` → `Revision(42)`; anything else (including `.tmp`) → `None`.
fn parse_record_file_name(name: &str) -> Option<Revision> {
    let stem = name.strip_suffix(".json")?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok().map(Revision)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use keel_core::{ComponentSpec, ReleaseSpec, ReleaseStatus};
    use tempfile::TempDir;

    use super::*;

    fn record(image: &str) -> ReleaseRecord {
        let spec = ReleaseSpec::new("webapp", vec![ComponentSpec::new("web", image, 1)]);
        ReleaseRecord::new(spec, Revision::default(), ReleaseStatus::Applied, "test")
    }

    fn name() -> ReleaseName {
        ReleaseName::from("webapp")
    }

    #[test]
    fn record_path_is_zero_padded() {
        let home = TempDir::new().unwrap();
        let store = FileStore::at_home(home.path());
        let path = store.record_path(&name(), Revision(7));
        assert!(path.ends_with(".keel/releases/webapp/00000007.json"));
    }

    #[test]
    fn parse_record_file_name_ignores_tmp_files() {
        assert_eq!(parse_record_file_name("00000012.json"), Some(Revision(12)));
        assert_eq!(parse_record_file_name(".00000012.42.0.tmp"), None);
        assert_eq!(parse_record_file_name("notes.json"), None);
        assert_eq!(parse_record_file_name(".json"), None);
    }

    #[test]
    fn append_then_load_roundtrip() {
        let home = TempDir::new().unwrap();
        let store = FileStore::at_home(home.path());
        let rev = store.append(record("web:1"), None).unwrap();
        assert_eq!(rev, Revision::FIRST);

        let loaded = store.current(&name()).unwrap();
        assert_eq!(loaded.revision, Revision::FIRST);
        assert_eq!(loaded.spec.components[0].image, "web:1");
    }

    #[test]
    fn tmp_file_cleaned_up_after_append() {
        let home = TempDir::new().unwrap();
        let store = FileStore::at_home(home.path());
        store.append(record("web:1"), None).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(store.release_dir(&name()))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "tmp files must be removed after append");
    }

    #[test]
    fn existing_revision_file_is_never_overwritten() {
        let home = TempDir::new().unwrap();
        let store = FileStore::at_home(home.path());
        store.append(record("web:1"), None).unwrap();

        let err = store.append(record("web:2"), None).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }), "got: {err}");
        assert_eq!(store.current(&name()).unwrap().spec.components[0].image, "web:1");
    }

    #[test]
    fn corrupt_record_reports_path() {
        let home = TempDir::new().unwrap();
        let store = FileStore::at_home(home.path());
        let dir = store.release_dir(&name());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("00000001.json"), "{ not json").unwrap();

        let err = store.current(&name()).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("00000001.json"));
    }

    #[cfg(unix)]
    #[test]
    fn record_files_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let home = TempDir::new().unwrap();
        let store = FileStore::at_home(home.path());
        store.append(record("web:1"), None).unwrap();

        let dir_mode = std::fs::metadata(store.release_dir(&name()))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        let file_mode = std::fs::metadata(store.record_path(&name(), Revision::FIRST))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
        assert_eq!(file_mode, 0o600);
    }
}
