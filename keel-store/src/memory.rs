//! In-process [`StateStore`].

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use keel_core::{ReleaseName, ReleaseRecord, Revision};

use crate::{claimed_revision, StateStore, StoreError};

type History = HashMap<ReleaseName, Vec<ReleaseRecord>>;

/// History held in memory; each release's records are kept in revision order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    releases: RwLock<History>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Records are pushed whole, so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, History> {
        self.releases.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, History> {
        self.releases.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl StateStore for MemoryStore {
    fn current(&self, release: &ReleaseName) -> Result<ReleaseRecord, StoreError> {
        self.read()
            .get(release)
            .and_then(|records| records.last())
            .cloned()
            .ok_or_else(|| StoreError::release_not_found(release))
    }

    fn append(
        &self,
        mut record: ReleaseRecord,
        expected_base: Option<Revision>,
    ) -> Result<Revision, StoreError> {
        let release = record.release().clone();
        let mut releases = self.write();
        let records = releases.entry(release.clone()).or_default();

        let actual = records.last().map(|r| r.revision);
        if actual != expected_base {
            return Err(StoreError::Conflict {
                release,
                expected: expected_base,
                actual,
            });
        }

        let revision = claimed_revision(expected_base);
        record.revision = revision;
        records.push(record);
        tracing::debug!(release = %release, revision = %revision, "appended record");
        Ok(revision)
    }

    fn history(
        &self,
        release: &ReleaseName,
        limit: Option<usize>,
    ) -> Result<Vec<ReleaseRecord>, StoreError> {
        let releases = self.read();
        let Some(records) = releases.get(release) else {
            return Ok(vec![]);
        };
        Ok(records
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn revision(
        &self,
        release: &ReleaseName,
        revision: Revision,
    ) -> Result<ReleaseRecord, StoreError> {
        self.read()
            .get(release)
            .and_then(|records| records.iter().find(|r| r.revision == revision))
            .cloned()
            .ok_or_else(|| StoreError::revision_not_found(release, revision))
    }

    fn releases(&self) -> Result<Vec<ReleaseName>, StoreError> {
        let mut names: Vec<ReleaseName> = self
            .read()
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use keel_core::{ComponentSpec, ReleaseSpec, ReleaseStatus};

    use super::*;

    fn record(replicas: u32) -> ReleaseRecord {
        let spec = ReleaseSpec::new("webapp", vec![ComponentSpec::new("web", "web:1", replicas)]);
        ReleaseRecord::new(spec, Revision::default(), ReleaseStatus::Applied, "test")
    }

    fn name() -> ReleaseName {
        ReleaseName::from("webapp")
    }

    #[test]
    fn current_of_unknown_release_is_not_found() {
        let store = MemoryStore::new();
        let err = store.current(&name()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { revision: None, .. }));
    }

    #[test]
    fn sequential_appends_have_no_gaps() {
        let store = MemoryStore::new();
        let mut base = None;
        for replicas in 1..=5 {
            let rev = store.append(record(replicas), base).unwrap();
            assert_eq!(rev, claimed_revision(base));
            base = Some(rev);
        }
        let revisions: Vec<u64> = store
            .history(&name(), None)
            .unwrap()
            .iter()
            .map(|r| r.revision.0)
            .collect();
        assert_eq!(revisions, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn stale_base_conflicts() {
        let store = MemoryStore::new();
        store.append(record(1), None).unwrap();
        store.append(record(2), Some(Revision(1))).unwrap();

        let err = store.append(record(3), Some(Revision(1))).unwrap_err();
        match err {
            StoreError::Conflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, Some(Revision(1)));
                assert_eq!(actual, Some(Revision(2)));
            }
            other => panic!("expected conflict, got {other}"),
        }
        assert_eq!(store.history(&name(), None).unwrap().len(), 2);
    }

    #[test]
    fn history_limit_returns_most_recent() {
        let store = MemoryStore::new();
        store.append(record(1), None).unwrap();
        store.append(record(2), Some(Revision(1))).unwrap();
        store.append(record(3), Some(Revision(2))).unwrap();

        let recent = store.history(&name(), Some(2)).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].revision, Revision(3));
        assert_eq!(recent[1].revision, Revision(2));
    }

    #[test]
    fn concurrent_appends_from_same_base_admit_one_winner() {
        let store = Arc::new(MemoryStore::new());
        store.append(record(1), None).unwrap();

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.append(record(10 + i), Some(Revision(1)))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::Conflict { .. })))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(store.current(&name()).unwrap().revision, Revision(2));
    }
}
