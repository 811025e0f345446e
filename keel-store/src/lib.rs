//! # keel-store
//!
//! Append-only release history.
//!
//! [`StateStore`] is the single serialization point for a release: an
//! [`append`](StateStore::append) only succeeds if the caller saw the latest
//! revision. [`FileStore`] persists under `~/.keel/releases/`,
//! [`MemoryStore`] backs tests and embedders.

pub mod error;
pub mod file;
pub mod memory;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;

use keel_core::{ReleaseName, ReleaseRecord, Revision};

/// Persisted, append-only history of every release.
///
/// Implementations must be safe to share between threads and tasks.
pub trait StateStore: Send + Sync {
    /// Latest record for `release`, or [`StoreError::NotFound`].
    fn current(&self, release: &ReleaseName) -> Result<ReleaseRecord, StoreError>;

    /// Append `record` as the revision following `expected_base`
    /// (revision 1 when `None`) and return the assigned revision.
    ///
    /// Fails with [`StoreError::Conflict`] if the latest stored revision is
    /// not `expected_base`.
    fn append(
        &self,
        record: ReleaseRecord,
        expected_base: Option<Revision>,
    ) -> Result<Revision, StoreError>;

    /// Records for `release`, most recent first, at most `limit` of them.
    fn history(
        &self,
        release: &ReleaseName,
        limit: Option<usize>,
    ) -> Result<Vec<ReleaseRecord>, StoreError>;

    /// One specific revision, or [`StoreError::NotFound`].
    fn revision(
        &self,
        release: &ReleaseName,
        revision: Revision,
    ) -> Result<ReleaseRecord, StoreError>;

    /// Names of all releases with at least one record, sorted.
    fn releases(&self) -> Result<Vec<ReleaseName>, StoreError>;
}

/// Revision that an append on top of `expected_base` claims.
pub(crate) fn claimed_revision(expected_base: Option<Revision>) -> Revision {
    expected_base.map_or(Revision::FIRST, Revision::next)
}
