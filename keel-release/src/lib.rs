//! # keel-release
//!
//! Reconciliation and release lifecycle.
//!
//! [`reconcile`] turns a desired [`ReleaseSpec`](keel_core::ReleaseSpec) and
//! the observed [`LiveState`](keel_core::LiveState) into an ordered operation
//! list. [`ReleaseManager`] drives install, upgrade, rollback and scale on top
//! of a [`StateStore`](keel_store::StateStore) and an
//! [`OrchestrationClient`](keel_cluster::OrchestrationClient).

pub mod diff;
pub mod error;
pub mod manager;
pub mod phase;
pub mod reconcile;

pub use diff::ReleaseDiff;
pub use error::{ErrorKind, ReleaseError};
pub use manager::{ManagerConfig, ReleaseManager, ReleaseStatusReport};
pub use phase::{Action, ReleasePhase};
pub use reconcile::{reconcile, Plan};
