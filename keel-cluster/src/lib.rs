//! Cluster bindings for keel.
//!
//! The release machinery only ever talks to a cluster through
//! [`OrchestrationClient`]. Two bindings ship here:
//! - [`MemoryCluster`] — in-memory fake with fault injection, for tests
//! - [`LocalCluster`] — file-backed simulated cluster used by the CLI

mod error;
pub mod local;
pub mod memory;

pub use error::OrchestrationError;
pub use local::LocalCluster;
pub use memory::MemoryCluster;

use async_trait::async_trait;
use keel_core::{LiveState, Operation, ReleaseName};

/// Capability set the release machinery needs from a cluster API.
///
/// `apply` must be idempotent for create, update and scale operations:
/// re-applying an operation that already took effect (for example after a
/// timeout) must not create a second workload. Deleting an absent component
/// succeeds. Each call either takes effect completely or not at all.
#[async_trait]
pub trait OrchestrationClient: Send + Sync {
    /// Apply a single operation to `release`'s workloads.
    async fn apply(&self, release: &ReleaseName, op: &Operation) -> Result<(), OrchestrationError>;

    /// Observe what currently exists for `release`. An unknown release has
    /// an empty live state.
    async fn read_live_state(&self, release: &ReleaseName) -> Result<LiveState, OrchestrationError>;
}
