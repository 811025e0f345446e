//! keel core library — release model, description parsing, operations, config.
//!
//! Public API surface:
//! - [`types`] — newtypes, [`ReleaseSpec`], [`ReleaseRecord`]
//! - [`spec`] — parse and validate release description documents
//! - [`operation`] — [`Operation`] and the observed [`LiveState`]
//! - [`config`] — `~/.keel/config.yaml`
//! - [`paths`] — on-disk layout under `~/.keel/`
//! - [`error`] — [`SpecError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod operation;
pub mod paths;
pub mod spec;
pub mod types;

pub use config::{ClusterDriver, KeelConfig};
pub use error::{ConfigError, SpecError, UnknownComponent};
pub use operation::{LiveComponent, LiveState, Operation, OperationKind};
pub use types::{
    ComponentName, ComponentSpec, Exposure, FailureInfo, ReleaseName, ReleaseRecord, ReleaseSpec,
    ReleaseStatus, Revision,
};
