//! Reconciliation engine and service-manager backends for upsync
//!
//! This crate converges the instances registered with a host's service
//! manager against the device catalog from `upsync-config`:
//!
//! - [`naming`]: maps device names to backend-legal instance identifiers
//! - [`runner`]: injected capability for external process invocation
//! - [`backend`]: the [`ServiceBackend`] contract plus the systemd and
//!   SMF implementations, substitutable behind one trait
//! - [`engine`]: the desired-vs-actual diff and convergence pass
//!
//! The engine is single-threaded and synchronous; every backend call is
//! a blocking external-process invocation issued one device at a time in
//! sorted order. One run assumes exclusive access to the configuration
//! file and the instance namespace; concurrent runs are not locked
//! against.

pub mod backend;
pub mod engine;
pub mod error;
pub mod naming;
pub mod runner;

pub use backend::{
    BackendKind, DependencyKind, ServiceBackend, SmfBackend, SmfDependencies, SystemdBackend,
    SystemdDependencies, select_backend,
};
pub use engine::{ReconcileReport, ReconcileState, reconcile};
pub use error::{Error, Result};
pub use naming::{hashed_identifier, instance_identifier};
pub use runner::{CommandOutput, CommandRunner, ScriptedRunner, SystemRunner};
