//! Service-manager backend abstraction
//!
//! Provides a unified interface for instance lifecycle operations across
//! the two supported service-management facilities (systemd and SMF).
//! The reconciliation engine only ever sees [`ServiceBackend`]; it never
//! branches on which variant is active.

mod smf;
mod systemd;

pub use smf::{SmfBackend, SmfDependencies};
pub use systemd::{SystemdBackend, SystemdDependencies};

use std::str::FromStr;
use std::sync::Arc;

use upsync_config::DeviceSection;

use crate::naming;
use crate::runner::CommandRunner;
use crate::{Error, Result};

/// Strength of a dependency declaration between an instance and its
/// media target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// The instance cannot run without the target
    Require,
    /// The target is pulled in but its failure is tolerated
    Want,
    /// The target is used when present
    Optional,
}

/// One dependency rule: declare a `kind` edge to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRule {
    pub kind: DependencyKind,
    pub target: String,
}

impl DependencyRule {
    pub fn new(kind: DependencyKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }
}

/// Trait for backend-specific instance lifecycle operations.
///
/// Both variants must be substitutable behind this contract. All calls
/// are blocking and attempt-once; failures surface to the caller with no
/// retry.
pub trait ServiceBackend {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether `name` satisfies this backend's identifier grammar.
    fn is_legal_identifier(&self, name: &str) -> bool;

    /// Project a bare name or identifier to the fully qualified unit
    /// name. Already-qualified names pass through unchanged.
    fn full_unit_name(&self, name_or_identifier: &str) -> String;

    /// Inverse projection: recover the instance portion of a fully
    /// qualified unit name. Unqualified input passes through unchanged.
    fn instance_suffix(&self, full_unit_name: &str) -> String;

    /// Enumerate registered instance suffixes, sorted.
    fn list_instances(&self) -> Result<Vec<String>>;

    /// Enumerate fully qualified unit names, undecoded, sorted.
    fn list_instances_raw(&self) -> Result<Vec<String>>;

    /// Create and enable an instance for `device`, declaring the media
    /// dependency implied by its classification. With `auto_start`, the
    /// instance is also started and any prior failure state cleared.
    ///
    /// Returns the identifier the instance was registered under.
    fn register_instance(&self, device: &DeviceSection, auto_start: bool) -> Result<String>;

    /// Stop, disable, and delete an instance along with any generated
    /// dependency artifacts. A failing stop step is non-fatal; deletion
    /// is still attempted.
    fn unregister_instance(&self, identifier: &str) -> Result<()>;

    /// Notify the consuming data server that the device population
    /// changed.
    fn restart_dependent_server(&self) -> Result<()>;

    /// Identifier this backend would register `name` under: verbatim if
    /// legal, hashed otherwise.
    fn identifier_for(&self, name: &str) -> String {
        naming::instance_identifier(name, |n| self.is_legal_identifier(n))
    }
}

/// Which backend to construct, as requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Probe the host for a supported service manager
    Auto,
    Systemd,
    Smf,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "systemd" => Ok(Self::Systemd),
            "smf" => Ok(Self::Smf),
            other => Err(Error::UnknownBackend {
                name: other.to_string(),
            }),
        }
    }
}

/// Construct the backend for `kind`, probing the host when `Auto`.
///
/// Probing asks the runner for `systemctl --version`, then `svcs -?`;
/// the first responder wins. Selection happens once at startup and the
/// result is passed by reference into the engine.
///
/// # Errors
///
/// [`Error::UnknownBackend`] when `Auto` finds no supported facility.
pub fn select_backend(
    kind: BackendKind,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn ServiceBackend>> {
    match kind {
        BackendKind::Systemd => Ok(Box::new(SystemdBackend::new(runner))),
        BackendKind::Smf => Ok(Box::new(SmfBackend::new(runner))),
        BackendKind::Auto => {
            if probe(&*runner, "systemctl", &["--version"]) {
                tracing::debug!("detected systemd service manager");
                return Ok(Box::new(SystemdBackend::new(runner)));
            }
            if probe(&*runner, "svcs", &["-?"]) {
                tracing::debug!("detected SMF service manager");
                return Ok(Box::new(SmfBackend::new(runner)));
            }
            Err(Error::UnknownBackend {
                name: "auto".to_string(),
            })
        }
    }
}

fn probe(runner: &dyn CommandRunner, program: &str, args: &[&str]) -> bool {
    matches!(runner.run(program, args), Ok(output) if output.success)
}
