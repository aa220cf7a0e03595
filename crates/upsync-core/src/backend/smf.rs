//! SMF (Service Management Facility) backend
//!
//! Instances live under the `system/power/ups-driver` service. SMF's
//! identifier grammar is the restrictive one: no leading digit and a
//! small punctuation set, so hashed fallbacks are common here. Media
//! dependencies become a `dependency` property group on the instance,
//! which SMF persists alongside the instance itself.

use std::sync::Arc;

use upsync_config::{DeviceSection, MediaClass, natural_cmp};

use super::{DependencyKind, DependencyRule, ServiceBackend};
use crate::runner::{CommandOutput, CommandRunner};
use crate::{Error, Result};

const SERVICE: &str = "system/power/ups-driver";
const FMRI_PREFIX: &str = "svc:/system/power/ups-driver:";
const FMRI_PATTERN: &str = "svc:/system/power/ups-driver:*";
const DEPENDENCY_PG: &str = "media_dependency";
const DEFAULT_SERVER_FMRI: &str = "svc:/system/power/ups-server:default";

/// Per-MediaClass dependency targets for SMF.
#[derive(Debug, Clone)]
pub struct SmfDependencies {
    pub usb: Option<DependencyRule>,
    pub network: Option<DependencyRule>,
    pub network_localhost: Option<DependencyRule>,
}

impl Default for SmfDependencies {
    fn default() -> Self {
        Self {
            usb: Some(DependencyRule::new(
                DependencyKind::Optional,
                "svc:/system/hotplug:default",
            )),
            network: Some(DependencyRule::new(
                DependencyKind::Require,
                "svc:/milestone/network:default",
            )),
            network_localhost: None,
        }
    }
}

impl SmfDependencies {
    fn rule_for(&self, media: MediaClass) -> Option<&DependencyRule> {
        match media {
            MediaClass::Usb => self.usb.as_ref(),
            MediaClass::Network => self.network.as_ref(),
            MediaClass::NetworkLocalhost => self.network_localhost.as_ref(),
            MediaClass::None => None,
        }
    }
}

/// Backend for hosts managed by SMF.
pub struct SmfBackend {
    runner: Arc<dyn CommandRunner>,
    dependencies: SmfDependencies,
    server_fmri: String,
}

impl SmfBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            dependencies: SmfDependencies::default(),
            server_fmri: DEFAULT_SERVER_FMRI.to_string(),
        }
    }

    /// Override the per-MediaClass dependency targets.
    pub fn with_dependencies(mut self, dependencies: SmfDependencies) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Override the data-server FMRI restarted after changes.
    pub fn with_server_fmri(mut self, fmri: impl Into<String>) -> Self {
        self.server_fmri = fmri.into();
        self
    }

    fn run_checked(&self, program: &str, args: &[&str]) -> Result<String> {
        let output: CommandOutput = self.runner.run(program, args)?;
        if output.success {
            Ok(output.stdout.trim().to_string())
        } else {
            Err(Error::Command {
                program: format!("{program} {}", args.join(" ")),
                cause: output.stderr.trim().to_string(),
            })
        }
    }

    /// Declare the dependency property group on a freshly added instance.
    fn declare_dependency(&self, identifier: &str, rule: &DependencyRule) -> Result<()> {
        let grouping = match rule.kind {
            DependencyKind::Require => "require_all",
            DependencyKind::Want | DependencyKind::Optional => "optional_all",
        };
        let instance = format!("{SERVICE}:{identifier}");

        self.run_checked(
            "svccfg",
            &["-s", &instance, "addpg", DEPENDENCY_PG, "dependency"],
        )?;
        for prop in [
            format!("{DEPENDENCY_PG}/grouping = astring: {grouping}"),
            format!("{DEPENDENCY_PG}/restart_on = astring: none"),
            format!("{DEPENDENCY_PG}/type = astring: service"),
            format!("{DEPENDENCY_PG}/entities = fmri: {}", rule.target),
        ] {
            self.run_checked("svccfg", &["-s", &instance, "setprop", &prop])?;
        }
        self.run_checked("svcadm", &["refresh", &instance])?;

        tracing::info!(instance, target = %rule.target, "declared media dependency");
        Ok(())
    }

    /// Add the instance, falling back to the hashed identifier if SMF
    /// rejects a verbatim name the grammar check accepted.
    fn add_instance(&self, device: &DeviceSection) -> Result<String> {
        let identifier = self.identifier_for(&device.name);

        match self.run_checked("svccfg", &["-s", SERVICE, "add", &identifier]) {
            Ok(_) => Ok(identifier),
            Err(first) if identifier == device.name => {
                let fallback = crate::naming::hashed_identifier(&device.name);
                tracing::warn!(
                    device = %device.name,
                    error = %first,
                    "verbatim name rejected, retrying with hashed identifier"
                );
                self.run_checked("svccfg", &["-s", SERVICE, "add", &fallback])?;
                Ok(fallback)
            }
            Err(e) => Err(e),
        }
    }
}

impl ServiceBackend for SmfBackend {
    fn name(&self) -> &'static str {
        "smf"
    }

    fn is_legal_identifier(&self, name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            }
            _ => false,
        }
    }

    fn full_unit_name(&self, name_or_identifier: &str) -> String {
        if name_or_identifier.starts_with("svc:") {
            name_or_identifier.to_string()
        } else {
            format!("{FMRI_PREFIX}{name_or_identifier}")
        }
    }

    fn instance_suffix(&self, full_unit_name: &str) -> String {
        full_unit_name
            .strip_prefix(FMRI_PREFIX)
            .unwrap_or(full_unit_name)
            .to_string()
    }

    fn list_instances(&self) -> Result<Vec<String>> {
        let mut instances: Vec<String> = self
            .list_instances_raw()?
            .iter()
            .map(|fmri| self.instance_suffix(fmri))
            .collect();
        instances.sort_by(|a, b| natural_cmp(a, b));
        Ok(instances)
    }

    fn list_instances_raw(&self) -> Result<Vec<String>> {
        let output = self
            .runner
            .run("svcs", &["-H", "-o", "fmri", FMRI_PATTERN])?;

        // svcs exits nonzero when the pattern matches nothing; that is an
        // empty population, not a failure.
        if !output.success {
            if output.stderr.contains("doesn't match") {
                return Ok(Vec::new());
            }
            return Err(Error::Command {
                program: format!("svcs -H -o fmri {FMRI_PATTERN}"),
                cause: output.stderr.trim().to_string(),
            });
        }

        let mut fmris: Vec<String> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        fmris.sort_by(|a, b| natural_cmp(a, b));
        Ok(fmris)
    }

    fn register_instance(&self, device: &DeviceSection, auto_start: bool) -> Result<String> {
        let wrap = |e: Error| Error::Register {
            device: device.name.clone(),
            cause: e.to_string(),
        };

        let identifier = self.add_instance(device).map_err(wrap)?;
        let instance = format!("{SERVICE}:{identifier}");
        tracing::info!(device = %device.name, instance, "registered instance");

        if let Some(rule) = self.dependencies.rule_for(device.media()) {
            self.declare_dependency(&identifier, rule).map_err(wrap)?;
        }

        if auto_start {
            // Clearing stale maintenance state is best-effort.
            let _ = self.runner.run("svcadm", &["clear", &instance]);
            self.run_checked("svcadm", &["enable", &instance])
                .map_err(wrap)?;
            tracing::info!(instance, "enabled instance");
        }

        Ok(identifier)
    }

    fn unregister_instance(&self, identifier: &str) -> Result<()> {
        let wrap = |e: Error| Error::Unregister {
            identifier: identifier.to_string(),
            cause: e.to_string(),
        };

        let instance = format!("{SERVICE}:{identifier}");

        // A failing disable must not prevent the delete step.
        if let Err(e) = self.run_checked("svcadm", &["disable", "-s", &instance]) {
            tracing::warn!(instance, error = %e, "disable failed, continuing with delete");
        }

        self.run_checked("svccfg", &["-s", SERVICE, "delete", identifier])
            .map_err(wrap)?;

        tracing::info!(instance, "unregistered instance");
        Ok(())
    }

    fn restart_dependent_server(&self) -> Result<()> {
        self.run_checked("svcadm", &["restart", &self.server_fmri])
            .map_err(|e| Error::Restart {
                cause: e.to_string(),
            })?;
        tracing::info!(fmri = %self.server_fmri, "restarted dependent server");
        Ok(())
    }
}
