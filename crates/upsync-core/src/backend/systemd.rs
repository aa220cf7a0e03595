//! systemd service-manager backend
//!
//! Instances are registered against the `ups-driver@.service` template.
//! Media dependencies become drop-in files under
//! `<unit>.d/50-media-dependency.conf` followed by a `daemon-reload`, so
//! the generated wiring survives package upgrades of the template unit.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use upsync_config::{DeviceSection, MediaClass, natural_cmp};

use super::{DependencyKind, DependencyRule, ServiceBackend};
use crate::runner::{CommandOutput, CommandRunner};
use crate::{Error, Result};

const UNIT_PREFIX: &str = "ups-driver@";
const UNIT_SUFFIX: &str = ".service";
const UNIT_PATTERN: &str = "ups-driver@*.service";
const DROPIN_FILE: &str = "50-media-dependency.conf";
const DEFAULT_SERVER_UNIT: &str = "ups-server.service";
const DEFAULT_DROPIN_ROOT: &str = "/etc/systemd/system";

/// Per-MediaClass dependency targets for systemd.
///
/// USB devices need no unit-level dependency (device activation handles
/// hot-plug); networked devices wait for the network to come online;
/// loopback proxies and serial devices need nothing.
#[derive(Debug, Clone)]
pub struct SystemdDependencies {
    pub usb: Option<DependencyRule>,
    pub network: Option<DependencyRule>,
    pub network_localhost: Option<DependencyRule>,
}

impl Default for SystemdDependencies {
    fn default() -> Self {
        Self {
            usb: None,
            network: Some(DependencyRule::new(
                DependencyKind::Want,
                "network-online.target",
            )),
            network_localhost: None,
        }
    }
}

impl SystemdDependencies {
    fn rule_for(&self, media: MediaClass) -> Option<&DependencyRule> {
        match media {
            MediaClass::Usb => self.usb.as_ref(),
            MediaClass::Network => self.network.as_ref(),
            MediaClass::NetworkLocalhost => self.network_localhost.as_ref(),
            MediaClass::None => None,
        }
    }
}

/// Backend for hosts managed by systemd.
pub struct SystemdBackend {
    runner: Arc<dyn CommandRunner>,
    dependencies: SystemdDependencies,
    dropin_root: PathBuf,
    server_unit: String,
}

impl SystemdBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            dependencies: SystemdDependencies::default(),
            dropin_root: PathBuf::from(DEFAULT_DROPIN_ROOT),
            server_unit: DEFAULT_SERVER_UNIT.to_string(),
        }
    }

    /// Override the per-MediaClass dependency targets.
    pub fn with_dependencies(mut self, dependencies: SystemdDependencies) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Override where dependency drop-ins are written (tests).
    pub fn with_dropin_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.dropin_root = root.into();
        self
    }

    /// Override the data-server unit restarted after changes.
    pub fn with_server_unit(mut self, unit: impl Into<String>) -> Self {
        self.server_unit = unit.into();
        self
    }

    fn systemctl(&self, args: &[&str]) -> Result<CommandOutput> {
        self.runner.run("systemctl", args)
    }

    /// Run systemctl and treat a nonzero exit as an error carrying stderr.
    fn systemctl_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.systemctl(args)?;
        if output.success {
            Ok(output.stdout.trim().to_string())
        } else {
            Err(Error::Command {
                program: format!("systemctl {}", args.join(" ")),
                cause: output.stderr.trim().to_string(),
            })
        }
    }

    fn dropin_dir(&self, unit: &str) -> PathBuf {
        self.dropin_root.join(format!("{unit}.d"))
    }

    /// Write the dependency drop-in for `unit` and reload unit files.
    fn write_dropin(&self, unit: &str, rule: &DependencyRule) -> Result<()> {
        let directive = match rule.kind {
            DependencyKind::Require => "Requires",
            // systemd has no optional grouping; Wants= is the weak edge.
            DependencyKind::Want | DependencyKind::Optional => "Wants",
        };
        let content = format!(
            "[Unit]\n{directive}={target}\nAfter={target}\n",
            target = rule.target
        );

        let dir = self.dropin_dir(unit);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(DROPIN_FILE), content)?;
        tracing::info!(unit, target = %rule.target, "declared media dependency");

        self.systemctl_checked(&["daemon-reload"])?;
        Ok(())
    }

    fn remove_dropin(&self, unit: &str) -> Result<bool> {
        let dir = self.dropin_dir(unit);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Enable the instance unit, falling back to the hashed identifier if
    /// systemd rejects a verbatim device name the grammar check accepted.
    fn enable_unit(&self, device: &DeviceSection) -> Result<String> {
        let identifier = self.identifier_for(&device.name);
        let unit = self.full_unit_name(&identifier);

        match self.systemctl_checked(&["enable", &unit]) {
            Ok(_) => Ok(identifier),
            Err(first) if identifier == device.name => {
                let fallback = crate::naming::hashed_identifier(&device.name);
                tracing::warn!(
                    device = %device.name,
                    error = %first,
                    "verbatim name rejected, retrying with hashed identifier"
                );
                let unit = self.full_unit_name(&fallback);
                self.systemctl_checked(&["enable", &unit])?;
                Ok(fallback)
            }
            Err(e) => Err(e),
        }
    }
}

impl ServiceBackend for SystemdBackend {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn is_legal_identifier(&self, name: &str) -> bool {
        !name.is_empty()
            && !name
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || c == '/' || c == '@')
    }

    fn full_unit_name(&self, name_or_identifier: &str) -> String {
        if name_or_identifier.starts_with(UNIT_PREFIX) && name_or_identifier.ends_with(UNIT_SUFFIX)
        {
            name_or_identifier.to_string()
        } else {
            format!("{UNIT_PREFIX}{name_or_identifier}{UNIT_SUFFIX}")
        }
    }

    fn instance_suffix(&self, full_unit_name: &str) -> String {
        full_unit_name
            .strip_prefix(UNIT_PREFIX)
            .and_then(|s| s.strip_suffix(UNIT_SUFFIX))
            .unwrap_or(full_unit_name)
            .to_string()
    }

    fn list_instances(&self) -> Result<Vec<String>> {
        let mut instances: Vec<String> = self
            .list_instances_raw()?
            .iter()
            .map(|unit| self.instance_suffix(unit))
            .collect();
        instances.sort_by(|a, b| natural_cmp(a, b));
        Ok(instances)
    }

    fn list_instances_raw(&self) -> Result<Vec<String>> {
        let stdout =
            self.systemctl_checked(&["list-unit-files", "--no-legend", "--plain", UNIT_PATTERN])?;

        let mut units: Vec<String> = stdout
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            // The template itself has an empty instance and is not a
            // registered device.
            .filter(|unit| *unit != "ups-driver@.service")
            .map(str::to_string)
            .collect();
        units.sort_by(|a, b| natural_cmp(a, b));
        Ok(units)
    }

    fn register_instance(&self, device: &DeviceSection, auto_start: bool) -> Result<String> {
        let wrap = |e: Error| Error::Register {
            device: device.name.clone(),
            cause: e.to_string(),
        };

        let identifier = self.enable_unit(device).map_err(wrap)?;
        let unit = self.full_unit_name(&identifier);
        tracing::info!(device = %device.name, unit, "registered instance");

        if let Some(rule) = self.dependencies.rule_for(device.media()) {
            self.write_dropin(&unit, rule).map_err(wrap)?;
        }

        if auto_start {
            // Clearing stale failure state is best-effort.
            let _ = self.systemctl(&["reset-failed", &unit]);
            self.systemctl_checked(&["start", &unit]).map_err(wrap)?;
            tracing::info!(unit, "started instance");
        }

        Ok(identifier)
    }

    fn unregister_instance(&self, identifier: &str) -> Result<()> {
        let wrap = |e: Error| Error::Unregister {
            identifier: identifier.to_string(),
            cause: e.to_string(),
        };

        let unit = self.full_unit_name(identifier);

        // A failing stop must not prevent the disable step.
        if let Err(e) = self.systemctl_checked(&["stop", &unit]) {
            tracing::warn!(unit, error = %e, "stop failed, continuing with disable");
        }

        self.systemctl_checked(&["disable", &unit]).map_err(wrap)?;

        if self.remove_dropin(&unit).map_err(wrap)? {
            self.systemctl_checked(&["daemon-reload"]).map_err(wrap)?;
        }

        tracing::info!(unit, "unregistered instance");
        Ok(())
    }

    fn restart_dependent_server(&self) -> Result<()> {
        self.systemctl_checked(&["try-restart", &self.server_unit])
            .map_err(|e| Error::Restart {
                cause: e.to_string(),
            })?;
        tracing::info!(unit = %self.server_unit, "restarted dependent server");
        Ok(())
    }
}
