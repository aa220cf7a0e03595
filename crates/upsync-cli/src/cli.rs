//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use upsync_core::BackendKind;

/// upsync - Keep service-manager instances in sync with the UPS device
/// configuration
#[derive(Parser, Debug)]
#[command(name = "upsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the device configuration file
    #[arg(
        long,
        global = true,
        env = "UPSYNC_UPS_CONF",
        default_value = "/etc/nut/ups.conf"
    )]
    pub config: PathBuf,

    /// Service-manager backend to drive
    #[arg(long, global = true, value_enum, default_value_t = BackendArg::Auto)]
    pub backend: BackendArg,

    /// Do not start instances or restart the data server after changes
    #[arg(long, global = true)]
    pub no_start: bool,

    /// Report exit 0 instead of 42 after a converged change
    #[arg(long, global = true, env = "UPSYNC_QUIET_RESTART")]
    pub quiet_restart_exit: bool,

    /// The command to run; defaults to a reconcile pass
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Backend selection argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    /// Probe the host for a supported service manager
    Auto,
    Systemd,
    Smf,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendKind::Auto,
            BackendArg::Systemd => BackendKind::Systemd,
            BackendArg::Smf => BackendKind::Smf,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Reconcile service instances against the device configuration
    Reconcile,

    /// List configured devices
    ListDevices {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List raw service units registered with the backend
    ListUnits,

    /// List registered instances as normalized identifiers
    ListInstances,

    /// Print the service unit a device maps to
    ServiceFor {
        /// Device name as written in the configuration
        device: String,
    },

    /// Print the device a service unit maps to
    DeviceFor {
        /// Fully qualified unit name or bare instance identifier
        unit: String,
    },

    /// Print the full device-to-unit mapping
    Map {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Dump one device's configuration block
    ShowDevice {
        /// Device name as written in the configuration
        name: String,
    },

    /// Print a single configuration value
    Get {
        /// Device name as written in the configuration
        device: String,
        /// Configuration key within the device section
        key: String,
    },
}
