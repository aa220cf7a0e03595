//! Command implementations and the exit-status policy

use std::sync::Arc;

use colored::Colorize;

use upsync_config::{ConfigReader, DeviceCatalog};
use upsync_core::engine::{ReconcileState, reconcile};
use upsync_core::runner::SystemRunner;
use upsync_core::{ServiceBackend, select_backend};

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};

/// Desired and actual matched, or the change report was suppressed.
pub const EXIT_OK: i32 = 0;
/// Changed and now matched; a downstream restart is expected.
pub const EXIT_CHANGED: i32 = 42;
/// Changed but still unmatched (partial failure).
pub const EXIT_UNMATCHED: i32 = 13;
/// Invalid inputs, e.g. an unknown backend.
pub const EXIT_INVALID: i32 = 1;
/// Config resource missing or unreadable.
pub const EXIT_CONFIG: i32 = 2;

/// Dispatch the parsed command line. Returns the process exit code.
pub fn execute(cli: &Cli) -> Result<i32> {
    match &cli.command {
        None | Some(Commands::Reconcile) => run_reconcile(cli),
        Some(Commands::ListDevices { json }) => run_list_devices(cli, *json),
        Some(Commands::ListUnits) => run_list_units(cli),
        Some(Commands::ListInstances) => run_list_instances(cli),
        Some(Commands::ServiceFor { device }) => run_service_for(cli, device),
        Some(Commands::DeviceFor { unit }) => run_device_for(cli, unit),
        Some(Commands::Map { json }) => run_map(cli, *json),
        Some(Commands::ShowDevice { name }) => run_show_device(cli, name),
        Some(Commands::Get { device, key }) => run_get(cli, device, key),
    }
}

fn catalog(cli: &Cli) -> DeviceCatalog {
    DeviceCatalog::new(ConfigReader::new(&cli.config))
}

fn backend(cli: &Cli) -> Result<Box<dyn ServiceBackend>> {
    Ok(select_backend(cli.backend.into(), Arc::new(SystemRunner))?)
}

/// Map a reconcile outcome to the process exit status.
///
/// `report_restart` is false when auto-start is disabled or the caller
/// asked for quiet convergence; a converged change then reports 0
/// instead of 42.
pub fn exit_code(state: ReconcileState, report_restart: bool) -> i32 {
    match state {
        ReconcileState::Matched => EXIT_OK,
        ReconcileState::ChangedMatched => {
            if report_restart {
                EXIT_CHANGED
            } else {
                EXIT_OK
            }
        }
        ReconcileState::ChangedUnmatched => EXIT_UNMATCHED,
    }
}

fn run_reconcile(cli: &Cli) -> Result<i32> {
    let devices = catalog(cli).load()?;
    let backend = backend(cli)?;
    let auto_start = !cli.no_start;

    let report = reconcile(&devices, &*backend, auto_start)?;

    for name in &report.added {
        println!("{} {}", "added".green().bold(), name);
    }
    for identity in &report.removed {
        println!("{} {}", "removed".yellow().bold(), identity);
    }
    for failure in &report.failures {
        eprintln!("{}: {}", "failed".red().bold(), failure);
    }

    let report_restart = auto_start && !cli.quiet_restart_exit;
    Ok(exit_code(report.state, report_restart))
}

fn run_list_devices(cli: &Cli, json: bool) -> Result<i32> {
    let devices = catalog(cli).load()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else {
        for device in &devices {
            println!("{}", device.name);
        }
    }
    Ok(EXIT_OK)
}

fn run_list_units(cli: &Cli) -> Result<i32> {
    for unit in backend(cli)?.list_instances_raw()? {
        println!("{unit}");
    }
    Ok(EXIT_OK)
}

fn run_list_instances(cli: &Cli) -> Result<i32> {
    for instance in backend(cli)?.list_instances()? {
        println!("{instance}");
    }
    Ok(EXIT_OK)
}

fn run_service_for(cli: &Cli, device: &str) -> Result<i32> {
    let device = catalog(cli).find(device)?;
    let backend = backend(cli)?;
    let identifier = backend.identifier_for(&device.name);
    println!("{}", backend.full_unit_name(&identifier));
    Ok(EXIT_OK)
}

/// Hashed identities cannot be decoded; the device is recovered by
/// re-deriving every known device's identity forward.
fn run_device_for(cli: &Cli, unit: &str) -> Result<i32> {
    let devices = catalog(cli).load()?;
    let backend = backend(cli)?;
    let suffix = backend.instance_suffix(unit);

    let device = devices
        .iter()
        .find(|d| d.name == suffix || backend.identifier_for(&d.name) == suffix)
        .ok_or_else(|| CliError::user(format!("No configured device maps to '{unit}'")))?;
    println!("{}", device.name);
    Ok(EXIT_OK)
}

fn run_map(cli: &Cli, json: bool) -> Result<i32> {
    let devices = catalog(cli).load()?;
    let backend = backend(cli)?;

    if json {
        let pairs: Vec<serde_json::Value> = devices
            .iter()
            .map(|d| {
                serde_json::json!({
                    "device": d.name,
                    "unit": backend.full_unit_name(&backend.identifier_for(&d.name)),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&pairs)?);
    } else {
        for device in &devices {
            let unit = backend.full_unit_name(&backend.identifier_for(&device.name));
            println!("{}\t{}", device.name, unit);
        }
    }
    Ok(EXIT_OK)
}

fn run_show_device(cli: &Cli, name: &str) -> Result<i32> {
    let section = ConfigReader::new(&cli.config).section(name)?;
    println!("[{}]", section.name);
    for (key, value) in &section.entries {
        println!("\t{key} = \"{value}\"");
    }
    Ok(EXIT_OK)
}

fn run_get(cli: &Cli, device: &str, key: &str) -> Result<i32> {
    println!("{}", ConfigReader::new(&cli.config).value(device, key)?);
    Ok(EXIT_OK)
}
