//! Full-stack reconciliation tests
//!
//! These exercise the real catalog, engine, and backend code paths with
//! a scripted command runner standing in for the host's service manager.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use upsync_config::{ConfigReader, DeviceCatalog, DeviceSection};
use upsync_core::engine::{ReconcileState, reconcile};
use upsync_core::runner::{CommandOutput, ScriptedRunner};
use upsync_core::{ServiceBackend, SmfBackend, SystemdBackend, hashed_identifier};

const SYSTEMD_LIST: &str = "systemctl list-unit-files --no-legend --plain ups-driver@*.service";
const SMF_LIST: &str = "svcs -H -o fmri svc:/system/power/ups-driver:*";

fn load_devices(content: &str) -> (TempDir, Vec<DeviceSection>) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ups.conf");
    fs::write(&path, content).unwrap();
    let devices = DeviceCatalog::new(ConfigReader::new(path)).load().unwrap();
    (temp, devices)
}

fn systemd_backend() -> (Arc<ScriptedRunner>, TempDir, SystemdBackend) {
    let runner = Arc::new(ScriptedRunner::new());
    let dropins = TempDir::new().unwrap();
    let backend =
        SystemdBackend::new(runner.clone()).with_dropin_root(dropins.path().to_path_buf());
    (runner, dropins, backend)
}

#[test]
fn scenario_a_registers_both_devices() {
    let (_conf, devices) = load_devices(
        "[ups1]\ndriver = usbhid-ups\nport = auto\n[ups2]\ndriver = snmp-ups\nport = 10.0.0.2\n",
    );
    let (runner, _dropins, backend) = systemd_backend();

    let populated = "ups-driver@ups1.service enabled\nups-driver@ups2.service enabled\n";
    runner.script(SYSTEMD_LIST, CommandOutput::ok(""));
    runner.script(SYSTEMD_LIST, CommandOutput::ok(populated));
    runner.script(SYSTEMD_LIST, CommandOutput::ok(populated));

    let report = reconcile(&devices, &backend, true).unwrap();

    assert_eq!(report.state, ReconcileState::ChangedMatched);
    assert_eq!(report.added, vec!["ups1", "ups2"]);
    assert!(report.removed.is_empty());
    assert!(report.failures.is_empty());

    let calls = runner.calls();
    assert!(calls.contains(&"systemctl enable ups-driver@ups1.service".to_string()));
    assert!(calls.contains(&"systemctl enable ups-driver@ups2.service".to_string()));
    assert!(calls.contains(&"systemctl start ups-driver@ups1.service".to_string()));
    assert!(calls.contains(&"systemctl try-restart ups-server.service".to_string()));
}

#[test]
fn scenario_b_matched_issues_no_mutations() {
    let (_conf, devices) = load_devices(
        "[ups1]\ndriver = usbhid-ups\nport = auto\n[ups2]\ndriver = snmp-ups\nport = 10.0.0.2\n",
    );
    let (runner, _dropins, backend) = systemd_backend();

    runner.script(
        SYSTEMD_LIST,
        CommandOutput::ok("ups-driver@ups1.service enabled\nups-driver@ups2.service enabled\n"),
    );

    let report = reconcile(&devices, &backend, true).unwrap();

    assert_eq!(report.state, ReconcileState::Matched);
    assert!(report.added.is_empty() && report.removed.is_empty());
    // Only the initial enumeration ran.
    assert_eq!(runner.calls().len(), 1);
}

#[test]
fn scenario_c_unregisters_dropped_device() {
    let (_conf, devices) = load_devices("[ups1]\ndriver = usbhid-ups\nport = auto\n");
    let (runner, _dropins, backend) = systemd_backend();

    let populated = "ups-driver@ups1.service enabled\nups-driver@ups2.service enabled\n";
    runner.script(SYSTEMD_LIST, CommandOutput::ok(populated));
    runner.script(SYSTEMD_LIST, CommandOutput::ok(populated));
    runner.script(
        SYSTEMD_LIST,
        CommandOutput::ok("ups-driver@ups1.service enabled\n"),
    );

    let report = reconcile(&devices, &backend, true).unwrap();

    assert_eq!(report.state, ReconcileState::ChangedMatched);
    assert!(report.added.is_empty());
    assert_eq!(report.removed, vec!["ups2"]);

    let calls = runner.calls();
    assert!(calls.contains(&"systemctl stop ups-driver@ups2.service".to_string()));
    assert!(calls.contains(&"systemctl disable ups-driver@ups2.service".to_string()));
    assert!(calls.contains(&"systemctl try-restart ups-server.service".to_string()));
}

#[test]
fn scenario_d_smf_registers_illegal_name_under_hash() {
    let (_conf, devices) = load_devices("[123bad:name]\ndriver = usbhid-ups\nport = auto\n");
    let runner = Arc::new(ScriptedRunner::new());
    let backend = SmfBackend::new(runner.clone());

    let hashed = hashed_identifier("123bad:name");
    let fmri = format!("svc:/system/power/ups-driver:{hashed}\n");
    runner.script(
        SMF_LIST,
        CommandOutput::fail("svcs: pattern doesn't match any instances"),
    );
    runner.script(SMF_LIST, CommandOutput::ok(fmri.clone()));
    runner.script(SMF_LIST, CommandOutput::ok(fmri));

    let report = reconcile(&devices, &backend, true).unwrap();

    assert_eq!(report.state, ReconcileState::ChangedMatched);
    assert_eq!(report.added, vec!["123bad:name"]);
    assert!(
        runner
            .calls()
            .contains(&format!("svccfg -s system/power/ups-driver add {hashed}"))
    );

    // The hashed form is what a subsequent enumeration reports.
    runner.script(
        SMF_LIST,
        CommandOutput::ok(format!("svc:/system/power/ups-driver:{hashed}\n")),
    );
    assert_eq!(backend.list_instances().unwrap(), vec![hashed]);
}

#[test]
fn auto_start_disabled_suppresses_start_and_restart() {
    let (_conf, devices) = load_devices("[ups1]\ndriver = usbhid-ups\nport = auto\n");
    let (runner, _dropins, backend) = systemd_backend();

    let populated = "ups-driver@ups1.service enabled\n";
    runner.script(SYSTEMD_LIST, CommandOutput::ok(""));
    runner.script(SYSTEMD_LIST, CommandOutput::ok(populated));
    runner.script(SYSTEMD_LIST, CommandOutput::ok(populated));

    let report = reconcile(&devices, &backend, false).unwrap();

    assert_eq!(report.state, ReconcileState::ChangedMatched);
    let calls = runner.calls();
    assert!(!calls.iter().any(|c| c.starts_with("systemctl start")));
    assert!(!calls.iter().any(|c| c.starts_with("systemctl try-restart")));
}

#[test]
fn register_failure_leaves_pass_unmatched() {
    let (_conf, devices) = load_devices(
        "[ups1]\ndriver = usbhid-ups\nport = auto\n[ups2]\ndriver = usbhid-ups\nport = auto\n",
    );
    let (runner, _dropins, backend) = systemd_backend();

    // ups1 fails both the verbatim enable and the hashed fallback.
    runner.script(
        "systemctl enable ups-driver@ups1.service",
        CommandOutput::fail("unit file error"),
    );
    let hashed_unit = format!("systemctl enable ups-driver@{}.service", hashed_identifier("ups1"));
    runner.script(&hashed_unit, CommandOutput::fail("unit file error"));

    runner.script(SYSTEMD_LIST, CommandOutput::ok(""));
    let after = "ups-driver@ups2.service enabled\n";
    runner.script(SYSTEMD_LIST, CommandOutput::ok(after));
    runner.script(SYSTEMD_LIST, CommandOutput::ok(after));

    let report = reconcile(&devices, &backend, true).unwrap();

    assert_eq!(report.state, ReconcileState::ChangedUnmatched);
    assert_eq!(report.added, vec!["ups2"]);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains("ups1"));
}
