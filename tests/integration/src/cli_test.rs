//! End-to-end CLI tests
//!
//! These drive the `upsync` binary itself and assert on the exit-status
//! contract and the query command output. Reconcile passes that would
//! shell out to a real service manager are covered in `reconcile_test`
//! against a scripted runner instead.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const SAMPLE: &str = "\
[ups10]
driver = usbhid-ups
port = auto

[ups2]
driver = snmp-ups
port = 10.0.0.2

[proxy]
driver = dummy-ups
port = \"upstream@10.0.0.3\"
";

fn write_config(content: &str) -> (TempDir, String) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ups.conf");
    fs::write(&path, content).unwrap();
    let path = path.to_str().unwrap().to_string();
    (temp, path)
}

fn upsync() -> Command {
    Command::cargo_bin("upsync").unwrap()
}

#[test]
fn missing_config_exits_2() {
    upsync()
        .args(["--config", "/nonexistent/ups.conf", "list-devices"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn missing_config_on_reconcile_exits_2() {
    // Catalog loading fails before any backend work starts.
    upsync()
        .args(["--config", "/nonexistent/ups.conf", "--backend", "systemd"])
        .assert()
        .code(2);
}

#[test]
fn empty_config_exits_2() {
    let (_temp, path) = write_config("\n\n");
    upsync()
        .args(["--config", &path, "list-devices"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("empty"));
}

#[test]
fn list_devices_is_naturally_sorted() {
    let (_temp, path) = write_config(SAMPLE);
    upsync()
        .args(["--config", &path, "list-devices"])
        .assert()
        .success()
        .stdout("proxy\nups2\nups10\n");
}

#[test]
fn list_devices_json_is_parseable() {
    let (_temp, path) = write_config(SAMPLE);
    let output = upsync()
        .args(["--config", &path, "list-devices", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let devices: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let devices = devices.as_array().unwrap();
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[1]["name"], "ups2");
    assert_eq!(devices[1]["driver"], "snmp-ups");
}

#[test]
fn duplicate_sections_are_rejected() {
    let (_temp, path) = write_config("[dup]\ndriver = a\n[dup]\ndriver = b\n");
    upsync()
        .args(["--config", &path, "list-devices"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Duplicate"));
}

#[test]
fn service_for_systemd() {
    let (_temp, path) = write_config(SAMPLE);
    upsync()
        .args(["--config", &path, "--backend", "systemd", "service-for", "ups2"])
        .assert()
        .success()
        .stdout("ups-driver@ups2.service\n");
}

#[test]
fn service_for_smf_hashes_illegal_name() {
    let (_temp, path) = write_config("[123bad:name]\ndriver = usbhid-ups\nport = auto\n");
    upsync()
        .args([
            "--config",
            &path,
            "--backend",
            "smf",
            "service-for",
            "123bad:name",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "svc:/system/power/ups-driver:MD5_",
        ));
}

#[test]
fn device_for_roundtrips() {
    let (_temp, path) = write_config(SAMPLE);
    upsync()
        .args([
            "--config",
            &path,
            "--backend",
            "systemd",
            "device-for",
            "ups-driver@ups2.service",
        ])
        .assert()
        .success()
        .stdout("ups2\n");
}

#[test]
fn device_for_unknown_unit_exits_1() {
    let (_temp, path) = write_config(SAMPLE);
    upsync()
        .args([
            "--config",
            &path,
            "--backend",
            "systemd",
            "device-for",
            "ups-driver@ghost.service",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No configured device"));
}

#[test]
fn map_lists_all_pairs() {
    let (_temp, path) = write_config(SAMPLE);
    upsync()
        .args(["--config", &path, "--backend", "systemd", "map"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ups2\tups-driver@ups2.service"))
        .stdout(predicate::str::contains("proxy\tups-driver@proxy.service"));
}

#[test]
fn show_device_dumps_section() {
    let (_temp, path) = write_config(SAMPLE);
    upsync()
        .args(["--config", &path, "show-device", "proxy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[proxy]"))
        .stdout(predicate::str::contains("driver = \"dummy-ups\""))
        .stdout(predicate::str::contains("port = \"upstream@10.0.0.3\""));
}

#[test]
fn get_single_value() {
    let (_temp, path) = write_config(SAMPLE);
    upsync()
        .args(["--config", &path, "get", "ups2", "port"])
        .assert()
        .success()
        .stdout("10.0.0.2\n");
}

#[test]
fn get_unknown_key_exits_1() {
    let (_temp, path) = write_config(SAMPLE);
    upsync()
        .args(["--config", &path, "get", "ups2", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn unknown_section_exits_1() {
    let (_temp, path) = write_config(SAMPLE);
    upsync()
        .args(["--config", &path, "show-device", "ghost"])
        .assert()
        .code(1);
}
