use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

#[test]
fn simulate_prints_the_command_log() {
    cargo_bin_cmd!("aliquot")
        .args(["--log-level", "warn", "simulate"])
        .arg(fixture("plate_fill.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Protocol: Plate fill"))
        .stdout(predicate::str::contains("Loading flex_1channel_50 on the left mount"))
        .stdout(predicate::str::contains("Fill the first column"))
        .stdout(predicate::str::contains("Tips used: 1"))
        .stdout(predicate::str::contains("D1 of labware-"));
}

#[test]
fn simulate_json_is_machine_readable() {
    let output = cargo_bin_cmd!("aliquot")
        .args(["--log-level", "error", "simulate", "--json"])
        .arg(fixture("plate_fill.json"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["protocolName"], "Plate fill");
    assert_eq!(summary["tipsUsed"], 1);
    assert!(summary["commands"].as_array().unwrap().iter().any(|c| c["commandType"] == "blowOut"));
    let plate_volumes: Vec<f64> = summary["liquidRemaining"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|well| well["labwareId"] != summary["commands"][1]["params"]["labwareId"])
        .filter_map(|well| well["volume"].as_f64())
        .collect();
    assert_eq!(plate_volumes, vec![10.0, 10.0, 10.0, 10.0]);
}

#[test]
fn failing_protocols_exit_non_zero_with_the_cause() {
    cargo_bin_cmd!("aliquot")
        .args(["simulate"])
        .arg(fixture("bad_reference.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad_reference.json failed"))
        .stderr(predicate::str::contains("Unknown pipette 'p1000' in protocol file (step 1 (pickUpTip))"));

    cargo_bin_cmd!("aliquot")
        .args(["simulate", "no_such_protocol.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading no_such_protocol.json"));
}

#[test]
fn liquid_classes_can_be_listed_and_shown() {
    cargo_bin_cmd!("aliquot")
        .args(["liquid-classes", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("water"))
        .stdout(predicate::str::contains("ethanol_80"))
        .stdout(predicate::str::contains("glycerol_50"));

    cargo_bin_cmd!("aliquot")
        .args(["liquid-classes", "show", "water"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"liquidClassName\": \"water\""));

    cargo_bin_cmd!("aliquot")
        .args(["liquid-classes", "show", "water", "--pipette", "flex_1channel_50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("opentrons_flex_96_tiprack_50ul"));

    cargo_bin_cmd!("aliquot")
        .args([
            "liquid-classes",
            "show",
            "water",
            "--pipette",
            "flex_1channel_50",
            "--tip-rack",
            "opentrons_flex_96_tiprack_50ul",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"aspirate\""));

    cargo_bin_cmd!("aliquot").args(["liquid-classes", "show", "honey"]).assert().failure();
}

#[test]
fn labware_can_be_listed_and_shown() {
    cargo_bin_cmd!("aliquot")
        .args(["labware", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("opentrons/nest_12_reservoir_15ml/1"));

    cargo_bin_cmd!("aliquot")
        .args(["labware", "show", "opentrons_flex_96_tiprack_50ul"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wells:      96"))
        .stdout(predicate::str::contains("Tip rack:   yes"));
}

#[test]
fn explicit_config_files_must_exist() {
    cargo_bin_cmd!("aliquot")
        .args(["--config", "missing.toml", "labware", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration is malformed"));
}

#[test]
fn config_files_configure_the_robot_and_logs() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("aliquot.toml");
    let logs = dir.path().join("logs");
    fs::write(&config, "[robot]\ntrash_slot = \"A1\"\n\n[logging]\nlevel = \"debug\"\n").unwrap();

    let output = cargo_bin_cmd!("aliquot")
        .arg("--config")
        .arg(&config)
        .arg("--log-dir")
        .arg(&logs)
        .args(["simulate", "--json"])
        .arg(fixture("plate_fill.json"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let trash = summary["commands"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["commandType"] == "loadTrashBin")
        .unwrap();
    assert_eq!(trash["params"]["slot"], "A1");
    assert!(fs::read_dir(&logs).unwrap().next().is_some());
}
