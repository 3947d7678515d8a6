use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn bin() -> Command {
    Command::cargo_bin("weighbridge").unwrap()
}

#[test]
fn self_check_passes_with_defaults() {
    bin()
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("self-check ok"));
}

#[test]
fn decode_known_bcd_frame() {
    bin()
        .args(["decode", "0218500003"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1850.00"));
}

#[test]
fn decode_rejects_bad_hex() {
    bin().args(["decode", "zz"]).assert().failure();
}

#[test]
fn decode_json_carries_centi_value() {
    let out = bin()
        .args(["--json", "decode", "0208200003"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["weight_centi"], 82_000);
    assert_eq!(v["weight"], "820.00");
}

#[test]
fn run_without_hardware_feature_fails_clearly() {
    bin()
        .args(["run", "--duration-s", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hardware"));
}

#[test]
fn invalid_config_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[serial]\nbaud = 0").unwrap();
    bin()
        .arg("--config")
        .arg(file.path())
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("baud"));
}

#[test]
fn simulate_two_visits_produces_a_waybill() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[stability]\ntolerance = 1.0\nstable_duration_ms = 50\ntick_ms = 5\n"
    )
    .unwrap();

    let out = bin()
        .arg("--config")
        .arg(file.path())
        .args([
            "--json",
            "simulate",
            "--weights",
            "1850,0,820",
            "--plate",
            "京A12345",
            "--plan-quantity",
            "400",
            "--unit-rate",
            "2.5",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let records = v["records"].as_array().unwrap();
    let waybills = v["waybills"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(waybills.len(), 1);
    let bill = &waybills[0];
    // Receiving by default: first visit is the loaded truck.
    assert_eq!(bill["total_weight_centi"], 185_000);
    assert_eq!(bill["truck_weight_centi"], 82_000);
    assert_eq!(bill["goods_weight_centi"], 103_000);
    // plan 400 × 2.5 = 1000.00 vs actual 1030.00 -> +3.0000 %
    assert_eq!(bill["offset_rate_e4"], 30_000);
}
