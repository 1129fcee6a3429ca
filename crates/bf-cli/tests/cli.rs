use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

fn battlefield() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("battlefield"));
    cmd.env_remove("BF_SCENARIO_DIR").env_remove("BF_JSON");
    cmd
}

#[test]
fn lists_scenarios() {
    battlefield()
        .arg("scenarios")
        .assert()
        .success()
        .stdout(predicate::str::contains("creaorder"))
        .stdout(predicate::str::contains("dtrx-onerror"));
}

#[test]
fn run_writes_a_report() {
    let tmp = TempDir::new().expect("tmpdir");
    let out = tmp.path().join("creaorder.json");
    battlefield()
        .args(["run", "creaorder", "--out"])
        .arg(&out)
        .assert()
        .success();

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).expect("json report");
    assert_eq!(report["scenario"], "creaorder");
    let traces = report["receipts"][0]["traces"].as_array().expect("traces");
    assert_eq!(traces.len(), 12);
    assert_eq!(traces[11]["label"], "i1");
    assert!(
        report["state_hash"]
            .as_str()
            .unwrap_or_default()
            .starts_with("sha256:")
    );
}

#[test]
fn unknown_scenario_fails() {
    battlefield()
        .args(["run", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown scenario 'nope'"));
}

#[test]
fn compare_reports_equal_and_different_files() {
    let tmp = TempDir::new().expect("tmpdir");
    let expected = tmp.path().join("expected.json");
    let actual = tmp.path().join("actual.json");
    fs::write(&expected, r#"{"receipts":[{"status":"committed"}]}"#).unwrap();
    fs::write(&actual, r#"{"receipts":[{"status":"committed"}]}"#).unwrap();

    battlefield()
        .arg("compare")
        .args([&expected, &actual])
        .assert()
        .success()
        .stdout(predicate::str::contains("Files are equal, all good"));

    fs::write(&actual, r#"{"receipts":[{"status":"aborted"}]}"#).unwrap();
    battlefield()
        .arg("compare")
        .args([&expected, &actual])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("$.receipts[0].status"))
        .stdout(predicate::str::contains("cp "));

    battlefield()
        .arg("compare")
        .args([&expected, &actual])
        .arg("--accept")
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(&expected).unwrap(),
        fs::read_to_string(&actual).unwrap()
    );
}

#[test]
fn check_accepts_then_matches_oracles() {
    let tmp = TempDir::new().expect("tmpdir");
    battlefield()
        .args(["check", "creaorder", "sktest", "--accept"])
        .env("BF_SCENARIO_DIR", tmp.path())
        .assert()
        .success();
    assert!(tmp.path().join("sktest.expected.json").exists());

    battlefield()
        .args(["check", "creaorder", "sktest"])
        .env("BF_SCENARIO_DIR", tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Files are equal, all good"));
}

#[test]
fn check_without_directory_fails() {
    battlefield()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no scenario directory"));
}
