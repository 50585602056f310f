use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn settlekit() -> Command {
    let mut cmd = Command::cargo_bin("settlekit").unwrap();
    // Keep a developer's own config out of the picture.
    cmd.env("HOME", env!("CARGO_TARGET_TMPDIR"));
    cmd
}

#[test]
fn test_help_exits_zero() {
    settlekit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("settlekit"));
}

#[test]
fn test_fill_prints_snapshot() {
    let fixture = fixture_path("login.html");

    settlekit()
        .args(["fill", fixture.to_str().unwrap(), "#email", "ada@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("input#email.field.wide"))
        .stdout(predicate::str::contains("value: ada@example.com"))
        .stdout(predicate::str::contains("focused: true"));
}

#[test]
fn test_fill_by_label_json() {
    let fixture = fixture_path("login.html");

    let assert = settlekit()
        .args(["--format", "json", "fill", fixture.to_str().unwrap(), "Email address", "x@y.z", "--label"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let output: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(output["success"], true);
    assert_eq!(output["element"]["id"], "email");
    assert_eq!(output["element"]["value"], "x@y.z");
}

#[test]
fn test_fill_contenteditable_markup() {
    let fixture = fixture_path("login.html");

    settlekit()
        .args(["fill", fixture.to_str().unwrap(), "#bio", "<b>hi</b>"])
        .assert()
        .success()
        .stdout(predicate::str::contains("innerHTML: <b>hi</b>"))
        .stdout(predicate::str::contains("text: hi"));
}

#[test]
fn test_fill_missing_element_fails() {
    let fixture = fixture_path("login.html");

    settlekit()
        .args(["fill", fixture.to_str().unwrap(), "#does-not-exist", "x"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Element not found when calling `fillText('#does-not-exist')`.",
        ));
}

#[test]
fn test_fill_readonly_fails() {
    let fixture = fixture_path("login.html");

    settlekit()
        .args(["fill", fixture.to_str().unwrap(), "#account", "admin"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("readonly '#account'"));
}

#[test]
fn test_fill_over_maxlength_fails() {
    let fixture = fixture_path("login.html");

    settlekit()
        .args(["fill", fixture.to_str().unwrap(), "#password", "much-too-long"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("exceeds maxlength: '8'"));
}

#[test]
fn test_fill_button_is_unsupported() {
    let fixture = fixture_path("login.html");

    settlekit()
        .args(["fill", fixture.to_str().unwrap(), "#submit", "x"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("only usable on form controls"));
}

#[test]
fn test_run_script() {
    let fixture = fixture_path("login.html");
    let script = fixture_path("script.json");

    settlekit()
        .args(["run", fixture.to_str().unwrap(), script.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok     fill_text"))
        .stdout(predicate::str::contains("ada@example.com"))
        .stdout(predicate::str::contains("Signed out"))
        .stdout(predicate::str::contains("FAILED").not());
}

#[test]
fn test_run_script_json_logs() {
    let fixture = fixture_path("login.html");
    let script = fixture_path("script.json");

    let assert = settlekit()
        .args(["-f", "json", "run", fixture.to_str().unwrap(), script.to_str().unwrap()])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let logs: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(logs.len(), 8);
    assert!(logs.iter().all(|log| log["result"] == "Success"));
    assert_eq!(logs[6]["data"], "ada@example.com");
}

#[test]
fn test_run_failing_script_stops() {
    let fixture = fixture_path("login.html");
    let script = fixture_path("failing_script.json");

    let assert = settlekit()
        .args(["run", fixture.to_str().unwrap(), script.to_str().unwrap()])
        .assert()
        .code(1);

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout.lines().filter(|l| l.starts_with("ok")).count(), 1);
    assert!(stdout.contains("FAILED fill_text"));
    assert!(!stdout.contains("get_value"));
}

#[test]
fn test_run_malformed_script() {
    let fixture = fixture_path("login.html");
    let script = fixture_path("malformed_script.json");

    settlekit()
        .args(["run", fixture.to_str().unwrap(), script.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to parse script"));
}

#[test]
fn test_missing_fixture() {
    settlekit()
        .args(["fill", "nonexistent_fixture_that_does_not_exist.html", "#a", "b"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to read fixture"));
}

#[test]
fn test_bad_config_file() {
    let fixture = fixture_path("login.html");
    let config = fixture_path("malformed_script.json");

    settlekit()
        .args(["--config", config.to_str().unwrap(), "fill", fixture.to_str().unwrap(), "#email", "x"])
        .assert()
        .code(2);
}

#[test]
fn test_unknown_subcommand() {
    settlekit()
        .arg("totally-fake-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
