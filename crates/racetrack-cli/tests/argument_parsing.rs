//! CLI argument parsing and replay tests.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const RACY_TRACE: &str = r#"# two threads write the same field without a lock
{"kind":"thread-start","thread":0,"child":1}
{"kind":"access","thread":0,"target":{"field":{"object":1,"owner":1,"field":0}},"is_write":true,"site":10}
{"kind":"access","thread":1,"target":{"field":{"object":1,"owner":1,"field":0}},"is_write":true,"site":11}
"#;

const LOCKED_TRACE: &str = r#"{"kind":"acquire","thread":0,"lock":7}
{"kind":"access","thread":0,"target":{"field":{"object":1,"owner":1,"field":0}},"is_write":true,"site":10}
{"kind":"release","thread":0,"lock":7}
{"kind":"acquire","thread":1,"lock":7}
{"kind":"access","thread":1,"target":{"field":{"object":1,"owner":1,"field":0}},"is_write":true,"site":11}
{"kind":"release","thread":1,"lock":7}
"#;

fn racetrack(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("racetrack").unwrap();
    cmd.current_dir(project).env("RUST_LOG", "error");
    cmd
}

fn write_trace(dir: &TempDir, contents: &str) -> String {
    let path = dir.path().join("trace.jsonl");
    fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

// ============================================================================
// Basic Commands
// ============================================================================

#[test]
fn version_command_succeeds() {
    let temp = TempDir::new().unwrap();
    racetrack(temp.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("racetrack"));
}

#[test]
fn version_flag_shows_version() {
    let temp = TempDir::new().unwrap();
    racetrack(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("racetrack"));
}

#[test]
fn help_flag_shows_usage() {
    let temp = TempDir::new().unwrap();
    racetrack(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("replay"));
}

#[test]
fn replay_requires_trace_argument() {
    let temp = TempDir::new().unwrap();
    racetrack(temp.path()).arg("replay").assert().failure();
}

#[test]
fn unknown_format_rejected() {
    let temp = TempDir::new().unwrap();
    let trace = write_trace(&temp, LOCKED_TRACE);
    racetrack(temp.path())
        .args(["replay", &trace, "--format", "xml"])
        .assert()
        .failure();
}

// ============================================================================
// Replay
// ============================================================================

#[test]
fn replay_reports_unsynchronized_writes() {
    let temp = TempDir::new().unwrap();
    let trace = write_trace(&temp, RACY_TRACE);
    racetrack(temp.path())
        .args(["replay", &trace])
        .assert()
        .success()
        .stdout(predicate::str::contains("Write-Write Race at site#11"))
        .stdout(predicate::str::contains("1 race(s)"))
        .stdout(predicate::str::contains("Distinct race pairs: 1"));
}

#[test]
fn replay_of_locked_trace_is_clean() {
    let temp = TempDir::new().unwrap();
    let trace = write_trace(&temp, LOCKED_TRACE);
    racetrack(temp.path())
        .args(["replay", &trace, "--deny-races"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Replayed 6 events, 0 race(s)"));
}

#[test]
fn deny_races_fails_on_race() {
    let temp = TempDir::new().unwrap();
    let trace = write_trace(&temp, RACY_TRACE);
    racetrack(temp.path())
        .args(["replay", &trace, "--deny-races"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("race(s) reported"));
}

#[test]
fn replay_json_output_parses() {
    let temp = TempDir::new().unwrap();
    let trace = write_trace(&temp, RACY_TRACE);
    let output = racetrack(temp.path())
        .args(["replay", &trace, "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["events"], 3);
    assert_eq!(summary["total_races"], 1);
    assert_eq!(summary["races"][0]["kind"], "write-write");
}

#[test]
fn malformed_line_names_its_line_number() {
    let temp = TempDir::new().unwrap();
    let trace = write_trace(&temp, "{\"kind\":\"acquire\",\"thread\":0,\"lock\":1}\nnot json\n");
    racetrack(temp.path())
        .args(["replay", &trace])
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn missing_trace_file_fails() {
    let temp = TempDir::new().unwrap();
    racetrack(temp.path())
        .args(["replay", "does-not-exist.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open trace"));
}

#[test]
fn sampling_config_from_project_dir_is_used() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("racetrack.toml"),
        "[detector]\ncount_operations = true\n\n[sampling.count]\nrate = 0\n",
    )
    .unwrap();
    let trace = write_trace(&temp, RACY_TRACE);
    racetrack(temp.path())
        .args(["replay", &trace, "--config", temp.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 race(s)"))
        .stdout(predicate::str::contains("Skipped"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_shows_defaults_as_toml() {
    let temp = TempDir::new().unwrap();
    racetrack(temp.path())
        .args(["config", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_threads"));
}

#[test]
fn invalid_project_config_fails() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("racetrack.toml"),
        "[sampling.count]\nrate = 250\n",
    )
    .unwrap();
    racetrack(temp.path())
        .args(["config", "--config", temp.path().to_str().unwrap()])
        .assert()
        .failure();
}
