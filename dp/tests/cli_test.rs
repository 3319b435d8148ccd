//! Integration tests for the `dp` binary

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn dp() -> Command {
    Command::cargo_bin("dp").expect("dp binary should build")
}

fn write_config(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("dashpoll.yml");
    fs::write(&path, yaml).expect("Failed to write config");
    path
}

#[test]
fn test_help_lists_commands() {
    dp().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_prints_effective_yaml() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(
        &dir,
        "polling:\n  interval-ms: 750\npanels:\n  - id: cpu\n    url: http://127.0.0.1:9/cpu\n",
    );

    dp().args(["config", "-c"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("interval-ms: 750"))
        .stdout(predicate::str::contains("id: cpu"))
        .stdout(predicate::str::contains("timeout-ms: 5000"));
}

#[test]
fn test_config_missing_file_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    dp().args(["config", "-c"])
        .arg(dir.path().join("missing.yml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_run_rejects_zero_interval() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&dir, "polling:\n  interval-ms: 0\n");

    dp().args(["run", "-c"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("interval-ms must be greater than zero"));
}

#[test]
fn test_run_rejects_duplicate_panels() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(
        &dir,
        "panels:\n  - id: cpu\n    url: http://127.0.0.1:9/a\n  - id: cpu\n    url: http://127.0.0.1:9/b\n",
    );

    dp().args(["run", "-c"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate panel id: cpu"));
}

#[test]
fn test_run_interval_override_is_validated() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&dir, "polling:\n  interval-ms: 1000\n");

    dp().args(["run", "--interval-ms", "0", "-c"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("interval-ms must be greater than zero"));
}
