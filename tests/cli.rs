//! Integration tests for the backee CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = r#"
settings:
  name: home-server
servers:
  - type: ssh
    name: nas
    location: /volume1/backups
    connection:
      host: nas.local
      port: 2222
      username: backup
    rotation_strategy:
      daily: 7
      monthly: 3
backup_items:
  files:
    includes:
      - /etc
"#;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.yml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("backee").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("hard-linked"))
        .stdout(predicate::str::contains("rotation"));
}

#[test]
fn test_config_summary() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, CONFIG);

    let mut cmd = Command::cargo_bin("backee").unwrap();
    cmd.arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration 'home-server'"))
        .stdout(predicate::str::contains("ssh://backup@nas.local:2222"))
        .stdout(predicate::str::contains("7 daily, 3 monthly, 0 yearly"));
}

#[test]
fn test_config_from_env() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, CONFIG);

    let mut cmd = Command::cargo_bin("backee").unwrap();
    cmd.arg("config")
        .env("BACKEE_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("home-server"));
}

#[test]
fn test_missing_config_fails() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("backee").unwrap();
    cmd.arg("backup")
        .arg("--config")
        .arg(temp_dir.path().join("absent.yml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read configuration file"));
}

#[test]
fn test_unsupported_server_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        &temp_dir,
        r#"
settings: {name: legacy}
servers:
  - type: ftp
    name: old
    location: /
"#,
    );

    let mut cmd = Command::cargo_bin("backee").unwrap();
    cmd.arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported server type: 'ftp'"));
}

#[test]
fn test_rotation_dry_run() {
    let mut cmd = Command::cargo_bin("backee").unwrap();
    cmd.args([
        "rotation",
        "--daily",
        "1",
        "--monthly",
        "1",
        "--now",
        "2024-05-17",
        "backup_2024-05-17-03-00",
        "backup_2024-05-16-03-00",
        "backup_2024-05-01-03-00",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("1 daily, 1 monthly, 0 yearly"))
    .stdout(predicate::str::contains("2 kept, 1 deleted, 0 untouched"));
}

#[test]
fn test_rotation_rejects_bad_date() {
    let mut cmd = Command::cargo_bin("backee").unwrap();
    cmd.args(["rotation", "--now", "17/05/2024", "backup_2024-05-17-03-00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date"));
}
