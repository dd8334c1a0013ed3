// Integration tests for CLI commands
// These run the built binary against a temporary config and snapshot.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn daopool(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_daopool"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_daopool"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Operator CLI for a local DAO pools node"));
    assert!(stdout.contains("init"));
    assert!(stdout.contains("status"));
    assert!(stdout.contains("mine"));
    assert!(stdout.contains("version"));
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_daopool"))
        .arg("version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_init_mine_status() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config.toml");
    let state = temp_dir.path().join("state.cbor");

    let output = daopool(&config, &["init", "--state-path", state.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(config.exists());
    assert!(state.exists());

    let output = daopool(&config, &["mine", "--blocks", "12"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("0 -> 12"));

    let output = daopool(&config, &["status", "--json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["block"], 12);
    assert_eq!(report["pools"].as_array().map(Vec::len), Some(0));

    let output = daopool(&config, &["status"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No pools"));
}

#[test]
fn test_init_twice_needs_force() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config.toml");
    let state = temp_dir.path().join("state.cbor");

    assert!(daopool(&config, &["init", "--state-path", state.to_str().unwrap()])
        .status
        .success());

    let output = daopool(&config, &["init"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--force"));

    assert!(daopool(&config, &["init", "--force"]).status.success());
}

#[test]
fn test_status_without_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = daopool(&temp_dir.path().join("missing.toml"), &["status"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read config file"));
}
