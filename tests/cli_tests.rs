//! Integration tests for the dispatch-console binary
//!
//! Each test points the binary at its own config directory through
//! DISPATCH_CONSOLE_CONFIG_DIR so the user's settings are never touched.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn run(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dispatch-console"))
        .args(args)
        .env("DISPATCH_CONSOLE_CONFIG_DIR", config_dir)
        .env_remove("JOURNAL_STREAM")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run dispatch-console")
}

#[test]
fn test_help_lists_commands() {
    let temp_dir = tempdir().unwrap();
    let output = run(temp_dir.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["setup", "settings", "check", "connect"] {
        assert!(stdout.contains(command), "help should mention {}", command);
    }
}

#[test]
fn test_no_command_without_autostart_prints_usage() {
    let temp_dir = tempdir().unwrap();
    let output = run(temp_dir.path(), &[]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage"));
}

#[test]
fn test_settings_set_then_show() {
    let temp_dir = tempdir().unwrap();

    let output = run(
        temp_dir.path(),
        &["settings", "set", "--address", "router.example.com", "--port", "5672"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(temp_dir.path().join("config.toml").exists());

    let output = run(temp_dir.path(), &["settings", "show", "--json"]);
    assert!(output.status.success());
    let settings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(settings["address"], "router.example.com");
    assert_eq!(settings["port"], 5672);
}

#[test]
fn test_invalid_port_exits_with_code_2() {
    let temp_dir = tempdir().unwrap();
    let output = run(temp_dir.path(), &["settings", "set", "--port", "70000"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(!temp_dir.path().join("config.toml").exists());
}

#[test]
fn test_check_against_closed_port_exits_with_code_1() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port().to_string();
    drop(listener);

    let temp_dir = tempdir().unwrap();
    let output = run(
        temp_dir.path(),
        &["check", "--address", "127.0.0.1", "--port", &port],
    );

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("Unable to connect to 127.0.0.1:{}", port)));
}
