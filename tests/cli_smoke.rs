//! CLI smoke tests - verify the commands that work without network access.
//!
//! These tests run the compiled binary against temporary config files and
//! verify exit codes and output.

use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const ENV_OVERRIDES: &[&str] = &[
    "GROUPWATCH_TELEGRAM_TOKEN",
    "TELEGRAM_BOT_TOKEN",
    "GROUPWATCH_ALLOWED_CHAT_ID",
    "ALLOWED_GROUP_ID",
    "GROUPWATCH_MONITORING_CHANNEL_ID",
    "TELEGRAM_MONITORING_CHANNEL_ID",
    "GROUPWATCH_GENERATION_API_KEY",
    "GROUPWATCH_GENERATION_API_BASE",
    "GROUPWATCH_GENERATION_MODEL",
    "GROUPWATCH_REPLIES_ENABLED",
    "GROUPWATCH_ALERT_LOG_PATH",
];

/// Helper: run groupwatch with given args and return (exit_code, stdout, stderr).
fn run_cli(args: &[&str]) -> (i32, String, String) {
    let bin = env!("CARGO_BIN_EXE_groupwatch");
    let mut cmd = Command::new(bin);
    cmd.args(args).env("RUST_LOG", "off");
    for key in ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    let output = cmd.output().expect("failed to execute groupwatch binary");
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

fn write_config(dir: &Path, json: &str) -> String {
    let path = dir.join("config.json");
    std::fs::write(&path, json).unwrap();
    path.to_string_lossy().into_owned()
}

// ============================================================================
// Help & Version
// ============================================================================

#[test]
fn cli_no_args_shows_help() {
    let (code, stdout, _stderr) = run_cli(&[]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("groupwatch"));
}

#[test]
fn cli_version_command() {
    let (code, stdout, _stderr) = run_cli(&["version"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("groupwatch"));
    assert!(stdout.contains('.'));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn cli_config_check_reports_unknown_field() {
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"{"telegram": {"token": "1:x"}, "monitor": {"allowed_chat_id": "-1", "histroy_capacity": 5}}"#,
    );
    let (code, stdout, _stderr) = run_cli(&["config", "check", "--config", &path]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Config file:"));
    assert!(
        stdout.contains("did you mean 'history_capacity'?"),
        "unexpected output: {}",
        stdout
    );
}

#[test]
fn cli_config_check_invalid_json() {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), "{ not json");
    let (code, stdout, _stderr) = run_cli(&["config", "check", "--config", &path]);
    assert_eq!(code, 0);
    assert!(stdout.contains("[ERROR] Invalid JSON"));
}

#[test]
fn cli_config_show_masks_secrets() {
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"{"telegram": {"token": "123:secret"}, "generation": {"api_key": "sk-secret"}}"#,
    );
    let (code, stdout, _stderr) = run_cli(&["config", "show", "--config", &path]);
    assert_eq!(code, 0);
    assert!(!stdout.contains("secret"));
    assert!(stdout.contains("********"));
    assert!(stdout.contains("\"history_capacity\": 100"));
}

// ============================================================================
// Alerts
// ============================================================================

#[test]
fn cli_alerts_without_log() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("alerts.log");
    let path = write_config(
        dir.path(),
        &format!(
            r#"{{"triggers": {{"alert_log_path": {}}}}}"#,
            serde_json::to_string(&log.to_string_lossy()).unwrap()
        ),
    );
    let (code, stdout, _stderr) = run_cli(&["alerts", "--config", &path]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No trigger alerts recorded"));
}

#[test]
fn cli_alerts_shows_latest_records() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("alerts.log");
    std::fs::write(
        &log,
        "[t1] TRIGGER ALERT\nMessage: one\n---\n[t2] TRIGGER ALERT\nMessage: two\n---\n",
    )
    .unwrap();
    let path = write_config(
        dir.path(),
        &format!(
            r#"{{"triggers": {{"alert_log_path": {}}}}}"#,
            serde_json::to_string(&log.to_string_lossy()).unwrap()
        ),
    );
    let (code, stdout, _stderr) = run_cli(&["alerts", "--limit", "1", "--config", &path]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Message: two"));
    assert!(!stdout.contains("Message: one"));
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn cli_run_without_token_fails() {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), "{}");
    let (code, _stdout, stderr) = run_cli(&["run", "--config", &path]);
    assert_ne!(code, 0);
    assert!(
        stderr.contains("No Telegram bot token configured"),
        "unexpected stderr: {}",
        stderr
    );
}
