//! CLI smoke tests: verify commands against console-only agent files.
//!
//! These tests run the compiled binary and verify exit codes and output.
//! No credentials or network access required.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::json;
use tempfile::TempDir;

/// Helper: run loopclaw with given args and return (exit_code, stdout, stderr).
fn run_cli(args: &[&str]) -> (i32, String, String) {
    let bin = env!("CARGO_BIN_EXE_loopclaw");
    let output = Command::new(bin)
        .args(args)
        .env("RUST_LOG", "off") // suppress tracing noise
        .env_remove("LOOPCLAW_LOOP_DELAY")
        .env_remove("LOOPCLAW_MODERATED")
        .output()
        .expect("failed to execute loopclaw binary");
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

fn write_agent(dir: &Path, name: &str, body: serde_json::Value) -> PathBuf {
    let path = dir.join(format!("{}.json", name));
    std::fs::write(&path, serde_json::to_string_pretty(&body).unwrap()).unwrap();
    path
}

fn console_agent(dir: &Path) -> PathBuf {
    write_agent(
        dir,
        "ned",
        json!({
            "name": "ned",
            "loop_delay": 60,
            "moderated": false,
            "tasks": [
                {"name": "post", "weight": 1},
                {"name": "like", "weight": 3}
            ],
            "config": [
                {"name": "console", "intervals": {"post": 600}}
            ]
        }),
    )
}

// ============================================================================
// Help & Version
// ============================================================================

#[test]
fn cli_no_args_shows_help() {
    let (code, stdout, _stderr) = run_cli(&[]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("loopclaw"));
}

#[test]
fn cli_help_flag() {
    let (code, stdout, _stderr) = run_cli(&["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Commands:"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("validate"));
}

#[test]
fn cli_version_command() {
    let (code, stdout, _stderr) = run_cli(&["version"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("loopclaw"));
    assert!(stdout.contains('.'));
}

// ============================================================================
// Agents & Validation
// ============================================================================

#[test]
fn cli_agents_lists_directory() {
    let dir = TempDir::new().unwrap();
    console_agent(dir.path());
    let dir_arg = dir.path().to_string_lossy().to_string();
    let (code, stdout, _stderr) = run_cli(&["agents", "--dir", &dir_arg]);
    assert_eq!(code, 0);
    assert!(stdout.contains("ned"));
    assert!(stdout.contains("1 agent(s) found."));
}

#[test]
fn cli_agents_empty_directory() {
    let dir = TempDir::new().unwrap();
    let dir_arg = dir.path().to_string_lossy().to_string();
    let (code, stdout, _stderr) = run_cli(&["agents", "--dir", &dir_arg]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No agents found"));
}

#[test]
fn cli_validate_good_agent() {
    let dir = TempDir::new().unwrap();
    let path = console_agent(dir.path());
    let (code, stdout, _stderr) = run_cli(&["validate", "--agent", path.to_str().unwrap()]);
    assert_eq!(code, 0, "stdout: {}", stdout);
    assert!(stdout.contains("[OK] Valid JSON"));
    assert!(stdout.contains("looks good"));
}

#[test]
fn cli_validate_suggests_field_names() {
    let dir = TempDir::new().unwrap();
    let path = write_agent(
        dir.path(),
        "typo",
        json!({"name": "typo", "loop_dely": 60, "tasks": [{"name": "post", "weight": 1}]}),
    );
    let (code, stdout, _stderr) = run_cli(&["validate", "--agent", path.to_str().unwrap()]);
    assert_ne!(code, 0);
    assert!(stdout.contains("Unknown field 'loop_dely'"));
    assert!(stdout.contains("did you mean 'loop_delay'?"));
}

#[test]
fn cli_validate_fails_on_errors() {
    let dir = TempDir::new().unwrap();
    let path = write_agent(
        dir.path(),
        "broken",
        json!({"name": "broken", "loop_delay": 0, "tasks": []}),
    );
    let (code, stdout, _stderr) = run_cli(&["validate", "--agent", path.to_str().unwrap()]);
    assert_ne!(code, 0);
    assert!(stdout.contains("[ERROR]"));
}

#[test]
fn cli_validate_missing_file() {
    let (code, _stdout, stderr) = run_cli(&["validate", "--agent", "/nonexistent/agent.json"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("not found"));
}

// ============================================================================
// Connections & Actions
// ============================================================================

#[test]
fn cli_connections_lists_console() {
    let dir = TempDir::new().unwrap();
    let path = console_agent(dir.path());
    let (code, stdout, _stderr) = run_cli(&["connections", "--agent", path.to_str().unwrap()]);
    assert_eq!(code, 0);
    assert!(stdout.contains("console"));
    assert!(stdout.contains("ready"));
    assert!(stdout.contains("1 of 1 connection(s) ready."));
}

#[test]
fn cli_connections_json() {
    let dir = TempDir::new().unwrap();
    let path = console_agent(dir.path());
    let (code, stdout, _stderr) =
        run_cli(&["connections", "--agent", path.to_str().unwrap(), "--json"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed[0]["name"], "console");
    assert_eq!(parsed[0]["configured"], true);
}

#[test]
fn cli_action_runs_task() {
    let dir = TempDir::new().unwrap();
    let path = console_agent(dir.path());
    let (code, stdout, _stderr) = run_cli(&["action", "--agent", path.to_str().unwrap(), "post"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("[OK] post"));
    assert!(stdout.contains("\"last_action\""));
}

#[test]
fn cli_action_direct_connection() {
    let dir = TempDir::new().unwrap();
    let path = console_agent(dir.path());
    let (code, stdout, _stderr) = run_cli(&[
        "action",
        "--agent",
        path.to_str().unwrap(),
        "--connection",
        "console",
        "--action",
        "like",
        "12345",
    ]);
    assert_eq!(code, 0);
    assert!(stdout.contains("12345"));
}

#[test]
fn cli_action_unknown_task_fails() {
    let dir = TempDir::new().unwrap();
    let path = console_agent(dir.path());
    let (code, _stdout, stderr) =
        run_cli(&["action", "--agent", path.to_str().unwrap(), "dance"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("dance"));
}

#[test]
fn cli_run_missing_agent_fails() {
    let (code, _stdout, stderr) = run_cli(&["run", "--agent", "/nonexistent/agent.json"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Failed to load agent"));
}
