//! CLI integration tests for the Beacon command-line interface.
//!
//! None of these reach a model: they cover argument parsing, the tool
//! catalog, config inspection and startup failures.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A beacon command isolated from the user's config, logs and API key.
fn beacon(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("beacon").unwrap();
    cmd.env("BEACON_CONFIG_DIR", config_dir.path())
        .env_remove("BEACON_CONFIG")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("RUST_LOG")
        .current_dir(config_dir.path());
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    beacon(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("tools"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    beacon(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("beacon"));
}

#[test]
fn test_ask_requires_prompt() {
    let dir = TempDir::new().unwrap();
    beacon(&dir)
        .arg("ask")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<PROMPT>"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_tools_lists_builtins_with_call_sites() {
    let dir = TempDir::new().unwrap();
    beacon(&dir)
        .arg("tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("calculator"))
        .stdout(predicate::str::contains("fetch_fact"))
        .stdout(predicate::str::contains("get_incidents"))
        .stdout(predicate::str::contains("[program]"))
        .stdout(predicate::str::contains("[direct, program]"));
}

#[test]
fn test_tools_json() {
    let dir = TempDir::new().unwrap();
    let output = beacon(&dir).args(["--json", "tools"]).output().unwrap();
    assert!(output.status.success());

    let tools: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let tools = tools.as_array().unwrap();
    assert_eq!(tools.len(), 8);
    assert!(tools.iter().all(|t| t["parameter_schema"]["type"] == "object"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_path_uses_config_dir() {
    let dir = TempDir::new().unwrap();
    beacon(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains(dir.path().to_string_lossy().as_ref()));
}

#[test]
fn test_config_show_fills_defaults_and_masks_key() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[llm]\napi_key = \"sk-secret\"\n\n[agent]\nmax_rounds = 3\n",
    )
    .unwrap();

    beacon(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_rounds = 3"))
        .stdout(predicate::str::contains("port = 8000"))
        .stdout(predicate::str::contains("sk-secret").not());
}

#[test]
fn test_explicit_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[server]\nport = 9100\n").unwrap();

    beacon(&dir)
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port = 9100"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup Failures
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_ask_without_api_key_fails() {
    let dir = TempDir::new().unwrap();
    beacon(&dir)
        .args(["ask", "How many incidents are open?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}

#[test]
fn test_invalid_agent_config_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[llm]\napi_key = \"sk-test\"\n\n[agent]\nmax_rounds = 0\n",
    )
    .unwrap();

    beacon(&dir)
        .args(["ask", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_rounds"));
}
