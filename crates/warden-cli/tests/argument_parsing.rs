//! Focused CLI argument parsing tests.
//!
//! Tests that verify command-line argument parsing and configuration
//! overrides without requiring a reachable registry.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn warden(project: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("warden").unwrap();
    cmd.current_dir(project.path())
        .env_remove("WARDEN_REGISTRY__BASE_URL")
        .env_remove("WARDEN_REGISTRY__ADMIN")
        .env_remove("WARDEN_AUTH__TOKEN");
    cmd
}

// ============================================================================
// Commands That Work Without a Registry
// ============================================================================

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("warden")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("warden"));
}

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("warden")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("policy-set"))
        .stdout(predicate::str::contains("--registry"));
}

#[test]
fn config_show_prints_defaults() {
    let project = TempDir::new().unwrap();

    warden(&project)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "base_url = \"http://127.0.0.1:4000/api\"",
        ))
        .stdout(predicate::str::contains("capacity = 256"));
}

#[test]
fn config_show_reads_project_file() {
    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("warden.toml"),
        "[registry]\nbase_url = \"https://ar.example.org/api\"\n",
    )
    .unwrap();

    warden(&project)
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://ar.example.org/api"));
}

#[test]
fn global_overrides_apply_and_token_is_masked() {
    let project = TempDir::new().unwrap();

    warden(&project)
        .args([
            "--admin",
            "--registry",
            "https://override.example.org/api",
            "--token",
            "very-secret",
            "config",
            "show",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("admin = true"))
        .stdout(predicate::str::contains("https://override.example.org/api"))
        .stdout(predicate::str::contains("very-secret").not());
}

// ============================================================================
// Argument Parsing Errors (Missing Required Arguments)
// ============================================================================

#[test]
fn no_command_shows_help() {
    Command::cargo_bin("warden")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn policy_set_show_requires_id() {
    Command::cargo_bin("warden")
        .unwrap()
        .args(["policy-set", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn policy_edit_requires_policy_id() {
    Command::cargo_bin("warden")
        .unwrap()
        .args(["policy", "edit", "set-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn policy_delete_requires_both_ids() {
    Command::cargo_bin("warden")
        .unwrap()
        .args(["policy", "delete"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

// ============================================================================
// Validation Before Any Request
// ============================================================================

#[test]
fn non_http_registry_rejected() {
    let project = TempDir::new().unwrap();

    warden(&project)
        .args(["--registry", "ftp://ar.example.org", "policy-set", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("http or https"));
}

#[test]
fn unknown_config_format_rejected() {
    let project = TempDir::new().unwrap();

    warden(&project)
        .args(["config", "show", "--format", "yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown format"));
}

#[test]
fn delete_without_terminal_requires_force() {
    let project = TempDir::new().unwrap();

    warden(&project)
        .args(["policy-set", "delete", "set-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn wizard_without_terminal_fails_cleanly() {
    let project = TempDir::new().unwrap();

    warden(&project)
        .args(["policy-set", "create"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("interactive terminal"));
}

// ============================================================================
// Unrecognized Commands/Arguments
// ============================================================================

#[test]
fn unrecognized_command_shows_error() {
    Command::cargo_bin("warden")
        .unwrap()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized"));
}
