// crates/trustx-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for the trustx binary.
// Purpose: Ensure config validation, offline analysis, and ledger listing behave end to end.
// Dependencies: trustx-cli binary
// ============================================================================
//! ## Overview
//! Runs the compiled `trustx` binary against temporary config files and
//! checks exit codes and canonical JSON output.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use serde_json::Value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn trustx_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_trustx"))
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(trustx_bin())
        .current_dir(dir)
        .env_remove("TRUSTX_CONFIG")
        .args(args)
        .output()
        .expect("run trustx")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is json")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies the printed example config validates.
#[test]
fn example_config_validates() {
    let dir = tempfile::tempdir().unwrap();
    let example = run(dir.path(), &["config", "example"]);
    assert!(example.status.success());
    fs::write(dir.path().join("trustx.toml"), &example.stdout).unwrap();

    let output = run(dir.path(), &["config", "validate"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "config valid");
}

/// Verifies invalid configuration fails closed with a message.
#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[aggregation.thresholds]\nmedium = 0.8\nhigh = 0.2\n").unwrap();

    let output = run(dir.path(), &["config", "validate", "--config", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load config"));

    let missing = run(dir.path(), &["config", "validate"]);
    assert!(!missing.status.success());
}

/// Verifies offline analysis prints a verdict and honors `--fail-on-high`.
#[test]
fn analyze_scores_scam_text_high() {
    let dir = tempfile::tempdir().unwrap();
    let args = [
        "analyze",
        "--type",
        "text",
        "--content",
        "Guaranteed 300% returns in 7 days, send money now!",
    ];
    let output = run(dir.path(), &args);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let verdict = stdout_json(&output);
    assert_eq!(verdict["risk_level"], "HIGH");
    assert_eq!(verdict["input_kind"], "TEXT");
    assert!(verdict["risk_score"].as_f64().unwrap() > 0.7);

    let mut strict = args.to_vec();
    strict.push("--fail-on-high");
    let output = run(dir.path(), &strict);
    assert_eq!(output.status.code(), Some(2));
}

/// Verifies advisor lookups use the seeded registry and text output.
#[test]
fn analyze_advisor_text_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(
        dir.path(),
        &[
            "analyze",
            "--type",
            "advisor",
            "--name",
            "Wealth Advisory Services",
            "--registration-id",
            "INA000005678",
            "--format",
            "text",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("input_kind: ADVISOR"));
    assert!(text.contains("risk_level: LOW"));
}

/// Verifies malformed input exits non-zero before any adapter runs.
#[test]
fn analyze_rejects_malformed_url() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["analyze", "--type", "url", "--content", "http://"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid input"));
}

/// Verifies `ledger failed` lists an empty sqlite store from config.
#[test]
fn ledger_failed_reads_configured_store() {
    let dir = tempfile::tempdir().unwrap();
    let example = run(dir.path(), &["config", "example"]);
    fs::write(dir.path().join("trustx.toml"), &example.stdout).unwrap();

    let output = run(dir.path(), &["ledger", "failed"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let listing = stdout_json(&output);
    assert_eq!(listing["count"], 0);
    assert_eq!(listing["records"], Value::Array(Vec::new()));
    assert!(dir.path().join("trustx.db").exists());
}
