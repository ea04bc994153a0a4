// crates/trustx-config/tests/section_validation.rs
// ============================================================================
// Module: Config Section Validation Tests
// Description: Per-section validation of aggregation, adapters, ledger, store.
// Purpose: Ensure invalid policies are rejected before the server starts.
// Dependencies: trustx-config
// ============================================================================

//! Section validation tests for trustx-config.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::time::Duration;

use trustx_config::TrustxConfig;

type TestResult = Result<(), String>;

fn assert_rejects(toml: &str, needle: &str) -> TestResult {
    match TrustxConfig::from_toml_str(toml) {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err(format!("expected rejection containing {needle}")),
    }
}

fn assert_accepts(toml: &str) -> Result<TrustxConfig, String> {
    TrustxConfig::from_toml_str(toml).map_err(|err| err.to_string())
}

/// Verifies weights must sum to one.
#[test]
fn weights_must_sum_to_one() -> TestResult {
    assert_rejects(
        "[aggregation.weights]\nTEXT_PATTERN = 0.5\nURL_REPUTATION = 0.5\nREGISTRY = 0.5\n\
         IMAGE_QR = 0.5\nANNOUNCEMENT_NLP = 0.5\n",
        "weights sum to",
    )
}

/// Verifies every source needs a positive weight.
#[test]
fn weights_must_be_positive_and_complete() -> TestResult {
    assert_rejects(
        "[aggregation.weights]\nTEXT_PATTERN = 0.6\nURL_REPUTATION = 0.4\nREGISTRY = 0.0\n\
         IMAGE_QR = 0.0\nANNOUNCEMENT_NLP = 0.0\n",
        "must be positive",
    )?;
    assert_rejects("[aggregation.weights]\nTEXT_PATTERN = 1.0\n", "missing weight")
}

/// Verifies thresholds must be ordered inside the unit interval.
#[test]
fn thresholds_must_be_ordered() -> TestResult {
    assert_rejects("[aggregation.thresholds]\nmedium = 0.8\nhigh = 0.5\n", "medium must not exceed high")?;
    assert_rejects("[aggregation.thresholds]\nmedium = 0.4\nhigh = 1.5\n", "[0, 1]")
}

/// Verifies custom thresholds are accepted.
#[test]
fn custom_thresholds_are_accepted() -> TestResult {
    let config = assert_accepts("[aggregation.thresholds]\nmedium = 0.3\nhigh = 0.6\n")?;
    if (config.aggregation.thresholds.medium - 0.3).abs() > f64::EPSILON {
        return Err("medium threshold not applied".to_string());
    }
    Ok(())
}

/// Verifies the request deadline bounds.
#[test]
fn request_deadline_bounds() -> TestResult {
    assert_rejects("[server]\nrequest_deadline_ms = 50\n", "server.request_deadline_ms")?;
    let config = assert_accepts("[server]\nrequest_deadline_ms = 2500\n")?;
    if config.server.request_deadline() != Duration::from_millis(2_500) {
        return Err("deadline not applied".to_string());
    }
    Ok(())
}

/// Verifies the bind address must parse.
#[test]
fn bind_must_be_socket_address() -> TestResult {
    assert_rejects("[server]\nbind = \"localhost\"\n", "server.bind")
}

/// Verifies adapter timeouts are bounded.
#[test]
fn adapter_timeouts_are_bounded() -> TestResult {
    assert_rejects("[adapters.url]\ntimeout_ms = 0\n", "adapters.url.timeout_ms")?;
    assert_rejects("[adapters.text]\ntimeout_ms = 600000\n", "adapters.text.timeout_ms")
}

/// Verifies blank phrase and TLD entries are rejected.
#[test]
fn list_entries_must_be_non_empty() -> TestResult {
    assert_rejects("[adapters.text]\nextra_phrases = [\"  \"]\n", "adapters.text.extra_phrases")?;
    assert_rejects("[adapters.url]\nsuspicious_tlds = [\".tk\"]\n", "leading dot")
}

/// Verifies the HTTP registry needs an endpoint and the static one rejects it.
#[test]
fn registry_endpoint_matches_source() -> TestResult {
    assert_rejects("[adapters.registry]\nsource = \"http\"\n", "adapters.registry.endpoint")?;
    assert_rejects(
        "[adapters.registry]\nendpoint = \"https://registry.example.com/\"\n",
        "must not set endpoint",
    )?;
    let config = assert_accepts(
        "[adapters.registry]\nsource = \"http\"\nendpoint = \"https://registry.example.com/\"\n",
    )?;
    let url = config.adapters.registry.endpoint_url().map_err(|err| err.to_string())?;
    if url.map(|url| url.to_string()) != Some("https://registry.example.com/".to_string()) {
        return Err("registry endpoint not parsed".to_string());
    }
    Ok(())
}

/// Verifies configured advisors require identifiers.
#[test]
fn registry_advisors_require_ids() -> TestResult {
    assert_rejects(
        "[[adapters.registry.advisors]]\nname = \"X\"\nregistration_id = \"\"\nstatus = \"ACTIVE\"\n",
        "registration_id",
    )
}

/// Verifies the oracle endpoint must be an http(s) url.
#[test]
fn oracle_endpoint_must_parse() -> TestResult {
    assert_rejects("[adapters.image_qr]\noracle_endpoint = \"file:///tmp/oracle\"\n", "oracle_endpoint")
}

/// Verifies the HTTP ledger needs an endpoint.
#[test]
fn http_ledger_requires_endpoint() -> TestResult {
    assert_rejects("[ledger]\nmode = \"http\"\n", "ledger.endpoint is required")?;
    assert_rejects("[ledger]\nendpoint = \"https://ledger.example.com/\"\n", "simulated ledger")?;
    assert_accepts("[ledger]\nmode = \"http\"\nendpoint = \"https://ledger.example.com/\"\n")?;
    Ok(())
}

/// Verifies retry policy bounds.
#[test]
fn ledger_retry_bounds() -> TestResult {
    assert_rejects("[ledger.retry]\nmax_attempts = 0\n", "ledger.retry.max_attempts")?;
    assert_rejects("[ledger.retry]\nbackoff_base_ms = 1\n", "ledger.retry.backoff_base_ms")?;
    assert_rejects("[ledger]\noutbox_capacity = 0\n", "ledger.outbox_capacity")?;
    assert_rejects("[ledger]\nconfirmations_required = 0\n", "ledger.confirmations_required")
}

/// Verifies the sqlite store needs a path and the memory store rejects one.
#[test]
fn store_path_matches_type() -> TestResult {
    assert_rejects("[store]\ntype = \"sqlite\"\n", "sqlite store requires path")?;
    assert_rejects("[store]\npath = \"trustx.db\"\n", "memory store must not set path")?;
    let config = assert_accepts("[store]\ntype = \"sqlite\"\npath = \"trustx.db\"\nsync_mode = \"normal\"\n")?;
    if config.store.sqlite_config().is_none() {
        return Err("expected sqlite config".to_string());
    }
    Ok(())
}

/// Verifies blank audit paths are rejected.
#[test]
fn audit_path_must_be_non_empty() -> TestResult {
    assert_rejects("[audit]\npath = \" \"\n", "audit.path must be non-empty")
}
