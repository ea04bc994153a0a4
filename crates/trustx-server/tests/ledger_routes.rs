// crates/trustx-server/tests/ledger_routes.rs
// ============================================================================
// Module: Ledger Route Tests
// Description: Ledger confirmation, idempotency, verification, and retry exhaustion over HTTP.
// Purpose: Validate that ledger state is reported without altering verdicts.
// Dependencies: trustx-server, trustx-ledger, axum, tokio
// ============================================================================
//! ## Overview
//! The harness reconciler is driven step by step so each test controls when
//! appends, confirmations, and retries happen.

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

mod common;

use axum::http::StatusCode;
use serde_json::json;
use trustx_core::LedgerPolicy;

use crate::common::BENIGN_TEXT;
use crate::common::Harness;
use crate::common::SCAM_TEXT;

/// Verifies a confirmed record is reported with its reference everywhere.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn confirmed_reference_appears_in_history_and_verify() {
    let mut harness = Harness::new();
    let analysis = harness.detect_text(SCAM_TEXT, None).await;
    assert_eq!(harness.drain_ledger().await, 1);

    let (_, history) = harness.get("/api/history").await;
    let entry = &history["history"][0];
    assert_eq!(entry["request_id"], analysis["request_id"]);
    assert_eq!(entry["ledger_status"], "CONFIRMED");
    let tx_hash = entry["blockchain_hash"].as_str().unwrap().to_string();
    assert!(tx_hash.starts_with("0x"));

    let (status, verify) = harness.get(&format!("/api/blockchain/verify/{tx_hash}")).await;
    assert_eq!(status, StatusCode::OK, "{verify}");
    assert_eq!(verify["status"], "success");
    assert!(verify["confirmations"].as_u64().unwrap() >= 1);
    assert_eq!(verify["record"]["status"], "CONFIRMED");
    assert_eq!(verify["record"]["request_id"], analysis["request_id"]);

    let (status, body) = harness.get("/api/blockchain/verify/0xdeadbeef").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

/// Verifies duplicate submissions of one input share a single ledger record.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_input_reuses_ledger_record() {
    let mut harness = Harness::new();
    harness.detect_text(SCAM_TEXT, Some("first")).await;
    harness.drain_ledger().await;

    let second = harness.detect_text(SCAM_TEXT, Some("second")).await;
    assert_eq!(harness.drain_ledger().await, 0);
    assert_eq!(second["ledger_status"], "CONFIRMED");
    assert!(second["blockchain_hash"].as_str().unwrap().starts_with("0x"));
    assert_eq!(harness.ledger.len().unwrap(), 1);

    let (_, dashboard) = harness.get("/api/stats/dashboard").await;
    assert_eq!(dashboard["stats"]["ledger"]["total"], 1);
    assert_eq!(dashboard["stats"]["verdicts"]["total"], 2);
}

/// Verifies manual logging is idempotent and skips low-risk verdicts.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn manual_log_goes_through_the_gate() {
    let mut harness = Harness::new();
    let low = harness.detect_text(BENIGN_TEXT, None).await;
    let (status, body) = harness
        .post_json("/api/blockchain/log", &json!({ "report": { "request_id": low["request_id"] } }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ledger"]["ledger_status"], "SKIPPED");
    assert_eq!(harness.drain_ledger().await, 0);

    let high = harness.detect_text(SCAM_TEXT, None).await;
    harness.drain_ledger().await;
    let (status, body) = harness
        .post_json("/api/blockchain/log", &json!({ "report": { "request_id": high["request_id"] } }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ledger"]["ledger_status"], "CONFIRMED");
    assert_eq!(harness.drain_ledger().await, 0);

    let (status, _) = harness
        .post_json("/api/blockchain/log", &json!({ "report": { "request_id": "missing" } }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = harness.post_json("/api/blockchain/log", &json!({ "report": {} })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Verifies exhausted retries surface in the failed view while the verdict is unchanged.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn retry_exhaustion_is_visible_and_verdict_unchanged() {
    let mut harness = Harness::with_policy(LedgerPolicy {
        max_attempts: 3,
        backoff_base_ms: 1_000,
        confirmation_timeout_ms: 60_000,
    });
    harness.ledger.fail_next_appends(3);
    let analysis = harness.detect_text(SCAM_TEXT, None).await;

    for _ in 0 .. 3 {
        assert_eq!(harness.drain_ledger().await, 1);
        harness.advance(10_000);
        harness.reconciler.tick().await;
    }
    assert_eq!(harness.drain_ledger().await, 0);

    let (status, failed) = harness.get("/api/ledger/failed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["count"], 1);
    let record = &failed["records"][0];
    assert_eq!(record["status"], "FAILED_AFTER_RETRIES");
    assert_eq!(record["attempts"], 3);
    assert_eq!(record["request_id"], analysis["request_id"]);

    let (_, history) = harness.get("/api/history").await;
    let entry = &history["history"][0];
    assert_eq!(entry["ledger_status"], "FAILED_AFTER_RETRIES");
    assert!(entry["blockchain_hash"].is_null());
    assert_eq!(entry["risk_level"], analysis["risk_level"]);
    assert_eq!(entry["risk_score"], analysis["risk_score"]);
    assert_eq!(entry["indicators"], analysis["indicators"]);

    let events = harness.audit.ledger.lock().unwrap();
    assert!(events.iter().any(|event| {
        serde_json::to_value(&event.ledger).unwrap()["status"] == "FAILED_AFTER_RETRIES"
    }));
}
