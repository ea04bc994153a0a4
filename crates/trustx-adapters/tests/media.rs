// crates/trustx-adapters/tests/media.rs
// ============================================================================
// Module: Image and QR Adapter Tests
// Description: Model oracle client and decoded-payload scoring tests.
// Purpose: Validate oracle wiring, payload encoding, and unavailable handling.
// Dependencies: trustx-adapters, trustx-core, tiny_http, serde_json
// ============================================================================
//! ## Overview
//! The oracle is served from a loopback fixture; decoded QR links must be
//! re-scored by the URL heuristics with the higher risk winning.

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

use std::sync::Arc;

use serde_json::Value;
use trustx_adapters::HttpModelOracle;
use trustx_adapters::ImageQrAdapter;
use trustx_adapters::ModelOracle;
use trustx_adapters::OracleVerdict;
use trustx_adapters::TextPatternAnalyzer;
use trustx_adapters::UrlReputationConfig;
use trustx_core::AdapterError;
use trustx_core::InputKind;
use trustx_core::SignalAdapter;
use url::Url;

use crate::common::local_fetcher;
use crate::common::qr;
use crate::common::spawn_server;

struct FixedOracle(OracleVerdict);

impl ModelOracle for FixedOracle {
    fn score(
        &self,
        _kind: InputKind,
        _data: &[u8],
        _content_type: Option<&str>,
    ) -> Result<OracleVerdict, AdapterError> {
        Ok(self.0.clone())
    }
}

fn with_oracle(oracle: impl ModelOracle + Send + Sync + 'static) -> ImageQrAdapter {
    ImageQrAdapter::new(
        Some(Arc::new(oracle)),
        UrlReputationConfig::default(),
        TextPatternAnalyzer::default(),
    )
}

/// Verifies the adapter is unavailable without an oracle.
#[test]
fn missing_oracle_is_unavailable() {
    let result = ImageQrAdapter::default().evaluate(&qr(b"png"));
    assert!(matches!(result, Err(AdapterError::Unavailable(_))));
}

/// Verifies a decoded QR link is scored and the higher risk wins.
#[test]
fn decoded_qr_link_raises_score() {
    let adapter = with_oracle(FixedOracle(OracleVerdict {
        score: 0.1,
        indicators: vec!["qr code".to_string()],
        decoded_text: Some("http://claim-prize.tk/upi".to_string()),
    }));
    let report = adapter.evaluate(&qr(b"png")).unwrap();
    assert_eq!(
        report.indicators,
        vec!["qr code", "insecure http connection", "suspicious top-level domain"]
    );
    assert!((report.score - 0.52).abs() < 1e-9);
    assert_eq!(
        report.details.get("decoded_url").map(String::as_str),
        Some("http://claim-prize.tk/upi")
    );
    assert_eq!(report.details.get("oracle_score").map(String::as_str), Some("0.100"));
}

/// Verifies decoded plain text is scored by the text analyzer.
#[test]
fn decoded_qr_text_is_scored() {
    let adapter = with_oracle(FixedOracle(OracleVerdict {
        score: 0.2,
        indicators: Vec::new(),
        decoded_text: Some("Pay now for guaranteed returns".to_string()),
    }));
    let report = adapter.evaluate(&qr(b"png")).unwrap();
    assert!(report.indicators.contains(&"fraud keywords".to_string()));
    assert!(report.score > 0.2);
    assert!(report.details.get("decoded_url").is_none());
}

/// Verifies out-of-range oracle scores fail the signal.
#[test]
fn out_of_range_oracle_score_fails() {
    let adapter = with_oracle(FixedOracle(OracleVerdict {
        score: 1.5,
        indicators: Vec::new(),
        decoded_text: None,
    }));
    assert!(matches!(adapter.evaluate(&qr(b"png")), Err(AdapterError::Failed(_))));
}

/// Verifies the HTTP oracle posts base64 image bytes and parses the verdict.
#[test]
fn http_oracle_round_trip() {
    let (base, handle) = spawn_server(
        r#"{"score":0.8,"indicators":["fake payment screenshot"]}"#,
        200,
        "application/json",
    );
    let oracle = HttpModelOracle::new(local_fetcher(), Url::parse(&base).unwrap().join("score").unwrap());

    let verdict = oracle.score(InputKind::Image, b"hello", Some("image/png")).unwrap();
    let captured = handle.join().unwrap().unwrap();

    assert_eq!(captured.url, "/score");
    let sent: Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(sent["kind"], "IMAGE");
    assert_eq!(sent["content_type"], "image/png");
    assert_eq!(sent["data_base64"], "aGVsbG8=");
    assert!((verdict.score - 0.8).abs() < 1e-9);
    assert_eq!(verdict.indicators, vec!["fake payment screenshot"]);
    assert!(verdict.decoded_text.is_none());
}
