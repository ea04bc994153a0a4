// crates/trustx-ledger/tests/common/mod.rs
// ============================================================================
// Module: Ledger Test Helpers
// Description: Write requests, verdicts, and a scripted HTTP ledger.
// Purpose: Share fixtures between ledger test binaries.
// Dependencies: tiny_http, trustx-core
// ============================================================================

#![allow(dead_code, reason = "Helpers are shared across test binaries.")]

use std::io::Read;
use std::thread;

use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use trustx_core::AggregationEngine;
use trustx_core::AggregationPolicy;
use trustx_core::DEFAULT_HASH_ALGORITHM;
use trustx_core::Fingerprint;
use trustx_core::HashDigest;
use trustx_core::IdempotencyKey;
use trustx_core::InputKind;
use trustx_core::LedgerWriteRequest;
use trustx_core::RequestId;
use trustx_core::RiskLevel;
use trustx_core::Signal;
use trustx_core::SignalSource;
use trustx_core::Timestamp;
use trustx_core::Verdict;
use trustx_core::VerdictContext;

/// Write request for a fingerprint.
pub fn write_request(fingerprint: &str, attempt: u32) -> LedgerWriteRequest {
    let fingerprint = Fingerprint::new(fingerprint);
    LedgerWriteRequest {
        idempotency_key: IdempotencyKey::from_fingerprint(&fingerprint),
        input_fingerprint: fingerprint,
        request_id: RequestId::new("req-ledger"),
        risk_level: RiskLevel::High,
        risk_score: 0.9,
        content_digest: HashDigest::new(DEFAULT_HASH_ALGORITHM, b"verdict"),
        attempt,
    }
}

/// HIGH verdict for a fingerprint.
pub fn high_verdict(request_id: &str, fingerprint: &str) -> Verdict {
    let engine = AggregationEngine::new(AggregationPolicy::default()).unwrap();
    let signal = Signal::ok(
        SignalSource::TextPattern,
        0.9,
        vec!["unrealistic returns".to_string()],
        1,
    )
    .unwrap();
    engine.aggregate(
        VerdictContext {
            request_id: RequestId::new(request_id),
            input_fingerprint: Fingerprint::new(fingerprint),
            input_kind: InputKind::Text,
            created_at: Timestamp::from_unix_millis(0),
        },
        &[signal],
    )
}

/// Request observed by the scripted ledger.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub url: String,
    /// Idempotency header value, when present.
    pub idempotency_key: Option<String>,
    /// Request body.
    pub body: String,
}

/// Serves the scripted `(status, body)` responses in order.
pub fn spawn_ledger(
    responses: Vec<(u16, String)>,
) -> (String, thread::JoinHandle<Vec<CapturedRequest>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://{addr}/");
    let handle = thread::spawn(move || {
        let mut captured = Vec::new();
        for (status, body) in responses {
            let Ok(mut request) = server.recv() else {
                break;
            };
            let mut sent = String::new();
            let _ = request.as_reader().read_to_string(&mut sent);
            let idempotency_key = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Idempotency-Key"))
                .map(|header| header.value.as_str().to_string());
            captured.push(CapturedRequest {
                method: request.method().as_str().to_string(),
                url: request.url().to_string(),
                idempotency_key,
                body: sent,
            });
            let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let _ = request.respond(Response::from_string(body).with_status_code(status).with_header(header));
        }
        captured
    });
    (url, handle)
}
