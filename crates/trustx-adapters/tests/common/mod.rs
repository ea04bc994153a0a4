// crates/trustx-adapters/tests/common/mod.rs
// ============================================================================
// Module: Adapter Test Helpers
// Description: Local HTTP fixtures and input builders for adapter tests.
// Purpose: Serve canned responses and capture the request that was sent.
// Dependencies: tiny_http, trustx-core, trustx-adapters
// ============================================================================

#![allow(dead_code, reason = "Helpers are shared across test binaries.")]

use std::collections::BTreeSet;
use std::io::Read;
use std::thread;

use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use trustx_adapters::HttpClientConfig;
use trustx_adapters::HttpFetcher;
use trustx_core::AnalysisInput;
use trustx_core::NormalizedInput;

/// Request observed by a fixture server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Request path and query.
    pub url: String,
    /// Request body.
    pub body: String,
}

/// Serves one response and returns the base URL plus a handle yielding the request.
pub fn spawn_server(
    body: &str,
    status: u16,
    content_type: &str,
) -> (String, thread::JoinHandle<Option<CapturedRequest>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://{addr}/");
    let body = body.to_string();
    let header = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()).unwrap();

    let handle = thread::spawn(move || {
        let mut request = server.recv().ok()?;
        let mut sent = String::new();
        request.as_reader().read_to_string(&mut sent).ok()?;
        let captured = CapturedRequest {
            url: request.url().to_string(),
            body: sent,
        };
        let response = Response::from_string(body).with_status_code(status).with_header(header);
        request.respond(response).ok()?;
        Some(captured)
    });

    (url, handle)
}

/// Fetcher allowed to reach the loopback fixture over cleartext HTTP.
pub fn local_fetcher() -> HttpFetcher {
    let mut allowed_hosts = BTreeSet::new();
    allowed_hosts.insert("127.0.0.1".to_string());
    HttpFetcher::new(HttpClientConfig {
        allow_http: true,
        allowed_hosts: Some(allowed_hosts),
        timeout_ms: 5_000,
        ..HttpClientConfig::default()
    })
    .unwrap()
}

/// Normalized text input.
pub fn text(content: &str) -> NormalizedInput {
    AnalysisInput::Text {
        content: content.to_string(),
    }
    .normalize()
    .unwrap()
}

/// Normalized URL input.
pub fn url(value: &str) -> NormalizedInput {
    AnalysisInput::Url {
        url: value.to_string(),
    }
    .normalize()
    .unwrap()
}

/// Normalized advisor input.
pub fn advisor(name: &str, registration_id: Option<&str>) -> NormalizedInput {
    AnalysisInput::Advisor {
        name: name.to_string(),
        registration_id: registration_id.map(str::to_string),
    }
    .normalize()
    .unwrap()
}

/// Normalized QR input.
pub fn qr(bytes: &[u8]) -> NormalizedInput {
    AnalysisInput::Qr {
        data: bytes.to_vec(),
        content_type: Some("image/png".to_string()),
    }
    .normalize()
    .unwrap()
}
