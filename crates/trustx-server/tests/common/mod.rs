// crates/trustx-server/tests/common/mod.rs
// ============================================================================
// Module: Server Test Harness
// Description: In-process router, manual clock, and ledger driver.
// Purpose: Share API fixtures between server test binaries.
// Dependencies: trustx-server, trustx-ledger, axum, tower
// ============================================================================

#![allow(dead_code, reason = "Helpers are shared across test binaries.")]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use axum::Router;
use axum::body::Body;
use axum::body::to_bytes;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use serde_json::Value;
use tokio::sync::mpsc::Receiver;
use tower::ServiceExt;
use trustx_adapters::AdapterRegistry;
use trustx_adapters::DEFAULT_REQUEST_DEADLINE;
use trustx_adapters::SignalFanout;
use trustx_core::AggregationEngine;
use trustx_core::AggregationPolicy;
use trustx_core::InMemoryLedgerStore;
use trustx_core::InMemorySessionStore;
use trustx_core::LedgerGate;
use trustx_core::LedgerPolicy;
use trustx_core::LedgerWriteRequest;
use trustx_core::SharedLedgerStore;
use trustx_core::SharedSessionStore;
use trustx_core::Timestamp;
use trustx_ledger::ChannelOutbox;
use trustx_ledger::Clock;
use trustx_ledger::LedgerReconciler;
use trustx_ledger::ReconcilerSettings;
use trustx_ledger::SimulatedLedger;
use trustx_ledger::SimulatedLedgerConfig;
use trustx_server::AnalysisAuditEvent;
use trustx_server::AnalysisService;
use trustx_server::AppState;
use trustx_server::AuditLedgerObserver;
use trustx_server::AuditSink;
use trustx_server::LedgerAuditEvent;
use trustx_server::NoopMetrics;
use trustx_server::RequestAuditEvent;
use trustx_server::ServiceParts;
use trustx_server::router;

/// Scam message that the text heuristics score HIGH.
pub const SCAM_TEXT: &str = "Guaranteed 300% returns in 7 days, send money now!";
/// Message with no findings.
pub const BENIGN_TEXT: &str = "The board approved the quarterly results at its meeting on Monday.";
/// Starting time of the manual clock.
pub const START_MILLIS: i64 = 1_700_000_000_000;

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Request events.
    pub requests: Mutex<Vec<RequestAuditEvent>>,
    /// Analysis events.
    pub analyses: Mutex<Vec<AnalysisAuditEvent>>,
    /// Ledger events.
    pub ledger: Mutex<Vec<LedgerAuditEvent>>,
}

impl AuditSink for RecordingAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        self.requests.lock().unwrap().push(event.clone());
    }

    fn record_analysis(&self, event: &AnalysisAuditEvent) {
        self.analyses.lock().unwrap().push(event.clone());
    }

    fn record_ledger(&self, event: &LedgerAuditEvent) {
        self.ledger.lock().unwrap().push(event.clone());
    }
}

/// In-process API with a manually driven ledger reconciler.
pub struct Harness {
    /// Router under test.
    pub app: Router,
    /// Service behind the router.
    pub service: AnalysisService,
    /// Simulated ledger.
    pub ledger: Arc<SimulatedLedger>,
    /// Recorded audit events.
    pub audit: Arc<RecordingAuditSink>,
    /// Reconciler driven step by step.
    pub reconciler: LedgerReconciler<SharedLedgerStore, ChannelOutbox>,
    /// Outbox receiver.
    pub receiver: Receiver<LedgerWriteRequest>,
    /// Manual clock in epoch milliseconds.
    pub millis: Arc<AtomicI64>,
}

impl Harness {
    /// Builds a harness with the default retry policy.
    pub fn new() -> Self {
        Self::with_policy(LedgerPolicy::default())
    }

    /// Builds a harness with a custom retry policy.
    pub fn with_policy(policy: LedgerPolicy) -> Self {
        Self::with_adapters(policy, AdapterRegistry::with_reference_adapters())
    }

    /// Builds a harness with a custom retry policy and adapter set.
    pub fn with_adapters(policy: LedgerPolicy, adapters: AdapterRegistry) -> Self {
        let millis = Arc::new(AtomicI64::new(START_MILLIS));
        let clock: Clock = {
            let millis = Arc::clone(&millis);
            Arc::new(move || Timestamp::from_unix_millis(millis.load(Ordering::SeqCst)))
        };
        let ledger = Arc::new(SimulatedLedger::new(SimulatedLedgerConfig {
            confirmations_required: 1,
        }));
        let audit = Arc::new(RecordingAuditSink::default());
        let (outbox, receiver) = ChannelOutbox::channel(64);
        let gate = Arc::new(LedgerGate::new(
            SharedLedgerStore::from_store(InMemoryLedgerStore::new()),
            outbox,
            policy,
        ));
        let reconciler = LedgerReconciler::new(
            Arc::clone(&gate),
            ledger.clone(),
            ReconcilerSettings::default(),
        )
        .with_observer(Arc::new(AuditLedgerObserver::new(audit.clone())))
        .with_clock(Arc::clone(&clock));
        let service = AnalysisService::new(ServiceParts {
            fanout: SignalFanout::new(Arc::new(adapters), DEFAULT_REQUEST_DEADLINE),
            engine: AggregationEngine::new(AggregationPolicy::default()).unwrap(),
            gate,
            sessions: SharedSessionStore::from_store(InMemorySessionStore::new()),
            ledger: ledger.clone(),
            audit: audit.clone(),
            clock,
        });
        let app = router(
            AppState {
                service: service.clone(),
                metrics: Arc::new(NoopMetrics),
            },
            1024 * 1024,
        );
        Self {
            app,
            service,
            ledger,
            audit,
            reconciler,
            receiver,
            millis,
        }
    }

    /// Advances the manual clock.
    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Hands every queued write to the reconciler.
    pub async fn drain_ledger(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(request) = self.receiver.try_recv() {
            self.reconciler.handle_write(request).await;
            handled += 1;
        }
        handled
    }

    /// Sends a request and returns the status and JSON body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// Sends a JSON POST.
    pub async fn post_json(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Sends a raw POST body.
    pub async fn post_raw(&self, path: &str, content_type: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Sends a GET.
    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let request = Request::builder().method("GET").uri(path).body(Body::empty()).unwrap();
        self.send(request).await
    }

    /// Submits text to `/api/detect` and returns the analysis payload.
    pub async fn detect_text(&self, content: &str, session_id: Option<&str>) -> Value {
        let mut body = serde_json::json!({ "type": "text", "content": content });
        if let Some(session_id) = session_id {
            body["session_id"] = Value::String(session_id.to_string());
        }
        let (status, body) = self.post_json("/api/detect", &body).await;
        assert_eq!(status, StatusCode::OK, "detect failed: {body}");
        body["analysis"].clone()
    }
}

/// Builds a multipart body with one file field and optional text fields.
pub fn multipart_body(
    boundary: &str,
    fields: &[(&str, &str)],
    file_field: &str,
    file: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{file_field}\"; \
             filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
