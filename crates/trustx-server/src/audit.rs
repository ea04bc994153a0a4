// crates/trustx-server/src/audit.rs
// ============================================================================
// Module: API Audit Logging
// Description: Structured audit events for requests, analyses, and ledger activity.
// Purpose: Emit redacted JSON-line audit logs without hard dependencies.
// Dependencies: trustx-core, trustx-ledger, serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are typed `Serialize` structs written as one JSON object per
//! line. They carry identifiers, hashes, levels, and statuses; raw input
//! content (message text, URLs, advisor names, image bytes) is never logged.
//! Sinks write to stderr, to an append-only file, or nowhere.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use trustx_core::Fingerprint;
use trustx_core::InputKind;
use trustx_core::RequestId;
use trustx_core::RiskLevel;
use trustx_core::SessionId;
use trustx_core::Signal;
use trustx_core::SignalSource;
use trustx_core::SignalStatus;
use trustx_ledger::LedgerEvent;
use trustx_ledger::LedgerObserver;

use crate::telemetry::ApiOutcome;
use crate::telemetry::ApiRoute;

// ============================================================================
// SECTION: Types
// ============================================================================

/// HTTP request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Route classification.
    pub route: ApiRoute,
    /// HTTP method.
    pub method: String,
    /// HTTP status code.
    pub status: u16,
    /// Outcome classification.
    pub outcome: ApiOutcome,
    /// Handler latency in milliseconds.
    pub latency_ms: u64,
}

impl RequestAuditEvent {
    /// Creates a request audit event with a consistent timestamp.
    #[must_use]
    pub fn new(route: ApiRoute, method: String, status: u16, latency_ms: u64) -> Self {
        Self {
            event: "api_request",
            timestamp_ms: now_ms(),
            route,
            method,
            status,
            outcome: ApiOutcome::from_status(status),
            latency_ms,
        }
    }
}

/// Per-signal summary inside an analysis audit event.
#[derive(Debug, Clone, Serialize)]
pub struct SignalAudit {
    /// Signal source.
    pub source: SignalSource,
    /// Signal status.
    pub status: SignalStatus,
    /// Adapter latency in milliseconds.
    pub latency_ms: u64,
}

impl From<&Signal> for SignalAudit {
    fn from(signal: &Signal) -> Self {
        Self {
            source: signal.source(),
            status: signal.status(),
            latency_ms: signal.latency_ms(),
        }
    }
}

/// Analysis pipeline audit event payload (hash-only).
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier.
    pub request_id: RequestId,
    /// Session the verdict was appended to.
    pub session_id: SessionId,
    /// Ingress sequence number.
    pub sequence: u64,
    /// Input kind.
    pub input_kind: InputKind,
    /// Input fingerprint.
    pub input_fingerprint: Fingerprint,
    /// Risk level.
    pub risk_level: RiskLevel,
    /// Risk score.
    pub risk_score: f64,
    /// Degraded flag.
    pub degraded: bool,
    /// Signal summaries.
    pub signals: Vec<SignalAudit>,
    /// Ledger status label after gating.
    pub ledger_status: &'static str,
    /// Gate or store faults raised while persisting the verdict.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<String>,
    /// Pipeline latency in milliseconds.
    pub latency_ms: u64,
}

/// Inputs required to construct an analysis audit event.
pub struct AnalysisAuditEventParams {
    /// Request identifier.
    pub request_id: RequestId,
    /// Session identifier.
    pub session_id: SessionId,
    /// Ingress sequence number.
    pub sequence: u64,
    /// Input kind.
    pub input_kind: InputKind,
    /// Input fingerprint.
    pub input_fingerprint: Fingerprint,
    /// Risk level.
    pub risk_level: RiskLevel,
    /// Risk score.
    pub risk_score: f64,
    /// Degraded flag.
    pub degraded: bool,
    /// Signal summaries.
    pub signals: Vec<SignalAudit>,
    /// Ledger status label.
    pub ledger_status: &'static str,
    /// Persistence faults.
    pub faults: Vec<String>,
    /// Pipeline latency in milliseconds.
    pub latency_ms: u64,
}

impl AnalysisAuditEvent {
    /// Creates an analysis audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: AnalysisAuditEventParams) -> Self {
        Self {
            event: "analysis",
            timestamp_ms: now_ms(),
            request_id: params.request_id,
            session_id: params.session_id,
            sequence: params.sequence,
            input_kind: params.input_kind,
            input_fingerprint: params.input_fingerprint,
            risk_level: params.risk_level,
            risk_score: params.risk_score,
            degraded: params.degraded,
            signals: params.signals,
            ledger_status: params.ledger_status,
            faults: params.faults,
            latency_ms: params.latency_ms,
        }
    }
}

/// Ledger activity audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Reconciler event.
    pub ledger: LedgerEvent,
}

impl LedgerAuditEvent {
    /// Wraps a reconciler event with a consistent timestamp.
    #[must_use]
    pub fn new(ledger: LedgerEvent) -> Self {
        Self {
            event: "ledger",
            timestamp_ms: now_ms(),
            ledger,
        }
    }
}

/// Returns the current wall-clock time in epoch milliseconds.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for API events.
pub trait AuditSink: Send + Sync {
    /// Records a request event.
    fn record_request(&self, event: &RequestAuditEvent);

    /// Records an analysis event.
    fn record_analysis(&self, _event: &AnalysisAuditEvent) {}

    /// Records a ledger event.
    fn record_ledger(&self, _event: &LedgerAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one event line.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        Self::emit(event);
    }

    fn record_analysis(&self, event: &AnalysisAuditEvent) {
        Self::emit(event);
    }

    fn record_ledger(&self, event: &LedgerAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one event line and flushes.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        self.emit(event);
    }

    fn record_analysis(&self, event: &AnalysisAuditEvent) {
        self.emit(event);
    }

    fn record_ledger(&self, event: &LedgerAuditEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_request(&self, _event: &RequestAuditEvent) {}
}

// ============================================================================
// SECTION: Ledger Bridge
// ============================================================================

/// Forwards reconciler events to an audit sink.
pub struct AuditLedgerObserver {
    /// Destination sink.
    sink: Arc<dyn AuditSink>,
}

impl AuditLedgerObserver {
    /// Creates an observer writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
        }
    }
}

impl LedgerObserver for AuditLedgerObserver {
    fn observe(&self, event: &LedgerEvent) {
        self.sink.record_ledger(&LedgerAuditEvent::new(event.clone()));
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test fixtures use explicit unwraps for clarity.")]

    use std::fs;

    use trustx_core::IdempotencyKey;

    use super::*;

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(&path).unwrap();
        sink.record_request(&RequestAuditEvent::new(ApiRoute::Health, "GET".to_string(), 200, 1));
        sink.record_request(&RequestAuditEvent::new(ApiRoute::Detect, "POST".to_string(), 400, 2));
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> =
            content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "api_request");
        assert_eq!(lines[0]["route"], "health");
        assert_eq!(lines[1]["outcome"], "client_error");
    }

    #[test]
    fn ledger_observer_nests_reconciler_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let sink: Arc<dyn AuditSink> = Arc::new(FileAuditSink::new(&path).unwrap());
        let observer = AuditLedgerObserver::new(sink);
        observer.observe(&LedgerEvent::Retried {
            idempotency_key: IdempotencyKey::new("key-1"),
            attempt: 2,
        });
        let content = fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(line["event"], "ledger");
        assert_eq!(line["ledger"]["event"], "retried");
        assert_eq!(line["ledger"]["attempt"], 2);
    }
}
