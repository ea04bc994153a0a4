// crates/trustx-server/src/routes.rs
// ============================================================================
// Module: HTTP Routes
// Description: axum router and handlers for the TrustX HTTP API.
// Purpose: Translate HTTP requests into analysis service calls.
// Dependencies: axum, serde, serde_json, time
// ============================================================================

//! ## Overview
//! Handlers parse request bodies themselves so malformed payloads map to the
//! API's own error envelope. Every response carries `status`; verdict-bearing
//! payloads embed the canonical verdict flattened with its ledger view. A
//! route-level middleware records metrics and a request audit event per call,
//! labelled by matched route template.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::FromRequest;
use axum::extract::MatchedPath;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use trustx_core::AnalysisInput;
use trustx_core::LedgerRecord;
use trustx_core::LedgerRef;
use trustx_core::RequestId;
use trustx_core::SessionId;
use trustx_core::SessionMetadata;
use trustx_core::SignalSource;
use trustx_core::Timestamp;

use crate::audit::RequestAuditEvent;
use crate::service::AnalysisReport;
use crate::service::AnalysisService;
use crate::service::AnnotatedVerdict;
use crate::service::DashboardStats;
use crate::service::LedgerView;
use crate::service::ServiceError;
use crate::service::SessionReport;
use crate::service::VerifyReport;
use crate::telemetry::ApiMetricEvent;
use crate::telemetry::ApiMetrics;
use crate::telemetry::ApiOutcome;
use crate::telemetry::ApiRoute;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Success marker in response envelopes.
const STATUS_SUCCESS: &str = "success";
/// Error marker in response envelopes.
const STATUS_ERROR: &str = "error";
/// Detail key carrying the registry verification status.
const REGISTRATION_STATUS_KEY: &str = "registration_status";
/// Verification status when the registry signal is unusable.
const REGISTRATION_UNAVAILABLE: &str = "UNAVAILABLE";

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Analysis service.
    pub service: AnalysisService,
    /// Request metrics sink.
    pub metrics: Arc<dyn ApiMetrics>,
}

/// Builds the API router.
#[must_use]
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/detect", post(detect))
        .route("/api/verify/advisor", post(verify_advisor))
        .route("/api/analyze/announcement", post(analyze_announcement))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/history", get(history))
        .route("/api/stats/dashboard", get(dashboard))
        .route("/api/blockchain/log", post(ledger_log))
        .route("/api/blockchain/verify/{tx_hash}", get(ledger_verify))
        .route("/api/ledger/failed", get(ledger_failed))
        .route("/health", get(health))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_request))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Records metrics and a request audit event around each handler.
async fn track_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(ApiRoute::Other, |path| ApiRoute::from_template(path.as_str()));
    let method = request.method().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    let latency = started.elapsed();
    let status = response.status().as_u16();
    let event = ApiMetricEvent {
        route,
        status,
        outcome: ApiOutcome::from_status(status),
    };
    state.metrics.record_request(event);
    state.metrics.record_latency(event, latency);
    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    state.service.audit().record_request(&RequestAuditEvent::new(route, method, status, latency_ms));
    response
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error envelope.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Always `"error"`.
    status: &'static str,
    /// Error message.
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let code = match &self {
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            status: STATUS_ERROR,
            error: self.to_string(),
        };
        (code, axum::Json(body)).into_response()
    }
}

/// Parses a JSON body, mapping failures to client errors.
fn parse_json<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, ServiceError> {
    serde_json::from_slice(bytes).map_err(|err| ServiceError::Input(format!("invalid json body: {err}")))
}

// ============================================================================
// SECTION: Request Payloads
// ============================================================================

/// JSON detect request.
#[derive(Debug, Deserialize)]
struct DetectRequest {
    /// `text`, `url`, or `advisor`.
    #[serde(rename = "type")]
    kind: String,
    /// Text content (also accepted as the URL or advisor name).
    #[serde(default)]
    content: Option<String>,
    /// URL to check.
    #[serde(default)]
    url: Option<String>,
    /// Advisor name.
    #[serde(default)]
    advisor_name: Option<String>,
    /// Advisor registration id.
    #[serde(default)]
    advisor_id: Option<String>,
    /// Target session.
    #[serde(default)]
    session_id: Option<String>,
}

impl DetectRequest {
    /// Converts the request into an analysis input.
    fn into_input(self) -> Result<(AnalysisInput, Option<String>), ServiceError> {
        let input = match self.kind.trim().to_ascii_lowercase().as_str() {
            "text" => AnalysisInput::Text {
                content: self.content.unwrap_or_default(),
            },
            "url" => AnalysisInput::Url {
                url: self.url.or(self.content).unwrap_or_default(),
            },
            "advisor" => AnalysisInput::Advisor {
                name: self.advisor_name.or(self.content).unwrap_or_default(),
                registration_id: self.advisor_id,
            },
            other => return Err(ServiceError::Input(format!("unsupported input type: {other}"))),
        };
        Ok((input, self.session_id))
    }
}

/// Advisor verification request.
#[derive(Debug, Deserialize)]
struct AdvisorRequest {
    /// Advisor name.
    #[serde(default)]
    advisor_name: String,
    /// Registration id.
    #[serde(default)]
    advisor_id: Option<String>,
    /// Target session.
    #[serde(default)]
    session_id: Option<String>,
}

/// Announcement analysis request.
#[derive(Debug, Deserialize)]
struct AnnouncementRequest {
    /// Company name.
    #[serde(default)]
    company: String,
    /// Announcement text.
    #[serde(default)]
    text: String,
    /// Target session.
    #[serde(default)]
    session_id: Option<String>,
}

/// Manual ledger log request.
#[derive(Debug, Deserialize)]
struct LedgerLogRequest {
    /// Report reference.
    report: ReportRef,
}

/// Report reference inside a ledger log request.
#[derive(Debug, Deserialize)]
struct ReportRef {
    /// Request id of the stored verdict.
    request_id: String,
}

/// History query parameters.
#[derive(Debug, Deserialize)]
struct HistoryQuery {
    /// Restricts history to one session.
    #[serde(default)]
    session_id: Option<String>,
    /// Maximum entries.
    #[serde(default)]
    limit: Option<usize>,
}

/// Converts an optional raw session id, ignoring blanks.
fn session_param(raw: Option<String>) -> Option<SessionId> {
    raw.map(|value| value.trim().to_string()).filter(|value| !value.is_empty()).map(SessionId::new)
}

// ============================================================================
// SECTION: Response Payloads
// ============================================================================

/// Analysis response.
#[derive(Debug, Serialize)]
struct AnalysisResponse {
    /// Envelope status.
    status: &'static str,
    /// Verdict report.
    analysis: AnalysisReport,
    /// Response time (RFC 3339).
    timestamp: String,
}

/// Advisor verification payload.
#[derive(Debug, Serialize)]
struct AdvisorVerification {
    /// Registry status or `UNAVAILABLE`.
    verification_status: String,
    /// Credibility, the complement of the risk score; null when the registry
    /// could not be consulted.
    credibility_score: Option<f64>,
    /// Verdict report.
    #[serde(flatten)]
    report: AnalysisReport,
}

/// Advisor verification response.
#[derive(Debug, Serialize)]
struct AdvisorResponse {
    /// Envelope status.
    status: &'static str,
    /// Verification payload.
    verification: AdvisorVerification,
    /// Response time (RFC 3339).
    timestamp: String,
}

/// Session creation response.
#[derive(Debug, Serialize)]
struct SessionCreatedResponse {
    /// Envelope status.
    status: &'static str,
    /// New session id.
    session_id: SessionId,
    /// Creation time (RFC 3339).
    created_at: String,
}

/// Session lookup response.
#[derive(Debug, Serialize)]
struct SessionResponse {
    /// Envelope status.
    status: &'static str,
    /// Session and verdicts.
    #[serde(flatten)]
    report: SessionReport,
}

/// History response.
#[derive(Debug, Serialize)]
struct HistoryResponse {
    /// Envelope status.
    status: &'static str,
    /// Number of entries.
    count: usize,
    /// Newest-first verdicts.
    history: Vec<AnnotatedVerdict>,
}

/// Dashboard response.
#[derive(Debug, Serialize)]
struct DashboardResponse {
    /// Envelope status.
    status: &'static str,
    /// Counters.
    stats: DashboardStats,
}

/// Manual ledger log response.
#[derive(Debug, Serialize)]
struct LedgerLogResponse {
    /// Envelope status.
    status: &'static str,
    /// Request id that was submitted.
    request_id: RequestId,
    /// Ledger view after submission.
    ledger: LedgerView,
}

/// Ledger verification response.
#[derive(Debug, Serialize)]
struct VerifyResponse {
    /// Envelope status.
    status: &'static str,
    /// Verification result.
    #[serde(flatten)]
    report: VerifyReport,
}

/// Failed ledger records response.
#[derive(Debug, Serialize)]
struct FailedResponse {
    /// Envelope status.
    status: &'static str,
    /// Number of records.
    count: usize,
    /// Records that exhausted their retries.
    records: Vec<LedgerRecord>,
}

/// Health response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    /// Always `"OK"`.
    status: &'static str,
    /// Response time (RFC 3339).
    timestamp: String,
}

/// Formats a timestamp as RFC 3339, falling back to epoch millis.
fn rfc3339(timestamp: Timestamp) -> String {
    let nanos = i128::from(timestamp.as_unix_millis()) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|value| value.format(&Rfc3339).ok())
        .unwrap_or_else(|| timestamp.as_unix_millis().to_string())
}

// ============================================================================
// SECTION: Analysis Handlers
// ============================================================================

/// Handles `POST /api/detect` (JSON or multipart).
async fn detect(State(state): State<AppState>, request: Request) -> Result<Response, ServiceError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().starts_with("multipart/form-data"));
    let (input, session_id) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|err| ServiceError::Input(err.body_text()))?;
        media_input(multipart).await?
    } else {
        let bytes = Bytes::from_request(request, &state)
            .await
            .map_err(|err| ServiceError::Input(err.body_text()))?;
        parse_json::<DetectRequest>(&bytes)?.into_input()?
    };
    let analysis = state.service.analyze(input, session_param(session_id)).await?;
    Ok(axum::Json(AnalysisResponse {
        status: STATUS_SUCCESS,
        analysis,
        timestamp: rfc3339(state.service.now()),
    })
    .into_response())
}

/// Reads an image or QR upload from a multipart body.
async fn media_input(mut multipart: Multipart) -> Result<(AnalysisInput, Option<String>), ServiceError> {
    let mut kind: Option<String> = None;
    let mut session_id = None;
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|err| ServiceError::Input(err.body_text()))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "type" => {
                kind = Some(field.text().await.map_err(|err| ServiceError::Input(err.body_text()))?);
            }
            "session_id" => {
                session_id = Some(field.text().await.map_err(|err| ServiceError::Input(err.body_text()))?);
            }
            "image" | "qr_image" => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|err| ServiceError::Input(err.body_text()))?;
                upload = Some((name, content_type, data.to_vec()));
            }
            _ => {}
        }
    }
    let Some((field_name, content_type, data)) = upload else {
        return Err(ServiceError::Input("image file is required".to_string()));
    };
    let is_qr = match kind.as_deref().map(str::trim) {
        Some("qr") => true,
        Some("image") => false,
        Some(other) => return Err(ServiceError::Input(format!("unsupported upload type: {other}"))),
        None => field_name == "qr_image",
    };
    let input = if is_qr {
        AnalysisInput::Qr {
            data,
            content_type,
        }
    } else {
        AnalysisInput::Image {
            data,
            content_type,
        }
    };
    Ok((input, session_id))
}

/// Handles `POST /api/verify/advisor`.
async fn verify_advisor(State(state): State<AppState>, bytes: Bytes) -> Result<Response, ServiceError> {
    let request: AdvisorRequest = parse_json(&bytes)?;
    let input = AnalysisInput::Advisor {
        name: request.advisor_name,
        registration_id: request.advisor_id,
    };
    let report = state.service.analyze(input, session_param(request.session_id)).await?;
    let verdict = &report.analysis.verdict;
    let registry_signal = verdict.signal_from(SignalSource::Registry);
    let verification_status = registry_signal
        .and_then(|signal| signal.details().get(REGISTRATION_STATUS_KEY).cloned())
        .unwrap_or_else(|| REGISTRATION_UNAVAILABLE.to_string());
    let credibility_score = registry_signal.map(|_| 1.0 - verdict.risk_score);
    Ok(axum::Json(AdvisorResponse {
        status: STATUS_SUCCESS,
        verification: AdvisorVerification {
            verification_status,
            credibility_score,
            report,
        },
        timestamp: rfc3339(state.service.now()),
    })
    .into_response())
}

/// Handles `POST /api/analyze/announcement`.
async fn analyze_announcement(
    State(state): State<AppState>,
    bytes: Bytes,
) -> Result<Response, ServiceError> {
    let request: AnnouncementRequest = parse_json(&bytes)?;
    let input = AnalysisInput::Announcement {
        company: request.company,
        text: request.text,
    };
    let analysis = state.service.analyze(input, session_param(request.session_id)).await?;
    Ok(axum::Json(AnalysisResponse {
        status: STATUS_SUCCESS,
        analysis,
        timestamp: rfc3339(state.service.now()),
    })
    .into_response())
}

// ============================================================================
// SECTION: Session Handlers
// ============================================================================

/// Handles `POST /api/sessions`; an empty body creates a session without metadata.
async fn create_session(State(state): State<AppState>, bytes: Bytes) -> Result<Response, ServiceError> {
    let metadata: SessionMetadata =
        if bytes.iter().all(u8::is_ascii_whitespace) { SessionMetadata::default() } else { parse_json(&bytes)? };
    let session = state.service.create_session(metadata).await?;
    let body = SessionCreatedResponse {
        status: STATUS_SUCCESS,
        session_id: session.session_id,
        created_at: rfc3339(session.created_at),
    };
    Ok((StatusCode::CREATED, axum::Json(body)).into_response())
}

/// Handles `GET /api/sessions/{id}`.
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let report = state.service.session(SessionId::new(id)).await?;
    Ok(axum::Json(SessionResponse {
        status: STATUS_SUCCESS,
        report,
    })
    .into_response())
}

/// Handles `GET /api/history`.
async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ServiceError> {
    let history = state.service.history(session_param(query.session_id), query.limit).await?;
    Ok(axum::Json(HistoryResponse {
        status: STATUS_SUCCESS,
        count: history.len(),
        history,
    })
    .into_response())
}

/// Handles `GET /api/stats/dashboard`.
async fn dashboard(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let stats = state.service.dashboard().await?;
    Ok(axum::Json(DashboardResponse {
        status: STATUS_SUCCESS,
        stats,
    })
    .into_response())
}

// ============================================================================
// SECTION: Ledger Handlers
// ============================================================================

/// Handles `POST /api/blockchain/log`.
async fn ledger_log(State(state): State<AppState>, bytes: Bytes) -> Result<Response, ServiceError> {
    let request: LedgerLogRequest = parse_json(&bytes)?;
    let request_id = request.report.request_id.trim().to_string();
    if request_id.is_empty() {
        return Err(ServiceError::Input("report.request_id must not be empty".to_string()));
    }
    let request_id = RequestId::new(request_id);
    let ledger = state.service.log_report(request_id.clone()).await?;
    Ok(axum::Json(LedgerLogResponse {
        status: STATUS_SUCCESS,
        request_id,
        ledger,
    })
    .into_response())
}

/// Handles `GET /api/blockchain/verify/{tx_hash}`.
async fn ledger_verify(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Result<Response, ServiceError> {
    let report = state.service.verify(LedgerRef::new(tx_hash)).await?;
    Ok(axum::Json(VerifyResponse {
        status: STATUS_SUCCESS,
        report,
    })
    .into_response())
}

/// Handles `GET /api/ledger/failed`.
async fn ledger_failed(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let records = state.service.failed().await?;
    Ok(axum::Json(FailedResponse {
        status: STATUS_SUCCESS,
        count: records.len(),
        records,
    })
    .into_response())
}

/// Handles `GET /health`.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "OK",
        timestamp: rfc3339(state.service.now()),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_formats_epoch_millis() {
        assert_eq!(rfc3339(Timestamp::from_unix_millis(0)), "1970-01-01T00:00:00Z");
        assert!(rfc3339(Timestamp::from_unix_millis(1_700_000_000_000)).starts_with("2023-11-14T22:13:20"));
    }

    #[test]
    fn detect_request_falls_back_to_content() {
        let request = DetectRequest {
            kind: "URL".to_string(),
            content: Some("example.com".to_string()),
            url: None,
            advisor_name: None,
            advisor_id: None,
            session_id: None,
        };
        let (input, _) = request.into_input().unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(
            input,
            AnalysisInput::Url {
                url: "example.com".to_string()
            }
        );
    }

    #[test]
    fn blank_session_param_is_ignored() {
        assert_eq!(session_param(Some("  ".to_string())), None);
        assert_eq!(session_param(Some(" s-1 ".to_string())), Some(SessionId::new("s-1")));
    }
}
