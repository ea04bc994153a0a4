// crates/trustx-server/src/telemetry.rs
// ============================================================================
// Module: API Telemetry
// Description: Observability hooks for HTTP request handling.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for API request counters and
//! latency histograms. It stays dependency-light so deployments can plug in a
//! metrics backend without redesign. Route labels are a closed set so raw
//! paths (which carry session ids and transaction hashes) never become labels.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for API request histograms.
pub const API_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// API route classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiRoute {
    /// `POST /api/detect`.
    Detect,
    /// `POST /api/verify/advisor`.
    VerifyAdvisor,
    /// `POST /api/analyze/announcement`.
    AnalyzeAnnouncement,
    /// `POST /api/sessions`.
    CreateSession,
    /// `GET /api/sessions/{id}`.
    GetSession,
    /// `GET /api/history`.
    History,
    /// `GET /api/stats/dashboard`.
    Dashboard,
    /// `POST /api/blockchain/log`.
    LedgerLog,
    /// `GET /api/blockchain/verify/{tx_hash}`.
    LedgerVerify,
    /// `GET /api/ledger/failed`.
    LedgerFailed,
    /// `GET /health`.
    Health,
    /// Unmatched route.
    Other,
}

impl ApiRoute {
    /// Classifies a matched route template.
    #[must_use]
    pub fn from_template(template: &str) -> Self {
        match template {
            "/api/detect" => Self::Detect,
            "/api/verify/advisor" => Self::VerifyAdvisor,
            "/api/analyze/announcement" => Self::AnalyzeAnnouncement,
            "/api/sessions" => Self::CreateSession,
            "/api/sessions/{id}" => Self::GetSession,
            "/api/history" => Self::History,
            "/api/stats/dashboard" => Self::Dashboard,
            "/api/blockchain/log" => Self::LedgerLog,
            "/api/blockchain/verify/{tx_hash}" => Self::LedgerVerify,
            "/api/ledger/failed" => Self::LedgerFailed,
            "/health" => Self::Health,
            _ => Self::Other,
        }
    }

    /// Returns a stable label for the route.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detect => "detect",
            Self::VerifyAdvisor => "verify_advisor",
            Self::AnalyzeAnnouncement => "analyze_announcement",
            Self::CreateSession => "create_session",
            Self::GetSession => "get_session",
            Self::History => "history",
            Self::Dashboard => "dashboard",
            Self::LedgerLog => "ledger_log",
            Self::LedgerVerify => "ledger_verify",
            Self::LedgerFailed => "ledger_failed",
            Self::Health => "health",
            Self::Other => "other",
        }
    }
}

/// API request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiOutcome {
    /// 2xx response.
    Ok,
    /// 4xx response.
    ClientError,
    /// 5xx response.
    ServerError,
}

impl ApiOutcome {
    /// Classifies an HTTP status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            500 .. => Self::ServerError,
            400 .. => Self::ClientError,
            _ => Self::Ok,
        }
    }

    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
        }
    }
}

/// API request metric event payload.
#[derive(Debug, Clone, Copy)]
pub struct ApiMetricEvent {
    /// Route classification.
    pub route: ApiRoute,
    /// HTTP status code.
    pub status: u16,
    /// Outcome classification.
    pub outcome: ApiOutcome,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for API requests and latencies.
pub trait ApiMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: ApiMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: ApiMetricEvent, latency: Duration);
}

/// No-op metrics sink.
pub struct NoopMetrics;

impl ApiMetrics for NoopMetrics {
    fn record_request(&self, _event: ApiMetricEvent) {}

    fn record_latency(&self, _event: ApiMetricEvent, _latency: Duration) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_map_to_stable_labels() {
        assert_eq!(ApiRoute::from_template("/api/sessions/{id}").as_str(), "get_session");
        assert_eq!(ApiRoute::from_template("/api/blockchain/verify/{tx_hash}"), ApiRoute::LedgerVerify);
        assert_eq!(ApiRoute::from_template("/api/sessions/abc"), ApiRoute::Other);
    }

    #[test]
    fn outcome_follows_status_class() {
        assert_eq!(ApiOutcome::from_status(200), ApiOutcome::Ok);
        assert_eq!(ApiOutcome::from_status(404), ApiOutcome::ClientError);
        assert_eq!(ApiOutcome::from_status(503), ApiOutcome::ServerError);
    }
}
