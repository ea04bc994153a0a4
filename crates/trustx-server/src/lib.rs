// crates/trustx-server/src/lib.rs
// ============================================================================
// Module: TrustX Server
// Description: HTTP API, analysis pipeline service, and audit logging.
// Purpose: Expose TrustX risk analysis over HTTP with injected runtime pieces.
// Dependencies: trustx-core, trustx-adapters, trustx-ledger, trustx-config, axum, tokio
// ============================================================================

//! ## Overview
//! The server crate wires configuration into a running API. [`AnalysisService`]
//! holds the analysis pipeline and ledger operations, [`routes`] maps them to
//! HTTP, and [`TrustxServer`] builds everything from a validated
//! [`trustx_config::TrustxConfig`] and runs the ledger reconciler beside the
//! listener.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod routes;
pub mod server;
pub mod service;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AnalysisAuditEvent;
pub use audit::AuditLedgerObserver;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::LedgerAuditEvent;
pub use audit::NoopAuditSink;
pub use audit::RequestAuditEvent;
pub use audit::StderrAuditSink;
pub use routes::AppState;
pub use routes::router;
pub use server::ServerError;
pub use server::TrustxServer;
pub use server::build_adapter_registry;
pub use server::build_audit_sink;
pub use server::build_ledger_client;
pub use server::build_stores;
pub use service::AnalysisReport;
pub use service::AnalysisService;
pub use service::AnnotatedVerdict;
pub use service::DashboardStats;
pub use service::LedgerView;
pub use service::ServiceError;
pub use service::ServiceGate;
pub use service::ServiceParts;
pub use telemetry::ApiMetricEvent;
pub use telemetry::ApiMetrics;
pub use telemetry::ApiOutcome;
pub use telemetry::ApiRoute;
pub use telemetry::NoopMetrics;
