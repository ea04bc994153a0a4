// crates/trustx-server/src/service.rs
// ============================================================================
// Module: Analysis Service
// Description: Analysis pipeline, session, history, and ledger operations.
// Purpose: Own the injected runtime pieces and expose one method per API operation.
// Dependencies: trustx-core, trustx-adapters, trustx-ledger, tokio, uuid
// ============================================================================

//! ## Overview
//! [`AnalysisService`] is the transport-independent core of the HTTP API.
//! Ingress validation and session sequencing happen on the caller's task; the
//! rest of the pipeline (fan-out, aggregation, ledger gating, session append)
//! runs in a spawned task so a verdict that has been computed is persisted
//! even when the client disconnects. Store calls are synchronous and run on
//! the blocking pool.
//!
//! Security posture: inputs are untrusted; validation fails closed before any
//! adapter runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use trustx_adapters::SignalFanout;
use trustx_core::AggregationEngine;
use trustx_core::AnalysisInput;
use trustx_core::Fingerprint;
use trustx_core::LedgerClient;
use trustx_core::LedgerGate;
use trustx_core::LedgerGateError;
use trustx_core::LedgerOutcome;
use trustx_core::LedgerRecord;
use trustx_core::LedgerRef;
use trustx_core::LedgerStats;
use trustx_core::LedgerStatus;
use trustx_core::LedgerStore;
use trustx_core::LedgerTxState;
use trustx_core::NormalizedInput;
use trustx_core::RequestId;
use trustx_core::RiskLevel;
use trustx_core::SessionId;
use trustx_core::SessionMetadata;
use trustx_core::SessionRecord;
use trustx_core::SessionStore;
use trustx_core::SharedLedgerStore;
use trustx_core::SharedSessionStore;
use trustx_core::StoreError;
use trustx_core::Timestamp;
use trustx_core::Verdict;
use trustx_core::VerdictContext;
use trustx_core::VerdictStats;
use trustx_ledger::ChannelOutbox;
use trustx_ledger::Clock;
use uuid::Uuid;

use crate::audit::AnalysisAuditEvent;
use crate::audit::AnalysisAuditEventParams;
use crate::audit::AuditSink;
use crate::audit::SignalAudit;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of history entries returned.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
/// Maximum number of history entries returned.
pub const MAX_HISTORY_LIMIT: usize = 100;
/// Maximum number of records returned by the failed-ledger view.
pub const MAX_FAILED_LIMIT: usize = 500;

/// Ledger status label for verdicts the gate skipped.
pub const LEDGER_SKIPPED: &str = "SKIPPED";
/// Ledger status label for verdicts without a ledger record.
pub const LEDGER_NOT_RECORDED: &str = "NOT_RECORDED";
/// Placeholder hash for records still in flight.
pub const PENDING_HASH: &str = "pending";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Ledger gate used by the service.
pub type ServiceGate = LedgerGate<SharedLedgerStore, ChannelOutbox>;

/// Service errors surfaced to the transport layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Client input was rejected.
    #[error("invalid input: {0}")]
    Input(String),
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(message) => Self::NotFound(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<LedgerGateError> for ServiceError {
    fn from(error: LedgerGateError) -> Self {
        Self::Internal(error.to_string())
    }
}

/// Ledger state attached to every verdict-bearing payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerView {
    /// `SKIPPED`, `NOT_RECORDED`, or the record status label.
    pub ledger_status: &'static str,
    /// Ledger reference when confirmed, `"pending"` in flight, otherwise null.
    pub blockchain_hash: Option<String>,
}

impl LedgerView {
    /// View for a verdict the gate skipped.
    #[must_use]
    pub const fn skipped() -> Self {
        Self {
            ledger_status: LEDGER_SKIPPED,
            blockchain_hash: None,
        }
    }

    /// View for a verdict with no ledger record.
    #[must_use]
    pub const fn not_recorded() -> Self {
        Self {
            ledger_status: LEDGER_NOT_RECORDED,
            blockchain_hash: None,
        }
    }

    /// View derived from a ledger record.
    #[must_use]
    pub fn from_record(record: &LedgerRecord) -> Self {
        let blockchain_hash = match record.status {
            LedgerStatus::Confirmed => record.ledger_ref.as_ref().map(ToString::to_string),
            LedgerStatus::Pending | LedgerStatus::Failed => Some(PENDING_HASH.to_string()),
            LedgerStatus::FailedAfterRetries => None,
        };
        Self {
            ledger_status: record.status.as_str(),
            blockchain_hash,
        }
    }

    /// View derived from a gate outcome.
    #[must_use]
    pub fn from_outcome(outcome: &LedgerOutcome) -> Self {
        outcome.record().map_or_else(Self::skipped, Self::from_record)
    }
}

/// Verdict with its ledger view.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedVerdict {
    /// Canonical verdict.
    #[serde(flatten)]
    pub verdict: Verdict,
    /// Ledger state.
    #[serde(flatten)]
    pub ledger: LedgerView,
}

/// Result of one analysis request.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Verdict with ledger state.
    #[serde(flatten)]
    pub analysis: AnnotatedVerdict,
    /// Session the verdict was appended to.
    pub session_id: SessionId,
    /// Ingress sequence within the session.
    pub sequence: u64,
}

/// Session with its ordered verdicts.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Session record.
    pub session: SessionRecord,
    /// Verdicts in arrival order.
    pub verdicts: Vec<AnnotatedVerdict>,
}

/// Dashboard counters.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    /// Verdict counters.
    pub verdicts: VerdictStats,
    /// Ledger counters by status.
    pub ledger: LedgerStats,
    /// Confirmed share of ledger records.
    pub ledger_success_rate: f64,
}

/// Ledger verification result.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    /// Confirmations reported by the ledger; zero when the ledger is unreachable.
    pub confirmations: u64,
    /// On-ledger state, when the ledger answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<LedgerTxState>,
    /// Stored record.
    pub record: LedgerRecord,
}

/// Runtime pieces injected into the service.
pub struct ServiceParts {
    /// Signal fan-out.
    pub fanout: SignalFanout,
    /// Aggregation engine.
    pub engine: AggregationEngine,
    /// Ledger gate.
    pub gate: Arc<ServiceGate>,
    /// Session and verdict store.
    pub sessions: SharedSessionStore,
    /// Ledger client used for verification polls.
    pub ledger: Arc<dyn LedgerClient + Send + Sync>,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
    /// Time source.
    pub clock: Clock,
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Analysis service shared by every request handler.
#[derive(Clone)]
pub struct AnalysisService {
    /// Signal fan-out.
    fanout: Arc<SignalFanout>,
    /// Aggregation engine.
    engine: Arc<AggregationEngine>,
    /// Ledger gate.
    gate: Arc<ServiceGate>,
    /// Session and verdict store.
    sessions: SharedSessionStore,
    /// Ledger client.
    ledger: Arc<dyn LedgerClient + Send + Sync>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Time source.
    clock: Clock,
}

/// Work handed to the spawned pipeline task.
struct PipelineJob {
    /// Normalized input.
    input: NormalizedInput,
    /// Input fingerprint.
    fingerprint: Fingerprint,
    /// Request identifier.
    request_id: RequestId,
    /// Target session.
    session_id: SessionId,
    /// Reserved sequence.
    sequence: u64,
    /// Ingress instant.
    started: Instant,
}

impl AnalysisService {
    /// Creates a service from its parts.
    #[must_use]
    pub fn new(parts: ServiceParts) -> Self {
        Self {
            fanout: Arc::new(parts.fanout),
            engine: Arc::new(parts.engine),
            gate: parts.gate,
            sessions: parts.sessions,
            ledger: parts.ledger,
            audit: parts.audit,
            clock: parts.clock,
        }
    }

    /// Returns the audit sink.
    #[must_use]
    pub fn audit(&self) -> Arc<dyn AuditSink> {
        Arc::clone(&self.audit)
    }

    /// Returns the ledger gate.
    #[must_use]
    pub fn gate(&self) -> Arc<ServiceGate> {
        Arc::clone(&self.gate)
    }

    /// Returns the current time from the injected clock.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        (self.clock)()
    }

    /// Analyzes one input and appends the verdict to a session.
    ///
    /// When `session_id` is absent a new session is created; an unknown
    /// session id is created on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Input`] for invalid inputs and
    /// [`ServiceError::Internal`] when session sequencing fails. Failures while
    /// persisting a computed verdict are audited, not returned.
    pub async fn analyze(
        &self,
        input: AnalysisInput,
        session_id: Option<SessionId>,
    ) -> Result<AnalysisReport, ServiceError> {
        let started = Instant::now();
        let input = input.normalize().map_err(|err| ServiceError::Input(err.to_string()))?;
        let fingerprint = input.fingerprint().map_err(|err| ServiceError::Internal(err.to_string()))?;
        let now = self.now();
        let (session_id, sequence) = self
            .blocking(move |service| {
                let session_id = match session_id {
                    Some(session_id) => {
                        service.sessions.ensure_session(&session_id, now)?;
                        session_id
                    }
                    None => {
                        let session_id = SessionId::new(Uuid::new_v4().to_string());
                        service.sessions.create_session(&session_id, &SessionMetadata::default(), now)?;
                        session_id
                    }
                };
                let sequence = service.sessions.reserve_sequence(&session_id)?;
                Ok((session_id, sequence))
            })
            .await?;
        let job = PipelineJob {
            input,
            fingerprint,
            request_id: RequestId::new(Uuid::new_v4().to_string()),
            session_id,
            sequence,
            started,
        };
        let service = self.clone();
        tokio::spawn(async move { service.run_pipeline(job).await })
            .await
            .map_err(|err| ServiceError::Internal(format!("analysis task failed: {err}")))?
    }

    /// Creates a session.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the store fails.
    pub async fn create_session(&self, metadata: SessionMetadata) -> Result<SessionRecord, ServiceError> {
        let now = self.now();
        self.blocking(move |service| {
            let session_id = SessionId::new(Uuid::new_v4().to_string());
            Ok(service.sessions.create_session(&session_id, &metadata, now)?)
        })
        .await
    }

    /// Returns a session and its verdicts in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for unknown sessions.
    pub async fn session(&self, session_id: SessionId) -> Result<SessionReport, ServiceError> {
        self.blocking(move |service| {
            let Some(session) = service.sessions.session(&session_id)? else {
                return Err(ServiceError::NotFound(format!("session {session_id}")));
            };
            let verdicts = service.sessions.session_verdicts(&session_id)?.unwrap_or_default();
            Ok(SessionReport {
                session,
                verdicts: verdicts.into_iter().map(|verdict| service.annotate(verdict)).collect(),
            })
        })
        .await
    }

    /// Returns newest-first verdicts, optionally for one session.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the store fails.
    pub async fn history(
        &self,
        session_id: Option<SessionId>,
        limit: Option<usize>,
    ) -> Result<Vec<AnnotatedVerdict>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        self.blocking(move |service| {
            let verdicts = service.sessions.history(session_id.as_ref(), limit)?;
            Ok(verdicts.into_iter().map(|verdict| service.annotate(verdict)).collect())
        })
        .await
    }

    /// Returns dashboard counters.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when a store fails.
    pub async fn dashboard(&self) -> Result<DashboardStats, ServiceError> {
        self.blocking(|service| {
            let verdicts = SessionStore::stats(&service.sessions)?;
            let ledger = LedgerStore::stats(service.gate.store())?;
            let ledger_success_rate = ledger.success_rate();
            Ok(DashboardStats {
                verdicts,
                ledger,
                ledger_success_rate,
            })
        })
        .await
    }

    /// Submits a stored verdict to the ledger gate.
    ///
    /// Resubmission is idempotent: an existing record is returned unchanged and
    /// a failed one is retried within its budget.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for unknown requests.
    pub async fn log_report(&self, request_id: RequestId) -> Result<LedgerView, ServiceError> {
        let now = self.now();
        self.blocking(move |service| {
            let Some(verdict) = service.sessions.verdict(&request_id)? else {
                return Err(ServiceError::NotFound(format!("request {request_id}")));
            };
            let outcome = service.gate.submit(&verdict, now)?;
            Ok(LedgerView::from_outcome(&outcome))
        })
        .await
    }

    /// Looks up a ledger reference and polls its confirmations.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] when no record carries the reference.
    pub async fn verify(&self, ledger_ref: LedgerRef) -> Result<VerifyReport, ServiceError> {
        self.blocking(move |service| {
            let Some(record) = service.gate.store().find_by_ref(&ledger_ref)? else {
                return Err(ServiceError::NotFound(format!("ledger reference {ledger_ref}")));
            };
            let (confirmations, state) = match service.ledger.status(&ledger_ref) {
                Ok(confirmation) => (confirmation.confirmations, Some(confirmation.state)),
                Err(_) => (0, None),
            };
            Ok(VerifyReport {
                confirmations,
                state,
                record,
            })
        })
        .await
    }

    /// Returns records that exhausted their retries.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the store fails.
    pub async fn failed(&self) -> Result<Vec<LedgerRecord>, ServiceError> {
        self.blocking(|service| {
            Ok(service.gate.store().list_by_status(LedgerStatus::FailedAfterRetries, MAX_FAILED_LIMIT)?)
        })
        .await
    }

    /// Runs fan-out, aggregation, and persistence for one request.
    async fn run_pipeline(self, job: PipelineJob) -> Result<AnalysisReport, ServiceError> {
        let input_kind = job.input.kind();
        let signals = self.fanout.collect(Arc::new(job.input)).await;
        let context = VerdictContext {
            request_id: job.request_id,
            input_fingerprint: job.fingerprint,
            input_kind,
            created_at: self.now(),
        };
        let verdict = self.engine.aggregate(context, &signals);
        let session_id = job.session_id;
        let sequence = job.sequence;
        let persisted_session = session_id.clone();
        let (verdict, ledger, faults) = self
            .blocking(move |service| {
                let (ledger, faults) = service.persist(&persisted_session, sequence, &verdict);
                Ok((verdict, ledger, faults))
            })
            .await?;
        let latency_ms = u64::try_from(job.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.audit.record_analysis(&AnalysisAuditEvent::new(AnalysisAuditEventParams {
            request_id: verdict.request_id.clone(),
            session_id: session_id.clone(),
            sequence,
            input_kind,
            input_fingerprint: verdict.input_fingerprint.clone(),
            risk_level: verdict.risk_level,
            risk_score: verdict.risk_score,
            degraded: verdict.degraded,
            signals: signals.iter().map(SignalAudit::from).collect(),
            ledger_status: ledger.ledger_status,
            faults,
            latency_ms,
        }));
        Ok(AnalysisReport {
            analysis: AnnotatedVerdict {
                verdict,
                ledger,
            },
            session_id,
            sequence,
        })
    }

    /// Appends the verdict and gates it, collecting faults instead of failing.
    fn persist(&self, session_id: &SessionId, sequence: u64, verdict: &Verdict) -> (LedgerView, Vec<String>) {
        let mut faults = Vec::new();
        if let Err(err) = self.sessions.append(session_id, sequence, verdict) {
            faults.push(err.to_string());
        }
        let ledger = match self.gate.submit(verdict, self.now()) {
            Ok(outcome) => LedgerView::from_outcome(&outcome),
            Err(err) => {
                faults.push(err.to_string());
                LedgerView::not_recorded()
            }
        };
        (ledger, faults)
    }

    /// Attaches the current ledger view to a stored verdict.
    fn annotate(&self, verdict: Verdict) -> AnnotatedVerdict {
        let ledger = if verdict.risk_level == RiskLevel::Low && !verdict.degraded {
            LedgerView::skipped()
        } else {
            match self.gate.record_for(&verdict.input_fingerprint) {
                Ok(Some(record)) => LedgerView::from_record(&record),
                Ok(None) | Err(_) => LedgerView::not_recorded(),
            }
        };
        AnnotatedVerdict {
            verdict,
            ledger,
        }
    }

    /// Runs synchronous store work on the blocking pool.
    async fn blocking<T, F>(&self, task: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> Result<T, ServiceError> + Send + 'static,
    {
        let service = self.clone();
        tokio::task::spawn_blocking(move || task(service))
            .await
            .map_err(|err| ServiceError::Internal(format!("store task failed: {err}")))?
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
