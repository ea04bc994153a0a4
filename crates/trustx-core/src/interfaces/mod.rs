// crates/trustx-core/src/interfaces/mod.rs
// ============================================================================
// Module: TrustX Interfaces
// Description: Backend-agnostic interfaces for adapters, ledger writers, and storage.
// Purpose: Define the contract surfaces used by the TrustX runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how TrustX integrates with registries, model oracles,
//! ledgers, and durable storage without embedding backend details. All
//! interfaces are synchronous; async hosts run them on blocking threads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::Fingerprint;
use crate::core::IdempotencyKey;
use crate::core::InputKind;
use crate::core::LedgerConfirmation;
use crate::core::LedgerReceipt;
use crate::core::LedgerRecord;
use crate::core::LedgerRef;
use crate::core::LedgerStats;
use crate::core::LedgerStatus;
use crate::core::LedgerWriteRequest;
use crate::core::NormalizedInput;
use crate::core::RequestId;
use crate::core::SessionId;
use crate::core::SessionMetadata;
use crate::core::SessionRecord;
use crate::core::SignalSource;
use crate::core::Timestamp;
use crate::core::Verdict;
use crate::core::VerdictStats;

// ============================================================================
// SECTION: Signal Adapters
// ============================================================================

/// Successful adapter evaluation before it is stamped into a signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterReport {
    /// Risk score in `[0, 1]`.
    pub score: f64,
    /// Ordered short findings.
    pub indicators: Vec<String>,
    /// Adapter-specific observations.
    pub details: BTreeMap<String, String>,
}

impl AdapterReport {
    /// Creates a report with no details.
    #[must_use]
    pub const fn new(score: f64, indicators: Vec<String>) -> Self {
        Self {
            score,
            indicators,
            details: BTreeMap::new(),
        }
    }

    /// Adds a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Adapter failures. Hosts convert these into failed signals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The adapter's upstream is not configured or not reachable.
    #[error("adapter upstream unavailable: {0}")]
    Unavailable(String),
    /// The adapter faulted while evaluating.
    #[error("adapter failed: {0}")]
    Failed(String),
    /// The adapter was handed an input kind it does not support.
    #[error("adapter does not support input kind {0}")]
    Unsupported(InputKind),
}

/// One fraud-signal capability.
pub trait SignalAdapter {
    /// Returns the source category this adapter reports as.
    fn source(&self) -> SignalSource;

    /// Returns true when the adapter applies to `kind`.
    fn supports(&self, kind: InputKind) -> bool;

    /// Evaluates the input.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the upstream is unavailable or the
    /// evaluation faults.
    fn evaluate(&self, input: &NormalizedInput) -> Result<AdapterReport, AdapterError>;
}

// ============================================================================
// SECTION: Ledger Writer
// ============================================================================

/// Ledger client errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerClientError {
    /// Transport failure reaching the ledger.
    #[error("ledger transport error: {0}")]
    Transport(String),
    /// The ledger rejected the request.
    #[error("ledger rejected request: {0}")]
    Rejected(String),
    /// The ledger reference is unknown.
    #[error("ledger reference not found: {0}")]
    NotFound(String),
    /// The ledger response was malformed.
    #[error("ledger response invalid: {0}")]
    Invalid(String),
}

/// Append-only ledger with a commit/confirm protocol.
pub trait LedgerClient {
    /// Appends an entry; repeated calls with one idempotency key return the same reference.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerClientError`] when the append fails.
    fn append(&self, request: &LedgerWriteRequest) -> Result<LedgerReceipt, LedgerClientError>;

    /// Polls the state of an appended entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerClientError`] when the poll fails.
    fn status(&self, ledger_ref: &LedgerRef) -> Result<LedgerConfirmation, LedgerClientError>;
}

/// Outbox errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutboxError {
    /// Queue is at capacity.
    #[error("ledger outbox full")]
    Full,
    /// Consumer has shut down.
    #[error("ledger outbox closed")]
    Closed,
}

/// Fire-and-forget handoff of ledger writes to the background writer.
pub trait LedgerOutbox {
    /// Enqueues a write without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError`] when the write cannot be queued.
    fn enqueue(&self, request: LedgerWriteRequest) -> Result<(), OutboxError>;
}

// ============================================================================
// SECTION: Stores
// ============================================================================

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Store data corruption detected.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("store version mismatch: {0}")]
    VersionMismatch(String),
    /// Referenced entity does not exist.
    #[error("store entity not found: {0}")]
    NotFound(String),
    /// Write conflicts with existing data.
    #[error("store conflict: {0}")]
    Conflict(String),
    /// Invalid data supplied to the store.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Store error.
    #[error("store error: {0}")]
    Store(String),
}

/// Atomic read-modify-write callback for ledger records.
///
/// Receives the current record (if any) and returns the replacement, or
/// `None` to leave the stored record unchanged.
pub type LedgerRecordUpdate<'a> = dyn FnMut(Option<&LedgerRecord>) -> Option<LedgerRecord> + 'a;

/// Durable ledger record storage keyed by idempotency key.
pub trait LedgerStore {
    /// Loads a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load(&self, key: &IdempotencyKey) -> Result<Option<LedgerRecord>, StoreError>;

    /// Applies `update` atomically and returns the stored record afterwards.
    ///
    /// No other update for the same key may interleave between the read
    /// passed to `update` and the write of its result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read or write fails.
    fn update(
        &self,
        key: &IdempotencyKey,
        update: &mut LedgerRecordUpdate<'_>,
    ) -> Result<Option<LedgerRecord>, StoreError>;

    /// Finds a record by its ledger reference.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_by_ref(&self, ledger_ref: &LedgerRef) -> Result<Option<LedgerRecord>, StoreError>;

    /// Lists records with `status`, oldest update first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when listing fails.
    fn list_by_status(
        &self,
        status: LedgerStatus,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>, StoreError>;

    /// Returns counts by status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when counting fails.
    fn stats(&self) -> Result<LedgerStats, StoreError>;
}

/// Session and verdict storage with a fingerprint secondary index.
pub trait SessionStore {
    /// Creates a session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the session already exists.
    fn create_session(
        &self,
        session_id: &SessionId,
        metadata: &SessionMetadata,
        created_at: Timestamp,
    ) -> Result<SessionRecord, StoreError>;

    /// Returns the session, creating it with default metadata when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading or creation fails.
    fn ensure_session(
        &self,
        session_id: &SessionId,
        created_at: Timestamp,
    ) -> Result<SessionRecord, StoreError>;

    /// Reserves the next ingress sequence number for a session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the session does not exist.
    fn reserve_sequence(&self, session_id: &SessionId) -> Result<u64, StoreError>;

    /// Appends a verdict at a reserved sequence and updates the fingerprint index
    /// in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown sessions and
    /// [`StoreError::Conflict`] for reused sequences or request ids.
    fn append(
        &self,
        session_id: &SessionId,
        sequence: u64,
        verdict: &Verdict,
    ) -> Result<(), StoreError>;

    /// Loads the session record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn session(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError>;

    /// Returns the session's verdicts in ascending sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn session_verdicts(&self, session_id: &SessionId)
    -> Result<Option<Vec<Verdict>>, StoreError>;

    /// Loads a verdict by request id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn verdict(&self, request_id: &RequestId) -> Result<Option<Verdict>, StoreError>;

    /// Returns the most recently appended verdict for a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn latest_for_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Verdict>, StoreError>;

    /// Returns up to `limit` verdicts, newest first, optionally scoped to a session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn history(
        &self,
        session_id: Option<&SessionId>,
        limit: usize,
    ) -> Result<Vec<Verdict>, StoreError>;

    /// Returns verdict statistics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when counting fails.
    fn stats(&self) -> Result<VerdictStats, StoreError>;
}
