// crates/trustx-core/src/runtime/ledger_gate.rs
// ============================================================================
// Module: TrustX Ledger Gate
// Description: Idempotent gate deciding which verdicts are written to the ledger.
// Purpose: Own every ledger record transition and the bounded retry schedule.
// Dependencies: thiserror, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`LedgerGate::submit`] skips LOW verdicts that are not degraded. Anything
//! else is keyed by the fingerprint-derived idempotency key; record creation
//! happens inside one atomic store update so concurrent submissions of the
//! same fingerprint open exactly one record. The write itself is handed to a
//! [`LedgerOutbox`] and confirmed out-of-band through
//! [`LedgerGate::record_confirmed`] and [`LedgerGate::record_failed`].
//!
//! Retries reuse the idempotency key. After `max_attempts` pending entries
//! the record becomes `FAILED_AFTER_RETRIES` and stays there.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::Fingerprint;
use crate::core::HashError;
use crate::core::IdempotencyKey;
use crate::core::LedgerOutcome;
use crate::core::LedgerRecord;
use crate::core::LedgerRef;
use crate::core::LedgerStatus;
use crate::core::RiskLevel;
use crate::core::SkipReason;
use crate::core::Timestamp;
use crate::core::Verdict;
use crate::interfaces::LedgerOutbox;
use crate::interfaces::LedgerStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum records scanned per retry or expiry pass.
const SCAN_LIMIT: usize = 256;
/// Failure reason recorded when a pending write is never confirmed.
const CONFIRMATION_TIMEOUT: &str = "confirmation timeout";

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Retry and confirmation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerPolicy {
    /// Maximum number of pending entries per record.
    pub max_attempts: u32,
    /// Backoff base; the n-th retry waits `base * 2^(n-1)`.
    pub backoff_base_ms: u64,
    /// Pending records older than this are treated as failed.
    pub confirmation_timeout_ms: u64,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 2_000,
            confirmation_timeout_ms: 60_000,
        }
    }
}

impl LedgerPolicy {
    /// Returns the backoff after `attempts` failed attempts.
    #[must_use]
    pub fn backoff_ms(&self, attempts: u32) -> u64 {
        let exponent = attempts.saturating_sub(1).min(31);
        self.backoff_base_ms.saturating_mul(1_u64 << exponent)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ledger gate errors.
#[derive(Debug, Error)]
pub enum LedgerGateError {
    /// Record store failure.
    #[error("ledger store error: {0}")]
    Store(String),
    /// Content digest computation failed.
    #[error("ledger digest error: {0}")]
    Digest(String),
    /// Callback referenced an unknown record.
    #[error("unknown ledger record: {0}")]
    UnknownRecord(String),
}

impl From<StoreError> for LedgerGateError {
    fn from(error: StoreError) -> Self {
        Self::Store(error.to_string())
    }
}

impl From<HashError> for LedgerGateError {
    fn from(error: HashError) -> Self {
        Self::Digest(error.to_string())
    }
}

// ============================================================================
// SECTION: Ledger Gate
// ============================================================================

/// Idempotent gate over ledger records.
#[derive(Debug, Clone)]
pub struct LedgerGate<S, O> {
    /// Record store.
    store: S,
    /// Write outbox.
    outbox: O,
    /// Retry policy.
    policy: LedgerPolicy,
}

impl<S, O> LedgerGate<S, O>
where
    S: LedgerStore,
    O: LedgerOutbox,
{
    /// Creates a gate.
    #[must_use]
    pub const fn new(store: S, outbox: O, policy: LedgerPolicy) -> Self {
        Self {
            store,
            outbox,
            policy,
        }
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Returns the record store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Submits a verdict.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerGateError`] when the digest or store update fails.
    pub fn submit(&self, verdict: &Verdict, now: Timestamp) -> Result<LedgerOutcome, LedgerGateError> {
        if verdict.risk_level == RiskLevel::Low && !verdict.degraded {
            return Ok(LedgerOutcome::Skipped {
                reason: SkipReason::LowRisk,
            });
        }
        let key = IdempotencyKey::from_fingerprint(&verdict.input_fingerprint);
        let digest = verdict.content_digest()?;
        let max_attempts = self.policy.max_attempts;
        let mut dispatched = false;
        let stored = self.store.update(&key, &mut |existing: Option<&LedgerRecord>| match existing {
            None => {
                dispatched = true;
                Some(LedgerRecord::open(verdict, digest.clone(), now))
            }
            Some(record) if record.status == LedgerStatus::Failed => {
                if record.attempts >= max_attempts {
                    Some(exhaust(record, "retry budget exhausted", now))
                } else {
                    dispatched = true;
                    Some(reopen(record, now))
                }
            }
            Some(_) => None,
        })?;
        let Some(record) = stored else {
            return Err(LedgerGateError::UnknownRecord(key.to_string()));
        };
        let record = if dispatched { self.dispatch(record, now)? } else { record };
        Ok(LedgerOutcome::Recorded {
            record,
            dispatched,
        })
    }

    /// Marks a record confirmed.
    ///
    /// Late confirmations are also accepted from `FAILED` and `FAILED_AFTER_RETRIES`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerGateError::UnknownRecord`] when no record exists.
    pub fn record_confirmed(
        &self,
        key: &IdempotencyKey,
        ledger_ref: &LedgerRef,
        now: Timestamp,
    ) -> Result<LedgerRecord, LedgerGateError> {
        let stored = self.store.update(key, &mut |existing: Option<&LedgerRecord>| {
            let record = existing?;
            if record.status == LedgerStatus::Confirmed {
                return None;
            }
            let mut next = record.clone();
            next.status = LedgerStatus::Confirmed;
            next.ledger_ref = Some(ledger_ref.clone());
            next.next_retry_at = None;
            next.updated_at = now;
            Some(next)
        })?;
        stored.ok_or_else(|| LedgerGateError::UnknownRecord(key.to_string()))
    }

    /// Records a failed attempt and schedules a retry or exhausts the record.
    ///
    /// Callbacks for records that are not pending are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerGateError::UnknownRecord`] when no record exists.
    pub fn record_failed(
        &self,
        key: &IdempotencyKey,
        reason: &str,
        now: Timestamp,
    ) -> Result<LedgerRecord, LedgerGateError> {
        let policy = self.policy;
        let stored = self.store.update(key, &mut |existing: Option<&LedgerRecord>| {
            let record = existing?;
            if record.status != LedgerStatus::Pending {
                return None;
            }
            Some(fail_attempt(record, &policy, reason, now))
        })?;
        stored.ok_or_else(|| LedgerGateError::UnknownRecord(key.to_string()))
    }

    /// Reopens every failed record whose backoff has elapsed and enqueues it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerGateError`] when the store fails.
    pub fn retry_due(&self, now: Timestamp) -> Result<Vec<LedgerRecord>, LedgerGateError> {
        let candidates = self.store.list_by_status(LedgerStatus::Failed, SCAN_LIMIT)?;
        let mut reopened = Vec::new();
        for candidate in candidates {
            let mut dispatched = false;
            let stored = self.store.update(&candidate.idempotency_key, &mut |existing: Option<&LedgerRecord>| {
                let record = existing?;
                let due = record.next_retry_at.is_none_or(|at| at <= now);
                if record.status != LedgerStatus::Failed || !due {
                    return None;
                }
                dispatched = true;
                Some(reopen(record, now))
            })?;
            if dispatched && let Some(record) = stored {
                reopened.push(self.dispatch(record, now)?);
            }
        }
        Ok(reopened)
    }

    /// Fails pending records whose confirmation window has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerGateError`] when the store fails.
    pub fn expire_pending(&self, now: Timestamp) -> Result<Vec<LedgerRecord>, LedgerGateError> {
        let policy = self.policy;
        let candidates = self.store.list_by_status(LedgerStatus::Pending, SCAN_LIMIT)?;
        let mut expired = Vec::new();
        for candidate in candidates {
            let mut failed = false;
            let stored = self.store.update(&candidate.idempotency_key, &mut |existing: Option<&LedgerRecord>| {
                let record = existing?;
                let elapsed = now.millis_since(record.updated_at) >= policy.confirmation_timeout_ms;
                if record.status != LedgerStatus::Pending || !elapsed {
                    return None;
                }
                failed = true;
                Some(fail_attempt(record, &policy, CONFIRMATION_TIMEOUT, now))
            })?;
            if failed && let Some(record) = stored {
                expired.push(record);
            }
        }
        Ok(expired)
    }

    /// Returns the record for a fingerprint, if any.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerGateError`] when the store fails.
    pub fn record_for(&self, fingerprint: &Fingerprint) -> Result<Option<LedgerRecord>, LedgerGateError> {
        Ok(self.store.load(&IdempotencyKey::from_fingerprint(fingerprint))?)
    }

    /// Hands the record's write to the outbox, failing the attempt when the queue rejects it.
    fn dispatch(&self, record: LedgerRecord, now: Timestamp) -> Result<LedgerRecord, LedgerGateError> {
        match self.outbox.enqueue(record.write_request()) {
            Ok(()) => Ok(record),
            Err(err) => self.record_failed(&record.idempotency_key, &err.to_string(), now),
        }
    }
}

// ============================================================================
// SECTION: Transitions
// ============================================================================

/// Moves a failed record back to pending for another attempt.
fn reopen(record: &LedgerRecord, now: Timestamp) -> LedgerRecord {
    let mut next = record.clone();
    next.status = LedgerStatus::Pending;
    next.attempts = record.attempts.saturating_add(1);
    next.next_retry_at = None;
    next.updated_at = now;
    next
}

/// Fails a pending attempt, scheduling a retry or exhausting the budget.
fn fail_attempt(record: &LedgerRecord, policy: &LedgerPolicy, reason: &str, now: Timestamp) -> LedgerRecord {
    if record.attempts >= policy.max_attempts {
        return exhaust(record, reason, now);
    }
    let mut next = record.clone();
    next.status = LedgerStatus::Failed;
    next.last_error = Some(reason.to_string());
    next.next_retry_at = Some(now.saturating_add_millis(policy.backoff_ms(record.attempts)));
    next.updated_at = now;
    next
}

/// Moves a record to the terminal failure state.
fn exhaust(record: &LedgerRecord, reason: &str, now: Timestamp) -> LedgerRecord {
    let mut next = record.clone();
    next.status = LedgerStatus::FailedAfterRetries;
    next.last_error = Some(reason.to_string());
    next.next_retry_at = None;
    next.updated_at = now;
    next
}
