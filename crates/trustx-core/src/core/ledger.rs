// crates/trustx-core/src/core/ledger.rs
// ============================================================================
// Module: TrustX Ledger Records
// Description: Ledger record state, write requests, receipts, and gate outcomes.
// Purpose: Model the durable-recording lifecycle of high-risk verdicts.
// Dependencies: serde, crate::core::{hashing, identifiers, time, verdict}
// ============================================================================

//! ## Overview
//! A [`LedgerRecord`] tracks one fingerprint's journey onto the append-only
//! ledger. Transitions are owned by the ledger gate:
//! `PENDING -> CONFIRMED`, `PENDING -> FAILED -> PENDING` (bounded), and the
//! terminal `FAILED_AFTER_RETRIES`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::Fingerprint;
use crate::core::identifiers::IdempotencyKey;
use crate::core::identifiers::LedgerRef;
use crate::core::identifiers::RequestId;
use crate::core::time::Timestamp;
use crate::core::verdict::RiskLevel;
use crate::core::verdict::Verdict;

// ============================================================================
// SECTION: Ledger Status
// ============================================================================

/// Lifecycle status of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerStatus {
    /// Write handed off; awaiting confirmation.
    Pending,
    /// Ledger confirmed the append.
    Confirmed,
    /// Last attempt failed; a retry is scheduled.
    Failed,
    /// Retries exhausted; needs manual reconciliation.
    FailedAfterRetries,
}

impl LedgerStatus {
    /// All statuses in canonical order.
    pub const ALL: [Self; 4] =
        [Self::Pending, Self::Confirmed, Self::Failed, Self::FailedAfterRetries];

    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
            Self::FailedAfterRetries => "FAILED_AFTER_RETRIES",
        }
    }

    /// Parses a stable label back into a status.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == label)
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Ledger Record
// ============================================================================

/// Durable-recording state for one fingerprint.
///
/// # Invariants
/// - `ledger_ref` is set iff `status == Confirmed`.
/// - `attempts` counts entries into `Pending` and never exceeds the policy maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Idempotency key derived from the fingerprint.
    pub idempotency_key: IdempotencyKey,
    /// Input fingerprint.
    pub input_fingerprint: Fingerprint,
    /// Verdict that opened the record.
    pub request_id: RequestId,
    /// Risk level of that verdict.
    pub risk_level: RiskLevel,
    /// Risk score of that verdict.
    pub risk_score: f64,
    /// Digest of fingerprint, level, score, and indicators.
    pub content_digest: HashDigest,
    /// Lifecycle status.
    pub status: LedgerStatus,
    /// Ledger reference once confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_ref: Option<LedgerRef>,
    /// Number of write attempts started.
    pub attempts: u32,
    /// Last failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Earliest time of the next automatic retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<Timestamp>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last transition time.
    pub updated_at: Timestamp,
}

impl LedgerRecord {
    /// Opens a pending record for a verdict.
    #[must_use]
    pub fn open(verdict: &Verdict, content_digest: HashDigest, now: Timestamp) -> Self {
        Self {
            idempotency_key: IdempotencyKey::from_fingerprint(&verdict.input_fingerprint),
            input_fingerprint: verdict.input_fingerprint.clone(),
            request_id: verdict.request_id.clone(),
            risk_level: verdict.risk_level,
            risk_score: verdict.risk_score,
            content_digest,
            status: LedgerStatus::Pending,
            ledger_ref: None,
            attempts: 1,
            last_error: None,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the write request for the current attempt.
    #[must_use]
    pub fn write_request(&self) -> LedgerWriteRequest {
        LedgerWriteRequest {
            idempotency_key: self.idempotency_key.clone(),
            input_fingerprint: self.input_fingerprint.clone(),
            request_id: self.request_id.clone(),
            risk_level: self.risk_level,
            risk_score: self.risk_score,
            content_digest: self.content_digest.clone(),
            attempt: self.attempts,
        }
    }

    /// Returns true when no further automatic transition will happen.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.status, LedgerStatus::Confirmed | LedgerStatus::FailedAfterRetries)
    }
}

// ============================================================================
// SECTION: Ledger Wire Types
// ============================================================================

/// Append request handed to the ledger writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerWriteRequest {
    /// Idempotency key reused across retries.
    pub idempotency_key: IdempotencyKey,
    /// Input fingerprint.
    pub input_fingerprint: Fingerprint,
    /// Originating request.
    pub request_id: RequestId,
    /// Risk level.
    pub risk_level: RiskLevel,
    /// Risk score.
    pub risk_score: f64,
    /// Content digest anchored on the ledger.
    pub content_digest: HashDigest,
    /// Attempt number, starting at 1.
    pub attempt: u32,
}

/// Acknowledgement returned by a ledger append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Ledger reference for the appended entry.
    pub ledger_ref: LedgerRef,
}

/// On-ledger state of an appended entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum LedgerTxState {
    /// Accepted, not yet final.
    Pending,
    /// Final.
    Confirmed,
    /// Rejected by the ledger.
    Rejected(String),
}

/// Status poll result for a ledger reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfirmation {
    /// Ledger reference.
    pub ledger_ref: LedgerRef,
    /// Entry state.
    pub state: LedgerTxState,
    /// Number of confirmations observed.
    pub confirmations: u64,
}

// ============================================================================
// SECTION: Gate Outcomes
// ============================================================================

/// Reason a verdict was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Low risk with every signal available.
    LowRisk,
}

impl SkipReason {
    /// Returns the stable label for the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowRisk => "low_risk",
        }
    }
}

/// Result of submitting a verdict to the ledger gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LedgerOutcome {
    /// No record was created.
    Skipped {
        /// Why the verdict was skipped.
        reason: SkipReason,
    },
    /// A record exists for the fingerprint.
    Recorded {
        /// Record state after submission.
        record: LedgerRecord,
        /// True when this submission handed a write to the outbox.
        dispatched: bool,
    },
}

impl LedgerOutcome {
    /// Returns the record when one exists.
    #[must_use]
    pub const fn record(&self) -> Option<&LedgerRecord> {
        match self {
            Self::Skipped {
                ..
            } => None,
            Self::Recorded {
                record,
                ..
            } => Some(record),
        }
    }
}

// ============================================================================
// SECTION: Ledger Statistics
// ============================================================================

/// Counts of ledger records by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    /// Total records.
    pub total: u64,
    /// Records pending confirmation.
    pub pending: u64,
    /// Confirmed records.
    pub confirmed: u64,
    /// Records awaiting retry.
    pub failed: u64,
    /// Records that exhausted retries.
    pub failed_after_retries: u64,
}

impl LedgerStats {
    /// Counts one record with `status`.
    pub fn record(&mut self, status: LedgerStatus) {
        self.total += 1;
        match status {
            LedgerStatus::Pending => self.pending += 1,
            LedgerStatus::Confirmed => self.confirmed += 1,
            LedgerStatus::Failed => self.failed += 1,
            LedgerStatus::FailedAfterRetries => self.failed_after_retries += 1,
        }
    }

    /// Returns the confirmed share of all records, or zero when empty.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss, reason = "Record counts stay far below 2^52.")]
        let rate = self.confirmed as f64 / self.total as f64;
        rate
    }
}
