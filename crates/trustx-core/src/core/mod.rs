// crates/trustx-core/src/core/mod.rs
// ============================================================================
// Module: TrustX Core Types
// Description: Canonical data model for signals, verdicts, ledger records, and sessions.
// Purpose: Group the serializable types shared by every TrustX crate.
// Dependencies: serde, serde_jcs, sha2, url
// ============================================================================

//! ## Overview
//! Core types are plain serializable data. Invariants that matter for
//! aggregation (score presence, score range) are enforced by constructors and
//! on deserialization rather than by callers.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod hashing;
pub mod identifiers;
pub mod input;
pub mod ledger;
pub mod session;
pub mod signal;
pub mod time;
pub mod verdict;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use hashing::digest_matches;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use identifiers::Fingerprint;
pub use identifiers::IdempotencyKey;
pub use identifiers::LedgerRef;
pub use identifiers::RequestId;
pub use identifiers::SessionId;
pub use input::AnalysisInput;
pub use input::InputError;
pub use input::InputKind;
pub use input::MAX_MEDIA_BYTES;
pub use input::MAX_TEXT_CHARS;
pub use input::NormalizedInput;
pub use ledger::LedgerConfirmation;
pub use ledger::LedgerOutcome;
pub use ledger::LedgerReceipt;
pub use ledger::LedgerRecord;
pub use ledger::LedgerStats;
pub use ledger::LedgerStatus;
pub use ledger::LedgerTxState;
pub use ledger::LedgerWriteRequest;
pub use ledger::SkipReason;
pub use session::IndicatorCount;
pub use session::SessionEntry;
pub use session::SessionMetadata;
pub use session::SessionRecord;
pub use session::TOP_INDICATOR_LIMIT;
pub use session::VerdictStats;
pub use session::VerdictStatsBuilder;
pub use signal::Signal;
pub use signal::SignalError;
pub use signal::SignalFailure;
pub use signal::SignalSource;
pub use signal::SignalStatus;
pub use time::Timestamp;
pub use verdict::RiskLevel;
pub use verdict::UnusableSignal;
pub use verdict::Verdict;
pub use verdict::WeightedSignal;
