// crates/trustx-core/src/core/verdict.rs
// ============================================================================
// Module: TrustX Verdicts
// Description: Aggregated risk outcome for one analysis request.
// Purpose: Define the single canonical verdict shape shared by every analysis surface.
// Dependencies: serde, crate::core::{hashing, identifiers, input, signal, time}
// ============================================================================

//! ## Overview
//! A [`Verdict`] is produced only by the aggregation engine. Its score is a
//! pure function of the contributing signals; the request id and creation
//! time are supplied by the host and are the only fields that differ between
//! two verdicts over the same signals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::Fingerprint;
use crate::core::identifiers::RequestId;
use crate::core::input::InputKind;
use crate::core::signal::Signal;
use crate::core::signal::SignalSource;
use crate::core::signal::SignalStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Risk Level
// ============================================================================

/// Discrete risk band derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Score below the medium threshold.
    Low,
    /// Score between the medium and high thresholds.
    Medium,
    /// Score above the high threshold.
    High,
}

impl RiskLevel {
    /// All levels in ascending order.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Returns the stable label for the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Parses a stable label back into a level.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == label)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Signal Views
// ============================================================================

/// A usable signal together with its renormalized weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedSignal {
    /// The contributing signal.
    pub signal: Signal,
    /// Weight applied after renormalizing over usable signals.
    pub weight: f64,
}

/// Summary of a signal excluded from aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusableSignal {
    /// Source category.
    pub source: SignalSource,
    /// Failure status.
    pub status: SignalStatus,
    /// Failure reason, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Aggregated outcome for one request.
///
/// # Invariants
/// - `risk_score` lies in `[0, 1]` and `risk_level` is derived from it.
/// - `indicators` and `recommendations` contain no duplicates.
/// - `degraded` is true iff `unusable_signals` is non-empty or no signal was usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Request identifier.
    pub request_id: RequestId,
    /// Content fingerprint of the normalized input.
    pub input_fingerprint: Fingerprint,
    /// Kind of input analyzed.
    pub input_kind: InputKind,
    /// Aggregated risk score.
    pub risk_score: f64,
    /// Risk band.
    pub risk_level: RiskLevel,
    /// Ordered, deduplicated indicators.
    pub indicators: Vec<String>,
    /// Ordered, deduplicated recommendations.
    pub recommendations: Vec<String>,
    /// Signals used for the score.
    pub contributing_signals: Vec<WeightedSignal>,
    /// Signals excluded from the score.
    pub unusable_signals: Vec<UnusableSignal>,
    /// True when any signal was missing or failed.
    pub degraded: bool,
    /// Host-supplied creation time.
    pub created_at: Timestamp,
}

/// Fields covered by the verdict content digest.
#[derive(Serialize)]
struct DigestMaterial<'a> {
    /// Input fingerprint.
    fingerprint: &'a Fingerprint,
    /// Risk level.
    risk_level: RiskLevel,
    /// Risk score.
    risk_score: f64,
    /// Indicators.
    indicators: &'a [String],
}

impl Verdict {
    /// Computes the content digest recorded on the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn content_digest(&self) -> Result<HashDigest, HashError> {
        hash_canonical_json(
            DEFAULT_HASH_ALGORITHM,
            &DigestMaterial {
                fingerprint: &self.input_fingerprint,
                risk_level: self.risk_level,
                risk_score: self.risk_score,
                indicators: &self.indicators,
            },
        )
    }

    /// Returns the first contributing signal from `source`, if any.
    #[must_use]
    pub fn signal_from(&self, source: SignalSource) -> Option<&Signal> {
        self.contributing_signals
            .iter()
            .map(|weighted| &weighted.signal)
            .find(|signal| signal.source() == source)
    }
}
