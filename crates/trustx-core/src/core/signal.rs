// crates/trustx-core/src/core/signal.rs
// ============================================================================
// Module: TrustX Signals
// Description: Normalized output of one signal source adapter for one request.
// Purpose: Give the aggregation engine a uniform, invariant-checked input.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`Signal`] is immutable once produced. Its score is present exactly when
//! the status is [`SignalStatus::Ok`], and always lies in `[0, 1]`. The
//! constructors enforce this and deserialization re-checks it, so every
//! signal the engine sees is well formed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Sources and Status
// ============================================================================

/// Signal source categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalSource {
    /// Text pattern matcher.
    TextPattern,
    /// URL reputation checks.
    UrlReputation,
    /// Advisor registry verification.
    Registry,
    /// Image or QR decoding and scoring.
    ImageQr,
    /// Announcement analysis.
    AnnouncementNlp,
}

impl SignalSource {
    /// All sources in canonical order.
    pub const ALL: [Self; 5] = [
        Self::TextPattern,
        Self::UrlReputation,
        Self::Registry,
        Self::ImageQr,
        Self::AnnouncementNlp,
    ];

    /// Returns the stable label for the source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TextPattern => "TEXT_PATTERN",
            Self::UrlReputation => "URL_REPUTATION",
            Self::Registry => "REGISTRY",
            Self::ImageQr => "IMAGE_QR",
            Self::AnnouncementNlp => "ANNOUNCEMENT_NLP",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion status of one adapter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    /// The adapter produced a score.
    Ok,
    /// The adapter did not finish before its deadline.
    Timeout,
    /// The adapter faulted.
    Error,
    /// The adapter's upstream is not configured or not reachable.
    Unavailable,
}

impl SignalStatus {
    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Timeout => "TIMEOUT",
            Self::Error => "ERROR",
            Self::Unavailable => "UNAVAILABLE",
        }
    }
}

/// Reason a signal carries no score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalFailure {
    /// Deadline elapsed.
    Timeout,
    /// Adapter fault with a short reason.
    Error(String),
    /// Upstream unavailable with a short reason.
    Unavailable(String),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Signal invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// Score outside `[0, 1]` or not finite.
    #[error("signal score out of range: {0}")]
    ScoreOutOfRange(String),
    /// Score present on a failed signal, or missing on an OK signal.
    #[error("signal score presence does not match status {0:?}")]
    ScoreStatusMismatch(SignalStatus),
}

// ============================================================================
// SECTION: Signal
// ============================================================================

/// Output of one adapter for one request.
///
/// # Invariants
/// - `score` is `Some` iff `status == Ok`, and lies in `[0, 1]`.
/// - `details` are informational and never influence scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SignalWire")]
pub struct Signal {
    /// Source category.
    source: SignalSource,
    /// Completion status.
    status: SignalStatus,
    /// Risk score, present only when OK.
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    /// Ordered short findings.
    indicators: Vec<String>,
    /// Adapter-specific observations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    details: BTreeMap<String, String>,
    /// Measured adapter latency.
    latency_ms: u64,
    /// Failure reason when not OK.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Signal {
    /// Creates an OK signal.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::ScoreOutOfRange`] when `score` is not a finite
    /// value in `[0, 1]`.
    pub fn ok(
        source: SignalSource,
        score: f64,
        indicators: Vec<String>,
        latency_ms: u64,
    ) -> Result<Self, SignalError> {
        check_score(score)?;
        Ok(Self {
            source,
            status: SignalStatus::Ok,
            score: Some(score),
            indicators,
            details: BTreeMap::new(),
            latency_ms,
            error: None,
        })
    }

    /// Creates a failed signal carrying no score.
    #[must_use]
    pub fn failed(source: SignalSource, failure: SignalFailure, latency_ms: u64) -> Self {
        let (status, error) = match failure {
            SignalFailure::Timeout => (SignalStatus::Timeout, Some("deadline elapsed".to_string())),
            SignalFailure::Error(reason) => (SignalStatus::Error, Some(reason)),
            SignalFailure::Unavailable(reason) => (SignalStatus::Unavailable, Some(reason)),
        };
        Self {
            source,
            status,
            score: None,
            indicators: Vec::new(),
            details: BTreeMap::new(),
            latency_ms,
            error,
        }
    }

    /// Returns the signal with additional details attached.
    #[must_use]
    pub fn with_details(mut self, details: BTreeMap<String, String>) -> Self {
        self.details.extend(details);
        self
    }

    /// Returns the source category.
    #[must_use]
    pub const fn source(&self) -> SignalSource {
        self.source
    }

    /// Returns the completion status.
    #[must_use]
    pub const fn status(&self) -> SignalStatus {
        self.status
    }

    /// Returns the score when the signal is usable.
    #[must_use]
    pub const fn score(&self) -> Option<f64> {
        self.score
    }

    /// Returns the ordered indicators.
    #[must_use]
    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    /// Returns adapter-specific details.
    #[must_use]
    pub const fn details(&self) -> &BTreeMap<String, String> {
        &self.details
    }

    /// Returns the measured latency in milliseconds.
    #[must_use]
    pub const fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    /// Returns the failure reason, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns true when the signal contributes to aggregation.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.status, SignalStatus::Ok)
    }
}

/// Wire form used to re-validate deserialized signals.
#[derive(Deserialize)]
struct SignalWire {
    /// Source category.
    source: SignalSource,
    /// Completion status.
    status: SignalStatus,
    /// Optional score.
    #[serde(default)]
    score: Option<f64>,
    /// Indicators.
    #[serde(default)]
    indicators: Vec<String>,
    /// Details.
    #[serde(default)]
    details: BTreeMap<String, String>,
    /// Latency.
    #[serde(default)]
    latency_ms: u64,
    /// Failure reason.
    #[serde(default)]
    error: Option<String>,
}

impl TryFrom<SignalWire> for Signal {
    type Error = SignalError;

    fn try_from(wire: SignalWire) -> Result<Self, Self::Error> {
        match (wire.status, wire.score) {
            (SignalStatus::Ok, Some(score)) => check_score(score)?,
            (SignalStatus::Ok, None) | (_, Some(_)) => {
                return Err(SignalError::ScoreStatusMismatch(wire.status));
            }
            (_, None) => {}
        }
        Ok(Self {
            source: wire.source,
            status: wire.status,
            score: wire.score,
            indicators: wire.indicators,
            details: wire.details,
            latency_ms: wire.latency_ms,
            error: wire.error,
        })
    }
}

/// Validates the score range.
fn check_score(score: f64) -> Result<(), SignalError> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(SignalError::ScoreOutOfRange(score.to_string()))
    }
}
