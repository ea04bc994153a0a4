// crates/trustx-core/src/runtime/policy.rs
// ============================================================================
// Module: TrustX Aggregation Policy
// Description: Source weights, risk thresholds, and recommendation tables.
// Purpose: Hold the tunable parameters of aggregation with fail-closed validation.
// Dependencies: serde, thiserror, crate::core
// ============================================================================

//! ## Overview
//! An [`AggregationPolicy`] is validated once when the engine is built.
//! Weights must be positive and sum to one across every source; thresholds
//! must be ordered inside `[0, 1]` so the level mapping stays total and
//! monotonic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::RiskLevel;
use crate::core::SignalSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Tolerance when checking that weights sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Source weights are invalid.
    #[error("invalid source weights: {0}")]
    Weights(String),
    /// Risk thresholds are invalid.
    #[error("invalid risk thresholds: {0}")]
    Thresholds(String),
}

// ============================================================================
// SECTION: Thresholds
// ============================================================================

/// Score boundaries between risk levels.
///
/// # Invariants
/// - `0 <= medium <= high <= 1`.
/// - `score < medium` is LOW, `medium <= score <= high` is MEDIUM, `score > high` is HIGH.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Lowest score classified as MEDIUM.
    pub medium: f64,
    /// Highest score classified as MEDIUM.
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 0.4,
            high: 0.7,
        }
    }
}

impl RiskThresholds {
    /// Maps a score to its risk level.
    #[must_use]
    pub fn level_for(&self, score: f64) -> RiskLevel {
        if score > self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Validates threshold ordering.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Thresholds`] when thresholds are not finite or
    /// not ordered inside `[0, 1]`.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !self.medium.is_finite() || !self.high.is_finite() {
            return Err(PolicyError::Thresholds("thresholds must be finite".to_string()));
        }
        if !(0.0..=1.0).contains(&self.medium) || !(0.0..=1.0).contains(&self.high) {
            return Err(PolicyError::Thresholds("thresholds must lie in [0, 1]".to_string()));
        }
        if self.medium > self.high {
            return Err(PolicyError::Thresholds("medium must not exceed high".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Source Weights
// ============================================================================

/// Fixed per-source weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceWeights(BTreeMap<SignalSource, f64>);

impl Default for SourceWeights {
    fn default() -> Self {
        Self(BTreeMap::from([
            (SignalSource::TextPattern, 0.30),
            (SignalSource::UrlReputation, 0.20),
            (SignalSource::Registry, 0.20),
            (SignalSource::ImageQr, 0.10),
            (SignalSource::AnnouncementNlp, 0.20),
        ]))
    }
}

impl SourceWeights {
    /// Creates weights from explicit values.
    #[must_use]
    pub const fn new(weights: BTreeMap<SignalSource, f64>) -> Self {
        Self(weights)
    }

    /// Returns the weight for a source, or zero when unset.
    #[must_use]
    pub fn weight(&self, source: SignalSource) -> f64 {
        self.0.get(&source).copied().unwrap_or(0.0)
    }

    /// Validates that every source has a positive weight and weights sum to one.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Weights`] when a source is missing, a weight is
    /// not positive, or the sum differs from one.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut sum = 0.0;
        for source in SignalSource::ALL {
            let Some(weight) = self.0.get(&source).copied() else {
                return Err(PolicyError::Weights(format!("missing weight for {source}")));
            };
            if !weight.is_finite() || weight <= 0.0 {
                return Err(PolicyError::Weights(format!("weight for {source} must be positive")));
            }
            sum += weight;
        }
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(PolicyError::Weights(format!("weights sum to {sum}, expected 1")));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Recommendations
// ============================================================================

/// Recommendation lookup by level and by indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationTable {
    /// Recommendations for HIGH verdicts.
    pub high: Vec<String>,
    /// Recommendations for MEDIUM verdicts.
    pub medium: Vec<String>,
    /// Recommendations for LOW verdicts.
    pub low: Vec<String>,
    /// Appended when any signal was unusable.
    pub degraded: Vec<String>,
    /// Indicator-specific recommendations appended after the level table.
    pub by_indicator: BTreeMap<String, Vec<String>>,
}

impl Default for RecommendationTable {
    fn default() -> Self {
        Self {
            high: strings(&[
                "DO NOT INVEST - High fraud risk detected",
                "Report this content to SEBI",
                "Verify advisor registration independently",
                "Consult with verified financial advisors",
            ]),
            medium: strings(&[
                "Exercise caution before investing",
                "Verify all claims independently",
                "Check SEBI registration of advisors",
                "Seek second opinion from certified advisors",
            ]),
            low: strings(&[
                "Low risk detected, but always verify investment opportunities",
                "Ensure advisor is SEBI registered",
                "Read all terms and conditions carefully",
            ]),
            degraded: strings(&["Some checks could not complete; treat this result as partial"]),
            by_indicator: BTreeMap::from([
                (
                    "insufficient data".to_string(),
                    strings(&["Automated checks were unavailable; verify this content independently"]),
                ),
                (
                    "advisor not found in registry".to_string(),
                    strings(&[
                        "DO NOT invest through unregistered advisors",
                        "Ask for the advisor's SEBI registration certificate",
                    ]),
                ),
                (
                    "entity on regulator alert list".to_string(),
                    strings(&["This entity appears on a regulator alert list; do not transact"]),
                ),
                (
                    "unrealistic returns".to_string(),
                    strings(&["Treat promises of unusually high returns as a warning sign"]),
                ),
                (
                    "url shortener".to_string(),
                    strings(&["Expand shortened links before opening them"]),
                ),
                (
                    "crypto wallet address".to_string(),
                    strings(&["Never send funds to wallet addresses shared in unsolicited messages"]),
                ),
            ]),
        }
    }
}

impl RecommendationTable {
    /// Builds the ordered, deduplicated recommendation list for a verdict.
    #[must_use]
    pub fn recommend(&self, level: RiskLevel, indicators: &[String], degraded: bool) -> Vec<String> {
        let base = match level {
            RiskLevel::High => &self.high,
            RiskLevel::Medium => &self.medium,
            RiskLevel::Low => &self.low,
        };
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let by_indicator =
            indicators.iter().filter_map(|indicator| self.by_indicator.get(indicator)).flatten();
        let tail = if degraded { self.degraded.as_slice() } else { &[] };
        for recommendation in base.iter().chain(by_indicator).chain(tail) {
            if seen.insert(recommendation.as_str()) {
                out.push(recommendation.clone());
            }
        }
        out
    }
}

/// Converts string literals to owned strings.
fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

// ============================================================================
// SECTION: Aggregation Policy
// ============================================================================

/// Complete aggregation policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationPolicy {
    /// Per-source weights.
    pub weights: SourceWeights,
    /// Level thresholds.
    pub thresholds: RiskThresholds,
    /// Recommendation tables.
    pub recommendations: RecommendationTable,
}

impl AggregationPolicy {
    /// Validates weights and thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when either is invalid.
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.weights.validate()?;
        self.thresholds.validate()
    }
}
