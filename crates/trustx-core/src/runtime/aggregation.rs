// crates/trustx-core/src/runtime/aggregation.rs
// ============================================================================
// Module: TrustX Aggregation Engine
// Description: Combines one request's signals into a single verdict.
// Purpose: Deterministic weighted aggregation with a defined degraded path.
// Dependencies: crate::core, crate::runtime::policy
// ============================================================================

//! ## Overview
//! The engine is pure: no I/O, no clock, no locks. Usable signals are
//! combined by a weighted average whose weights are renormalized over the
//! usable subset. When nothing is usable the verdict is LOW, degraded, and
//! carries the `insufficient data` indicator.
//!
//! Indicator order is by contributing weight (descending) and then by the
//! order signals were supplied, so equal signal sets always produce
//! byte-identical verdict bodies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::Fingerprint;
use crate::core::InputKind;
use crate::core::RequestId;
use crate::core::RiskLevel;
use crate::core::Signal;
use crate::core::Timestamp;
use crate::core::UnusableSignal;
use crate::core::Verdict;
use crate::core::WeightedSignal;
use crate::runtime::policy::AggregationPolicy;
use crate::runtime::policy::PolicyError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Indicator emitted when no signal was usable.
pub const INSUFFICIENT_DATA: &str = "insufficient data";

// ============================================================================
// SECTION: Verdict Context
// ============================================================================

/// Host-supplied fields stamped onto a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictContext {
    /// Request identifier.
    pub request_id: RequestId,
    /// Input fingerprint.
    pub input_fingerprint: Fingerprint,
    /// Input kind.
    pub input_kind: InputKind,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Aggregation Engine
// ============================================================================

/// Deterministic signal aggregator.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    /// Validated policy.
    policy: AggregationPolicy,
}

impl AggregationEngine {
    /// Creates an engine after validating the policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when the policy is invalid.
    pub fn new(policy: AggregationPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self {
            policy,
        })
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &AggregationPolicy {
        &self.policy
    }

    /// Aggregates signals into a verdict. Never fails.
    #[must_use]
    pub fn aggregate(&self, context: VerdictContext, signals: &[Signal]) -> Verdict {
        let mut usable: Vec<(&Signal, f64, f64)> = Vec::new();
        let mut unusable = Vec::new();
        for signal in signals {
            match signal.score() {
                Some(score) if signal.is_usable() => {
                    usable.push((signal, score, self.policy.weights.weight(signal.source())));
                }
                _ => unusable.push(UnusableSignal {
                    source: signal.source(),
                    status: signal.status(),
                    error: signal.error().map(str::to_string),
                }),
            }
        }

        let total_weight: f64 = usable.iter().map(|(_, _, weight)| *weight).sum();
        if usable.is_empty() || total_weight <= 0.0 {
            return self.insufficient(context, unusable);
        }

        let weighted_sum: f64 = usable.iter().map(|(_, score, weight)| score * weight).sum();
        let risk_score = (weighted_sum / total_weight).clamp(0.0, 1.0);
        let risk_level = self.policy.thresholds.level_for(risk_score);
        let degraded = !unusable.is_empty();

        let mut ranked: Vec<(f64, &String)> = usable
            .iter()
            .flat_map(|(signal, _, weight)| {
                signal.indicators().iter().map(move |indicator| (*weight, indicator))
            })
            .collect();
        // Stable sort: ties keep signal supply order.
        ranked.sort_by(|left, right| right.0.total_cmp(&left.0));
        let indicators = dedup(ranked.into_iter().map(|(_, indicator)| indicator));

        let recommendations =
            self.policy.recommendations.recommend(risk_level, &indicators, degraded);
        let contributing_signals = usable
            .into_iter()
            .map(|(signal, _, weight)| WeightedSignal {
                signal: signal.clone(),
                weight: weight / total_weight,
            })
            .collect();

        Verdict {
            request_id: context.request_id,
            input_fingerprint: context.input_fingerprint,
            input_kind: context.input_kind,
            risk_score,
            risk_level,
            indicators,
            recommendations,
            contributing_signals,
            unusable_signals: unusable,
            degraded,
            created_at: context.created_at,
        }
    }

    /// Builds the verdict for a request with no usable signals.
    fn insufficient(&self, context: VerdictContext, unusable: Vec<UnusableSignal>) -> Verdict {
        let indicators = vec![INSUFFICIENT_DATA.to_string()];
        let recommendations =
            self.policy.recommendations.recommend(RiskLevel::Low, &indicators, true);
        Verdict {
            request_id: context.request_id,
            input_fingerprint: context.input_fingerprint,
            input_kind: context.input_kind,
            risk_score: 0.0,
            risk_level: RiskLevel::Low,
            indicators,
            recommendations,
            contributing_signals: Vec::new(),
            unusable_signals: unusable,
            degraded: true,
            created_at: context.created_at,
        }
    }
}

/// Removes exact duplicates, keeping first occurrences.
fn dedup<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values.filter(|value| seen.insert(value.as_str())).cloned().collect()
}
