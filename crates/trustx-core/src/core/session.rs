// crates/trustx-core/src/core/session.rs
// ============================================================================
// Module: TrustX Sessions
// Description: Session records, ordered verdict references, and verdict statistics.
// Purpose: Define what the session store persists and reports.
// Dependencies: serde, crate::core::{identifiers, input, time, verdict}
// ============================================================================

//! ## Overview
//! Sessions reference verdicts by request id and never mutate them. Entries
//! are ordered by a sequence number reserved at ingress, so completion order
//! does not affect read order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RequestId;
use crate::core::identifiers::SessionId;
use crate::core::input::InputKind;
use crate::core::time::Timestamp;
use crate::core::verdict::RiskLevel;
use crate::core::verdict::Verdict;

// ============================================================================
// SECTION: Session Types
// ============================================================================

/// Optional descriptive metadata attached at session creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Free-form label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Client tag (app, web, api).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

/// One verdict reference inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// Ingress sequence number.
    pub sequence: u64,
    /// Referenced verdict.
    pub request_id: RequestId,
}

/// Session with its ordered verdict references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier.
    pub session_id: SessionId,
    /// Creation metadata.
    pub metadata: SessionMetadata,
    /// Creation time.
    pub created_at: Timestamp,
    /// Entries ordered by ascending sequence.
    pub entries: Vec<SessionEntry>,
}

// ============================================================================
// SECTION: Verdict Statistics
// ============================================================================

/// Number of top indicators reported in statistics.
pub const TOP_INDICATOR_LIMIT: usize = 10;

/// Indicator frequency entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorCount {
    /// Indicator text.
    pub indicator: String,
    /// Occurrences among high-risk verdicts.
    pub count: u64,
}

/// Aggregate counts over stored verdicts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictStats {
    /// Total verdicts.
    pub total: u64,
    /// Degraded verdicts.
    pub degraded: u64,
    /// Counts keyed by risk level label.
    pub by_level: BTreeMap<String, u64>,
    /// Counts keyed by input kind label.
    pub by_kind: BTreeMap<String, u64>,
    /// Most frequent indicators among high-risk verdicts.
    pub top_high_risk_indicators: Vec<IndicatorCount>,
}

/// Incremental accumulator for [`VerdictStats`].
#[derive(Debug, Default)]
pub struct VerdictStatsBuilder {
    /// Counts accumulated so far.
    stats: VerdictStats,
    /// Indicator counts among high-risk verdicts.
    high_indicators: BTreeMap<String, u64>,
}

impl VerdictStatsBuilder {
    /// Creates an empty accumulator with every level and kind present.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self::default();
        for level in RiskLevel::ALL {
            builder.stats.by_level.insert(level.as_str().to_string(), 0);
        }
        builder
    }

    /// Counts one verdict.
    pub fn record(&mut self, verdict: &Verdict) {
        self.record_group(verdict.risk_level, verdict.input_kind, verdict.degraded, 1);
        if verdict.risk_level == RiskLevel::High {
            for indicator in &verdict.indicators {
                self.record_high_indicator(indicator, 1);
            }
        }
    }

    /// Counts `count` verdicts sharing one level, kind, and degraded flag.
    pub fn record_group(&mut self, level: RiskLevel, kind: InputKind, degraded: bool, count: u64) {
        self.stats.total += count;
        if degraded {
            self.stats.degraded += count;
        }
        *self.stats.by_level.entry(level.as_str().to_string()).or_insert(0) += count;
        *self.stats.by_kind.entry(kind.as_str().to_string()).or_insert(0) += count;
    }

    /// Counts `count` occurrences of an indicator on high-risk verdicts.
    pub fn record_high_indicator(&mut self, indicator: &str, count: u64) {
        *self.high_indicators.entry(indicator.to_string()).or_insert(0) += count;
    }

    /// Finalizes the statistics.
    #[must_use]
    pub fn finish(mut self) -> VerdictStats {
        let mut top: Vec<IndicatorCount> = self
            .high_indicators
            .into_iter()
            .map(|(indicator, count)| IndicatorCount {
                indicator,
                count,
            })
            .collect();
        // BTreeMap iteration already sorted names; stable sort keeps them as the tiebreak.
        top.sort_by(|left, right| right.count.cmp(&left.count));
        top.truncate(TOP_INDICATOR_LIMIT);
        self.stats.top_high_risk_indicators = top;
        self.stats
    }
}
