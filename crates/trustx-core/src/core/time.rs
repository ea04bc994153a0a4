// crates/trustx-core/src/core/time.rs
// ============================================================================
// Module: TrustX Time Model
// Description: Canonical timestamp representation for verdicts and ledger records.
// Purpose: Keep the core deterministic by accepting time from callers.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The core never reads wall-clock time. Hosts stamp verdicts and drive the
//! ledger retry schedule by passing [`Timestamp`] values explicitly, which
//! keeps aggregation and retry behavior replayable in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix epoch milliseconds supplied by the host.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - Monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub const fn as_unix_millis(&self) -> i64 {
        self.0
    }

    /// Returns a timestamp advanced by `millis`, saturating at the bounds.
    #[must_use]
    pub fn saturating_add_millis(&self, millis: u64) -> Self {
        let delta = i64::try_from(millis).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(delta))
    }

    /// Returns the milliseconds elapsed since `earlier`, or zero when `earlier` is later.
    #[must_use]
    pub fn millis_since(&self, earlier: Self) -> u64 {
        u64::try_from(self.0.saturating_sub(earlier.0)).unwrap_or(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
