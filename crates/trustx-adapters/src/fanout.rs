// crates/trustx-adapters/src/fanout.rs
// ============================================================================
// Module: Signal Fan-Out
// Description: Concurrent adapter execution under a request deadline.
// Purpose: Produce exactly one signal per applicable adapter, on time.
// Dependencies: tokio, trustx-core, crate::registry
// ============================================================================

//! ## Overview
//! Every applicable adapter runs on the blocking pool at the same time. Each
//! is awaited until the earlier of its own budget and the request deadline;
//! late adapters yield `TIMEOUT`, panics yield `ERROR`, and upstream outages
//! yield `UNAVAILABLE`. A timed-out adapter is abandoned, not cancelled; its
//! result is discarded when it eventually finishes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::task::JoinHandle;
use trustx_core::AdapterError;
use trustx_core::AdapterReport;
use trustx_core::NormalizedInput;
use trustx_core::Signal;
use trustx_core::SignalFailure;
use trustx_core::SignalSource;

use crate::registry::AdapterRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default request deadline.
pub const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: Fan-Out
// ============================================================================

/// Result of one adapter run on the blocking pool.
type AdapterRun = (Result<AdapterReport, AdapterError>, u64);

/// Concurrent adapter executor.
#[derive(Clone)]
pub struct SignalFanout {
    /// Adapters to run.
    registry: Arc<AdapterRegistry>,
    /// Overall request deadline.
    deadline: Duration,
}

impl SignalFanout {
    /// Creates a fan-out over `registry` bounded by `deadline`.
    #[must_use]
    pub const fn new(registry: Arc<AdapterRegistry>, deadline: Duration) -> Self {
        Self {
            registry,
            deadline,
        }
    }

    /// Returns the adapter registry.
    #[must_use]
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Returns the request deadline.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Runs every applicable adapter and returns their signals in source order.
    pub async fn collect(&self, input: Arc<NormalizedInput>) -> Vec<Signal> {
        let started = tokio::time::Instant::now();
        let request_deadline = started + self.deadline;

        let runs: Vec<(SignalSource, Duration, JoinHandle<AdapterRun>)> = self
            .registry
            .for_kind(input.kind())
            .into_iter()
            .map(|slot| {
                let input = Arc::clone(&input);
                let adapter = Arc::clone(&slot.adapter);
                let handle = tokio::task::spawn_blocking(move || {
                    let clock = Instant::now();
                    let result = adapter.evaluate(&input);
                    (result, elapsed_ms(clock.elapsed()))
                });
                (slot.source, slot.timeout, handle)
            })
            .collect();

        let mut signals = Vec::with_capacity(runs.len());
        for (source, budget, handle) in runs {
            let adapter_deadline = (started + budget).min(request_deadline);
            let signal = match tokio::time::timeout_at(adapter_deadline, handle).await {
                Err(_) => Signal::failed(
                    source,
                    SignalFailure::Timeout,
                    elapsed_ms(adapter_deadline.saturating_duration_since(started)),
                ),
                Ok(Err(join)) => {
                    let reason = if join.is_panic() { "adapter panicked" } else { "adapter cancelled" };
                    Signal::failed(
                        source,
                        SignalFailure::Error(reason.to_string()),
                        elapsed_ms(started.elapsed()),
                    )
                }
                Ok(Ok((result, latency_ms))) => into_signal(source, result, latency_ms),
            };
            signals.push(signal);
        }
        signals
    }
}

/// Converts an adapter result into a signal.
#[must_use]
pub fn into_signal(
    source: SignalSource,
    result: Result<AdapterReport, AdapterError>,
    latency_ms: u64,
) -> Signal {
    match result {
        Ok(report) => match Signal::ok(source, report.score, report.indicators, latency_ms) {
            Ok(signal) => signal.with_details(report.details),
            Err(err) => Signal::failed(source, SignalFailure::Error(err.to_string()), latency_ms),
        },
        Err(AdapterError::Unavailable(reason)) => {
            Signal::failed(source, SignalFailure::Unavailable(reason), latency_ms)
        }
        Err(err) => Signal::failed(source, SignalFailure::Error(err.to_string()), latency_ms),
    }
}

/// Converts a duration to whole milliseconds, saturating.
fn elapsed_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
