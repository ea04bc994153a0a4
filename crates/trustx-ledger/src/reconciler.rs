// crates/trustx-ledger/src/reconciler.rs
// ============================================================================
// Module: Ledger Reconciler
// Description: Background task that performs ledger writes and confirmations.
// Purpose: Drive ledger records from pending to confirmed or failed.
// Dependencies: tokio, serde, trustx-core
// ============================================================================

//! ## Overview
//! The reconciler drains the outbox, appends each write through a
//! [`LedgerClient`], and polls in-flight references until the ledger confirms
//! or rejects them. On every tick it also expires pending records past the
//! confirmation window and re-dispatches failed records whose backoff has
//! elapsed. Ledger and store calls run on the blocking pool.
//!
//! Every state change is reported to a [`LedgerObserver`] so hosts can audit
//! ledger activity without the reconciler knowing about log sinks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use trustx_core::IdempotencyKey;
use trustx_core::LedgerClient;
use trustx_core::LedgerClientError;
use trustx_core::LedgerGate;
use trustx_core::LedgerGateError;
use trustx_core::LedgerOutbox;
use trustx_core::LedgerRecord;
use trustx_core::LedgerRef;
use trustx_core::LedgerStatus;
use trustx_core::LedgerStore;
use trustx_core::LedgerTxState;
use trustx_core::LedgerWriteRequest;
use trustx_core::Timestamp;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock source.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Returns the current wall-clock time.
#[must_use]
pub fn system_now() -> Timestamp {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    Timestamp::from_unix_millis(i64::try_from(millis).unwrap_or(i64::MAX))
}

/// Returns a clock backed by [`system_now`].
#[must_use]
pub fn system_clock() -> Clock {
    Arc::new(system_now)
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Ledger activity reported by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// The ledger accepted an append.
    Appended {
        /// Record key.
        idempotency_key: IdempotencyKey,
        /// Returned reference.
        ledger_ref: LedgerRef,
        /// Attempt number.
        attempt: u32,
    },
    /// The record was confirmed.
    Confirmed {
        /// Record key.
        idempotency_key: IdempotencyKey,
        /// Confirmed reference.
        ledger_ref: LedgerRef,
        /// Confirmations observed.
        confirmations: u64,
    },
    /// An attempt failed.
    AttemptFailed {
        /// Record key.
        idempotency_key: IdempotencyKey,
        /// Failure reason.
        reason: String,
        /// Record status after the failure.
        status: LedgerStatus,
        /// Attempts used so far.
        attempts: u32,
    },
    /// A failed record was re-dispatched.
    Retried {
        /// Record key.
        idempotency_key: IdempotencyKey,
        /// New attempt number.
        attempt: u32,
    },
    /// The gate or its store failed.
    GateError {
        /// Error description.
        reason: String,
    },
}

/// Receiver of ledger events.
pub trait LedgerObserver {
    /// Observes one event.
    fn observe(&self, event: &LedgerEvent);
}

/// Observer that discards events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLedgerObserver;

impl LedgerObserver for NoopLedgerObserver {
    fn observe(&self, _event: &LedgerEvent) {}
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Reconciler timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Interval between confirmation and retry passes.
    pub poll_interval: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

// ============================================================================
// SECTION: Reconciler
// ============================================================================

/// Background ledger writer and confirmation poller.
pub struct LedgerReconciler<S, O> {
    /// Gate owning record transitions.
    gate: Arc<LedgerGate<S, O>>,
    /// Ledger client.
    client: Arc<dyn LedgerClient + Send + Sync>,
    /// Event observer.
    observer: Arc<dyn LedgerObserver + Send + Sync>,
    /// Time source.
    clock: Clock,
    /// Timing.
    settings: ReconcilerSettings,
    /// Appended references awaiting confirmation.
    in_flight: BTreeMap<IdempotencyKey, LedgerRef>,
}

impl<S, O> LedgerReconciler<S, O>
where
    S: LedgerStore + Send + Sync + 'static,
    O: LedgerOutbox + Send + Sync + 'static,
{
    /// Creates a reconciler using the system clock and no observer.
    #[must_use]
    pub fn new(
        gate: Arc<LedgerGate<S, O>>,
        client: Arc<dyn LedgerClient + Send + Sync>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            gate,
            client,
            observer: Arc::new(NoopLedgerObserver),
            clock: system_clock(),
            settings,
            in_flight: BTreeMap::new(),
        }
    }

    /// Replaces the observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn LedgerObserver + Send + Sync>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the number of references awaiting confirmation.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Runs until the outbox closes or `shutdown` changes or is dropped.
    pub async fn run(
        mut self,
        mut receiver: Receiver<LedgerWriteRequest>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                request = receiver.recv() => match request {
                    Some(request) => self.handle_write(request).await,
                    None => break,
                },
                _ = interval.tick() => self.tick().await,
            }
        }
    }

    /// Appends one write and polls its reference once.
    pub async fn handle_write(&mut self, request: LedgerWriteRequest) {
        let key = request.idempotency_key.clone();
        let attempt = request.attempt;
        let client = Arc::clone(&self.client);
        let result = tokio::task::spawn_blocking(move || client.append(&request))
            .await
            .unwrap_or_else(|_| Err(LedgerClientError::Transport("ledger append task failed".to_string())));
        match result {
            Ok(receipt) => {
                self.observer.observe(&LedgerEvent::Appended {
                    idempotency_key: key.clone(),
                    ledger_ref: receipt.ledger_ref.clone(),
                    attempt,
                });
                self.in_flight.insert(key.clone(), receipt.ledger_ref.clone());
                self.poll(key, receipt.ledger_ref).await;
            }
            Err(err) => self.fail(key, err.to_string()).await,
        }
    }

    /// Polls in-flight references, expires stale records, and retries due ones.
    pub async fn tick(&mut self) {
        let in_flight: Vec<(IdempotencyKey, LedgerRef)> =
            self.in_flight.iter().map(|(key, ledger_ref)| (key.clone(), ledger_ref.clone())).collect();
        for (key, ledger_ref) in in_flight {
            self.poll(key, ledger_ref).await;
        }

        let now = (self.clock)();
        match self.with_gate(move |gate| gate.expire_pending(now)).await {
            Ok(expired) => {
                for record in expired {
                    self.in_flight.remove(&record.idempotency_key);
                    self.report_failure(&record);
                }
            }
            Err(err) => self.report_gate_error(&err),
        }

        let now = (self.clock)();
        match self.with_gate(move |gate| gate.retry_due(now)).await {
            Ok(reopened) => {
                for record in reopened {
                    if record.status == LedgerStatus::Pending {
                        self.observer.observe(&LedgerEvent::Retried {
                            idempotency_key: record.idempotency_key.clone(),
                            attempt: record.attempts,
                        });
                    } else {
                        self.report_failure(&record);
                    }
                }
            }
            Err(err) => self.report_gate_error(&err),
        }
    }

    /// Polls one reference and applies the outcome.
    async fn poll(&mut self, key: IdempotencyKey, ledger_ref: LedgerRef) {
        let client = Arc::clone(&self.client);
        let polled = ledger_ref.clone();
        let result = tokio::task::spawn_blocking(move || client.status(&polled))
            .await
            .unwrap_or_else(|_| Err(LedgerClientError::Transport("ledger status task failed".to_string())));
        match result {
            Ok(confirmation) => match confirmation.state {
                LedgerTxState::Pending => {}
                LedgerTxState::Confirmed => {
                    self.in_flight.remove(&key);
                    let now = (self.clock)();
                    let confirmed_key = key.clone();
                    let confirmed_ref = ledger_ref.clone();
                    match self
                        .with_gate(move |gate| gate.record_confirmed(&confirmed_key, &confirmed_ref, now))
                        .await
                    {
                        Ok(_) => self.observer.observe(&LedgerEvent::Confirmed {
                            idempotency_key: key,
                            ledger_ref,
                            confirmations: confirmation.confirmations,
                        }),
                        Err(err) => self.report_gate_error(&err),
                    }
                }
                LedgerTxState::Rejected(reason) => {
                    self.in_flight.remove(&key);
                    self.fail(key, format!("ledger rejected entry: {reason}")).await;
                }
            },
            Err(LedgerClientError::NotFound(_)) => {
                self.in_flight.remove(&key);
                self.fail(key, "ledger entry not found".to_string()).await;
            }
            Err(_) => {}
        }
    }

    /// Records a failed attempt.
    async fn fail(&mut self, key: IdempotencyKey, reason: String) {
        let now = (self.clock)();
        match self.with_gate(move |gate| gate.record_failed(&key, &reason, now)).await {
            Ok(record) => self.report_failure(&record),
            Err(err) => self.report_gate_error(&err),
        }
    }

    /// Reports a record that left the pending state without confirmation.
    fn report_failure(&self, record: &LedgerRecord) {
        self.observer.observe(&LedgerEvent::AttemptFailed {
            idempotency_key: record.idempotency_key.clone(),
            reason: record.last_error.clone().unwrap_or_default(),
            status: record.status,
            attempts: record.attempts,
        });
    }

    /// Reports a gate failure.
    fn report_gate_error(&self, err: &LedgerGateError) {
        self.observer.observe(&LedgerEvent::GateError {
            reason: err.to_string(),
        });
    }

    /// Runs a gate operation on the blocking pool.
    async fn with_gate<T, F>(&self, operation: F) -> Result<T, LedgerGateError>
    where
        T: Send + 'static,
        F: FnOnce(&LedgerGate<S, O>) -> Result<T, LedgerGateError> + Send + 'static,
    {
        let gate = Arc::clone(&self.gate);
        tokio::task::spawn_blocking(move || operation(&gate))
            .await
            .unwrap_or_else(|_| Err(LedgerGateError::Store("ledger gate task failed".to_string())))
    }
}
