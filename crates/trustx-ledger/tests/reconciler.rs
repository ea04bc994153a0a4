// crates/trustx-ledger/tests/reconciler.rs
// ============================================================================
// Module: Ledger Reconciler Tests
// Description: End-to-end ledger flows through gate, outbox, and reconciler.
// Purpose: Validate confirmation, retry backoff, exhaustion, and expiry.
// Dependencies: trustx-ledger, trustx-core, tokio
// ============================================================================
//! ## Overview
//! Each test wires a [`LedgerGate`] to a channel outbox and a simulated
//! ledger, then drives the reconciler step by step with a manual clock.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use trustx_core::Fingerprint;
use trustx_core::IdempotencyKey;
use trustx_core::InMemoryLedgerStore;
use trustx_core::LedgerGate;
use trustx_core::LedgerPolicy;
use trustx_core::LedgerStatus;
use trustx_core::LedgerStore;
use trustx_core::LedgerWriteRequest;
use trustx_core::Timestamp;
use trustx_ledger::ChannelOutbox;
use trustx_ledger::LedgerEvent;
use trustx_ledger::LedgerObserver;
use trustx_ledger::LedgerReconciler;
use trustx_ledger::ReconcilerSettings;
use trustx_ledger::SimulatedLedger;
use trustx_ledger::SimulatedLedgerConfig;
use trustx_ledger::simulated_ref;

type Gate = LedgerGate<InMemoryLedgerStore, ChannelOutbox>;

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<LedgerEvent>>,
}

impl RecordingObserver {
    fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| serde_json::to_value(event).unwrap()["event"].as_str().unwrap().to_string())
            .collect()
    }
}

impl LedgerObserver for RecordingObserver {
    fn observe(&self, event: &LedgerEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct Harness {
    gate: Arc<Gate>,
    ledger: Arc<SimulatedLedger>,
    receiver: Receiver<LedgerWriteRequest>,
    clock: Arc<AtomicI64>,
    observer: Arc<RecordingObserver>,
    reconciler: LedgerReconciler<InMemoryLedgerStore, ChannelOutbox>,
}

impl Harness {
    fn new(config: SimulatedLedgerConfig) -> Self {
        let (outbox, receiver) = ChannelOutbox::channel(16);
        let gate = Arc::new(LedgerGate::new(InMemoryLedgerStore::new(), outbox, LedgerPolicy::default()));
        let ledger = Arc::new(SimulatedLedger::new(config));
        let clock = Arc::new(AtomicI64::new(0));
        let observer = Arc::new(RecordingObserver::default());
        let tick = Arc::clone(&clock);
        let reconciler = LedgerReconciler::new(Arc::clone(&gate), ledger.clone(), ReconcilerSettings::default())
            .with_observer(observer.clone())
            .with_clock(Arc::new(move || Timestamp::from_unix_millis(tick.load(Ordering::SeqCst))));
        Self {
            gate,
            ledger,
            receiver,
            clock,
            observer,
            reconciler,
        }
    }

    fn set_time(&self, millis: i64) {
        self.clock.store(millis, Ordering::SeqCst);
    }

    fn status(&self, fingerprint: &str) -> LedgerStatus {
        let key = IdempotencyKey::from_fingerprint(&Fingerprint::new(fingerprint));
        self.gate.store().load(&key).unwrap().unwrap().status
    }

    async fn drain(&mut self) {
        while let Ok(request) = self.receiver.try_recv() {
            self.reconciler.handle_write(request).await;
        }
    }
}

/// Verifies a dispatched write is appended and confirmed with the simulated reference.
#[tokio::test]
async fn write_is_appended_and_confirmed() {
    let mut harness = Harness::new(SimulatedLedgerConfig::default());
    harness.gate.submit(&common::high_verdict("req-1", "fp-confirm"), Timestamp::from_unix_millis(0)).unwrap();
    let request = harness.receiver.try_recv().unwrap();
    let expected = simulated_ref(&request);
    harness.reconciler.handle_write(request).await;

    let record = harness.gate.record_for(&Fingerprint::new("fp-confirm")).unwrap().unwrap();
    assert_eq!(record.status, LedgerStatus::Confirmed);
    assert_eq!(record.ledger_ref, Some(expected));
    assert_eq!(harness.reconciler.in_flight(), 0);
    assert_eq!(harness.observer.names(), vec!["appended", "confirmed"]);
}

/// Verifies confirmations that need several polls complete on later ticks.
#[tokio::test]
async fn deep_confirmation_completes_on_tick() {
    let mut harness = Harness::new(SimulatedLedgerConfig {
        confirmations_required: 3,
    });
    harness.gate.submit(&common::high_verdict("req-2", "fp-deep"), Timestamp::from_unix_millis(0)).unwrap();
    harness.drain().await;
    assert_eq!(harness.status("fp-deep"), LedgerStatus::Pending);
    assert_eq!(harness.reconciler.in_flight(), 1);

    harness.set_time(1_000);
    harness.reconciler.tick().await;
    assert_eq!(harness.status("fp-deep"), LedgerStatus::Pending);
    harness.set_time(2_000);
    harness.reconciler.tick().await;
    assert_eq!(harness.status("fp-deep"), LedgerStatus::Confirmed);
    assert_eq!(harness.reconciler.in_flight(), 0);
}

/// Verifies failed appends back off, retry, and exhaust after three attempts.
#[tokio::test]
async fn failed_appends_retry_then_exhaust() {
    let mut harness = Harness::new(SimulatedLedgerConfig::default());
    harness.ledger.fail_next_appends(3);
    harness.gate.submit(&common::high_verdict("req-3", "fp-flaky"), Timestamp::from_unix_millis(0)).unwrap();
    harness.drain().await;
    assert_eq!(harness.status("fp-flaky"), LedgerStatus::Failed);

    harness.set_time(1_999);
    harness.reconciler.tick().await;
    assert!(harness.receiver.try_recv().is_err());

    harness.set_time(2_000);
    harness.reconciler.tick().await;
    let retry = harness.receiver.try_recv().unwrap();
    assert_eq!(retry.attempt, 2);
    harness.reconciler.handle_write(retry).await;
    assert_eq!(harness.status("fp-flaky"), LedgerStatus::Failed);

    harness.set_time(6_000);
    harness.reconciler.tick().await;
    let last = harness.receiver.try_recv().unwrap();
    assert_eq!(last.attempt, 3);
    harness.reconciler.handle_write(last).await;
    assert_eq!(harness.status("fp-flaky"), LedgerStatus::FailedAfterRetries);

    harness.set_time(1_000_000);
    harness.reconciler.tick().await;
    assert!(harness.receiver.try_recv().is_err());
    assert!(harness.ledger.is_empty().unwrap());
}

/// Verifies a transient failure followed by a successful retry confirms the record.
#[tokio::test]
async fn retry_after_transient_failure_confirms() {
    let mut harness = Harness::new(SimulatedLedgerConfig::default());
    harness.ledger.fail_next_appends(1);
    harness.gate.submit(&common::high_verdict("req-4", "fp-once"), Timestamp::from_unix_millis(0)).unwrap();
    harness.drain().await;
    harness.set_time(2_000);
    harness.reconciler.tick().await;
    harness.drain().await;
    assert_eq!(harness.status("fp-once"), LedgerStatus::Confirmed);
    assert_eq!(harness.observer.names(), vec!["attempt_failed", "retried", "appended", "confirmed"]);
}

/// Verifies pending records past the confirmation window are failed by a tick.
#[tokio::test]
async fn unconfirmed_records_expire() {
    let mut harness = Harness::new(SimulatedLedgerConfig {
        confirmations_required: u64::MAX,
    });
    harness.gate.submit(&common::high_verdict("req-5", "fp-slow"), Timestamp::from_unix_millis(0)).unwrap();
    harness.drain().await;
    assert_eq!(harness.reconciler.in_flight(), 1);

    harness.set_time(60_000);
    harness.reconciler.tick().await;
    let key = IdempotencyKey::from_fingerprint(&Fingerprint::new("fp-slow"));
    let record = harness.gate.store().load(&key).unwrap().unwrap();
    assert_eq!(record.status, LedgerStatus::Failed);
    assert_eq!(record.last_error.as_deref(), Some("confirmation timeout"));
    assert_eq!(harness.reconciler.in_flight(), 0);
}

/// Verifies the run loop drains the outbox and stops on shutdown.
#[tokio::test]
async fn run_loop_processes_writes_until_shutdown() {
    let (outbox, receiver) = ChannelOutbox::channel(4);
    let gate = Arc::new(LedgerGate::new(InMemoryLedgerStore::new(), outbox, LedgerPolicy::default()));
    let ledger = Arc::new(SimulatedLedger::default());
    let reconciler = LedgerReconciler::new(
        Arc::clone(&gate),
        ledger,
        ReconcilerSettings {
            poll_interval: Duration::from_millis(10),
        },
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(reconciler.run(receiver, shutdown_rx));

    gate.submit(&common::high_verdict("req-6", "fp-loop"), Timestamp::from_unix_millis(0)).unwrap();
    let fingerprint = Fingerprint::new("fp-loop");
    let mut confirmed = false;
    for _ in 0 .. 200 {
        if gate.record_for(&fingerprint).unwrap().is_some_and(|record| record.status == LedgerStatus::Confirmed) {
            confirmed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(confirmed);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}
