// crates/trustx-ledger/src/lib.rs
// ============================================================================
// Module: TrustX Ledger
// Description: Ledger clients, the write outbox, and the reconciler task.
// Purpose: Record high-risk verdict digests on an append-only ledger.
// Dependencies: trustx-core, reqwest, tokio
// ============================================================================

//! ## Overview
//! The ledger gate in `trustx-core` decides which verdicts are recorded. This
//! crate supplies the pieces that actually move the writes: a
//! [`ChannelOutbox`] the gate enqueues into, a [`LedgerReconciler`] task that
//! drains it, and two [`trustx_core::LedgerClient`] implementations: an
//! in-process [`SimulatedLedger`] and an [`HttpLedgerClient`] for an external
//! append service.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod http;
pub mod outbox;
pub mod reconciler;
pub mod simulated;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use http::HttpLedgerClient;
pub use http::HttpLedgerConfig;
pub use http::IDEMPOTENCY_HEADER;
pub use outbox::ChannelOutbox;
pub use outbox::DEFAULT_OUTBOX_CAPACITY;
pub use reconciler::Clock;
pub use reconciler::LedgerEvent;
pub use reconciler::LedgerObserver;
pub use reconciler::LedgerReconciler;
pub use reconciler::NoopLedgerObserver;
pub use reconciler::ReconcilerSettings;
pub use reconciler::system_clock;
pub use reconciler::system_now;
pub use simulated::SimulatedLedger;
pub use simulated::SimulatedLedgerConfig;
pub use simulated::simulated_ref;
