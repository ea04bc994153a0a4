// crates/trustx-core/src/lib.rs
// ============================================================================
// Module: TrustX Core Library
// Description: Public API surface for the TrustX risk engine core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! TrustX core combines heterogeneous fraud signals into a single deterministic
//! risk verdict and governs which verdicts are recorded on an append-only
//! ledger. It performs no network or disk I/O; adapters, ledger clients, and
//! durable stores integrate through the traits in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::AdapterError;
pub use interfaces::AdapterReport;
pub use interfaces::LedgerClient;
pub use interfaces::LedgerClientError;
pub use interfaces::LedgerOutbox;
pub use interfaces::LedgerStore;
pub use interfaces::OutboxError;
pub use interfaces::SessionStore;
pub use interfaces::SignalAdapter;
pub use interfaces::StoreError;
pub use runtime::AggregationEngine;
pub use runtime::AggregationPolicy;
pub use runtime::INSUFFICIENT_DATA;
pub use runtime::InMemoryLedgerStore;
pub use runtime::InMemorySessionStore;
pub use runtime::LedgerGate;
pub use runtime::LedgerGateError;
pub use runtime::LedgerPolicy;
pub use runtime::PolicyError;
pub use runtime::RecommendationTable;
pub use runtime::RiskThresholds;
pub use runtime::SharedLedgerStore;
pub use runtime::SharedSessionStore;
pub use runtime::SourceWeights;
pub use runtime::VerdictContext;
