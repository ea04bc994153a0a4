// crates/trustx-core/src/runtime/mod.rs
// ============================================================================
// Module: TrustX Runtime
// Description: Aggregation engine, ledger gate, and in-memory stores.
// Purpose: Provide the deterministic decision logic behind every analysis request.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The runtime turns signals into verdicts and verdicts into ledger records.
//! Nothing here performs I/O directly; stores and outboxes are injected.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod aggregation;
pub mod ledger_gate;
pub mod policy;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aggregation::AggregationEngine;
pub use aggregation::INSUFFICIENT_DATA;
pub use aggregation::VerdictContext;
pub use ledger_gate::LedgerGate;
pub use ledger_gate::LedgerGateError;
pub use ledger_gate::LedgerPolicy;
pub use policy::AggregationPolicy;
pub use policy::PolicyError;
pub use policy::RecommendationTable;
pub use policy::RiskThresholds;
pub use policy::SourceWeights;
pub use store::InMemoryLedgerStore;
pub use store::InMemorySessionStore;
pub use store::SharedLedgerStore;
pub use store::SharedSessionStore;
