// crates/trustx-config/src/lib.rs
// ============================================================================
// Module: TrustX Config Library
// Description: Canonical config model, loading, and validation.
// Purpose: Single source of truth for trustx.toml semantics.
// Dependencies: trustx-core, trustx-adapters, trustx-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `trustx-config` defines the canonical configuration model for the TrustX
//! engine. It loads `trustx.toml` with strict size and path limits, validates
//! every section fail-closed, and exposes the runtime policies (aggregation,
//! ledger retry, store, adapter settings) the server wires together.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
