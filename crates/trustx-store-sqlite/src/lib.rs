// crates/trustx-store-sqlite/src/lib.rs
// ============================================================================
// Module: TrustX SQLite Store
// Description: SQLite-backed session, verdict, and ledger record storage.
// Purpose: Durable implementations of the core store interfaces.
// Dependencies: trustx-core, rusqlite
// ============================================================================

//! ## Overview
//! [`SqliteStore`] implements both [`trustx_core::SessionStore`] and
//! [`trustx_core::LedgerStore`] over a single database file.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_PAYLOAD_BYTES;
pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
