// crates/trustx-ledger/src/simulated.rs
// ============================================================================
// Module: Simulated Ledger
// Description: In-process append-only ledger with deterministic references.
// Purpose: Stand in for a blockchain during development and tests.
// Dependencies: trustx-core
// ============================================================================

//! ## Overview
//! References are `0x` + SHA-256 of the idempotency key and content digest,
//! so appending the same write twice yields the same reference. Each status
//! poll adds one confirmation; an entry is final once it reaches the
//! configured depth. Transport failures can be injected for retry testing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use trustx_core::DEFAULT_HASH_ALGORITHM;
use trustx_core::IdempotencyKey;
use trustx_core::LedgerClient;
use trustx_core::LedgerClientError;
use trustx_core::LedgerConfirmation;
use trustx_core::LedgerReceipt;
use trustx_core::LedgerRef;
use trustx_core::LedgerTxState;
use trustx_core::LedgerWriteRequest;
use trustx_core::hash_bytes;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Simulated ledger settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedLedgerConfig {
    /// Confirmations required before an entry is final.
    pub confirmations_required: u64,
}

impl Default for SimulatedLedgerConfig {
    fn default() -> Self {
        Self {
            confirmations_required: 1,
        }
    }
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// One appended entry.
#[derive(Debug, Clone)]
struct SimulatedEntry {
    /// Write that created the entry.
    request: LedgerWriteRequest,
    /// Confirmations observed so far.
    confirmations: u64,
}

/// Entries and the idempotency index.
#[derive(Debug, Default)]
struct SimulatedState {
    /// Entries by reference.
    entries: BTreeMap<LedgerRef, SimulatedEntry>,
    /// References by idempotency key.
    by_key: BTreeMap<IdempotencyKey, LedgerRef>,
}

/// In-process ledger.
#[derive(Debug, Default)]
pub struct SimulatedLedger {
    /// Settings.
    config: SimulatedLedgerConfig,
    /// Ledger state.
    state: Mutex<SimulatedState>,
    /// Remaining appends that fail with a transport error.
    injected_failures: AtomicU32,
}

impl SimulatedLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new(config: SimulatedLedgerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SimulatedState::default()),
            injected_failures: AtomicU32::new(0),
        }
    }

    /// Makes the next `count` appends fail with a transport error.
    pub fn fail_next_appends(&self, count: u32) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Returns the number of distinct entries.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerClientError::Transport`] when the state lock is poisoned.
    pub fn len(&self) -> Result<usize, LedgerClientError> {
        Ok(self.lock()?.entries.len())
    }

    /// Returns true when nothing has been appended.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerClientError::Transport`] when the state lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, LedgerClientError> {
        Ok(self.len()? == 0)
    }

    /// Returns the write recorded under a reference.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerClientError::Transport`] when the state lock is poisoned.
    pub fn entry(&self, ledger_ref: &LedgerRef) -> Result<Option<LedgerWriteRequest>, LedgerClientError> {
        Ok(self.lock()?.entries.get(ledger_ref).map(|entry| entry.request.clone()))
    }

    /// Locks the state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SimulatedState>, LedgerClientError> {
        self.state
            .lock()
            .map_err(|_| LedgerClientError::Transport("simulated ledger mutex poisoned".to_string()))
    }
}

/// Derives the reference for a write.
#[must_use]
pub fn simulated_ref(request: &LedgerWriteRequest) -> LedgerRef {
    let material = format!(
        "{}:{}",
        request.idempotency_key.as_str(),
        request.content_digest.as_hex()
    );
    LedgerRef::new(format!("0x{}", hash_bytes(DEFAULT_HASH_ALGORITHM, material.as_bytes()).as_hex()))
}

impl LedgerClient for SimulatedLedger {
    fn append(&self, request: &LedgerWriteRequest) -> Result<LedgerReceipt, LedgerClientError> {
        let injected = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if injected.is_ok() {
            return Err(LedgerClientError::Transport("simulated transport failure".to_string()));
        }
        let mut state = self.lock()?;
        if let Some(existing) = state.by_key.get(&request.idempotency_key) {
            return Ok(LedgerReceipt {
                ledger_ref: existing.clone(),
            });
        }
        let ledger_ref = simulated_ref(request);
        state.by_key.insert(request.idempotency_key.clone(), ledger_ref.clone());
        state.entries.insert(
            ledger_ref.clone(),
            SimulatedEntry {
                request: request.clone(),
                confirmations: 0,
            },
        );
        Ok(LedgerReceipt {
            ledger_ref,
        })
    }

    fn status(&self, ledger_ref: &LedgerRef) -> Result<LedgerConfirmation, LedgerClientError> {
        let required = self.config.confirmations_required;
        let mut state = self.lock()?;
        let entry = state
            .entries
            .get_mut(ledger_ref)
            .ok_or_else(|| LedgerClientError::NotFound(ledger_ref.to_string()))?;
        entry.confirmations = entry.confirmations.saturating_add(1);
        let state = if entry.confirmations >= required {
            LedgerTxState::Confirmed
        } else {
            LedgerTxState::Pending
        };
        Ok(LedgerConfirmation {
            ledger_ref: ledger_ref.clone(),
            state,
            confirmations: entry.confirmations,
        })
    }
}
