// crates/trustx-core/src/runtime/store.rs
// ============================================================================
// Module: TrustX In-Memory Stores
// Description: In-memory session and ledger record stores plus shared wrappers.
// Purpose: Provide deterministic store implementations without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Each store keeps all state behind one mutex, so every trait call is a
//! single transaction: an append updates the session entries, the verdict
//! table, and the fingerprint index together, and a ledger update's
//! read-modify-write cannot interleave with another update.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::Fingerprint;
use crate::core::IdempotencyKey;
use crate::core::LedgerRecord;
use crate::core::LedgerRef;
use crate::core::LedgerStats;
use crate::core::LedgerStatus;
use crate::core::RequestId;
use crate::core::SessionEntry;
use crate::core::SessionId;
use crate::core::SessionMetadata;
use crate::core::SessionRecord;
use crate::core::Timestamp;
use crate::core::Verdict;
use crate::core::VerdictStats;
use crate::core::VerdictStatsBuilder;
use crate::interfaces::LedgerRecordUpdate;
use crate::interfaces::LedgerStore;
use crate::interfaces::SessionStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Session Store
// ============================================================================

/// Session plus its next free sequence number.
#[derive(Debug, Clone)]
struct SessionSlot {
    /// Session record with entries sorted by sequence.
    record: SessionRecord,
    /// Next sequence handed out by `reserve_sequence`.
    next_sequence: u64,
}

/// All session store state guarded by one mutex.
#[derive(Debug, Default)]
struct SessionState {
    /// Sessions by id.
    sessions: BTreeMap<SessionId, SessionSlot>,
    /// Verdicts by request id.
    verdicts: BTreeMap<RequestId, Verdict>,
    /// Request ids in append order.
    arrival: Vec<RequestId>,
    /// Latest appended verdict per fingerprint.
    fingerprint_index: BTreeMap<Fingerprint, RequestId>,
}

/// In-memory session store for tests and single-process deployments.
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<SessionState>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the store state.
    fn lock(&self) -> Result<MutexGuard<'_, SessionState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("session store mutex poisoned".to_string()))
    }
}

/// Creates a fresh session slot.
fn new_slot(session_id: &SessionId, metadata: &SessionMetadata, created_at: Timestamp) -> SessionSlot {
    SessionSlot {
        record: SessionRecord {
            session_id: session_id.clone(),
            metadata: metadata.clone(),
            created_at,
            entries: Vec::new(),
        },
        next_sequence: 1,
    }
}

impl SessionStore for InMemorySessionStore {
    fn create_session(
        &self,
        session_id: &SessionId,
        metadata: &SessionMetadata,
        created_at: Timestamp,
    ) -> Result<SessionRecord, StoreError> {
        let mut guard = self.lock()?;
        if guard.sessions.contains_key(session_id) {
            return Err(StoreError::Conflict(format!("session {session_id} already exists")));
        }
        let slot = new_slot(session_id, metadata, created_at);
        let record = slot.record.clone();
        guard.sessions.insert(session_id.clone(), slot);
        Ok(record)
    }

    fn ensure_session(
        &self,
        session_id: &SessionId,
        created_at: Timestamp,
    ) -> Result<SessionRecord, StoreError> {
        let mut guard = self.lock()?;
        let slot = guard
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| new_slot(session_id, &SessionMetadata::default(), created_at));
        Ok(slot.record.clone())
    }

    fn reserve_sequence(&self, session_id: &SessionId) -> Result<u64, StoreError> {
        let mut guard = self.lock()?;
        let slot = guard
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
        let sequence = slot.next_sequence;
        slot.next_sequence += 1;
        Ok(sequence)
    }

    fn append(
        &self,
        session_id: &SessionId,
        sequence: u64,
        verdict: &Verdict,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        if state.verdicts.contains_key(&verdict.request_id) {
            return Err(StoreError::Conflict(format!("verdict {} already stored", verdict.request_id)));
        }
        let slot = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
        if sequence == 0 || sequence >= slot.next_sequence {
            return Err(StoreError::Invalid(format!("sequence {sequence} was not reserved")));
        }
        let position = match slot.record.entries.binary_search_by_key(&sequence, |entry| entry.sequence) {
            Ok(_) => return Err(StoreError::Conflict(format!("sequence {sequence} already used"))),
            Err(position) => position,
        };
        slot.record.entries.insert(
            position,
            SessionEntry {
                sequence,
                request_id: verdict.request_id.clone(),
            },
        );
        state.verdicts.insert(verdict.request_id.clone(), verdict.clone());
        state.arrival.push(verdict.request_id.clone());
        state.fingerprint_index.insert(verdict.input_fingerprint.clone(), verdict.request_id.clone());
        Ok(())
    }

    fn session(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.sessions.get(session_id).map(|slot| slot.record.clone()))
    }

    fn session_verdicts(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Vec<Verdict>>, StoreError> {
        let guard = self.lock()?;
        let Some(slot) = guard.sessions.get(session_id) else {
            return Ok(None);
        };
        let verdicts = slot
            .record
            .entries
            .iter()
            .filter_map(|entry| guard.verdicts.get(&entry.request_id).cloned())
            .collect();
        Ok(Some(verdicts))
    }

    fn verdict(&self, request_id: &RequestId) -> Result<Option<Verdict>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.verdicts.get(request_id).cloned())
    }

    fn latest_for_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Verdict>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .fingerprint_index
            .get(fingerprint)
            .and_then(|request_id| guard.verdicts.get(request_id))
            .cloned())
    }

    fn history(
        &self,
        session_id: Option<&SessionId>,
        limit: usize,
    ) -> Result<Vec<Verdict>, StoreError> {
        let guard = self.lock()?;
        let ids: Vec<&RequestId> = match session_id {
            Some(session_id) => match guard.sessions.get(session_id) {
                Some(slot) => slot.record.entries.iter().rev().map(|entry| &entry.request_id).collect(),
                None => Vec::new(),
            },
            None => guard.arrival.iter().rev().collect(),
        };
        Ok(ids
            .into_iter()
            .filter_map(|request_id| guard.verdicts.get(request_id).cloned())
            .take(limit)
            .collect())
    }

    fn stats(&self) -> Result<VerdictStats, StoreError> {
        let guard = self.lock()?;
        let mut builder = VerdictStatsBuilder::new();
        for verdict in guard.verdicts.values() {
            builder.record(verdict);
        }
        Ok(builder.finish())
    }
}

// ============================================================================
// SECTION: In-Memory Ledger Store
// ============================================================================

/// In-memory ledger record store for tests and single-process deployments.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedgerStore {
    /// Records keyed by idempotency key.
    records: Arc<Mutex<BTreeMap<IdempotencyKey, LedgerRecord>>>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the record map.
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<IdempotencyKey, LedgerRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Store("ledger store mutex poisoned".to_string()))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load(&self, key: &IdempotencyKey) -> Result<Option<LedgerRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.get(key).cloned())
    }

    fn update(
        &self,
        key: &IdempotencyKey,
        update: &mut LedgerRecordUpdate<'_>,
    ) -> Result<Option<LedgerRecord>, StoreError> {
        let mut guard = self.lock()?;
        match update(guard.get(key)) {
            Some(next) => {
                if &next.idempotency_key != key {
                    return Err(StoreError::Invalid("ledger record key mismatch".to_string()));
                }
                guard.insert(key.clone(), next.clone());
                Ok(Some(next))
            }
            None => Ok(guard.get(key).cloned()),
        }
    }

    fn find_by_ref(&self, ledger_ref: &LedgerRef) -> Result<Option<LedgerRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.values().find(|record| record.ledger_ref.as_ref() == Some(ledger_ref)).cloned())
    }

    fn list_by_status(
        &self,
        status: LedgerStatus,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>, StoreError> {
        let guard = self.lock()?;
        let mut records: Vec<LedgerRecord> =
            guard.values().filter(|record| record.status == status).cloned().collect();
        records.sort_by_key(|record| record.updated_at);
        records.truncate(limit);
        Ok(records)
    }

    fn stats(&self) -> Result<LedgerStats, StoreError> {
        let guard = self.lock()?;
        let mut stats = LedgerStats::default();
        for record in guard.values() {
            stats.record(record.status);
        }
        Ok(stats)
    }
}

// ============================================================================
// SECTION: Shared Store Wrappers
// ============================================================================

/// Shared session store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedSessionStore {
    /// Inner store implementation.
    inner: Arc<dyn SessionStore + Send + Sync>,
}

impl SharedSessionStore {
    /// Wraps a session store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl SessionStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn SessionStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl SessionStore for SharedSessionStore {
    fn create_session(
        &self,
        session_id: &SessionId,
        metadata: &SessionMetadata,
        created_at: Timestamp,
    ) -> Result<SessionRecord, StoreError> {
        self.inner.create_session(session_id, metadata, created_at)
    }

    fn ensure_session(
        &self,
        session_id: &SessionId,
        created_at: Timestamp,
    ) -> Result<SessionRecord, StoreError> {
        self.inner.ensure_session(session_id, created_at)
    }

    fn reserve_sequence(&self, session_id: &SessionId) -> Result<u64, StoreError> {
        self.inner.reserve_sequence(session_id)
    }

    fn append(
        &self,
        session_id: &SessionId,
        sequence: u64,
        verdict: &Verdict,
    ) -> Result<(), StoreError> {
        self.inner.append(session_id, sequence, verdict)
    }

    fn session(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        self.inner.session(session_id)
    }

    fn session_verdicts(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Vec<Verdict>>, StoreError> {
        self.inner.session_verdicts(session_id)
    }

    fn verdict(&self, request_id: &RequestId) -> Result<Option<Verdict>, StoreError> {
        self.inner.verdict(request_id)
    }

    fn latest_for_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Verdict>, StoreError> {
        self.inner.latest_for_fingerprint(fingerprint)
    }

    fn history(
        &self,
        session_id: Option<&SessionId>,
        limit: usize,
    ) -> Result<Vec<Verdict>, StoreError> {
        self.inner.history(session_id, limit)
    }

    fn stats(&self) -> Result<VerdictStats, StoreError> {
        self.inner.stats()
    }
}

/// Shared ledger record store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedLedgerStore {
    /// Inner store implementation.
    inner: Arc<dyn LedgerStore + Send + Sync>,
}

impl SharedLedgerStore {
    /// Wraps a ledger store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl LedgerStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn LedgerStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl LedgerStore for SharedLedgerStore {
    fn load(&self, key: &IdempotencyKey) -> Result<Option<LedgerRecord>, StoreError> {
        self.inner.load(key)
    }

    fn update(
        &self,
        key: &IdempotencyKey,
        update: &mut LedgerRecordUpdate<'_>,
    ) -> Result<Option<LedgerRecord>, StoreError> {
        self.inner.update(key, update)
    }

    fn find_by_ref(&self, ledger_ref: &LedgerRef) -> Result<Option<LedgerRecord>, StoreError> {
        self.inner.find_by_ref(ledger_ref)
    }

    fn list_by_status(
        &self,
        status: LedgerStatus,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>, StoreError> {
        self.inner.list_by_status(status, limit)
    }

    fn stats(&self) -> Result<LedgerStats, StoreError> {
        self.inner.stats()
    }
}
