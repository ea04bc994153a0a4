// crates/trustx-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Session, verdict, and ledger record persistence on SQLite.
// Purpose: Validate ordering, indexes, atomic updates, and integrity checks.
// Dependencies: trustx-store-sqlite, trustx-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Integration tests for the `SQLite` store:
//! - Session ordering by reserved sequence and the fingerprint index
//! - History ordering and limits
//! - Ledger gate flows over the durable record store
//! - Tamper detection and schema version validation

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;
use trustx_core::AggregationEngine;
use trustx_core::AggregationPolicy;
use trustx_core::Fingerprint;
use trustx_core::HashAlgorithm;
use trustx_core::IdempotencyKey;
use trustx_core::InputKind;
use trustx_core::LedgerGate;
use trustx_core::LedgerOutbox;
use trustx_core::LedgerPolicy;
use trustx_core::LedgerRef;
use trustx_core::LedgerStatus;
use trustx_core::LedgerStore;
use trustx_core::LedgerWriteRequest;
use trustx_core::OutboxError;
use trustx_core::RequestId;
use trustx_core::RiskLevel;
use trustx_core::SessionId;
use trustx_core::SessionMetadata;
use trustx_core::SessionStore;
use trustx_core::Signal;
use trustx_core::SignalSource;
use trustx_core::StoreError;
use trustx_core::Timestamp;
use trustx_core::Verdict;
use trustx_core::VerdictContext;
use trustx_core::canonical_json_bytes;
use trustx_core::hash_bytes;
use trustx_store_sqlite::SqliteStore;
use trustx_store_sqlite::SqliteStoreConfig;
use trustx_store_sqlite::SqliteStoreError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open(dir: &TempDir) -> SqliteStore {
    SqliteStore::open(SqliteStoreConfig::new(dir.path().join("trustx.db"))).unwrap()
}

fn at(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn verdict(request_id: &str, fingerprint: &str, score: f64, kind: InputKind) -> Verdict {
    let engine = AggregationEngine::new(AggregationPolicy::default()).unwrap();
    let signal = Signal::ok(
        SignalSource::TextPattern,
        score,
        vec!["unrealistic returns".to_string(), "urgency language".to_string()],
        3,
    )
    .unwrap();
    engine.aggregate(
        VerdictContext {
            request_id: RequestId::new(request_id),
            input_fingerprint: Fingerprint::new(fingerprint),
            input_kind: kind,
            created_at: at(1_000),
        },
        &[signal],
    )
}

fn ids(verdicts: &[Verdict]) -> Vec<&str> {
    verdicts.iter().map(|verdict| verdict.request_id.as_str()).collect()
}

#[derive(Clone, Default)]
struct RecordingOutbox {
    sent: Arc<Mutex<Vec<LedgerWriteRequest>>>,
}

impl LedgerOutbox for RecordingOutbox {
    fn enqueue(&self, request: LedgerWriteRequest) -> Result<(), OutboxError> {
        self.sent.lock().unwrap().push(request);
        Ok(())
    }
}

// ============================================================================
// SECTION: Sessions
// ============================================================================

/// Verifies out-of-order appends read back in reserved sequence order.
#[test]
fn session_reads_follow_reserved_sequence() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let session = SessionId::new("s-1");
    let metadata = SessionMetadata {
        label: Some("demo".to_string()),
        client: Some("web".to_string()),
    };
    store.create_session(&session, &metadata, at(0)).unwrap();
    let first = store.reserve_sequence(&session).unwrap();
    let second = store.reserve_sequence(&session).unwrap();
    assert_eq!((first, second), (1, 2));

    store.append(&session, second, &verdict("req-b", "fp-b", 0.2, InputKind::Text)).unwrap();
    store.append(&session, first, &verdict("req-a", "fp-a", 0.9, InputKind::Url)).unwrap();

    let verdicts = store.session_verdicts(&session).unwrap().unwrap();
    assert_eq!(ids(&verdicts), vec!["req-a", "req-b"]);
    let record = store.session(&session).unwrap().unwrap();
    assert_eq!(record.metadata, metadata);
    assert_eq!(record.entries.iter().map(|entry| entry.sequence).collect::<Vec<_>>(), vec![1, 2]);
    assert!(store.session_verdicts(&SessionId::new("missing")).unwrap().is_none());
}

/// Verifies session creation conflicts and append validation.
#[test]
fn session_writes_are_validated() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let session = SessionId::new("s-2");
    store.create_session(&session, &SessionMetadata::default(), at(0)).unwrap();
    assert!(matches!(
        store.create_session(&session, &SessionMetadata::default(), at(1)),
        Err(StoreError::Conflict(_))
    ));

    let unreserved = store.append(&session, 1, &verdict("req-x", "fp-x", 0.9, InputKind::Text));
    assert!(matches!(unreserved, Err(StoreError::Invalid(_))));

    let sequence = store.reserve_sequence(&session).unwrap();
    store.append(&session, sequence, &verdict("req-x", "fp-x", 0.9, InputKind::Text)).unwrap();
    let again = store.reserve_sequence(&session).unwrap();
    let duplicate = store.append(&session, again, &verdict("req-x", "fp-x", 0.9, InputKind::Text));
    assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
    let reused = store.append(&session, sequence, &verdict("req-y", "fp-y", 0.9, InputKind::Text));
    assert!(matches!(reused, Err(StoreError::Conflict(_))));

    assert!(matches!(
        store.reserve_sequence(&SessionId::new("missing")),
        Err(StoreError::NotFound(_))
    ));
}

/// Verifies ensure_session creates once and then returns the existing record.
#[test]
fn ensure_session_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let session = SessionId::new("s-ensure");
    let created = store.ensure_session(&session, at(5)).unwrap();
    let existing = store.ensure_session(&session, at(99)).unwrap();
    assert_eq!(created.created_at, at(5));
    assert_eq!(existing.created_at, at(5));
    assert_eq!(existing.metadata, SessionMetadata::default());
}

/// Verifies the fingerprint index tracks the latest appended verdict.
#[test]
fn fingerprint_index_tracks_latest_append() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let session = SessionId::new("s-fp");
    store.ensure_session(&session, at(0)).unwrap();
    for request in ["req-1", "req-2"] {
        let sequence = store.reserve_sequence(&session).unwrap();
        store.append(&session, sequence, &verdict(request, "fp-shared", 0.9, InputKind::Text)).unwrap();
    }
    let latest = store.latest_for_fingerprint(&Fingerprint::new("fp-shared")).unwrap().unwrap();
    assert_eq!(latest.request_id.as_str(), "req-2");
    assert!(store.latest_for_fingerprint(&Fingerprint::new("fp-none")).unwrap().is_none());
    assert_eq!(store.verdict(&RequestId::new("req-1")).unwrap().unwrap().request_id.as_str(), "req-1");
}

/// Verifies history is newest first, scoped by session, and limited.
#[test]
fn history_is_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let left = SessionId::new("s-left");
    let right = SessionId::new("s-right");
    store.ensure_session(&left, at(0)).unwrap();
    store.ensure_session(&right, at(0)).unwrap();
    for (session, request) in [(&left, "req-1"), (&right, "req-2"), (&left, "req-3")] {
        let sequence = store.reserve_sequence(session).unwrap();
        store.append(session, sequence, &verdict(request, request, 0.5, InputKind::Text)).unwrap();
    }
    assert_eq!(ids(&store.history(None, 10).unwrap()), vec!["req-3", "req-2", "req-1"]);
    assert_eq!(ids(&store.history(None, 2).unwrap()), vec!["req-3", "req-2"]);
    assert_eq!(ids(&store.history(Some(&left), 10).unwrap()), vec!["req-3", "req-1"]);
    assert!(store.history(Some(&SessionId::new("missing")), 10).unwrap().is_empty());
}

/// Verifies verdict statistics count levels, kinds, and high-risk indicators.
#[test]
fn verdict_stats_are_aggregated() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let session = SessionId::new("s-stats");
    store.ensure_session(&session, at(0)).unwrap();
    let samples = [
        ("req-1", 0.9, InputKind::Text),
        ("req-2", 0.95, InputKind::Url),
        ("req-3", 0.1, InputKind::Text),
    ];
    for (request, score, kind) in samples {
        let sequence = store.reserve_sequence(&session).unwrap();
        store.append(&session, sequence, &verdict(request, request, score, kind)).unwrap();
    }
    let engine = AggregationEngine::new(AggregationPolicy::default()).unwrap();
    let unscored = engine.aggregate(
        VerdictContext {
            request_id: RequestId::new("req-4"),
            input_fingerprint: Fingerprint::new("req-4"),
            input_kind: InputKind::Advisor,
            created_at: at(1_000),
        },
        &[],
    );
    let sequence = store.reserve_sequence(&session).unwrap();
    store.append(&session, sequence, &unscored).unwrap();

    let stats = SessionStore::stats(&store).unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.degraded, 1);
    assert_eq!(stats.by_level.get(RiskLevel::High.as_str()), Some(&2));
    assert_eq!(stats.by_level.get(RiskLevel::Low.as_str()), Some(&2));
    assert_eq!(stats.by_level.get(RiskLevel::Medium.as_str()), Some(&0));
    assert_eq!(stats.by_kind.get(InputKind::Text.as_str()), Some(&2));
    assert_eq!(stats.by_kind.get(InputKind::Advisor.as_str()), Some(&1));
    let top: Vec<(&str, u64)> = stats
        .top_high_risk_indicators
        .iter()
        .map(|entry| (entry.indicator.as_str(), entry.count))
        .collect();
    assert_eq!(top, vec![("unrealistic returns", 2), ("urgency language", 2)]);
}

/// Verifies data survives reopening the database file.
#[test]
fn data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let session = SessionId::new("s-durable");
    {
        let store = open(&dir);
        store.ensure_session(&session, at(0)).unwrap();
        let sequence = store.reserve_sequence(&session).unwrap();
        store.append(&session, sequence, &verdict("req-d", "fp-d", 0.9, InputKind::Text)).unwrap();
    }
    let store = open(&dir);
    store.readiness().unwrap();
    assert_eq!(ids(&store.session_verdicts(&session).unwrap().unwrap()), vec!["req-d"]);
    assert_eq!(store.reserve_sequence(&session).unwrap(), 2);
}

// ============================================================================
// SECTION: Ledger Records
// ============================================================================

/// Verifies the ledger gate runs its state machine over the durable store.
#[test]
fn ledger_gate_flow_over_sqlite() {
    let dir = TempDir::new().unwrap();
    let outbox = RecordingOutbox::default();
    let gate = LedgerGate::new(open(&dir), outbox.clone(), LedgerPolicy::default());
    let high = verdict("req-l", "fp-ledger", 0.9, InputKind::Text);
    let key = IdempotencyKey::from_fingerprint(&high.input_fingerprint);

    gate.submit(&high, at(0)).unwrap();
    gate.submit(&verdict("req-l2", "fp-ledger", 0.9, InputKind::Text), at(10)).unwrap();
    assert_eq!(outbox.sent.lock().unwrap().len(), 1);

    let failed = gate.record_failed(&key, "ledger down", at(100)).unwrap();
    assert_eq!(failed.next_retry_at, Some(at(2_100)));
    let listed = gate.store().list_by_status(LedgerStatus::Failed, 10).unwrap();
    assert_eq!(listed.len(), 1);

    gate.retry_due(at(2_100)).unwrap();
    let reference = LedgerRef::new("0xfeed");
    let confirmed = gate.record_confirmed(&key, &reference, at(2_200)).unwrap();
    assert_eq!(confirmed.status, LedgerStatus::Confirmed);
    assert_eq!(confirmed.attempts, 2);

    let found = gate.store().find_by_ref(&reference).unwrap().unwrap();
    assert_eq!(found.idempotency_key, key);
    let stats = LedgerStore::stats(gate.store()).unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.confirmed, 1);
}

/// Verifies concurrent submissions of one fingerprint dispatch exactly once.
#[test]
fn concurrent_updates_are_serialized() {
    let dir = TempDir::new().unwrap();
    let outbox = RecordingOutbox::default();
    let gate = Arc::new(LedgerGate::new(open(&dir), outbox.clone(), LedgerPolicy::default()));
    let handles: Vec<_> = (0 .. 8)
        .map(|index| {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let request = format!("req-{index}");
                gate.submit(&verdict(&request, "fp-race", 0.9, InputKind::Text), at(0)).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(outbox.sent.lock().unwrap().len(), 1);
}

// ============================================================================
// SECTION: Integrity
// ============================================================================

/// Verifies tampered verdict payloads fail closed.
#[test]
fn tampered_payloads_are_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let session = SessionId::new("s-tamper");
    store.ensure_session(&session, at(0)).unwrap();
    let sequence = store.reserve_sequence(&session).unwrap();
    store.append(&session, sequence, &verdict("req-t", "fp-t", 0.9, InputKind::Text)).unwrap();
    drop(store);

    let connection = Connection::open(dir.path().join("trustx.db")).unwrap();
    connection
        .execute(
            "UPDATE verdicts SET payload = ?1 WHERE request_id = 'req-t'",
            params![b"{\"tampered\":true}".as_slice()],
        )
        .unwrap();
    drop(connection);

    let store = open(&dir);
    let result = store.verdict(&RequestId::new("req-t"));
    assert!(matches!(result, Err(StoreError::Corrupt(_))));
}

/// Verifies an unknown schema version is refused.
#[test]
fn unknown_schema_version_is_refused() {
    let dir = TempDir::new().unwrap();
    drop(open(&dir));
    let connection = Connection::open(dir.path().join("trustx.db")).unwrap();
    connection.execute("UPDATE store_meta SET version = 99", []).unwrap();
    drop(connection);

    let result = SqliteStore::open(SqliteStoreConfig::new(dir.path().join("trustx.db")));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

/// Verifies a version 1 database is migrated and its verdicts feed the statistics.
#[test]
fn version_one_store_is_migrated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trustx.db");
    let high = verdict("req-old", "fp-old", 0.95, InputKind::Url);
    let payload = canonical_json_bytes(&high).unwrap();
    let hash = hash_bytes(HashAlgorithm::Sha256, &payload).value;
    let connection = Connection::open(&path).unwrap();
    connection
        .execute_batch(
            "CREATE TABLE store_meta (version INTEGER NOT NULL);
             INSERT INTO store_meta (version) VALUES (1);
             CREATE TABLE sessions (
                 session_id TEXT PRIMARY KEY,
                 metadata_json TEXT NOT NULL,
                 created_at INTEGER NOT NULL,
                 next_sequence INTEGER NOT NULL
             );
             CREATE TABLE verdicts (
                 arrival INTEGER PRIMARY KEY AUTOINCREMENT,
                 request_id TEXT NOT NULL UNIQUE,
                 session_id TEXT NOT NULL REFERENCES sessions(session_id),
                 sequence INTEGER NOT NULL,
                 fingerprint TEXT NOT NULL,
                 payload BLOB NOT NULL,
                 payload_hash TEXT NOT NULL,
                 hash_algorithm TEXT NOT NULL,
                 UNIQUE (session_id, sequence)
             );
             CREATE TABLE fingerprint_index (
                 fingerprint TEXT PRIMARY KEY,
                 request_id TEXT NOT NULL REFERENCES verdicts(request_id)
             );
             CREATE TABLE ledger_records (
                 idempotency_key TEXT PRIMARY KEY,
                 status TEXT NOT NULL,
                 ledger_ref TEXT,
                 updated_at INTEGER NOT NULL,
                 payload BLOB NOT NULL,
                 payload_hash TEXT NOT NULL,
                 hash_algorithm TEXT NOT NULL
             );
             INSERT INTO sessions VALUES ('s-old', '{}', 0, 2);",
        )
        .unwrap();
    connection
        .execute(
            "INSERT INTO verdicts (request_id, session_id, sequence, fingerprint, payload, \
             payload_hash, hash_algorithm) VALUES ('req-old', 's-old', 1, 'fp-old', ?1, ?2, \
             'sha256')",
            params![payload.as_slice(), hash.as_str()],
        )
        .unwrap();
    drop(connection);

    let store = open(&dir);
    let stats = SessionStore::stats(&store).unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.by_level.get(RiskLevel::High.as_str()), Some(&1));
    assert_eq!(stats.by_kind.get(InputKind::Url.as_str()), Some(&1));
    assert_eq!(stats.top_high_risk_indicators.len(), 2);
    assert_eq!(ids(&store.session_verdicts(&SessionId::new("s-old")).unwrap().unwrap()), vec!["req-old"]);

    let sequence = store.reserve_sequence(&SessionId::new("s-old")).unwrap();
    assert_eq!(sequence, 2);
    store.append(&SessionId::new("s-old"), sequence, &verdict("req-new", "fp-new", 0.9, InputKind::Url)).unwrap();
    assert_eq!(SessionStore::stats(&store).unwrap().top_high_risk_indicators[0].count, 2);
}

/// Verifies directory paths are rejected.
#[test]
fn directory_paths_are_rejected() {
    let dir = TempDir::new().unwrap();
    let result = SqliteStore::open(SqliteStoreConfig::new(dir.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}
