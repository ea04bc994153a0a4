// crates/trustx-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store
// Description: Durable SessionStore and LedgerStore backed by SQLite.
// Purpose: Persist sessions, verdicts, and ledger records with integrity hashes.
// Dependencies: trustx-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Verdicts and ledger records are stored as canonical JSON next to their
//! SHA-256 digest. Every load re-hashes the payload and fails closed on a
//! mismatch. Session appends and the fingerprint index update share one
//! transaction; ledger record updates run inside an `IMMEDIATE` transaction so
//! the read-modify-write is atomic across connections.
//!
//! Each verdict row also carries its risk level, input kind, and degraded flag
//! in plain columns, and high-risk indicators get their own table, so
//! dashboard statistics are SQL aggregates rather than payload scans.
//!
//! Database contents are treated as untrusted: payload sizes are bounded
//! before they are read and decoded records must match the key they were
//! stored under.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use trustx_core::DEFAULT_HASH_ALGORITHM;
use trustx_core::Fingerprint;
use trustx_core::HashAlgorithm;
use trustx_core::IdempotencyKey;
use trustx_core::InputKind;
use trustx_core::LedgerRecord;
use trustx_core::LedgerRef;
use trustx_core::LedgerStats;
use trustx_core::LedgerStatus;
use trustx_core::LedgerStore;
use trustx_core::RequestId;
use trustx_core::RiskLevel;
use trustx_core::SessionEntry;
use trustx_core::SessionId;
use trustx_core::SessionMetadata;
use trustx_core::SessionRecord;
use trustx_core::SessionStore;
use trustx_core::StoreError;
use trustx_core::TOP_INDICATOR_LIMIT;
use trustx_core::Timestamp;
use trustx_core::Verdict;
use trustx_core::VerdictStats;
use trustx_core::VerdictStatsBuilder;
use trustx_core::canonical_json_bytes;
use trustx_core::digest_matches;
use trustx_core::hash_bytes;
use trustx_core::interfaces::LedgerRecordUpdate;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 2;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum stored payload size for one verdict or ledger record.
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw verdict payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Referenced entity does not exist.
    #[error("sqlite store entity not found: {0}")]
    NotFound(String),
    /// Write conflicts with existing data.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Payload exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "payload exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed session and ledger record store.
///
/// # Invariants
/// - Payload loads verify stored hashes before deserialization.
/// - Connection access is serialized through a mutex.
#[derive(Clone)]
pub struct SqliteStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens an `SQLite` store, creating the schema when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized, or its schema version is unsupported.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Verifies the store can execute a simple statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the mutex is poisoned or the query fails.
    pub fn readiness(&self) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Locks the connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Io("sqlite mutex poisoned".to_string()))
    }

    /// Loads one session record, entries included.
    fn load_session(
        connection: &Connection,
        session_id: &SessionId,
    ) -> Result<Option<SessionRecord>, SqliteStoreError> {
        let row: Option<(String, i64)> = connection
            .query_row(
                "SELECT metadata_json, created_at FROM sessions WHERE session_id = ?1",
                params![session_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((metadata_json, created_at)) = row else {
            return Ok(None);
        };
        let metadata: SessionMetadata = serde_json::from_str(&metadata_json)
            .map_err(|err| SqliteStoreError::Invalid(format!("session metadata: {err}")))?;
        let mut statement = connection.prepare_cached(
            "SELECT sequence, request_id FROM verdicts WHERE session_id = ?1 ORDER BY sequence ASC",
        )?;
        let entries = statement
            .query_map(params![session_id.as_str()], |row| {
                let sequence: i64 = row.get(0)?;
                let request_id: String = row.get(1)?;
                Ok((sequence, request_id))
            })?
            .map(|row| {
                let (sequence, request_id) = row?;
                Ok(SessionEntry {
                    sequence: sequence_from_db(sequence)?,
                    request_id: RequestId::new(request_id),
                })
            })
            .collect::<Result<Vec<_>, SqliteStoreError>>()?;
        Ok(Some(SessionRecord {
            session_id: session_id.clone(),
            metadata,
            created_at: Timestamp::from_unix_millis(created_at),
            entries,
        }))
    }

    /// Runs a verdict query and decodes every row.
    fn query_verdicts(
        connection: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Verdict>, SqliteStoreError> {
        let mut statement = connection.prepare_cached(sql)?;
        let rows = statement
            .query_map(params, map_payload_row)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        rows.into_iter().map(|row| decode_verdict(&row)).collect()
    }
}

// ============================================================================
// SECTION: Session Store
// ============================================================================

impl SessionStore for SqliteStore {
    fn create_session(
        &self,
        session_id: &SessionId,
        metadata: &SessionMetadata,
        created_at: Timestamp,
    ) -> Result<SessionRecord, StoreError> {
        let guard = self.lock()?;
        let metadata_json =
            serde_json::to_string(metadata).map_err(|err| StoreError::Invalid(err.to_string()))?;
        let inserted = guard
            .execute(
                "INSERT OR IGNORE INTO sessions (session_id, metadata_json, created_at, \
                 next_sequence) VALUES (?1, ?2, ?3, 1)",
                params![session_id.as_str(), metadata_json, created_at.as_unix_millis()],
            )
            .map_err(SqliteStoreError::from)?;
        if inserted == 0 {
            return Err(StoreError::Conflict(format!("session {session_id} already exists")));
        }
        Ok(SessionRecord {
            session_id: session_id.clone(),
            metadata: metadata.clone(),
            created_at,
            entries: Vec::new(),
        })
    }

    fn ensure_session(
        &self,
        session_id: &SessionId,
        created_at: Timestamp,
    ) -> Result<SessionRecord, StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT OR IGNORE INTO sessions (session_id, metadata_json, created_at, \
                 next_sequence) VALUES (?1, '{}', ?2, 1)",
                params![session_id.as_str(), created_at.as_unix_millis()],
            )
            .map_err(SqliteStoreError::from)?;
        Self::load_session(&guard, session_id)?
            .ok_or_else(|| StoreError::Corrupt(format!("session {session_id} vanished")))
    }

    fn reserve_sequence(&self, session_id: &SessionId) -> Result<u64, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(SqliteStoreError::from)?;
        let next: Option<i64> = tx
            .query_row(
                "SELECT next_sequence FROM sessions WHERE session_id = ?1",
                params![session_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        let next = next.ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
        let following = next
            .checked_add(1)
            .ok_or_else(|| StoreError::Corrupt(format!("sequence overflow for {session_id}")))?;
        tx.execute(
            "UPDATE sessions SET next_sequence = ?1 WHERE session_id = ?2",
            params![following, session_id.as_str()],
        )
        .map_err(SqliteStoreError::from)?;
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(sequence_from_db(next)?)
    }

    fn append(
        &self,
        session_id: &SessionId,
        sequence: u64,
        verdict: &Verdict,
    ) -> Result<(), StoreError> {
        let payload = encode_payload(verdict)?;
        let sequence_db = sequence_to_db(sequence)?;
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(SqliteStoreError::from)?;
        let next: Option<i64> = tx
            .query_row(
                "SELECT next_sequence FROM sessions WHERE session_id = ?1",
                params![session_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        let next = next.ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
        if sequence_db == 0 || sequence_db >= next {
            return Err(StoreError::Invalid(format!("sequence {sequence} was not reserved")));
        }
        let request_taken: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM verdicts WHERE request_id = ?1)",
                params![verdict.request_id.as_str()],
                |row| row.get(0),
            )
            .map_err(SqliteStoreError::from)?;
        if request_taken {
            return Err(StoreError::Conflict(format!("verdict {} already stored", verdict.request_id)));
        }
        let sequence_taken: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM verdicts WHERE session_id = ?1 AND sequence = ?2)",
                params![session_id.as_str(), sequence_db],
                |row| row.get(0),
            )
            .map_err(SqliteStoreError::from)?;
        if sequence_taken {
            return Err(StoreError::Conflict(format!("sequence {sequence} already used")));
        }
        tx.execute(
            "INSERT INTO verdicts (request_id, session_id, sequence, fingerprint, risk_level, \
             input_kind, degraded, payload, payload_hash, hash_algorithm) VALUES (?1, ?2, ?3, \
             ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                verdict.request_id.as_str(),
                session_id.as_str(),
                sequence_db,
                verdict.input_fingerprint.as_str(),
                verdict.risk_level.as_str(),
                verdict.input_kind.as_str(),
                verdict.degraded,
                payload.bytes.as_slice(),
                payload.hash.as_str(),
                DEFAULT_HASH_ALGORITHM.as_str(),
            ],
        )
        .map_err(SqliteStoreError::from)?;
        if verdict.risk_level == RiskLevel::High {
            for indicator in &verdict.indicators {
                tx.execute(
                    "INSERT OR IGNORE INTO high_risk_indicators (request_id, indicator) VALUES \
                     (?1, ?2)",
                    params![verdict.request_id.as_str(), indicator.as_str()],
                )
                .map_err(SqliteStoreError::from)?;
            }
        }
        tx.execute(
            "INSERT INTO fingerprint_index (fingerprint, request_id) VALUES (?1, ?2) \
             ON CONFLICT(fingerprint) DO UPDATE SET request_id = excluded.request_id",
            params![verdict.input_fingerprint.as_str(), verdict.request_id.as_str()],
        )
        .map_err(SqliteStoreError::from)?;
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(())
    }

    fn session(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(Self::load_session(&guard, session_id)?)
    }

    fn session_verdicts(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Vec<Verdict>>, StoreError> {
        let guard = self.lock()?;
        let exists: bool = guard
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sessions WHERE session_id = ?1)",
                params![session_id.as_str()],
                |row| row.get(0),
            )
            .map_err(SqliteStoreError::from)?;
        if !exists {
            return Ok(None);
        }
        let verdicts = Self::query_verdicts(
            &guard,
            "SELECT request_id, payload, payload_hash, hash_algorithm FROM verdicts WHERE \
             session_id = ?1 ORDER BY sequence ASC",
            &[&session_id.as_str()],
        )?;
        Ok(Some(verdicts))
    }

    fn verdict(&self, request_id: &RequestId) -> Result<Option<Verdict>, StoreError> {
        let guard = self.lock()?;
        let verdicts = Self::query_verdicts(
            &guard,
            "SELECT request_id, payload, payload_hash, hash_algorithm FROM verdicts WHERE \
             request_id = ?1",
            &[&request_id.as_str()],
        )?;
        Ok(verdicts.into_iter().next())
    }

    fn latest_for_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Verdict>, StoreError> {
        let guard = self.lock()?;
        let verdicts = Self::query_verdicts(
            &guard,
            "SELECT v.request_id, v.payload, v.payload_hash, v.hash_algorithm FROM \
             fingerprint_index f JOIN verdicts v ON v.request_id = f.request_id WHERE \
             f.fingerprint = ?1",
            &[&fingerprint.as_str()],
        )?;
        Ok(verdicts.into_iter().next())
    }

    fn history(
        &self,
        session_id: Option<&SessionId>,
        limit: usize,
    ) -> Result<Vec<Verdict>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let guard = self.lock()?;
        let verdicts = match session_id {
            Some(session_id) => Self::query_verdicts(
                &guard,
                "SELECT request_id, payload, payload_hash, hash_algorithm FROM verdicts WHERE \
                 session_id = ?1 ORDER BY sequence DESC LIMIT ?2",
                &[&session_id.as_str(), &limit],
            )?,
            None => Self::query_verdicts(
                &guard,
                "SELECT request_id, payload, payload_hash, hash_algorithm FROM verdicts ORDER \
                 BY arrival DESC LIMIT ?1",
                &[&limit],
            )?,
        };
        Ok(verdicts)
    }

    fn stats(&self) -> Result<VerdictStats, StoreError> {
        let guard = self.lock()?;
        let mut builder = VerdictStatsBuilder::new();
        let mut statement = guard
            .prepare_cached(
                "SELECT risk_level, input_kind, degraded, COUNT(1) FROM verdicts GROUP BY \
                 risk_level, input_kind, degraded",
            )
            .map_err(SqliteStoreError::from)?;
        let groups = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(SqliteStoreError::from)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()
            .map_err(SqliteStoreError::from)?;
        for (level, kind, degraded, count) in groups {
            let level = RiskLevel::parse(&level)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown risk level {level}")))?;
            let kind = InputKind::parse(&kind)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown input kind {kind}")))?;
            builder.record_group(level, kind, degraded, count_from_db(count)?);
        }
        let limit = i64::try_from(TOP_INDICATOR_LIMIT).unwrap_or(i64::MAX);
        let mut statement = guard
            .prepare_cached(
                "SELECT indicator, COUNT(1) AS occurrences FROM high_risk_indicators GROUP BY \
                 indicator ORDER BY occurrences DESC, indicator ASC LIMIT ?1",
            )
            .map_err(SqliteStoreError::from)?;
        let indicators = statement
            .query_map(params![limit], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(SqliteStoreError::from)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()
            .map_err(SqliteStoreError::from)?;
        for (indicator, count) in indicators {
            builder.record_high_indicator(&indicator, count_from_db(count)?);
        }
        Ok(builder.finish())
    }
}

// ============================================================================
// SECTION: Ledger Store
// ============================================================================

impl LedgerStore for SqliteStore {
    fn load(&self, key: &IdempotencyKey) -> Result<Option<LedgerRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(load_ledger_record(&guard, key)?)
    }

    fn update(
        &self,
        key: &IdempotencyKey,
        update: &mut LedgerRecordUpdate<'_>,
    ) -> Result<Option<LedgerRecord>, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(SqliteStoreError::from)?;
        let current = load_ledger_record(&tx, key)?;
        let Some(next) = update(current.as_ref()) else {
            tx.commit().map_err(SqliteStoreError::from)?;
            return Ok(current);
        };
        if &next.idempotency_key != key {
            return Err(StoreError::Invalid("ledger record key mismatch".to_string()));
        }
        write_ledger_record(&tx, &next)?;
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(Some(next))
    }

    fn find_by_ref(&self, ledger_ref: &LedgerRef) -> Result<Option<LedgerRecord>, StoreError> {
        let guard = self.lock()?;
        let records = query_ledger_records(
            &guard,
            "SELECT idempotency_key, payload, payload_hash, hash_algorithm FROM ledger_records \
             WHERE ledger_ref = ?1 LIMIT 1",
            &[&ledger_ref.as_str()],
        )?;
        Ok(records.into_iter().next())
    }

    fn list_by_status(
        &self,
        status: LedgerStatus,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let guard = self.lock()?;
        Ok(query_ledger_records(
            &guard,
            "SELECT idempotency_key, payload, payload_hash, hash_algorithm FROM ledger_records \
             WHERE status = ?1 ORDER BY updated_at ASC, idempotency_key ASC LIMIT ?2",
            &[&status.as_str(), &limit],
        )?)
    }

    fn stats(&self) -> Result<LedgerStats, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare_cached("SELECT status, COUNT(1) FROM ledger_records GROUP BY status")
            .map_err(SqliteStoreError::from)?;
        let rows = statement
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(SqliteStoreError::from)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()
            .map_err(SqliteStoreError::from)?;
        let mut stats = LedgerStats::default();
        for (label, count) in rows {
            let status = LedgerStatus::parse(&label)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown ledger status {label}")))?;
            for _ in 0 .. count {
                stats.record(status);
            }
        }
        Ok(stats)
    }
}

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Canonical payload bytes with their digest.
struct EncodedPayload {
    /// Canonical JSON bytes.
    bytes: Vec<u8>,
    /// Hex digest of `bytes`.
    hash: String,
}

/// Raw payload row.
struct PayloadRow {
    /// Key the payload was stored under.
    key: String,
    /// Stored bytes.
    bytes: Vec<u8>,
    /// Stored digest.
    hash: String,
    /// Stored hash algorithm label.
    algorithm: String,
}

/// Serializes a value canonically and hashes it.
fn encode_payload<T: Serialize>(value: &T) -> Result<EncodedPayload, SqliteStoreError> {
    let bytes = canonical_json_bytes(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if bytes.len() > MAX_PAYLOAD_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_PAYLOAD_BYTES,
            actual_bytes: bytes.len(),
        });
    }
    let hash = hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes).value;
    Ok(EncodedPayload {
        bytes,
        hash,
    })
}

/// Verifies a stored payload's digest and decodes it.
fn decode_payload<T: DeserializeOwned>(row: &PayloadRow) -> Result<T, SqliteStoreError> {
    if row.bytes.len() > MAX_PAYLOAD_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_PAYLOAD_BYTES,
            actual_bytes: row.bytes.len(),
        });
    }
    let algorithm = HashAlgorithm::parse(&row.algorithm).ok_or_else(|| {
        SqliteStoreError::Invalid(format!("unsupported hash algorithm: {}", row.algorithm))
    })?;
    if !digest_matches(algorithm, &row.bytes, &row.hash) {
        return Err(SqliteStoreError::Corrupt(format!("hash mismatch for {}", row.key)));
    }
    serde_json::from_slice(&row.bytes).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Maps a `(key, payload, hash, algorithm)` row.
fn map_payload_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PayloadRow> {
    Ok(PayloadRow {
        key: row.get(0)?,
        bytes: row.get(1)?,
        hash: row.get(2)?,
        algorithm: row.get(3)?,
    })
}

/// Decodes a verdict row and checks it matches its key.
fn decode_verdict(row: &PayloadRow) -> Result<Verdict, SqliteStoreError> {
    let verdict: Verdict = decode_payload(row)?;
    if verdict.request_id.as_str() != row.key {
        return Err(SqliteStoreError::Invalid("request_id mismatch between key and payload".to_string()));
    }
    Ok(verdict)
}

/// Runs a ledger record query and decodes every row.
fn query_ledger_records(
    connection: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<LedgerRecord>, SqliteStoreError> {
    let mut statement = connection.prepare_cached(sql)?;
    let rows = statement
        .query_map(params, map_payload_row)?
        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
    rows.iter()
        .map(|row| {
            let record: LedgerRecord = decode_payload(row)?;
            if record.idempotency_key.as_str() != row.key {
                return Err(SqliteStoreError::Invalid(
                    "idempotency_key mismatch between key and payload".to_string(),
                ));
            }
            Ok(record)
        })
        .collect()
}

/// Loads one ledger record.
fn load_ledger_record(
    connection: &Connection,
    key: &IdempotencyKey,
) -> Result<Option<LedgerRecord>, SqliteStoreError> {
    let records = query_ledger_records(
        connection,
        "SELECT idempotency_key, payload, payload_hash, hash_algorithm FROM ledger_records WHERE \
         idempotency_key = ?1",
        &[&key.as_str()],
    )?;
    Ok(records.into_iter().next())
}

/// Inserts or replaces a ledger record inside a transaction.
fn write_ledger_record(tx: &Transaction<'_>, record: &LedgerRecord) -> Result<(), SqliteStoreError> {
    let payload = encode_payload(record)?;
    tx.execute(
        "INSERT INTO ledger_records (idempotency_key, status, ledger_ref, updated_at, payload, \
         payload_hash, hash_algorithm) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT(idempotency_key) DO UPDATE SET status = excluded.status, ledger_ref = \
         excluded.ledger_ref, updated_at = excluded.updated_at, payload = excluded.payload, \
         payload_hash = excluded.payload_hash, hash_algorithm = excluded.hash_algorithm",
        params![
            record.idempotency_key.as_str(),
            record.status.as_str(),
            record.ledger_ref.as_ref().map(LedgerRef::as_str),
            record.updated_at.as_unix_millis(),
            payload.bytes.as_slice(),
            payload.hash.as_str(),
            DEFAULT_HASH_ALGORITHM.as_str(),
        ],
    )?;
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a sequence number to its column value.
fn sequence_to_db(sequence: u64) -> Result<i64, SqliteStoreError> {
    i64::try_from(sequence).map_err(|_| SqliteStoreError::Invalid(format!("sequence {sequence} too large")))
}

/// Converts a stored sequence number back.
fn sequence_from_db(sequence: i64) -> Result<u64, SqliteStoreError> {
    u64::try_from(sequence).map_err(|_| SqliteStoreError::Corrupt(format!("negative sequence {sequence}")))
}

/// Ensures the parent directory exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    connection.execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection.execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    Ok(connection)
}

/// Converts a `COUNT` result to an unsigned count.
fn count_from_db(count: i64) -> Result<u64, SqliteStoreError> {
    u64::try_from(count).map_err(|_| SqliteStoreError::Corrupt(format!("negative count {count}")))
}

/// Initializes the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    session_id TEXT PRIMARY KEY,
                    metadata_json TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    next_sequence INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS verdicts (
                    arrival INTEGER PRIMARY KEY AUTOINCREMENT,
                    request_id TEXT NOT NULL UNIQUE,
                    session_id TEXT NOT NULL REFERENCES sessions(session_id),
                    sequence INTEGER NOT NULL,
                    fingerprint TEXT NOT NULL,
                    risk_level TEXT NOT NULL,
                    input_kind TEXT NOT NULL,
                    degraded INTEGER NOT NULL,
                    payload BLOB NOT NULL,
                    payload_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    UNIQUE (session_id, sequence)
                );
                CREATE INDEX IF NOT EXISTS idx_verdicts_summary
                    ON verdicts (risk_level, input_kind, degraded);
                CREATE TABLE IF NOT EXISTS high_risk_indicators (
                    request_id TEXT NOT NULL REFERENCES verdicts(request_id),
                    indicator TEXT NOT NULL,
                    PRIMARY KEY (request_id, indicator)
                );
                CREATE INDEX IF NOT EXISTS idx_high_risk_indicators_indicator
                    ON high_risk_indicators (indicator);
                CREATE TABLE IF NOT EXISTS fingerprint_index (
                    fingerprint TEXT PRIMARY KEY,
                    request_id TEXT NOT NULL REFERENCES verdicts(request_id)
                );
                CREATE TABLE IF NOT EXISTS ledger_records (
                    idempotency_key TEXT PRIMARY KEY,
                    status TEXT NOT NULL,
                    ledger_ref TEXT,
                    updated_at INTEGER NOT NULL,
                    payload BLOB NOT NULL,
                    payload_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_ledger_records_status
                    ON ledger_records (status, updated_at);
                CREATE INDEX IF NOT EXISTS idx_ledger_records_ref
                    ON ledger_records (ledger_ref);",
            )?;
        }
        Some(1) => {
            tx.execute_batch(
                "ALTER TABLE verdicts ADD COLUMN risk_level TEXT NOT NULL DEFAULT 'LOW';
                 ALTER TABLE verdicts ADD COLUMN input_kind TEXT NOT NULL DEFAULT 'TEXT';
                 ALTER TABLE verdicts ADD COLUMN degraded INTEGER NOT NULL DEFAULT 0;
                 UPDATE verdicts SET
                     risk_level = json_extract(CAST(payload AS TEXT), '$.risk_level'),
                     input_kind = json_extract(CAST(payload AS TEXT), '$.input_kind'),
                     degraded = json_extract(CAST(payload AS TEXT), '$.degraded');
                 CREATE INDEX IF NOT EXISTS idx_verdicts_summary
                     ON verdicts (risk_level, input_kind, degraded);
                 CREATE TABLE IF NOT EXISTS high_risk_indicators (
                     request_id TEXT NOT NULL REFERENCES verdicts(request_id),
                     indicator TEXT NOT NULL,
                     PRIMARY KEY (request_id, indicator)
                 );
                 CREATE INDEX IF NOT EXISTS idx_high_risk_indicators_indicator
                     ON high_risk_indicators (indicator);
                 INSERT OR IGNORE INTO high_risk_indicators (request_id, indicator)
                 SELECT v.request_id, j.value
                 FROM verdicts v, json_each(CAST(v.payload AS TEXT), '$.indicators') j
                 WHERE v.risk_level = 'HIGH';",
            )?;
            tx.execute("UPDATE store_meta SET version = ?1", params![SCHEMA_VERSION])?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}


// ============================================================================
// SECTION: Tests
// ============================================================================
