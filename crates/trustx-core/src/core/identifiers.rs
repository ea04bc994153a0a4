// crates/trustx-core/src/core/identifiers.rs
// ============================================================================
// Module: TrustX Identifiers
// Description: Opaque identifiers for requests, sessions, fingerprints, and ledger entries.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, crate::core::hashing
// ============================================================================

//! ## Overview
//! Identifiers are opaque strings. Request and session identifiers are minted
//! by the host; fingerprints and idempotency keys are content-derived so that
//! equal inputs collapse onto the same ledger record.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::hash_bytes;

// ============================================================================
// SECTION: Host-Minted Identifiers
// ============================================================================

/// Unique identifier assigned to one analysis request at ingress.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Creates a new request identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Session identifier grouping the verdicts of one client session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Opaque ledger reference (transaction hash) returned once an append is accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerRef(String);

impl LedgerRef {
    /// Creates a new ledger reference.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LedgerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for LedgerRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LedgerRef {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Content-Derived Identifiers
// ============================================================================

/// Content hash of a normalized input. Equal inputs share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps an existing lowercase hex fingerprint.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Builds a fingerprint from a content digest.
    #[must_use]
    pub fn from_digest(digest: &HashDigest) -> Self {
        Self(digest.value.clone())
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Domain separator mixed into idempotency keys.
const IDEMPOTENCY_DOMAIN: &[u8] = b"trustx.ledger.v1:";

/// Ledger idempotency key derived from an input fingerprint.
///
/// # Invariants
/// - Deterministic: the same fingerprint always yields the same key, so
///   retries never create a second ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derives the idempotency key for a fingerprint.
    #[must_use]
    pub fn from_fingerprint(fingerprint: &Fingerprint) -> Self {
        let mut material = Vec::with_capacity(IDEMPOTENCY_DOMAIN.len() + fingerprint.0.len());
        material.extend_from_slice(IDEMPOTENCY_DOMAIN);
        material.extend_from_slice(fingerprint.0.as_bytes());
        Self(hash_bytes(DEFAULT_HASH_ALGORITHM, &material).value)
    }

    /// Wraps a previously derived key, for example when loading from storage.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
