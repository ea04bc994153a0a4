// crates/trustx-core/src/core/hashing.rs
// ============================================================================
// Module: TrustX Content Digests
// Description: Digests behind input fingerprints, ledger payloads, and stored rows.
// Purpose: Give every TrustX identity and integrity check one digest format.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! TrustX hashes three things: normalized inputs (the fingerprint that keys
//! deduplication and ledger idempotency), verdicts (the content digest a
//! ledger entry commits to), and stored payloads (checked on every load).
//! Structured values are hashed over RFC 8785 canonical JSON so field order
//! and whitespace never change a digest; uploaded media is hashed as raw
//! bytes. Digests are lowercase hex tagged with their algorithm label.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Algorithms
// ============================================================================

/// Digest algorithms TrustX can produce and verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Returns the label persisted next to stored digests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Parses a persisted label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// Algorithm used for new fingerprints and digests.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Algorithm-tagged digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm that produced the digest.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest.
    pub value: String,
}

impl HashDigest {
    /// Wraps raw digest output.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        let value = bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        });
        Self {
            algorithm,
            value,
        }
    }

    /// Returns the hex digest.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

/// Canonicalization failures.
#[derive(Debug, Error)]
pub enum HashError {
    /// The value has no canonical JSON form (for example a non-finite float).
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Returns the RFC 8785 canonical JSON encoding of `value`.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the value cannot be encoded.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Digests the canonical JSON encoding of `value`.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the value cannot be encoded.
pub fn hash_canonical_json<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    Ok(hash_bytes(algorithm, &canonical_json_bytes(value)?))
}

/// Digests raw bytes.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => HashDigest::new(algorithm, &Sha256::digest(bytes)),
    }
}

/// Returns true when `bytes` digest to `expected_hex` under `algorithm`.
#[must_use]
pub fn digest_matches(algorithm: HashAlgorithm, bytes: &[u8], expected_hex: &str) -> bool {
    hash_bytes(algorithm, bytes).value.eq_ignore_ascii_case(expected_hex)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
