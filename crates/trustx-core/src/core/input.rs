// crates/trustx-core/src/core/input.rs
// ============================================================================
// Module: TrustX Analysis Inputs
// Description: Raw analysis inputs, ingress validation, normalization, and fingerprints.
// Purpose: Reject unusable inputs before fan-out and derive stable content fingerprints.
// Dependencies: serde, url, crate::core::hashing
// ============================================================================

//! ## Overview
//! Every analysis request carries exactly one [`AnalysisInput`]. Ingress calls
//! [`AnalysisInput::normalize`], which fails closed with [`InputError`] for
//! empty, malformed, or oversized inputs. The resulting [`NormalizedInput`] is
//! what adapters see and what the fingerprint is computed over.
//!
//! Fingerprints are case- and whitespace-insensitive for text fields, use the
//! canonical URL form for links, and hash raw bytes for media.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_bytes;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::Fingerprint;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum characters accepted for free-text fields.
pub const MAX_TEXT_CHARS: usize = 100_000;
/// Maximum bytes accepted for image and QR payloads.
pub const MAX_MEDIA_BYTES: usize = 10 * 1024 * 1024;
/// Maximum characters accepted for URLs.
const MAX_URL_CHARS: usize = 4096;
/// Maximum characters accepted for advisor and company names.
const MAX_NAME_CHARS: usize = 256;

// ============================================================================
// SECTION: Input Kinds
// ============================================================================

/// Kind of content submitted for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputKind {
    /// Free text (messages, posts, offers).
    Text,
    /// A single URL.
    Url,
    /// An image (screenshot, flyer).
    Image,
    /// A QR code image.
    Qr,
    /// An advisor identity to verify.
    Advisor,
    /// A corporate announcement.
    Announcement,
}

impl InputKind {
    /// All input kinds in canonical order.
    pub const ALL: [Self; 6] =
        [Self::Text, Self::Url, Self::Image, Self::Qr, Self::Advisor, Self::Announcement];

    /// Returns the stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Url => "URL",
            Self::Image => "IMAGE",
            Self::Qr => "QR",
            Self::Advisor => "ADVISOR",
            Self::Announcement => "ANNOUNCEMENT",
        }
    }

    /// Parses a stable label back into a kind.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == label)
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ingress validation failures (client errors).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// A required field is missing or blank.
    #[error("{0} must not be empty")]
    Empty(&'static str),
    /// A field exceeds its size limit.
    #[error("{field} exceeds limit of {limit}")]
    TooLarge {
        /// Field name.
        field: &'static str,
        /// Limit that was exceeded.
        limit: usize,
    },
    /// The URL could not be parsed or uses an unsupported scheme.
    #[error("malformed url: {0}")]
    MalformedUrl(String),
}

// ============================================================================
// SECTION: Raw Inputs
// ============================================================================

/// Raw analysis input as received at ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisInput {
    /// Free text.
    Text {
        /// Text content.
        content: String,
    },
    /// URL to check.
    Url {
        /// URL as submitted; a missing scheme is treated as `http`.
        url: String,
    },
    /// Image bytes.
    Image {
        /// Raw image bytes.
        data: Vec<u8>,
        /// Declared content type, when known.
        content_type: Option<String>,
    },
    /// QR code image bytes.
    Qr {
        /// Raw image bytes.
        data: Vec<u8>,
        /// Declared content type, when known.
        content_type: Option<String>,
    },
    /// Advisor identity.
    Advisor {
        /// Advisor name.
        name: String,
        /// Optional registration identifier.
        registration_id: Option<String>,
    },
    /// Corporate announcement.
    Announcement {
        /// Company name.
        company: String,
        /// Announcement text.
        text: String,
    },
}

impl AnalysisInput {
    /// Validates and normalizes the input.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] when a required field is empty, a field exceeds
    /// its limit, or a URL is malformed.
    pub fn normalize(self) -> Result<NormalizedInput, InputError> {
        match self {
            Self::Text {
                content,
            } => Ok(NormalizedInput::Text {
                content: normalize_text("content", &content, MAX_TEXT_CHARS)?,
            }),
            Self::Url {
                url,
            } => Ok(NormalizedInput::Url {
                url: normalize_url(&url)?,
            }),
            Self::Image {
                data,
                content_type,
            } => {
                check_media(&data)?;
                Ok(NormalizedInput::Image {
                    data,
                    content_type,
                })
            }
            Self::Qr {
                data,
                content_type,
            } => {
                check_media(&data)?;
                Ok(NormalizedInput::Qr {
                    data,
                    content_type,
                })
            }
            Self::Advisor {
                name,
                registration_id,
            } => {
                let name = normalize_text("advisor_name", &name, MAX_NAME_CHARS)?;
                let registration_id = registration_id
                    .map(|id| id.trim().to_ascii_uppercase())
                    .filter(|id| !id.is_empty());
                Ok(NormalizedInput::Advisor {
                    name,
                    registration_id,
                })
            }
            Self::Announcement {
                company,
                text,
            } => Ok(NormalizedInput::Announcement {
                company: normalize_text("company", &company, MAX_NAME_CHARS)?,
                text: normalize_text("text", &text, MAX_TEXT_CHARS)?,
            }),
        }
    }
}

// ============================================================================
// SECTION: Normalized Inputs
// ============================================================================

/// Validated input handed to adapters.
///
/// # Invariants
/// - Text fields are trimmed with internal whitespace collapsed to single spaces.
/// - URLs are absolute `http`/`https` URLs with a host and no fragment.
/// - Media payloads are non-empty and within [`MAX_MEDIA_BYTES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedInput {
    /// Free text.
    Text {
        /// Normalized text.
        content: String,
    },
    /// URL.
    Url {
        /// Canonical URL.
        url: Url,
    },
    /// Image bytes.
    Image {
        /// Raw image bytes.
        data: Vec<u8>,
        /// Declared content type, when known.
        content_type: Option<String>,
    },
    /// QR code image bytes.
    Qr {
        /// Raw image bytes.
        data: Vec<u8>,
        /// Declared content type, when known.
        content_type: Option<String>,
    },
    /// Advisor identity.
    Advisor {
        /// Normalized advisor name.
        name: String,
        /// Uppercased registration identifier.
        registration_id: Option<String>,
    },
    /// Corporate announcement.
    Announcement {
        /// Normalized company name.
        company: String,
        /// Normalized announcement text.
        text: String,
    },
}

/// Canonical material hashed into a fingerprint.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
enum FingerprintMaterial<'a> {
    /// Lowercased text.
    Text {
        /// Lowercased content.
        content: String,
    },
    /// Canonical URL.
    Url {
        /// Canonical URL string.
        url: &'a str,
    },
    /// Image digest.
    Image {
        /// Hex digest of the raw bytes.
        digest: String,
    },
    /// QR digest.
    Qr {
        /// Hex digest of the raw bytes.
        digest: String,
    },
    /// Advisor identity.
    Advisor {
        /// Lowercased name.
        name: String,
        /// Registration identifier.
        registration_id: Option<&'a str>,
    },
    /// Announcement.
    Announcement {
        /// Lowercased company.
        company: String,
        /// Lowercased text.
        text: String,
    },
}

impl NormalizedInput {
    /// Returns the input kind.
    #[must_use]
    pub const fn kind(&self) -> InputKind {
        match self {
            Self::Text {
                ..
            } => InputKind::Text,
            Self::Url {
                ..
            } => InputKind::Url,
            Self::Image {
                ..
            } => InputKind::Image,
            Self::Qr {
                ..
            } => InputKind::Qr,
            Self::Advisor {
                ..
            } => InputKind::Advisor,
            Self::Announcement {
                ..
            } => InputKind::Announcement,
        }
    }

    /// Computes the content fingerprint of the input.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn fingerprint(&self) -> Result<Fingerprint, HashError> {
        let material = match self {
            Self::Text {
                content,
            } => FingerprintMaterial::Text {
                content: content.to_lowercase(),
            },
            Self::Url {
                url,
            } => FingerprintMaterial::Url {
                url: url.as_str(),
            },
            Self::Image {
                data,
                ..
            } => FingerprintMaterial::Image {
                digest: hash_bytes(DEFAULT_HASH_ALGORITHM, data).value,
            },
            Self::Qr {
                data,
                ..
            } => FingerprintMaterial::Qr {
                digest: hash_bytes(DEFAULT_HASH_ALGORITHM, data).value,
            },
            Self::Advisor {
                name,
                registration_id,
            } => FingerprintMaterial::Advisor {
                name: name.to_lowercase(),
                registration_id: registration_id.as_deref(),
            },
            Self::Announcement {
                company,
                text,
            } => FingerprintMaterial::Announcement {
                company: company.to_lowercase(),
                text: text.to_lowercase(),
            },
        };
        let digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &material)?;
        Ok(Fingerprint::from_digest(&digest))
    }

    /// Returns the textual content adapters can scan, when the input has one.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text {
                content,
            } => Some(content),
            Self::Announcement {
                text,
                ..
            } => Some(text),
            Self::Url {
                url,
            } => Some(url.as_str()),
            Self::Advisor {
                name,
                ..
            } => Some(name),
            Self::Image {
                ..
            }
            | Self::Qr {
                ..
            } => None,
        }
    }
}

// ============================================================================
// SECTION: Normalization Helpers
// ============================================================================

/// Trims and collapses whitespace, enforcing non-empty and length limits.
fn normalize_text(field: &'static str, value: &str, limit: usize) -> Result<String, InputError> {
    if value.chars().count() > limit {
        return Err(InputError::TooLarge {
            field,
            limit,
        });
    }
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return Err(InputError::Empty(field));
    }
    Ok(collapsed)
}

/// Parses a URL into canonical form, defaulting to `http` when no scheme is given.
fn normalize_url(raw: &str) -> Result<Url, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty("url"));
    }
    if trimmed.chars().count() > MAX_URL_CHARS {
        return Err(InputError::TooLarge {
            field: "url",
            limit: MAX_URL_CHARS,
        });
    }
    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("http://{trimmed}"))
            .map_err(|err| InputError::MalformedUrl(err.to_string()))?,
        Err(err) => return Err(InputError::MalformedUrl(err.to_string())),
    };
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(InputError::MalformedUrl(format!("unsupported scheme {other}"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(InputError::MalformedUrl("missing host".to_string()));
    }
    url.set_fragment(None);
    Ok(url)
}

/// Validates a media payload.
const fn check_media(data: &[u8]) -> Result<(), InputError> {
    if data.is_empty() {
        return Err(InputError::Empty("image"));
    }
    if data.len() > MAX_MEDIA_BYTES {
        return Err(InputError::TooLarge {
            field: "image",
            limit: MAX_MEDIA_BYTES,
        });
    }
    Ok(())
}
