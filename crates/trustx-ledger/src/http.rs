// crates/trustx-ledger/src/http.rs
// ============================================================================
// Module: HTTP Ledger Client
// Description: Ledger client for an external append/confirm HTTP service.
// Purpose: Append verdict digests with idempotency keys and poll their state.
// Dependencies: reqwest, serde_json, trustx-core, url
// ============================================================================

//! ## Overview
//! Appends are `POST {base}/entries` with an `Idempotency-Key` header and the
//! write request as JSON; the service answers `{"ledger_ref": ...}`. Status
//! polls are `GET {base}/entries/{ref}` answering a
//! [`trustx_core::LedgerConfirmation`]. Redirects are disabled and bodies are
//! size-limited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use trustx_core::LedgerClient;
use trustx_core::LedgerClientError;
use trustx_core::LedgerConfirmation;
use trustx_core::LedgerReceipt;
use trustx_core::LedgerRef;
use trustx_core::LedgerWriteRequest;
use url::Url;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Header carrying the write's idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// HTTP ledger client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpLedgerConfig {
    /// Service base URL.
    pub endpoint: Url,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response size, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

/// Default request timeout.
const fn default_timeout_ms() -> u64 {
    5_000
}

/// Default response size limit.
const fn default_max_response_bytes() -> usize {
    64 * 1024
}

impl HttpLedgerConfig {
    /// Creates settings with default limits.
    #[must_use]
    pub const fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout_ms: default_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Ledger client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    /// Settings.
    config: HttpLedgerConfig,
    /// Underlying client.
    client: Client,
}

impl HttpLedgerClient {
    /// Builds a client.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerClientError::Transport`] when the client cannot be built.
    pub fn new(config: HttpLedgerConfig) -> Result<Self, LedgerClientError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent("trustx-ledger/0.1")
            .redirect(Policy::none())
            .build()
            .map_err(|_| LedgerClientError::Transport("http client build failed".to_string()))?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Joins a path onto the endpoint.
    fn url(&self, path: &str) -> Result<Url, LedgerClientError> {
        self.config
            .endpoint
            .join(path)
            .map_err(|_| LedgerClientError::Invalid("invalid ledger endpoint".to_string()))
    }

    /// Maps a response to a decoded body or a typed error.
    fn decode<T: DeserializeOwned>(&self, mut response: Response) -> Result<T, LedgerClientError> {
        let status = response.status();
        let body = read_limited(&mut response, self.config.max_response_bytes)?;
        match status {
            status if status.is_success() => serde_json::from_slice(&body)
                .map_err(|_| LedgerClientError::Invalid("ledger response is not valid json".to_string())),
            StatusCode::NOT_FOUND => Err(LedgerClientError::NotFound(body_text(&body))),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
                Err(LedgerClientError::Rejected(body_text(&body)))
            }
            other => Err(LedgerClientError::Transport(format!("ledger returned status {}", other.as_u16()))),
        }
    }
}

impl LedgerClient for HttpLedgerClient {
    fn append(&self, request: &LedgerWriteRequest) -> Result<LedgerReceipt, LedgerClientError> {
        let payload = serde_json::to_vec(request)
            .map_err(|_| LedgerClientError::Invalid("write serialization failed".to_string()))?;
        let response = self
            .client
            .post(self.url("entries")?)
            .header(CONTENT_TYPE, "application/json")
            .header(IDEMPOTENCY_HEADER, request.idempotency_key.as_str())
            .body(payload)
            .send()
            .map_err(|_| LedgerClientError::Transport("ledger append failed".to_string()))?;
        self.decode(response)
    }

    fn status(&self, ledger_ref: &LedgerRef) -> Result<LedgerConfirmation, LedgerClientError> {
        let mut url = self.url("entries/")?;
        url.path_segments_mut()
            .map_err(|_| LedgerClientError::Invalid("invalid ledger endpoint".to_string()))?
            .pop_if_empty()
            .push(ledger_ref.as_str());
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|_| LedgerClientError::Transport("ledger status poll failed".to_string()))?;
        self.decode(response)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a body while enforcing a byte limit.
fn read_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, LedgerClientError> {
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| LedgerClientError::Invalid("response size limit exceeds u64".to_string()))?;
    let mut buf = Vec::new();
    response
        .take(max_bytes_u64.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|_| LedgerClientError::Transport("failed to read ledger response".to_string()))?;
    if buf.len() > max_bytes {
        return Err(LedgerClientError::Invalid("ledger response exceeds size limit".to_string()));
    }
    Ok(buf)
}

/// Short printable form of an error body.
fn body_text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(200).collect()
}
