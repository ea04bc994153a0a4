// crates/trustx-adapters/src/http.rs
// ============================================================================
// Module: Bounded HTTP Client
// Description: Blocking HTTP helper shared by network-backed adapters.
// Purpose: Enforce scheme policy, host allowlists, timeouts, and body limits.
// Dependencies: reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! Registry lookups, model oracle calls, and page fetches all go through
//! [`HttpFetcher`]. Redirects are disabled, bodies are read with a hard byte
//! cap, and transport failures surface as [`AdapterError::Unavailable`] so the
//! fan-out reports them as unavailable signals rather than faults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use trustx_core::AdapterError;
use url::Url;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Outbound HTTP limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Allow cleartext HTTP.
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size, in bytes.
    pub max_response_bytes: usize,
    /// Optional host allowlist.
    pub allowed_hosts: Option<BTreeSet<String>>,
    /// User agent for outbound requests.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            timeout_ms: 5_000,
            max_response_bytes: 1024 * 1024,
            allowed_hosts: None,
            user_agent: "trustx/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Fetcher
// ============================================================================

/// Response body with its status and declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    /// HTTP status code.
    pub status: u16,
    /// Declared content type.
    pub content_type: Option<String>,
    /// Body bytes, bounded by the configured limit.
    pub body: Vec<u8>,
}

/// Blocking HTTP client with fail-closed limits.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// Limits and policy.
    config: HttpClientConfig,
    /// Underlying client.
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Failed`] when the client cannot be built.
    pub fn new(config: HttpClientConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|_| AdapterError::Failed("http client build failed".to_string()))?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Issues a GET and returns the bounded body whatever the status.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when policy rejects the URL, the transport
    /// fails, or the body exceeds the size limit.
    pub fn get(&self, url: &Url) -> Result<FetchedBody, AdapterError> {
        validate_url(url, &self.config)?;
        self.send(self.client.get(url.clone()))
    }

    /// Issues a GET and decodes a JSON body from a 2xx response.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] on transport, status, or decode failure.
    pub fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, AdapterError> {
        decode_json(&self.get(url)?)
    }

    /// Issues a JSON POST and decodes a JSON body from a 2xx response.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] on transport, status, or decode failure.
    pub fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &Url,
        body: &B,
    ) -> Result<T, AdapterError> {
        validate_url(url, &self.config)?;
        let payload = serde_json::to_vec(body)
            .map_err(|_| AdapterError::Failed("request serialization failed".to_string()))?;
        let request =
            self.client.post(url.clone()).header(CONTENT_TYPE, "application/json").body(payload);
        decode_json(&self.send(request)?)
    }

    /// Sends a request and reads the bounded body.
    fn send(&self, request: RequestBuilder) -> Result<FetchedBody, AdapterError> {
        let mut response = request.send().map_err(|err| {
            if err.is_timeout() {
                AdapterError::Unavailable("http request timed out".to_string())
            } else {
                AdapterError::Unavailable("http request failed".to_string())
            }
        })?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = read_response_limited(&mut response, self.config.max_response_bytes)?;
        Ok(FetchedBody {
            status,
            content_type,
            body,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates URL scheme and allowlist policy.
///
/// # Errors
///
/// Returns [`AdapterError::Failed`] when the URL is not permitted.
pub fn validate_url(url: &Url, config: &HttpClientConfig) -> Result<(), AdapterError> {
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        _ => return Err(AdapterError::Failed("unsupported url scheme".to_string())),
    }
    if let Some(allowlist) = &config.allowed_hosts {
        let host = url
            .host_str()
            .ok_or_else(|| AdapterError::Failed("url host required".to_string()))?;
        if !allowlist.contains(host) {
            return Err(AdapterError::Failed("url host not allowed".to_string()));
        }
    }
    Ok(())
}

/// Decodes a JSON body from a successful response.
fn decode_json<T: DeserializeOwned>(fetched: &FetchedBody) -> Result<T, AdapterError> {
    if !(200 .. 300).contains(&fetched.status) {
        return Err(AdapterError::Unavailable(format!("upstream returned status {}", fetched.status)));
    }
    serde_json::from_slice(&fetched.body)
        .map_err(|_| AdapterError::Failed("upstream response is not valid json".to_string()))
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(
    response: &mut reqwest::blocking::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, AdapterError> {
    let expected_len = response.content_length();
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| AdapterError::Failed("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(AdapterError::Failed("http response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle
        .read_to_end(&mut buf)
        .map_err(|_| AdapterError::Unavailable("failed to read response".to_string()))?;
    if buf.len() > max_bytes {
        return Err(AdapterError::Failed("http response exceeds size limit".to_string()));
    }
    Ok(buf)
}
