// crates/trustx-config/src/config.rs
// ============================================================================
// Module: TrustX Configuration
// Description: Configuration loading and validation for the TrustX engine.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: trustx-core, trustx-adapters, trustx-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path comes from the caller, else `TRUSTX_CONFIG`, else `./trustx.toml`.
//! Every section validates independently and the whole load fails closed on
//! the first invalid value, so a running server never starts with weights that
//! do not sum to one, unordered thresholds, or an HTTP mode without endpoint.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use trustx_adapters::HttpClientConfig;
use trustx_adapters::RegistryEntry;
use trustx_adapters::StaticRegistry;
use trustx_adapters::UrlReputationConfig;
use trustx_core::AggregationPolicy;
use trustx_core::LedgerPolicy;
use trustx_store_sqlite::SqliteStoreConfig;
use trustx_store_sqlite::SqliteStoreMode;
use trustx_store_sqlite::SqliteSyncMode;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "trustx.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "TRUSTX_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default HTTP bind address.
const DEFAULT_BIND: &str = "127.0.0.1:5000";
/// Default request body limit; fits a maximum-size image in a multipart form.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 12 * 1024 * 1024;
/// Smallest accepted request body limit.
pub(crate) const MIN_MAX_BODY_BYTES: usize = 1024;
/// Largest accepted request body limit.
pub(crate) const MAX_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
/// Default request deadline in milliseconds.
pub(crate) const DEFAULT_REQUEST_DEADLINE_MS: u64 = 10_000;
/// Minimum request deadline in milliseconds.
pub(crate) const MIN_REQUEST_DEADLINE_MS: u64 = 100;
/// Maximum request deadline in milliseconds.
pub(crate) const MAX_REQUEST_DEADLINE_MS: u64 = 120_000;
/// Default per-adapter timeout in milliseconds.
pub(crate) const DEFAULT_ADAPTER_TIMEOUT_MS: u64 = 5_000;
/// Minimum per-adapter timeout in milliseconds.
pub(crate) const MIN_ADAPTER_TIMEOUT_MS: u64 = 10;
/// Maximum per-adapter timeout in milliseconds.
pub(crate) const MAX_ADAPTER_TIMEOUT_MS: u64 = 60_000;
/// Maximum number of configured extra fraud phrases.
pub(crate) const MAX_EXTRA_PHRASES: usize = 512;
/// Maximum length of one configured phrase or list entry.
pub(crate) const MAX_LIST_ENTRY_LENGTH: usize = 256;
/// Default registry cache staleness window (24 hours).
pub(crate) const DEFAULT_CACHE_TTL_MS: u64 = 24 * 60 * 60 * 1000;
/// Maximum registry cache staleness window (7 days).
pub(crate) const MAX_CACHE_TTL_MS: u64 = 7 * 24 * 60 * 60 * 1000;
/// Maximum configured registry advisors.
pub(crate) const MAX_REGISTRY_ADVISORS: usize = 10_000;
/// Default ledger client timeout in milliseconds.
pub(crate) const DEFAULT_LEDGER_TIMEOUT_MS: u64 = 5_000;
/// Default reconciler poll interval in milliseconds.
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
/// Minimum reconciler poll interval in milliseconds.
pub(crate) const MIN_POLL_INTERVAL_MS: u64 = 50;
/// Maximum reconciler poll interval in milliseconds.
pub(crate) const MAX_POLL_INTERVAL_MS: u64 = 60_000;
/// Default outbox capacity.
pub(crate) const DEFAULT_OUTBOX_CAPACITY: usize = 1024;
/// Maximum outbox capacity.
pub(crate) const MAX_OUTBOX_CAPACITY: usize = 65_536;
/// Maximum confirmations the simulated ledger may require.
pub(crate) const MAX_CONFIRMATIONS: u64 = 64;
/// Maximum ledger write attempts per record.
pub(crate) const MAX_LEDGER_ATTEMPTS: u32 = 10;
/// Minimum retry backoff base in milliseconds.
pub(crate) const MIN_BACKOFF_BASE_MS: u64 = 100;
/// Maximum retry backoff base in milliseconds.
pub(crate) const MAX_BACKOFF_BASE_MS: u64 = 3_600_000;
/// Minimum confirmation timeout in milliseconds.
pub(crate) const MIN_CONFIRMATION_TIMEOUT_MS: u64 = 1_000;
/// Maximum confirmation timeout in milliseconds.
pub(crate) const MAX_CONFIRMATION_TIMEOUT_MS: u64 = 86_400_000;
/// Default `SQLite` busy timeout in milliseconds.
pub(crate) const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum `SQLite` busy timeout in milliseconds.
pub(crate) const MAX_STORE_BUSY_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root `trustx.toml` configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustxConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Aggregation weights, thresholds, and recommendations.
    #[serde(default)]
    pub aggregation: AggregationPolicy,
    /// Signal adapter configuration.
    #[serde(default)]
    pub adapters: AdaptersConfig,
    /// Ledger client, reconciler, and retry configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Session and ledger record store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl TrustxConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.aggregation
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("aggregation: {err}")))?;
        self.adapters.validate()?;
        self.ledger.validate()?;
        self.store.validate()?;
        self.audit.validate()
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (`host:port`).
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Deadline for one analysis fan-out in milliseconds.
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            request_deadline_ms: default_request_deadline_ms(),
        }
    }
}

impl ServerConfig {
    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if !(MIN_MAX_BODY_BYTES ..= MAX_MAX_BODY_BYTES).contains(&self.max_body_bytes) {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between {MIN_MAX_BODY_BYTES} and \
                 {MAX_MAX_BODY_BYTES}"
            )));
        }
        validate_timeout_range(
            "server.request_deadline_ms",
            self.request_deadline_ms,
            MIN_REQUEST_DEADLINE_MS,
            MAX_REQUEST_DEADLINE_MS,
        )
    }

    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind)))
    }

    /// Returns the analysis request deadline.
    #[must_use]
    pub const fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

// ============================================================================
// SECTION: Adapters
// ============================================================================

/// Signal adapter configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdaptersConfig {
    /// Outbound HTTP limits shared by page fetches, the HTTP registry, and the oracle.
    #[serde(default)]
    pub http: HttpClientConfig,
    /// Text pattern adapter.
    #[serde(default)]
    pub text: TextAdapterConfig,
    /// URL reputation adapter.
    #[serde(default)]
    pub url: UrlAdapterConfig,
    /// Advisor registry adapter.
    #[serde(default)]
    pub registry: RegistryAdapterConfig,
    /// Image/QR adapter.
    #[serde(default)]
    pub image_qr: ImageQrAdapterConfig,
    /// Announcement adapter.
    #[serde(default)]
    pub announcement: AnnouncementAdapterConfig,
}

impl AdaptersConfig {
    /// Validates adapter configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_range(
            "adapters.http.timeout_ms",
            self.http.timeout_ms,
            MIN_ADAPTER_TIMEOUT_MS,
            MAX_ADAPTER_TIMEOUT_MS,
        )?;
        if self.http.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(
                "adapters.http.max_response_bytes must be greater than zero".to_string(),
            ));
        }
        if let Some(hosts) = &self.http.allowed_hosts {
            validate_list("adapters.http.allowed_hosts", hosts.iter())?;
        }
        self.text.validate()?;
        self.url.validate()?;
        self.registry.validate()?;
        self.image_qr.validate()?;
        validate_adapter_timeout("adapters.announcement", self.announcement.timeout_ms)
    }
}

/// Text pattern adapter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextAdapterConfig {
    /// Register the adapter.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Evaluation budget in milliseconds.
    #[serde(default = "default_adapter_timeout_ms")]
    pub timeout_ms: u64,
    /// Additional fraud phrases matched alongside the built-in list.
    #[serde(default)]
    pub extra_phrases: Vec<String>,
}

impl Default for TextAdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_adapter_timeout_ms(),
            extra_phrases: Vec::new(),
        }
    }
}

impl TextAdapterConfig {
    /// Validates text adapter configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_adapter_timeout("adapters.text", self.timeout_ms)?;
        if self.extra_phrases.len() > MAX_EXTRA_PHRASES {
            return Err(ConfigError::Invalid(format!(
                "adapters.text.extra_phrases exceeds {MAX_EXTRA_PHRASES} entries"
            )));
        }
        validate_list("adapters.text.extra_phrases", self.extra_phrases.iter())
    }
}

/// URL reputation adapter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlAdapterConfig {
    /// Register the adapter.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Evaluation budget in milliseconds.
    #[serde(default = "default_adapter_timeout_ms")]
    pub timeout_ms: u64,
    /// Fetch the page and score its visible text.
    #[serde(default)]
    pub fetch_page: bool,
    /// Top-level domains treated as suspicious, without the leading dot.
    #[serde(default = "default_suspicious_tlds")]
    pub suspicious_tlds: Vec<String>,
    /// Domain length above which a host is flagged.
    #[serde(default = "default_max_domain_len")]
    pub max_domain_len: usize,
}

impl Default for UrlAdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_adapter_timeout_ms(),
            fetch_page: false,
            suspicious_tlds: default_suspicious_tlds(),
            max_domain_len: default_max_domain_len(),
        }
    }
}

impl UrlAdapterConfig {
    /// Validates URL adapter configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_adapter_timeout("adapters.url", self.timeout_ms)?;
        if self.max_domain_len == 0 {
            return Err(ConfigError::Invalid(
                "adapters.url.max_domain_len must be greater than zero".to_string(),
            ));
        }
        validate_list("adapters.url.suspicious_tlds", self.suspicious_tlds.iter())?;
        if self.suspicious_tlds.iter().any(|tld| tld.trim().starts_with('.')) {
            return Err(ConfigError::Invalid(
                "adapters.url.suspicious_tlds entries must omit the leading dot".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the heuristic settings for the adapter.
    #[must_use]
    pub fn reputation_config(&self) -> UrlReputationConfig {
        UrlReputationConfig {
            suspicious_tlds: self
                .suspicious_tlds
                .iter()
                .map(|tld| tld.trim().to_ascii_lowercase())
                .collect(),
            max_domain_len: self.max_domain_len,
            fetch_page: self.fetch_page,
        }
    }
}

/// Registry backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistrySource {
    /// In-process registry from configuration.
    #[default]
    Static,
    /// Remote registry over HTTP.
    Http,
}

/// Advisor registry adapter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryAdapterConfig {
    /// Register the adapter.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Evaluation budget in milliseconds.
    #[serde(default = "default_adapter_timeout_ms")]
    pub timeout_ms: u64,
    /// Registry backend.
    #[serde(default)]
    pub source: RegistrySource,
    /// Base URL of the HTTP registry.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Staleness window for cached lookups in milliseconds.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    /// Seed the static registry with the sample advisors.
    #[serde(default = "default_true")]
    pub include_sample: bool,
    /// Additional registered advisors for the static registry.
    #[serde(default)]
    pub advisors: Vec<RegistryEntry>,
    /// Names on the regulator alert list.
    #[serde(default)]
    pub alert_list: Vec<String>,
}

impl Default for RegistryAdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_adapter_timeout_ms(),
            source: RegistrySource::default(),
            endpoint: None,
            cache_ttl_ms: default_cache_ttl_ms(),
            include_sample: true,
            advisors: Vec::new(),
            alert_list: Vec::new(),
        }
    }
}

impl RegistryAdapterConfig {
    /// Validates registry adapter configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_adapter_timeout("adapters.registry", self.timeout_ms)?;
        validate_timeout_range("adapters.registry.cache_ttl_ms", self.cache_ttl_ms, 0, MAX_CACHE_TTL_MS)?;
        if self.advisors.len() > MAX_REGISTRY_ADVISORS {
            return Err(ConfigError::Invalid(format!(
                "adapters.registry.advisors exceeds {MAX_REGISTRY_ADVISORS} entries"
            )));
        }
        for advisor in &self.advisors {
            if advisor.name.trim().is_empty() || advisor.registration_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "adapters.registry.advisors entries require name and registration_id"
                        .to_string(),
                ));
            }
        }
        validate_list("adapters.registry.alert_list", self.alert_list.iter())?;
        match self.source {
            RegistrySource::Static => {
                if self.endpoint.is_some() {
                    return Err(ConfigError::Invalid(
                        "static adapters.registry must not set endpoint".to_string(),
                    ));
                }
                Ok(())
            }
            RegistrySource::Http => {
                require_endpoint("adapters.registry.endpoint", self.endpoint.as_deref())?;
                Ok(())
            }
        }
    }

    /// Builds the static registry from configuration.
    #[must_use]
    pub fn static_registry(&self) -> StaticRegistry {
        let mut registry =
            if self.include_sample { StaticRegistry::sample() } else { StaticRegistry::default() };
        registry.advisors.extend(self.advisors.iter().cloned());
        registry.alert_list.extend(self.alert_list.iter().map(|name| name.trim().to_string()));
        registry
    }

    /// Returns the parsed HTTP registry endpoint, when configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the endpoint does not parse.
    pub fn endpoint_url(&self) -> Result<Option<Url>, ConfigError> {
        self.endpoint
            .as_deref()
            .map(|endpoint| parse_endpoint("adapters.registry.endpoint", endpoint))
            .transpose()
    }

    /// Returns the cache staleness window.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// Image/QR adapter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageQrAdapterConfig {
    /// Register the adapter.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Evaluation budget in milliseconds.
    #[serde(default = "default_adapter_timeout_ms")]
    pub timeout_ms: u64,
    /// Model oracle endpoint; without it the adapter reports UNAVAILABLE.
    #[serde(default)]
    pub oracle_endpoint: Option<String>,
}

impl Default for ImageQrAdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_adapter_timeout_ms(),
            oracle_endpoint: None,
        }
    }
}

impl ImageQrAdapterConfig {
    /// Validates image/QR adapter configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_adapter_timeout("adapters.image_qr", self.timeout_ms)?;
        self.oracle_url().map(|_| ())
    }

    /// Returns the parsed oracle endpoint, when configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the endpoint does not parse.
    pub fn oracle_url(&self) -> Result<Option<Url>, ConfigError> {
        self.oracle_endpoint
            .as_deref()
            .map(|endpoint| parse_endpoint("adapters.image_qr.oracle_endpoint", endpoint))
            .transpose()
    }
}

/// Announcement adapter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnouncementAdapterConfig {
    /// Register the adapter.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Evaluation budget in milliseconds.
    #[serde(default = "default_adapter_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AnnouncementAdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_adapter_timeout_ms(),
        }
    }
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Ledger backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedgerMode {
    /// In-process simulated ledger.
    #[default]
    Simulated,
    /// Remote ledger service over HTTP.
    Http,
}

/// Ledger client, reconciler, and retry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Ledger backend.
    #[serde(default)]
    pub mode: LedgerMode,
    /// Base URL of the HTTP ledger service.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// HTTP ledger request timeout in milliseconds.
    #[serde(default = "default_ledger_timeout_ms")]
    pub timeout_ms: u64,
    /// Confirmations the simulated ledger requires before an entry is final.
    #[serde(default = "default_confirmations_required")]
    pub confirmations_required: u64,
    /// Reconciler poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Outbox channel capacity.
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
    /// Retry and confirmation policy.
    #[serde(default)]
    pub retry: LedgerPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mode: LedgerMode::default(),
            endpoint: None,
            timeout_ms: default_ledger_timeout_ms(),
            confirmations_required: default_confirmations_required(),
            poll_interval_ms: default_poll_interval_ms(),
            outbox_capacity: default_outbox_capacity(),
            retry: LedgerPolicy::default(),
        }
    }
}

impl LedgerConfig {
    /// Validates ledger configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.mode {
            LedgerMode::Simulated => {
                if self.endpoint.is_some() {
                    return Err(ConfigError::Invalid(
                        "simulated ledger must not set endpoint".to_string(),
                    ));
                }
            }
            LedgerMode::Http => {
                require_endpoint("ledger.endpoint", self.endpoint.as_deref())?;
            }
        }
        validate_timeout_range(
            "ledger.timeout_ms",
            self.timeout_ms,
            MIN_ADAPTER_TIMEOUT_MS,
            MAX_ADAPTER_TIMEOUT_MS,
        )?;
        if !(1 ..= MAX_CONFIRMATIONS).contains(&self.confirmations_required) {
            return Err(ConfigError::Invalid(format!(
                "ledger.confirmations_required must be between 1 and {MAX_CONFIRMATIONS}"
            )));
        }
        validate_timeout_range(
            "ledger.poll_interval_ms",
            self.poll_interval_ms,
            MIN_POLL_INTERVAL_MS,
            MAX_POLL_INTERVAL_MS,
        )?;
        if !(1 ..= MAX_OUTBOX_CAPACITY).contains(&self.outbox_capacity) {
            return Err(ConfigError::Invalid(format!(
                "ledger.outbox_capacity must be between 1 and {MAX_OUTBOX_CAPACITY}"
            )));
        }
        if !(1 ..= MAX_LEDGER_ATTEMPTS).contains(&self.retry.max_attempts) {
            return Err(ConfigError::Invalid(format!(
                "ledger.retry.max_attempts must be between 1 and {MAX_LEDGER_ATTEMPTS}"
            )));
        }
        validate_timeout_range(
            "ledger.retry.backoff_base_ms",
            self.retry.backoff_base_ms,
            MIN_BACKOFF_BASE_MS,
            MAX_BACKOFF_BASE_MS,
        )?;
        validate_timeout_range(
            "ledger.retry.confirmation_timeout_ms",
            self.retry.confirmation_timeout_ms,
            MIN_CONFIRMATION_TIMEOUT_MS,
            MAX_CONFIRMATION_TIMEOUT_MS,
        )
    }

    /// Returns the parsed HTTP ledger endpoint, when configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the endpoint does not parse.
    pub fn endpoint_url(&self) -> Result<Option<Url>, ConfigError> {
        self.endpoint
            .as_deref()
            .map(|endpoint| parse_endpoint("ledger.endpoint", endpoint))
            .transpose()
    }

    /// Returns the reconciler poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory stores.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Session and ledger record store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self
                    .path
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("sqlite store requires path".to_string()))?;
                validate_path_string("store.path", &path.to_string_lossy())?;
                validate_timeout_range(
                    "store.busy_timeout_ms",
                    self.busy_timeout_ms,
                    0,
                    MAX_STORE_BUSY_TIMEOUT_MS,
                )
            }
        }
    }

    /// Returns the `SQLite` configuration when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        if self.store_type != StoreType::Sqlite {
            return None;
        }
        self.path.as_ref().map(|path| SqliteStoreConfig {
            path: path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        })
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a timeout value against bounds.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Validates a per-adapter evaluation budget.
fn validate_adapter_timeout(section: &str, value_ms: u64) -> Result<(), ConfigError> {
    validate_timeout_range(
        &format!("{section}.timeout_ms"),
        value_ms,
        MIN_ADAPTER_TIMEOUT_MS,
        MAX_ADAPTER_TIMEOUT_MS,
    )
}

/// Validates that list entries are non-empty and bounded.
fn validate_list<'a>(field: &str, values: impl Iterator<Item = &'a String>) -> Result<(), ConfigError> {
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid(format!("{field} entries must be non-empty")));
        }
        if trimmed.len() > MAX_LIST_ENTRY_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "{field} entries must be at most {MAX_LIST_ENTRY_LENGTH} bytes"
            )));
        }
    }
    Ok(())
}

/// Requires and parses an endpoint for an HTTP mode.
fn require_endpoint(field: &str, endpoint: Option<&str>) -> Result<Url, ConfigError> {
    let endpoint = endpoint
        .ok_or_else(|| ConfigError::Invalid(format!("{field} is required for http mode")))?;
    parse_endpoint(field, endpoint)
}

/// Parses an absolute `http`/`https` endpoint.
fn parse_endpoint(field: &str, endpoint: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(endpoint.trim())
        .map_err(|err| ConfigError::Invalid(format!("{field} is not a valid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::Invalid(format!("{field} must be an absolute http(s) url")));
    }
    Ok(url)
}

/// Default serde helper for enabled flags.
const fn default_true() -> bool {
    true
}

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default request body limit.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default request deadline.
const fn default_request_deadline_ms() -> u64 {
    DEFAULT_REQUEST_DEADLINE_MS
}

/// Default adapter timeout.
const fn default_adapter_timeout_ms() -> u64 {
    DEFAULT_ADAPTER_TIMEOUT_MS
}

/// Default suspicious TLD list.
fn default_suspicious_tlds() -> Vec<String> {
    UrlReputationConfig::default().suspicious_tlds
}

/// Default long-domain threshold.
fn default_max_domain_len() -> usize {
    UrlReputationConfig::default().max_domain_len
}

/// Default registry cache staleness window.
const fn default_cache_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}

/// Default ledger client timeout.
const fn default_ledger_timeout_ms() -> u64 {
    DEFAULT_LEDGER_TIMEOUT_MS
}

/// Default simulated confirmations.
const fn default_confirmations_required() -> u64 {
    1
}

/// Default reconciler poll interval.
const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Default outbox capacity.
const fn default_outbox_capacity() -> usize {
    DEFAULT_OUTBOX_CAPACITY
}

/// Default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Tests
// ============================================================================
