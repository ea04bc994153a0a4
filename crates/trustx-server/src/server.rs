// crates/trustx-server/src/server.rs
// ============================================================================
// Module: TrustX Server
// Description: Runtime wiring from configuration and the HTTP serve loop.
// Purpose: Build adapters, stores, ledger pieces, and the router from `trustx.toml`.
// Dependencies: trustx-config, trustx-adapters, trustx-ledger, trustx-store-sqlite, axum, tokio
// ============================================================================

//! ## Overview
//! [`TrustxServer::from_config`] validates configuration and assembles every
//! runtime piece explicitly: nothing is global, each store, adapter, and
//! client is owned by the server and injected into the analysis service.
//! [`TrustxServer::serve`] runs the ledger reconciler alongside the HTTP
//! listener and stops both on Ctrl-C.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use trustx_adapters::AdapterRegistry;
use trustx_adapters::AnnouncementAdapter;
use trustx_adapters::CachedRegistry;
use trustx_adapters::HttpFetcher;
use trustx_adapters::HttpModelOracle;
use trustx_adapters::HttpRegistry;
use trustx_adapters::ImageQrAdapter;
use trustx_adapters::ModelOracle;
use trustx_adapters::RegistryAdapter;
use trustx_adapters::RegistryLookup;
use trustx_adapters::SignalFanout;
use trustx_adapters::TextPatternAdapter;
use trustx_adapters::TextPatternAnalyzer;
use trustx_adapters::UrlReputationAdapter;
use trustx_config::AdaptersConfig;
use trustx_config::AuditConfig;
use trustx_config::LedgerConfig;
use trustx_config::LedgerMode;
use trustx_config::RegistrySource;
use trustx_config::StoreConfig;
use trustx_config::StoreType;
use trustx_config::TrustxConfig;
use trustx_core::AggregationEngine;
use trustx_core::InMemoryLedgerStore;
use trustx_core::InMemorySessionStore;
use trustx_core::LedgerClient;
use trustx_core::LedgerGate;
use trustx_core::LedgerWriteRequest;
use trustx_core::SharedLedgerStore;
use trustx_core::SharedSessionStore;
use trustx_core::SignalSource;
use trustx_ledger::ChannelOutbox;
use trustx_ledger::HttpLedgerClient;
use trustx_ledger::HttpLedgerConfig;
use trustx_ledger::LedgerReconciler;
use trustx_ledger::ReconcilerSettings;
use trustx_ledger::SimulatedLedger;
use trustx_ledger::SimulatedLedgerConfig;
use trustx_ledger::system_clock;
use trustx_store_sqlite::SqliteStore;

use crate::audit::AuditLedgerObserver;
use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::routes::AppState;
use crate::routes::router;
use crate::service::AnalysisService;
use crate::service::ServiceGate;
use crate::service::ServiceParts;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Server
// ============================================================================

/// TrustX HTTP server instance.
pub struct TrustxServer {
    /// Validated configuration.
    config: TrustxConfig,
    /// Handler state.
    state: AppState,
    /// Background ledger writer.
    reconciler: LedgerReconciler<SharedLedgerStore, ChannelOutbox>,
    /// Outbox receiver drained by the reconciler.
    receiver: Receiver<LedgerWriteRequest>,
}

impl TrustxServer {
    /// Builds a server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when validation or initialization fails.
    pub fn from_config(config: TrustxConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let engine = AggregationEngine::new(config.aggregation.clone())
            .map_err(|err| ServerError::Config(err.to_string()))?;
        let registry = build_adapter_registry(&config.adapters)?;
        let fanout = SignalFanout::new(Arc::new(registry), config.server.request_deadline());
        let (sessions, ledger_store) = build_stores(&config.store)?;
        let ledger = build_ledger_client(&config.ledger)?;
        let (outbox, receiver) = ChannelOutbox::channel(config.ledger.outbox_capacity);
        let gate: Arc<ServiceGate> = Arc::new(LedgerGate::new(ledger_store, outbox, config.ledger.retry));
        let audit = build_audit_sink(&config.audit)?;
        let reconciler = LedgerReconciler::new(
            Arc::clone(&gate),
            Arc::clone(&ledger),
            ReconcilerSettings {
                poll_interval: config.ledger.poll_interval(),
            },
        )
        .with_observer(Arc::new(AuditLedgerObserver::new(Arc::clone(&audit))));
        let service = AnalysisService::new(ServiceParts {
            fanout,
            engine,
            gate,
            sessions,
            ledger,
            audit,
            clock: system_clock(),
        });
        let state = AppState {
            service,
            metrics: Arc::new(NoopMetrics),
        };
        Ok(Self {
            config,
            state,
            reconciler,
            receiver,
        })
    }

    /// Returns the API router without starting the reconciler.
    #[must_use]
    pub fn app(&self) -> Router {
        router(self.state.clone(), self.config.server.max_body_bytes)
    }

    /// Serves HTTP requests until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr = self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let app = self.app();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reconciler = tokio::spawn(self.reconciler.run(self.receiver, shutdown_rx));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        let served = axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")));
        let _ = shutdown_tx.send(true);
        let _ = reconciler.await;
        served
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds the adapter registry, honoring per-adapter enablement and timeouts.
///
/// # Errors
///
/// Returns [`ServerError`] when an endpoint is missing or a client cannot be built.
pub fn build_adapter_registry(config: &AdaptersConfig) -> Result<AdapterRegistry, ServerError> {
    let analyzer = TextPatternAnalyzer::new(&config.text.extra_phrases);
    let needs_fetcher = config.url.fetch_page
        || config.registry.source == RegistrySource::Http
        || config.image_qr.oracle_endpoint.is_some();
    let fetcher = if needs_fetcher {
        Some(HttpFetcher::new(config.http.clone()).map_err(|err| ServerError::Init(err.to_string()))?)
    } else {
        None
    };

    let mut registry = AdapterRegistry::new();
    registry.register(TextPatternAdapter::new(analyzer.clone()), millis(config.text.timeout_ms));
    registry.register(
        UrlReputationAdapter::new(
            config.url.reputation_config(),
            fetcher.clone().filter(|_| config.url.fetch_page),
            analyzer.clone(),
        ),
        millis(config.url.timeout_ms),
    );

    let lookup: Arc<dyn RegistryLookup + Send + Sync> = match config.registry.source {
        RegistrySource::Static => Arc::new(config.registry.static_registry()),
        RegistrySource::Http => {
            let endpoint = config
                .registry
                .endpoint_url()
                .map_err(|err| ServerError::Config(err.to_string()))?
                .ok_or_else(|| ServerError::Config("http registry requires endpoint".to_string()))?;
            let fetcher = fetcher
                .clone()
                .ok_or_else(|| ServerError::Init("http registry requires a fetcher".to_string()))?;
            Arc::new(CachedRegistry::new(HttpRegistry::new(fetcher, endpoint), config.registry.cache_ttl()))
        }
    };
    registry.register(RegistryAdapter::new(lookup), millis(config.registry.timeout_ms));

    let oracle_url = config.image_qr.oracle_url().map_err(|err| ServerError::Config(err.to_string()))?;
    let oracle = match (oracle_url, fetcher) {
        (Some(endpoint), Some(fetcher)) => {
            let oracle: Arc<dyn ModelOracle + Send + Sync> = Arc::new(HttpModelOracle::new(fetcher, endpoint));
            Some(oracle)
        }
        _ => None,
    };
    registry.register(
        ImageQrAdapter::new(oracle, config.url.reputation_config(), analyzer.clone()),
        millis(config.image_qr.timeout_ms),
    );
    registry.register(AnnouncementAdapter::new(analyzer), millis(config.announcement.timeout_ms));

    let enablement = [
        (SignalSource::TextPattern, config.text.enabled),
        (SignalSource::UrlReputation, config.url.enabled),
        (SignalSource::Registry, config.registry.enabled),
        (SignalSource::ImageQr, config.image_qr.enabled),
        (SignalSource::AnnouncementNlp, config.announcement.enabled),
    ];
    for (source, enabled) in enablement {
        if !enabled {
            registry.disable(source);
        }
    }
    Ok(registry)
}

/// Builds the session and ledger stores.
///
/// # Errors
///
/// Returns [`ServerError`] when the SQLite store cannot be opened.
pub fn build_stores(config: &StoreConfig) -> Result<(SharedSessionStore, SharedLedgerStore), ServerError> {
    match config.store_type {
        StoreType::Memory => Ok((
            SharedSessionStore::from_store(InMemorySessionStore::new()),
            SharedLedgerStore::from_store(InMemoryLedgerStore::new()),
        )),
        StoreType::Sqlite => {
            let sqlite_config = config
                .sqlite_config()
                .ok_or_else(|| ServerError::Config("sqlite store requires path".to_string()))?;
            let store = Arc::new(SqliteStore::open(sqlite_config).map_err(|err| ServerError::Init(err.to_string()))?);
            Ok((SharedSessionStore::new(store.clone()), SharedLedgerStore::new(store)))
        }
    }
}

/// Builds the ledger client.
///
/// # Errors
///
/// Returns [`ServerError`] when the HTTP ledger endpoint is missing or the client fails to build.
pub fn build_ledger_client(config: &LedgerConfig) -> Result<Arc<dyn LedgerClient + Send + Sync>, ServerError> {
    match config.mode {
        LedgerMode::Simulated => Ok(Arc::new(SimulatedLedger::new(SimulatedLedgerConfig {
            confirmations_required: config.confirmations_required,
        }))),
        LedgerMode::Http => {
            let endpoint = config
                .endpoint_url()
                .map_err(|err| ServerError::Config(err.to_string()))?
                .ok_or_else(|| ServerError::Config("http ledger requires endpoint".to_string()))?;
            let mut http_config = HttpLedgerConfig::new(endpoint);
            http_config.timeout_ms = config.timeout_ms;
            let client = HttpLedgerClient::new(http_config).map_err(|err| ServerError::Init(err.to_string()))?;
            Ok(Arc::new(client))
        }
    }
}

/// Builds the audit sink: file when a path is set, stderr otherwise, nothing when disabled.
///
/// # Errors
///
/// Returns [`ServerError::Init`] when the audit file cannot be opened.
pub fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path)).map_err(|err| ServerError::Init(err.to_string()))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Converts configured milliseconds to a duration.
const fn millis(value: u64) -> Duration {
    Duration::from_millis(value)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization failure.
    #[error("init error: {0}")]
    Init(String),
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
