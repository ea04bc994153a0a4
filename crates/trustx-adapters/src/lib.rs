// crates/trustx-adapters/src/lib.rs
// ============================================================================
// Module: TrustX Adapters
// Description: Reference signal adapters and concurrent fan-out.
// Purpose: Produce fraud signals for every supported input kind.
// Dependencies: trustx-core, reqwest, tokio
// ============================================================================

//! ## Overview
//! This crate provides the reference [`trustx_core::SignalAdapter`]
//! implementations (text patterns, URL reputation, advisor registry,
//! announcements, image/QR via a model oracle), an [`AdapterRegistry`] that
//! resolves adapters per input kind, and [`SignalFanout`] which runs them
//! concurrently under per-adapter budgets and a request deadline.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod advisor;
pub mod announcement;
pub mod fanout;
pub mod http;
pub mod media;
pub mod registry;
pub mod text;
pub mod url_reputation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use advisor::CachedRegistry;
pub use advisor::HttpRegistry;
pub use advisor::RegistrationStatus;
pub use advisor::RegistryAdapter;
pub use advisor::RegistryEntry;
pub use advisor::RegistryLookup;
pub use advisor::RegistryMatch;
pub use advisor::StaticRegistry;
pub use announcement::AnnouncementAdapter;
pub use fanout::DEFAULT_REQUEST_DEADLINE;
pub use fanout::SignalFanout;
pub use fanout::into_signal;
pub use http::FetchedBody;
pub use http::HttpClientConfig;
pub use http::HttpFetcher;
pub use media::HttpModelOracle;
pub use media::ImageQrAdapter;
pub use media::ModelOracle;
pub use media::OracleVerdict;
pub use registry::AdapterRegistry;
pub use registry::AdapterSlot;
pub use registry::DEFAULT_ADAPTER_TIMEOUT;
pub use registry::SharedAdapter;
pub use text::TextFindings;
pub use text::TextPatternAdapter;
pub use text::TextPatternAnalyzer;
pub use url_reputation::UrlFindings;
pub use url_reputation::UrlReputationAdapter;
pub use url_reputation::UrlReputationConfig;
pub use url_reputation::analyze_url;
