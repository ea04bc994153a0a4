// crates/trustx-adapters/src/registry.rs
// ============================================================================
// Module: Adapter Registry
// Description: Registry of signal adapters keyed by source.
// Purpose: Resolve the adapters and time budgets that apply to an input kind.
// Dependencies: trustx-core
// ============================================================================

//! ## Overview
//! The adapter registry holds at most one adapter per [`SignalSource`] with
//! its own time budget, plus an access policy that can disable sources
//! without unregistering them. Resolution order is the canonical source
//! order so fan-out results are stable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use trustx_core::InputKind;
use trustx_core::SignalAdapter;
use trustx_core::SignalSource;

use crate::advisor::RegistryAdapter;
use crate::advisor::StaticRegistry;
use crate::announcement::AnnouncementAdapter;
use crate::media::ImageQrAdapter;
use crate::text::TextPatternAdapter;
use crate::text::TextPatternAnalyzer;
use crate::url_reputation::UrlReputationAdapter;
use crate::url_reputation::UrlReputationConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-adapter time budget.
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Shared adapter handle.
pub type SharedAdapter = Arc<dyn SignalAdapter + Send + Sync>;

/// One registered adapter.
#[derive(Clone)]
pub struct AdapterSlot {
    /// Source the adapter reports as.
    pub source: SignalSource,
    /// Adapter implementation.
    pub adapter: SharedAdapter,
    /// Time budget for one evaluation.
    pub timeout: Duration,
}

/// Signal adapter registry.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    /// Adapters keyed by source.
    slots: BTreeMap<SignalSource, AdapterSlot>,
    /// Sources disabled by policy.
    disabled: BTreeSet<SignalSource>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every reference adapter using offline defaults:
    /// no page fetching, the sample static registry, and no model oracle.
    #[must_use]
    pub fn with_reference_adapters() -> Self {
        let analyzer = TextPatternAnalyzer::default();
        let mut registry = Self::new();
        registry.register(TextPatternAdapter::new(analyzer.clone()), DEFAULT_ADAPTER_TIMEOUT);
        registry.register(
            UrlReputationAdapter::new(UrlReputationConfig::default(), None, analyzer.clone()),
            DEFAULT_ADAPTER_TIMEOUT,
        );
        registry.register(
            RegistryAdapter::new(Arc::new(StaticRegistry::sample())),
            DEFAULT_ADAPTER_TIMEOUT,
        );
        registry.register(
            ImageQrAdapter::new(None, UrlReputationConfig::default(), analyzer.clone()),
            DEFAULT_ADAPTER_TIMEOUT,
        );
        registry.register(AnnouncementAdapter::new(analyzer), DEFAULT_ADAPTER_TIMEOUT);
        registry
    }

    /// Registers an adapter, replacing any adapter for the same source.
    pub fn register(&mut self, adapter: impl SignalAdapter + Send + Sync + 'static, timeout: Duration) {
        self.register_shared(Arc::new(adapter), timeout);
    }

    /// Registers a shared adapter, replacing any adapter for the same source.
    pub fn register_shared(&mut self, adapter: SharedAdapter, timeout: Duration) {
        let source = adapter.source();
        self.slots.insert(
            source,
            AdapterSlot {
                source,
                adapter,
                timeout,
            },
        );
    }

    /// Disables a source without removing its adapter.
    pub fn disable(&mut self, source: SignalSource) {
        self.disabled.insert(source);
    }

    /// Returns true when a source is registered and enabled.
    #[must_use]
    pub fn is_enabled(&self, source: SignalSource) -> bool {
        self.slots.contains_key(&source) && !self.disabled.contains(&source)
    }

    /// Returns the enabled adapters that support `kind`, in source order.
    #[must_use]
    pub fn for_kind(&self, kind: InputKind) -> Vec<AdapterSlot> {
        self.slots
            .values()
            .filter(|slot| !self.disabled.contains(&slot.source) && slot.adapter.supports(kind))
            .cloned()
            .collect()
    }

    /// Returns the registered sources in order.
    #[must_use]
    pub fn sources(&self) -> Vec<SignalSource> {
        self.slots.keys().copied().collect()
    }
}
