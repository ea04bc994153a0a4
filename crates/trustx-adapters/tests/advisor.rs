// crates/trustx-adapters/tests/advisor.rs
// ============================================================================
// Module: Registry Adapter Tests
// Description: Advisor registry lookups, caching, and risk mapping tests.
// Purpose: Validate status-to-risk mapping across static and HTTP registries.
// Dependencies: trustx-adapters, trustx-core, tiny_http, time
// ============================================================================
//! ## Overview
//! Registered active advisors must score low with no indicators; suspended,
//! cancelled, unknown, and alert-listed names score progressively higher.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use time::Date;
use time::Month;
use trustx_adapters::CachedRegistry;
use trustx_adapters::HttpRegistry;
use trustx_adapters::RegistrationStatus;
use trustx_adapters::RegistryAdapter;
use trustx_adapters::RegistryEntry;
use trustx_adapters::RegistryLookup;
use trustx_adapters::RegistryMatch;
use trustx_adapters::StaticRegistry;
use trustx_core::AdapterError;
use trustx_core::AdapterReport;
use trustx_core::SignalAdapter;
use url::Url;

use crate::common::advisor;
use crate::common::local_fetcher;
use crate::common::spawn_server;

fn today() -> Date {
    Date::from_calendar_date(2026, Month::March, 1).unwrap()
}

fn adapter(registry: StaticRegistry) -> RegistryAdapter {
    RegistryAdapter::new(Arc::new(registry)).with_reference_date(today())
}

fn status(report: &AdapterReport) -> &str {
    report.details.get("registration_status").map(String::as_str).unwrap()
}

/// Verifies an active long-standing registration scores low with no indicators.
#[test]
fn active_advisor_scores_low() {
    let report = adapter(StaticRegistry::sample())
        .evaluate(&advisor("Wealth Advisory Services", Some("INA000005678")))
        .unwrap();
    assert!((report.score - 0.1).abs() < 1e-9);
    assert!(report.indicators.is_empty());
    assert_eq!(status(&report), "ACTIVE");
    assert_eq!(report.details.get("location").map(String::as_str), Some("Delhi"));
}

/// Verifies lookups fall back to a fuzzy name match without an id.
#[test]
fn name_lookup_is_case_and_punctuation_insensitive() {
    let report = adapter(StaticRegistry::sample())
        .evaluate(&advisor("certified financial planner", None))
        .unwrap();
    assert_eq!(status(&report), "ACTIVE");
    assert_eq!(
        report.details.get("registration_id").map(String::as_str),
        Some("INA000001234")
    );
}

/// Verifies a mismatched registration id is flagged.
#[test]
fn mismatched_registration_id_is_flagged() {
    let report = adapter(StaticRegistry::sample())
        .evaluate(&advisor("Wealth Advisory Services", Some("INA999999999")))
        .unwrap();
    assert_eq!(report.indicators, vec!["registration id mismatch"]);
    assert!(report.score > 0.7);
}

/// Verifies suspended, cancelled, and recent registrations map to their indicators.
#[test]
fn registration_states_map_to_risk() {
    let entry = |name: &str, id: &str, status, registered_on: &str| RegistryEntry {
        name: name.to_string(),
        registration_id: id.to_string(),
        status,
        registered_on: Some(registered_on.to_string()),
        location: None,
    };
    let registry = StaticRegistry {
        advisors: vec![
            entry("Alpha Capital", "INA1", RegistrationStatus::Suspended, "2015-01-01"),
            entry("Beta Wealth", "INA2", RegistrationStatus::Cancelled, "2015-01-01"),
            entry("Gamma Advisors", "INA3", RegistrationStatus::Active, "2025-12-01"),
        ],
        alert_list: Vec::new(),
    };
    let adapter = adapter(registry);

    let suspended = adapter.evaluate(&advisor("Alpha Capital", Some("INA1"))).unwrap();
    assert_eq!(suspended.indicators, vec!["advisor registration suspended"]);
    assert!((suspended.score - 0.8).abs() < 1e-9);

    let cancelled = adapter.evaluate(&advisor("Beta Wealth", Some("INA2"))).unwrap();
    assert_eq!(cancelled.indicators, vec!["advisor registration cancelled"]);
    assert_eq!(status(&cancelled), "CANCELLED");

    let recent = adapter.evaluate(&advisor("Gamma Advisors", Some("INA3"))).unwrap();
    assert_eq!(recent.indicators, vec!["recently registered advisor"]);
    assert!(recent.score > 0.1 && recent.score < 0.4);
}

/// Verifies unregistered names score medium and suspicious names higher.
#[test]
fn unregistered_advisors_are_flagged() {
    let adapter = adapter(StaticRegistry::sample());

    let unknown = adapter.evaluate(&advisor("Rahul Sharma", None)).unwrap();
    assert_eq!(unknown.indicators, vec!["advisor not found in registry"]);
    assert!((unknown.score - 0.6).abs() < 1e-9);
    assert_eq!(status(&unknown), "NOT_FOUND");

    let suspicious = adapter.evaluate(&advisor("Guaranteed Profit Guru 9876543210", None)).unwrap();
    assert_eq!(
        suspicious.indicators,
        vec![
            "advisor not found in registry",
            "suspicious advisor name",
            "phone number in advisor name"
        ]
    );
    assert!(suspicious.score > 0.7);
}

/// Verifies alert-listed names are flagged regardless of registration.
#[test]
fn alert_listed_entity_scores_highest() {
    let mut registry = StaticRegistry::sample();
    registry.alert_list.push("Quick Rich Advisory".to_string());
    let report = adapter(registry).evaluate(&advisor("quick  rich advisory", None)).unwrap();
    assert_eq!(report.indicators, vec!["entity on regulator alert list"]);
    assert!((report.score - 0.95).abs() < 1e-9);
}

/// Verifies the HTTP registry sends name and id as query parameters.
#[test]
fn http_registry_queries_by_name_and_id() {
    let body = r#"{"entry":{"name":"Remote Advisors","registration_id":"INA000042","status":"SUSPENDED"},"flagged":false}"#;
    let (base, handle) = spawn_server(body, 200, "application/json");
    let registry = HttpRegistry::new(local_fetcher(), Url::parse(&base).unwrap());

    let answer = registry.lookup("Remote Advisors", Some("INA000042")).unwrap();
    let captured = handle.join().unwrap().unwrap();

    assert_eq!(captured.url, "/advisors?name=Remote+Advisors&registration_id=INA000042");
    assert_eq!(answer.entry.unwrap().status, RegistrationStatus::Suspended);
}

/// Verifies upstream failures surface as unavailable.
#[test]
fn http_registry_failure_is_unavailable() {
    let (base, handle) = spawn_server("down", 503, "text/plain");
    let registry = HttpRegistry::new(local_fetcher(), Url::parse(&base).unwrap());
    let result = registry.lookup("Anyone", None);
    handle.join().unwrap();
    assert!(matches!(result, Err(AdapterError::Unavailable(_))));
}

struct CountingRegistry {
    calls: AtomicUsize,
    fail: bool,
}

impl RegistryLookup for CountingRegistry {
    fn lookup(&self, _name: &str, _id: Option<&str>) -> Result<RegistryMatch, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AdapterError::Unavailable("offline".to_string()));
        }
        Ok(RegistryMatch::default())
    }
}

/// Verifies the cache serves repeat lookups and never caches failures.
#[test]
fn cache_serves_repeats_and_skips_failures() {
    let cached = CachedRegistry::new(
        CountingRegistry {
            calls: AtomicUsize::new(0),
            fail: false,
        },
        Duration::from_secs(3600),
    );
    cached.lookup("Rahul Sharma", None).unwrap();
    cached.lookup("RAHUL  sharma", None).unwrap();
    cached.lookup("Rahul Sharma", Some("ina1")).unwrap();
    assert_eq!(cached.len(), 2);
    assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);

    let failing = CachedRegistry::new(
        CountingRegistry {
            calls: AtomicUsize::new(0),
            fail: true,
        },
        Duration::from_secs(3600),
    );
    assert!(failing.lookup("x", None).is_err());
    assert!(failing.lookup("x", None).is_err());
    assert!(failing.is_empty());
    assert_eq!(failing.inner().calls.load(Ordering::SeqCst), 2);
}

/// Verifies an expired entry is fetched again.
#[test]
fn cache_entries_expire() {
    let cached = CachedRegistry::new(
        CountingRegistry {
            calls: AtomicUsize::new(0),
            fail: false,
        },
        Duration::ZERO,
    );
    cached.lookup("a b", None).unwrap();
    cached.lookup("a b", None).unwrap();
    assert!(cached.is_empty());
    assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
}
