// crates/trustx-adapters/src/advisor.rs
// ============================================================================
// Module: Advisor Registry Adapter
// Description: Registry lookups for investment advisors and risk mapping.
// Purpose: Turn registration status and alert-list hits into risk signals.
// Dependencies: trustx-core, time, url, crate::{http, text}
// ============================================================================

//! ## Overview
//! A [`RegistryLookup`] answers "is this advisor registered, and is the name
//! on the regulator alert list". Three sources are provided: a static
//! registry seeded from configuration, an HTTP registry, and a TTL cache that
//! wraps either. [`RegistryAdapter`] maps the answer to a risk score; the
//! registry speaks in credibility, so risk is its complement.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use time::Date;
use time::Month;
use time::OffsetDateTime;
use trustx_core::AdapterError;
use trustx_core::AdapterReport;
use trustx_core::InputKind;
use trustx_core::NormalizedInput;
use trustx_core::SignalAdapter;
use trustx_core::SignalSource;
use url::Url;

use crate::http::HttpFetcher;
use crate::text::noisy_or;

// ============================================================================
// SECTION: Registry Types
// ============================================================================

/// Registration status reported by a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    /// Registration is active.
    Active,
    /// Registration is suspended.
    Suspended,
    /// Registration is cancelled.
    Cancelled,
    /// No registration exists.
    NotFound,
}

impl RegistrationStatus {
    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Cancelled => "CANCELLED",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

/// One registered advisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Registered name.
    pub name: String,
    /// Registration identifier.
    pub registration_id: String,
    /// Registration status.
    pub status: RegistrationStatus,
    /// Registration date as `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_on: Option<String>,
    /// Registered location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Answer to a registry lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMatch {
    /// Matching entry, if any.
    #[serde(default)]
    pub entry: Option<RegistryEntry>,
    /// True when the name is on the regulator alert list.
    #[serde(default)]
    pub flagged: bool,
}

/// Advisor registry source.
pub trait RegistryLookup {
    /// Looks up an advisor by registration id, falling back to name.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the registry cannot answer.
    fn lookup(&self, name: &str, registration_id: Option<&str>)
    -> Result<RegistryMatch, AdapterError>;
}

// ============================================================================
// SECTION: Static Registry
// ============================================================================

/// In-process registry with an alert list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticRegistry {
    /// Registered advisors.
    pub advisors: Vec<RegistryEntry>,
    /// Names on the regulator alert list.
    pub alert_list: Vec<String>,
}

impl StaticRegistry {
    /// Returns a registry seeded with sample advisors.
    #[must_use]
    pub fn sample() -> Self {
        Self {
            advisors: vec![
                RegistryEntry {
                    name: "Certified Financial Planner Ltd".to_string(),
                    registration_id: "INA000001234".to_string(),
                    status: RegistrationStatus::Active,
                    registered_on: Some("2020-01-15".to_string()),
                    location: Some("Mumbai".to_string()),
                },
                RegistryEntry {
                    name: "Wealth Advisory Services".to_string(),
                    registration_id: "INA000005678".to_string(),
                    status: RegistrationStatus::Active,
                    registered_on: Some("2019-06-10".to_string()),
                    location: Some("Delhi".to_string()),
                },
            ],
            alert_list: Vec::new(),
        }
    }
}

impl RegistryLookup for StaticRegistry {
    fn lookup(
        &self,
        name: &str,
        registration_id: Option<&str>,
    ) -> Result<RegistryMatch, AdapterError> {
        let wanted = fold_name(name);
        let by_id = registration_id.and_then(|id| {
            self.advisors.iter().find(|entry| entry.registration_id.eq_ignore_ascii_case(id))
        });
        let entry = by_id.or_else(|| {
            self.advisors.iter().find(|entry| {
                let known = fold_name(&entry.name);
                !wanted.is_empty() && (known.contains(&wanted) || wanted.contains(&known))
            })
        });
        let flagged = self.alert_list.iter().any(|flagged| fold_name(flagged) == wanted);
        Ok(RegistryMatch {
            entry: entry.cloned(),
            flagged,
        })
    }
}

/// Lowercases a name and collapses it to alphanumeric words.
fn fold_name(name: &str) -> String {
    name.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// SECTION: HTTP Registry
// ============================================================================

/// Registry reached over HTTP: `GET {base}/advisors?name=..&registration_id=..`
/// returning a [`RegistryMatch`] JSON body.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    /// Bounded client.
    fetcher: HttpFetcher,
    /// Base endpoint.
    base_url: Url,
}

impl HttpRegistry {
    /// Creates an HTTP registry.
    #[must_use]
    pub const fn new(fetcher: HttpFetcher, base_url: Url) -> Self {
        Self {
            fetcher,
            base_url,
        }
    }
}

impl RegistryLookup for HttpRegistry {
    fn lookup(
        &self,
        name: &str,
        registration_id: Option<&str>,
    ) -> Result<RegistryMatch, AdapterError> {
        let mut url = self
            .base_url
            .join("advisors")
            .map_err(|_| AdapterError::Failed("invalid registry endpoint".to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("name", name);
            if let Some(id) = registration_id {
                query.append_pair("registration_id", id);
            }
        }
        self.fetcher.get_json(&url)
    }
}

// ============================================================================
// SECTION: Cached Registry
// ============================================================================

/// TTL cache in front of another registry. Failures are not cached.
pub struct CachedRegistry<R> {
    /// Wrapped registry.
    inner: R,
    /// Entry lifetime.
    ttl: Duration,
    /// Cached answers keyed by folded id and name.
    cache: Mutex<BTreeMap<String, (Instant, RegistryMatch)>>,
}

impl<R> CachedRegistry<R> {
    /// Wraps `inner` with a cache of the given lifetime.
    #[must_use]
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the wrapped registry.
    #[must_use]
    pub const fn inner(&self) -> &R {
        &self.inner
    }

    /// Returns the number of live cache entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .map(|cache| cache.values().filter(|(at, _)| at.elapsed() < self.ttl).count())
            .unwrap_or(0)
    }

    /// Returns true when no live entries are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: RegistryLookup> RegistryLookup for CachedRegistry<R> {
    fn lookup(
        &self,
        name: &str,
        registration_id: Option<&str>,
    ) -> Result<RegistryMatch, AdapterError> {
        let key = format!("{}|{}", registration_id.unwrap_or_default().to_uppercase(), fold_name(name));
        {
            let cache = self
                .cache
                .lock()
                .map_err(|_| AdapterError::Failed("registry cache mutex poisoned".to_string()))?;
            if let Some((at, answer)) = cache.get(&key)
                && at.elapsed() < self.ttl
            {
                return Ok(answer.clone());
            }
        }
        let answer = self.inner.lookup(name, registration_id)?;
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| AdapterError::Failed("registry cache mutex poisoned".to_string()))?;
        cache.retain(|_, (at, _)| at.elapsed() < self.ttl);
        cache.insert(key, (Instant::now(), answer.clone()));
        Ok(answer)
    }
}

// ============================================================================
// SECTION: Risk Mapping
// ============================================================================

/// Words that make an unregistered advisor name suspicious.
const SUSPICIOUS_NAME_WORDS: &[&str] = &[
    "guaranteed",
    "guarantee",
    "assured",
    "profit",
    "profits",
    "returns",
    "tips",
    "jackpot",
    "multibagger",
    "sureshot",
    "guru",
];

/// Days below which a registration counts as recent.
const RECENT_REGISTRATION_DAYS: i64 = 365;

/// Maps a registry answer to a report.
fn assess(
    name: &str,
    registration_id: Option<&str>,
    answer: &RegistryMatch,
    today: Date,
) -> AdapterReport {
    if answer.flagged {
        return AdapterReport::new(0.95, vec!["entity on regulator alert list".to_string()])
            .with_detail("registration_status", "FLAGGED");
    }
    let Some(entry) = &answer.entry else {
        return assess_unregistered(name);
    };

    let mut weights = Vec::new();
    let mut indicators = Vec::new();
    let base = match entry.status {
        RegistrationStatus::Active => 0.1,
        RegistrationStatus::Suspended => {
            indicators.push("advisor registration suspended".to_string());
            0.8
        }
        RegistrationStatus::Cancelled => {
            indicators.push("advisor registration cancelled".to_string());
            0.85
        }
        RegistrationStatus::NotFound => return assess_unregistered(name),
    };
    weights.push(base);
    if let Some(id) = registration_id
        && !entry.registration_id.eq_ignore_ascii_case(id)
    {
        weights.push(0.7);
        indicators.push("registration id mismatch".to_string());
    }
    let registered = entry.registered_on.as_deref().and_then(parse_date);
    if entry.status == RegistrationStatus::Active
        && let Some(registered) = registered
        && (today - registered).whole_days() < RECENT_REGISTRATION_DAYS
    {
        weights.push(0.2);
        indicators.push("recently registered advisor".to_string());
    }

    let mut report = AdapterReport::new(noisy_or(&weights), indicators)
        .with_detail("registration_status", entry.status.as_str())
        .with_detail("registration_id", entry.registration_id.clone())
        .with_detail("registered_name", entry.name.clone());
    if let Some(date) = &entry.registered_on {
        report = report.with_detail("registered_on", date.clone());
    }
    if let Some(location) = &entry.location {
        report = report.with_detail("location", location.clone());
    }
    report
}

/// Scores an advisor with no registration.
fn assess_unregistered(name: &str) -> AdapterReport {
    let folded = fold_name(name);
    let words: Vec<&str> = folded.split(' ').filter(|word| !word.is_empty()).collect();
    let mut weights = vec![0.6];
    let mut indicators = vec!["advisor not found in registry".to_string()];
    if words.iter().any(|word| SUSPICIOUS_NAME_WORDS.contains(word)) {
        weights.push(0.4);
        indicators.push("suspicious advisor name".to_string());
    }
    if name.chars().filter(char::is_ascii_digit).count() >= 10 {
        weights.push(0.3);
        indicators.push("phone number in advisor name".to_string());
    }
    if words.len() < 2 {
        weights.push(0.1);
        indicators.push("incomplete advisor name".to_string());
    }
    AdapterReport::new(noisy_or(&weights), indicators)
        .with_detail("registration_status", RegistrationStatus::NotFound.as_str())
}

/// Parses `YYYY-MM-DD`.
fn parse_date(value: &str) -> Option<Date> {
    let mut parts = value.trim().splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = Month::try_from(parts.next()?.parse::<u8>().ok()?).ok()?;
    let day = parts.next()?.parse::<u8>().ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Registry verification signal adapter.
#[derive(Clone)]
pub struct RegistryAdapter {
    /// Registry source.
    registry: Arc<dyn RegistryLookup + Send + Sync>,
    /// Fixed reference date; the current UTC date when unset.
    reference_date: Option<Date>,
}

impl RegistryAdapter {
    /// Creates a registry adapter.
    #[must_use]
    pub fn new(registry: Arc<dyn RegistryLookup + Send + Sync>) -> Self {
        Self {
            registry,
            reference_date: None,
        }
    }

    /// Pins the date used for recent-registration checks.
    #[must_use]
    pub const fn with_reference_date(mut self, date: Date) -> Self {
        self.reference_date = Some(date);
        self
    }
}

impl SignalAdapter for RegistryAdapter {
    fn source(&self) -> SignalSource {
        SignalSource::Registry
    }

    fn supports(&self, kind: InputKind) -> bool {
        kind == InputKind::Advisor
    }

    fn evaluate(&self, input: &NormalizedInput) -> Result<AdapterReport, AdapterError> {
        let NormalizedInput::Advisor {
            name,
            registration_id,
        } = input
        else {
            return Err(AdapterError::Unsupported(input.kind()));
        };
        let answer = self.registry.lookup(name, registration_id.as_deref())?;
        let today = self.reference_date.unwrap_or_else(|| OffsetDateTime::now_utc().date());
        Ok(assess(name, registration_id.as_deref(), &answer, today))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
