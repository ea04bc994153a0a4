// crates/trustx-adapters/src/url_reputation.rs
// ============================================================================
// Module: URL Reputation Adapter
// Description: Structural URL heuristics with an optional bounded page fetch.
// Purpose: Score phishing and scam landing pages.
// Dependencies: trustx-core, url, crate::{http, text}
// ============================================================================

//! ## Overview
//! Heuristics run on the canonical URL only: cleartext scheme, suspicious
//! top-level domains, very long domains, link shorteners, IP-literal hosts,
//! embedded credentials, and punycode labels. When page fetching is enabled
//! the visible text of the page is scored by the text analyzer as well. A
//! failed fetch is recorded as a detail and never fails the signal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use trustx_core::AdapterError;
use trustx_core::AdapterReport;
use trustx_core::InputKind;
use trustx_core::NormalizedInput;
use trustx_core::SignalAdapter;
use trustx_core::SignalSource;
use url::Host;
use url::Url;

use crate::http::HttpFetcher;
use crate::text::SHORTENER_HOSTS;
use crate::text::TextPatternAnalyzer;
use crate::text::noisy_or;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// URL heuristic settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlReputationConfig {
    /// Top-level domains treated as suspicious, without the leading dot.
    pub suspicious_tlds: Vec<String>,
    /// Domain length above which a host is flagged.
    pub max_domain_len: usize,
    /// Fetch the page and score its text.
    pub fetch_page: bool,
}

impl Default for UrlReputationConfig {
    fn default() -> Self {
        Self {
            suspicious_tlds: ["tk", "ml", "ga", "cf", "click", "download"]
                .iter()
                .map(|tld| (*tld).to_string())
                .collect(),
            max_domain_len: 30,
            fetch_page: false,
        }
    }
}

// ============================================================================
// SECTION: Heuristics
// ============================================================================

/// Weight of cleartext HTTP.
const INSECURE_WEIGHT: f64 = 0.2;
/// Weight of a suspicious TLD.
const TLD_WEIGHT: f64 = 0.4;
/// Weight of an unusually long domain.
const LONG_DOMAIN_WEIGHT: f64 = 0.2;
/// Weight of a link shortener.
const SHORTENER_WEIGHT: f64 = 0.3;
/// Weight of an IP-literal host.
const IP_HOST_WEIGHT: f64 = 0.4;
/// Weight of credentials embedded in the URL.
const CREDENTIALS_WEIGHT: f64 = 0.5;
/// Weight of a punycode label.
const PUNYCODE_WEIGHT: f64 = 0.3;

/// Structural findings for one URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlFindings {
    /// Combined score.
    pub score: f64,
    /// Indicators in check order.
    pub indicators: Vec<String>,
    /// Category weights that fired, aligned with `indicators`.
    weights: Vec<f64>,
}

/// Runs the structural heuristics over a canonical URL.
#[must_use]
pub fn analyze_url(url: &Url, config: &UrlReputationConfig) -> UrlFindings {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let mut weights = Vec::new();
    let mut indicators = Vec::new();
    let mut flag = |matched: bool, weight: f64, indicator: &str| {
        if matched {
            weights.push(weight);
            indicators.push(indicator.to_string());
        }
    };

    let is_ip = matches!(url.host(), Some(Host::Ipv4(_) | Host::Ipv6(_)));
    let tld = host.rsplit('.').next().unwrap_or_default();

    flag(url.scheme() == "http", INSECURE_WEIGHT, "insecure http connection");
    flag(
        !is_ip && config.suspicious_tlds.iter().any(|candidate| candidate == tld),
        TLD_WEIGHT,
        "suspicious top-level domain",
    );
    flag(host.len() > config.max_domain_len, LONG_DOMAIN_WEIGHT, "unusually long domain");
    flag(
        SHORTENER_HOSTS.iter().any(|shortener| host == *shortener),
        SHORTENER_WEIGHT,
        "url shortener",
    );
    flag(is_ip, IP_HOST_WEIGHT, "ip address host");
    flag(
        !url.username().is_empty() || url.password().is_some(),
        CREDENTIALS_WEIGHT,
        "embedded credentials",
    );
    flag(host.split('.').any(|label| label.starts_with("xn--")), PUNYCODE_WEIGHT, "punycode domain");

    UrlFindings {
        score: noisy_or(&weights),
        indicators,
        weights,
    }
}

/// Strips tags, scripts, and styles from HTML, returning visible text.
#[must_use]
pub fn visible_text(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len() / 2);
    let mut cursor = 0usize;
    while let Some(offset) = lower[cursor ..].find('<') {
        let start = cursor + offset;
        out.push_str(&html[cursor .. start]);
        out.push(' ');
        let skip_to = ["script", "style"]
            .iter()
            .find(|tag| lower[start + 1 ..].starts_with(**tag))
            .and_then(|tag| lower[start ..].find(&format!("</{tag}")).map(|end| start + end));
        let from = skip_to.unwrap_or(start);
        match lower[from ..].find('>') {
            Some(close) => cursor = from + close + 1,
            None => {
                cursor = html.len();
                break;
            }
        }
    }
    if cursor < html.len() {
        out.push_str(&html[cursor ..]);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// URL reputation signal adapter.
#[derive(Debug, Clone, Default)]
pub struct UrlReputationAdapter {
    /// Heuristic settings.
    config: UrlReputationConfig,
    /// Page fetcher, present when fetching is enabled.
    fetcher: Option<HttpFetcher>,
    /// Analyzer for page text.
    analyzer: TextPatternAnalyzer,
}

impl UrlReputationAdapter {
    /// Creates an adapter. `fetcher` is used only when `config.fetch_page` is set.
    #[must_use]
    pub const fn new(
        config: UrlReputationConfig,
        fetcher: Option<HttpFetcher>,
        analyzer: TextPatternAnalyzer,
    ) -> Self {
        Self {
            config,
            fetcher,
            analyzer,
        }
    }

    /// Fetches the page and scores its visible text.
    fn page_findings(&self, url: &Url) -> Result<Option<(f64, usize)>, AdapterError> {
        let Some(fetcher) = self.fetcher.as_ref().filter(|_| self.config.fetch_page) else {
            return Ok(None);
        };
        let page = fetcher.get(url)?;
        if !(200 .. 300).contains(&page.status) {
            return Err(AdapterError::Unavailable(format!("page returned status {}", page.status)));
        }
        let text = visible_text(&String::from_utf8_lossy(&page.body));
        let findings = self.analyzer.analyze(&text);
        Ok(Some((findings.score, findings.phrase_matches)))
    }
}

impl SignalAdapter for UrlReputationAdapter {
    fn source(&self) -> SignalSource {
        SignalSource::UrlReputation
    }

    fn supports(&self, kind: InputKind) -> bool {
        kind == InputKind::Url
    }

    fn evaluate(&self, input: &NormalizedInput) -> Result<AdapterReport, AdapterError> {
        let NormalizedInput::Url {
            url,
        } = input
        else {
            return Err(AdapterError::Unsupported(input.kind()));
        };
        let mut findings = analyze_url(url, &self.config);
        let mut details = vec![("host", url.host_str().unwrap_or_default().to_string())];

        match self.page_findings(url) {
            Ok(Some((score, phrases))) => {
                details.push(("page_fetch", "ok".to_string()));
                details.push(("page_phrase_matches", phrases.to_string()));
                if score > 0.0 {
                    findings.weights.push(score);
                    findings.indicators.push("suspicious page content".to_string());
                    findings.score = noisy_or(&findings.weights);
                }
            }
            Ok(None) => {}
            Err(err) => details.push(("page_fetch", format!("failed: {err}"))),
        }

        let mut report = AdapterReport::new(findings.score, findings.indicators);
        for (key, value) in details {
            report = report.with_detail(key, value);
        }
        Ok(report)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
