// crates/trustx-adapters/src/media.rs
// ============================================================================
// Module: Image and QR Adapter
// Description: Model-oracle scoring for images and QR codes.
// Purpose: Score screenshots and QR payloads, re-checking decoded links.
// Dependencies: base64, trustx-core, url, crate::{http, text, url_reputation}
// ============================================================================

//! ## Overview
//! Image content is scored by an external model oracle. For QR codes the
//! oracle may also return the decoded payload; a decoded URL is run through
//! the URL heuristics and decoded text through the text analyzer, and the
//! higher risk wins. Without an oracle the adapter reports unavailable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde::Serialize;
use trustx_core::AdapterError;
use trustx_core::AdapterReport;
use trustx_core::InputKind;
use trustx_core::NormalizedInput;
use trustx_core::SignalAdapter;
use trustx_core::SignalSource;
use url::Url;

use crate::http::HttpFetcher;
use crate::text::TextPatternAnalyzer;
use crate::url_reputation::UrlReputationConfig;
use crate::url_reputation::analyze_url;

// ============================================================================
// SECTION: Model Oracle
// ============================================================================

/// Oracle answer for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleVerdict {
    /// Risk score in `[0, 1]`.
    pub score: f64,
    /// Findings reported by the model.
    #[serde(default)]
    pub indicators: Vec<String>,
    /// Decoded QR payload, when the image is a QR code.
    #[serde(default)]
    pub decoded_text: Option<String>,
}

/// External image classifier.
pub trait ModelOracle {
    /// Scores image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the oracle cannot answer.
    fn score(
        &self,
        kind: InputKind,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<OracleVerdict, AdapterError>;
}

/// Request body sent to an HTTP oracle.
#[derive(Debug, Serialize)]
struct OracleRequest<'a> {
    /// Input kind label.
    kind: &'static str,
    /// Declared content type.
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    /// Base64-encoded image bytes.
    data_base64: String,
}

/// Model oracle reached with a JSON POST.
#[derive(Debug, Clone)]
pub struct HttpModelOracle {
    /// Bounded client.
    fetcher: HttpFetcher,
    /// Scoring endpoint.
    endpoint: Url,
}

impl HttpModelOracle {
    /// Creates an HTTP oracle.
    #[must_use]
    pub const fn new(fetcher: HttpFetcher, endpoint: Url) -> Self {
        Self {
            fetcher,
            endpoint,
        }
    }
}

impl ModelOracle for HttpModelOracle {
    fn score(
        &self,
        kind: InputKind,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<OracleVerdict, AdapterError> {
        let request = OracleRequest {
            kind: kind.as_str(),
            content_type,
            data_base64: STANDARD.encode(data),
        };
        self.fetcher.post_json(&self.endpoint, &request)
    }
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Image and QR signal adapter.
#[derive(Clone, Default)]
pub struct ImageQrAdapter {
    /// Oracle, when configured.
    oracle: Option<Arc<dyn ModelOracle + Send + Sync>>,
    /// URL heuristics for decoded links.
    url_config: UrlReputationConfig,
    /// Analyzer for decoded text.
    analyzer: TextPatternAnalyzer,
}

impl ImageQrAdapter {
    /// Creates an adapter.
    #[must_use]
    pub fn new(
        oracle: Option<Arc<dyn ModelOracle + Send + Sync>>,
        url_config: UrlReputationConfig,
        analyzer: TextPatternAnalyzer,
    ) -> Self {
        Self {
            oracle,
            url_config,
            analyzer,
        }
    }

    /// Scores a decoded payload, returning `(score, indicators, decoded url)`.
    fn decoded_findings(&self, decoded: &str) -> (f64, Vec<String>, Option<String>) {
        let trimmed = decoded.trim();
        if let Ok(url) = Url::parse(trimmed)
            && matches!(url.scheme(), "http" | "https")
            && url.host_str().is_some()
        {
            let findings = analyze_url(&url, &self.url_config);
            return (findings.score, findings.indicators, Some(url.to_string()));
        }
        let findings = self.analyzer.analyze(trimmed);
        (findings.score, findings.indicators, None)
    }
}

impl SignalAdapter for ImageQrAdapter {
    fn source(&self) -> SignalSource {
        SignalSource::ImageQr
    }

    fn supports(&self, kind: InputKind) -> bool {
        matches!(kind, InputKind::Image | InputKind::Qr)
    }

    fn evaluate(&self, input: &NormalizedInput) -> Result<AdapterReport, AdapterError> {
        let (data, content_type) = match input {
            NormalizedInput::Image {
                data,
                content_type,
            }
            | NormalizedInput::Qr {
                data,
                content_type,
            } => (data, content_type),
            other => return Err(AdapterError::Unsupported(other.kind())),
        };
        let oracle = self
            .oracle
            .as_ref()
            .ok_or_else(|| AdapterError::Unavailable("no model oracle configured".to_string()))?;
        let verdict = oracle.score(input.kind(), data, content_type.as_deref())?;
        if !verdict.score.is_finite() || !(0.0 ..= 1.0).contains(&verdict.score) {
            return Err(AdapterError::Failed("oracle score out of range".to_string()));
        }

        let mut score = verdict.score;
        let mut indicators = verdict.indicators;
        let mut report_details = Vec::new();
        if let Some(decoded) = verdict.decoded_text.as_deref().filter(|text| !text.trim().is_empty()) {
            let (decoded_score, decoded_indicators, decoded_url) = self.decoded_findings(decoded);
            score = score.max(decoded_score);
            for indicator in decoded_indicators {
                if !indicators.contains(&indicator) {
                    indicators.push(indicator);
                }
            }
            if let Some(url) = decoded_url {
                report_details.push(("decoded_url", url));
            }
        }

        let mut report = AdapterReport::new(score, indicators)
            .with_detail("oracle_score", format!("{:.3}", verdict.score));
        for (key, value) in report_details {
            report = report.with_detail(key, value);
        }
        Ok(report)
    }
}
