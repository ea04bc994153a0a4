// crates/trustx-adapters/src/announcement.rs
// ============================================================================
// Module: Announcement Adapter
// Description: Credibility scoring for corporate announcements.
// Purpose: Flag fabricated or promotional announcements attributed to companies.
// Dependencies: trustx-core, crate::text
// ============================================================================

//! ## Overview
//! Credibility is the mean of three components: text cleanliness (one minus
//! the text-pattern score), whether the announcement names the company, and
//! how many formal disclosure cues appear. Risk is `1 - credibility`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use trustx_core::AdapterError;
use trustx_core::AdapterReport;
use trustx_core::InputKind;
use trustx_core::NormalizedInput;
use trustx_core::SignalAdapter;
use trustx_core::SignalSource;

use crate::text::TextPatternAnalyzer;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Vocabulary typical of formal exchange disclosures.
const FORMAL_CUES: &[&str] = &[
    "board",
    "directors",
    "quarter",
    "quarterly",
    "fiscal",
    "financial year",
    "regulation",
    "disclosure",
    "stock exchange",
    "shareholders",
    "results",
    "dividend",
    "pursuant",
    "audited",
    "meeting",
];

/// Number of cues at which the format component saturates.
const FORMAL_CUE_TARGET: f64 = 3.0;

/// Component value when the company is not named.
const UNNAMED_COMPANY_CREDIBILITY: f64 = 0.4;

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Announcement credibility adapter.
#[derive(Debug, Clone, Default)]
pub struct AnnouncementAdapter {
    /// Analyzer for the announcement body.
    analyzer: TextPatternAnalyzer,
}

impl AnnouncementAdapter {
    /// Creates an announcement adapter.
    #[must_use]
    pub const fn new(analyzer: TextPatternAnalyzer) -> Self {
        Self {
            analyzer,
        }
    }

    /// Returns `(credibility, indicators)` for a company and its announcement.
    #[must_use]
    pub fn credibility(&self, company: &str, text: &str) -> (f64, Vec<String>) {
        let findings = self.analyzer.analyze(text);
        let mut indicators = findings.indicators;
        let lower = format!(" {} ", words(text));

        let cleanliness = 1.0 - findings.score;
        let company_words = words(company);
        let named = !company_words.is_empty() && lower.contains(&format!(" {company_words} "));
        let mention = if named {
            1.0
        } else {
            indicators.push("company not named in announcement".to_string());
            UNNAMED_COMPANY_CREDIBILITY
        };
        let cues = FORMAL_CUES.iter().filter(|cue| lower.contains(&format!(" {cue} "))).count();
        if cues == 0 {
            indicators.push("informal announcement format".to_string());
        }
        let cue_count = u32::try_from(cues).unwrap_or(u32::MAX);
        let format = (f64::from(cue_count) / FORMAL_CUE_TARGET).min(1.0);

        let credibility = ((cleanliness + mention + format) / 3.0).clamp(0.0, 1.0);
        (credibility, indicators)
    }
}

/// Lowercase alphanumeric words joined by single spaces.
fn words(text: &str) -> String {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl SignalAdapter for AnnouncementAdapter {
    fn source(&self) -> SignalSource {
        SignalSource::AnnouncementNlp
    }

    fn supports(&self, kind: InputKind) -> bool {
        kind == InputKind::Announcement
    }

    fn evaluate(&self, input: &NormalizedInput) -> Result<AdapterReport, AdapterError> {
        let NormalizedInput::Announcement {
            company,
            text,
        } = input
        else {
            return Err(AdapterError::Unsupported(input.kind()));
        };
        let (credibility, indicators) = self.credibility(company, text);
        Ok(AdapterReport::new(1.0 - credibility, indicators)
            .with_detail("credibility_score", format!("{credibility:.3}")))
    }
}
