// crates/trustx-adapters/src/text.rs
// ============================================================================
// Module: Text Pattern Adapter
// Description: Keyword and pattern matching over free text.
// Purpose: Score investment-fraud language in messages, posts, and announcements.
// Dependencies: trustx-core
// ============================================================================

//! ## Overview
//! The analyzer tokenizes lowercase text into words and checks a fixed set of
//! categories (fraud phrases, unrealistic returns, guarantee and urgency
//! language, phone numbers, wallet addresses, link shorteners). Each matched
//! category contributes a weight; weights combine with a noisy-OR so that
//! independent red flags reinforce each other without exceeding one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use trustx_core::AdapterError;
use trustx_core::AdapterReport;
use trustx_core::InputKind;
use trustx_core::NormalizedInput;
use trustx_core::SignalAdapter;
use trustx_core::SignalSource;

// ============================================================================
// SECTION: Vocabulary
// ============================================================================

/// Known fraud phrases, in normalized word form.
const FRAUD_PHRASES: &[&str] = &[
    "guaranteed returns",
    "risk free",
    "double your money",
    "limited time offer",
    "insider trading",
    "hot tip",
    "pump and dump",
    "ponzi scheme",
    "get rich quick",
    "no risk",
    "guaranteed profit",
    "easy money",
    "exclusive opportunity",
    "secret strategy",
    "sure shot",
    "100 returns",
    "daily profit",
    "overnight success",
    "investment advisory without sebi",
    "unregistered advisor",
    "fake sebi certificate",
    "bogus investment scheme",
];

/// Guarantee language.
const GUARANTEE_TERMS: &[&str] =
    &["guarantee", "guaranteed", "assured", "assure", "promise", "promised", "certain", "risk free"];

/// Urgency and pressure language.
const URGENCY_TERMS: &[&str] = &[
    "urgent",
    "urgently",
    "hurry",
    "limited time",
    "act now",
    "deadline",
    "now or never",
    "expires",
    "last chance",
    "today only",
    "immediately",
    "send money now",
    "right now",
];

/// Words that mark a preceding percentage as a return claim.
const RETURN_WORDS: &[&str] =
    &["return", "returns", "profit", "profits", "gain", "gains", "interest", "roi"];

/// Multiplier phrases that are unrealistic on their own.
const MULTIPLIER_PHRASES: &[&str] =
    &["double your money", "triple your money", "money doubles", "money will double"];

/// Link shortener hosts.
pub const SHORTENER_HOSTS: &[&str] =
    &["bit.ly", "tinyurl.com", "t.co", "short.link", "goo.gl", "cutt.ly", "is.gd", "ow.ly"];

/// Percentage at or above which a return claim is unrealistic.
const UNREALISTIC_RETURN_PERCENT: u32 = 20;

// ============================================================================
// SECTION: Category Weights
// ============================================================================

/// Weight of a single fraud phrase match.
const FRAUD_PHRASE_BASE: f64 = 0.35;
/// Weight added per additional fraud phrase.
const FRAUD_PHRASE_STEP: f64 = 0.15;
/// Cap on the fraud phrase weight.
const FRAUD_PHRASE_CAP: f64 = 0.8;
/// Weight of unrealistic return claims.
const UNREALISTIC_RETURNS_WEIGHT: f64 = 0.6;
/// Weight of guarantee language.
const GUARANTEE_WEIGHT: f64 = 0.4;
/// Weight of urgency language.
const URGENCY_WEIGHT: f64 = 0.35;
/// Weight of crypto wallet addresses.
const WALLET_WEIGHT: f64 = 0.3;
/// Weight of link shorteners.
const SHORTENER_WEIGHT: f64 = 0.25;
/// Weight of phone numbers.
const PHONE_WEIGHT: f64 = 0.15;

// ============================================================================
// SECTION: Analyzer
// ============================================================================

/// Result of scanning one text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFindings {
    /// Combined score in `[0, 1]`.
    pub score: f64,
    /// Indicators in category order.
    pub indicators: Vec<String>,
    /// Number of fraud phrases matched.
    pub phrase_matches: usize,
}

/// Keyword and pattern analyzer.
#[derive(Debug, Clone, Default)]
pub struct TextPatternAnalyzer {
    /// Additional fraud phrases beyond the built-in list.
    extra_phrases: Vec<String>,
}

impl TextPatternAnalyzer {
    /// Creates an analyzer with additional fraud phrases.
    #[must_use]
    pub fn new(extra_phrases: &[String]) -> Self {
        Self {
            extra_phrases: extra_phrases.iter().map(|phrase| words(phrase).join(" ")).collect(),
        }
    }

    /// Scans text and returns its findings.
    #[must_use]
    pub fn analyze(&self, text: &str) -> TextFindings {
        let lower = text.to_lowercase();
        let tokens = words(&lower);
        let padded = format!(" {} ", tokens.join(" "));
        let has = |phrase: &str| padded.contains(&format!(" {phrase} "));

        let phrase_matches = FRAUD_PHRASES.iter().filter(|phrase| has(phrase)).count()
            + self.extra_phrases.iter().filter(|phrase| has(phrase)).count();

        let mut weights = Vec::new();
        let mut indicators = Vec::new();
        let mut flag = |matched: bool, weight: f64, indicator: &str| {
            if matched {
                weights.push(weight);
                indicators.push(indicator.to_string());
            }
        };

        flag(phrase_matches > 0, phrase_weight(phrase_matches), "fraud keywords");
        flag(
            has_unrealistic_return(&tokens) || MULTIPLIER_PHRASES.iter().any(|phrase| has(phrase)),
            UNREALISTIC_RETURNS_WEIGHT,
            "unrealistic returns",
        );
        flag(GUARANTEE_TERMS.iter().any(|term| has(term)), GUARANTEE_WEIGHT, "guarantee language");
        flag(URGENCY_TERMS.iter().any(|term| has(term)), URGENCY_WEIGHT, "urgency language");
        flag(lower.split_whitespace().any(is_wallet_address), WALLET_WEIGHT, "crypto wallet address");
        flag(contains_shortener(&lower), SHORTENER_WEIGHT, "url shortener");
        flag(has_phone_number(&lower), PHONE_WEIGHT, "phone number");

        TextFindings {
            score: noisy_or(&weights),
            indicators,
            phrase_matches,
        }
    }
}

/// Weight for a number of fraud phrase matches.
fn phrase_weight(matches: usize) -> f64 {
    let extra = u32::try_from(matches.saturating_sub(1)).unwrap_or(u32::MAX);
    f64::from(extra).mul_add(FRAUD_PHRASE_STEP, FRAUD_PHRASE_BASE).min(FRAUD_PHRASE_CAP)
}

/// Combines independent category weights: `1 - prod(1 - w)`.
#[must_use]
pub fn noisy_or(weights: &[f64]) -> f64 {
    let clear: f64 = weights.iter().map(|weight| 1.0 - weight.clamp(0.0, 1.0)).product();
    (1.0 - clear).clamp(0.0, 1.0)
}

/// Splits lowercase text into alphanumeric words.
fn words(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Detects a large percentage followed closely by a return word.
fn has_unrealistic_return(tokens: &[String]) -> bool {
    tokens.iter().enumerate().any(|(index, token)| {
        let Ok(value) = token.parse::<u32>() else {
            return false;
        };
        value >= UNREALISTIC_RETURN_PERCENT
            && tokens
                .iter()
                .skip(index + 1)
                .take(2)
                .any(|next| RETURN_WORDS.contains(&next.as_str()))
    })
}

/// Detects an Ethereum-style or Bitcoin-style wallet address token.
fn is_wallet_address(token: &str) -> bool {
    let token = token.trim_matches(|ch: char| !ch.is_ascii_alphanumeric());
    if let Some(hex) = token.strip_prefix("0x") {
        return hex.len() == 40 && hex.chars().all(|ch| ch.is_ascii_hexdigit());
    }
    // Input is lowercased, so only the digit zero is outside the base58 alphabet.
    let legacy = (token.starts_with('1') || token.starts_with('3'))
        && (26 ..= 35).contains(&token.len())
        && token.chars().all(|ch| ch.is_ascii_alphanumeric() && ch != '0');
    let bech32 = token.starts_with("bc1") && (42 ..= 62).contains(&token.len());
    (legacy || bech32) && token.chars().any(|ch| ch.is_ascii_alphabetic())
}

/// Detects a link shortener host in the text.
fn contains_shortener(lower: &str) -> bool {
    SHORTENER_HOSTS.iter().any(|host| {
        lower.match_indices(host).any(|(start, _)| {
            let before = lower[.. start].chars().next_back();
            let after = lower[start + host.len() ..].chars().next();
            let bounded_before = before.is_none_or(|ch| !ch.is_alphanumeric() && ch != '.');
            let bounded_after = after.is_none_or(|ch| ch == '/' || ch.is_whitespace());
            bounded_before && bounded_after
        })
    })
}

/// Detects a token of ten or more digits with only dialing punctuation.
fn has_phone_number(text: &str) -> bool {
    text.split_whitespace().any(|token| {
        let digits = token.chars().filter(char::is_ascii_digit).count();
        digits >= 10
            && token.chars().all(|ch| ch.is_ascii_digit() || matches!(ch, '+' | '-' | '(' | ')' | '.' | ','))
    })
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Signal adapter wrapping [`TextPatternAnalyzer`].
#[derive(Debug, Clone, Default)]
pub struct TextPatternAdapter {
    /// Analyzer instance.
    analyzer: TextPatternAnalyzer,
}

impl TextPatternAdapter {
    /// Creates a text pattern adapter.
    #[must_use]
    pub const fn new(analyzer: TextPatternAnalyzer) -> Self {
        Self {
            analyzer,
        }
    }
}

impl SignalAdapter for TextPatternAdapter {
    fn source(&self) -> SignalSource {
        SignalSource::TextPattern
    }

    fn supports(&self, kind: InputKind) -> bool {
        matches!(kind, InputKind::Text | InputKind::Announcement)
    }

    fn evaluate(&self, input: &NormalizedInput) -> Result<AdapterReport, AdapterError> {
        let text = match input {
            NormalizedInput::Text {
                content,
            } => content.as_str(),
            NormalizedInput::Announcement {
                text,
                ..
            } => text.as_str(),
            other => return Err(AdapterError::Unsupported(other.kind())),
        };
        let findings = self.analyzer.analyze(text);
        Ok(AdapterReport::new(findings.score, findings.indicators)
            .with_detail("phrase_matches", findings.phrase_matches.to_string()))
    }
}
