//! Pricing-fact extraction.
//!
//! Pulls structured fee facts out of arbitrary snippet text with one fixed,
//! case-insensitive pattern per field. [`extract`] is pure and total: it
//! never fails, and any field without a match is simply `None`. Each field
//! takes the *first* occurrence in the scanned text, so callers control
//! precedence by concatenation order: the response assembler concatenates
//! snippets in descending relevance order, making the most relevant
//! snippet's figure the one reported.

use regex::Regex;
use std::sync::LazyLock;

/// Fee facts recoverable from documentation text. Every field is optional;
/// values are pre-formatted display strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingFacts {
    pub monthly_fee: Option<String>,
    pub card_fee: Option<String>,
    pub ach_fee: Option<String>,
    pub platform_fee: Option<String>,
    pub chargeback_fee: Option<String>,
    pub setup_fee: Option<String>,
    pub hidden_fee: Option<String>,
}

impl PricingFacts {
    /// True when no pattern matched at all.
    pub fn is_empty(&self) -> bool {
        self.monthly_fee.is_none()
            && self.card_fee.is_none()
            && self.ach_fee.is_none()
            && self.platform_fee.is_none()
            && self.chargeback_fee.is_none()
            && self.setup_fee.is_none()
            && self.hidden_fee.is_none()
    }
}

static MONTHLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$(\d+(?:\.\d+)?)\s*/\s*month\s*/\s*user").expect("monthly fee regex is valid")
});

static CARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*\+\s*(\$\d+(?:\.\d+)?|\d+(?:\.\d+)?¢)[^.\n]*?\bcard")
        .expect("card fee regex is valid")
});

static ACH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%[^.\n]*?\bACH\b[^.\n]*?\(\s*\$(\d+(?:\.\d+)?)\s*cap\s*\)")
        .expect("ACH fee regex is valid")
});

static PLATFORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:(\d+(?:\.\d+)?)\s*%\s*platform\s+fee|additional\s+(\d+(?:\.\d+)?)\s*%\s*fee)")
        .expect("platform fee regex is valid")
});

static CHARGEBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$(\d+(?:\.\d+)?)\s*fee\s+for\s+disputed\s+payments[^.\n]*?\bchargebacks?\b")
        .expect("chargeback fee regex is valid")
});

static SETUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bno\s+setup\s+fees?\b").expect("setup fee regex is valid"));

static HIDDEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bno\s+hidden\s+fees?\b").expect("hidden fee regex is valid")
});

/// Extract whatever fee facts the text mentions. First match wins per field.
pub fn extract(text: &str) -> PricingFacts {
    PricingFacts {
        monthly_fee: MONTHLY_RE
            .captures(text)
            .map(|c| format!("${} per user per month", &c[1])),
        card_fee: CARD_RE
            .captures(text)
            .map(|c| format!("{}% + {} per card transaction", &c[1], &c[2])),
        ach_fee: ACH_RE
            .captures(text)
            .map(|c| format!("{}% per ACH transfer (${} cap)", &c[1], &c[2])),
        platform_fee: PLATFORM_RE.captures(text).map(|c| {
            let pct = c.get(1).or_else(|| c.get(2)).map(|m| m.as_str()).unwrap_or("");
            format!("{}% platform fee", pct)
        }),
        chargeback_fee: CHARGEBACK_RE
            .captures(text)
            .map(|c| format!("${} per disputed payment (chargeback)", &c[1])),
        setup_fee: SETUP_RE.is_match(text).then(|| "No setup fees".to_string()),
        hidden_fee: HIDDEN_RE
            .is_match(text)
            .then(|| "No hidden fees".to_string()),
    }
}
