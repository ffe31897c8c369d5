//! Query intent classification.
//!
//! A static, ordered rule table labels every query with exactly one
//! [`Intent`]. Each rule pairs a main pattern with an optional exclusion
//! pattern; the first rule whose main pattern matches and whose exclusion
//! does not wins. Rule order encodes precedence (pricing before support
//! before abusive-language detection) and the table is fixed at compile
//! time rather than extensible at runtime.
//!
//! The support rule's exclusion prevents feature questions like
//! "does it support recurring payments" from being read as a request for
//! a human: "support" there is a verb, not an escalation.

use regex::Regex;
use std::sync::LazyLock;

/// Closed classification label used to select a response strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Pricing,
    Support,
    Abusive,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Pricing => "pricing",
            Intent::Support => "support",
            Intent::Abusive => "abusive",
            Intent::General => "general",
        }
    }
}

static PRICING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(price|prices|pricing|cost|costs|fee|fees|charge|charges|how much|subscription|plan)\b")
        .expect("pricing pattern is valid")
});

static SUPPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bsupport\b|\b(talk|speak|chat)\s+(to|with)\s+(a\s+|an\s+)?(human|person|agent|lawyer|someone)\b|\breal\s+person\b|\bcustomer\s+service\b|\bhelp\s+me\b|\bcontact\s+(you|us|someone)\b",
    )
    .expect("support pattern is valid")
});

/// Feature questions phrased around the verb "support" must not escalate.
static SUPPORT_EXCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(does|do|can|could|will|would|is|are)\b[^?]*\bsupports?\b|\bsupports\b")
        .expect("support exclusion pattern is valid")
});

static ABUSIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(fuck|fucking|shit|shitty|bitch|asshole|bastard|dumbass|moron|screw\s+you|hate\s+you|stupid\s+(bot|app|site|service)|useless\s+(bot|app|site|service))\b",
    )
    .expect("abusive pattern is valid")
});

/// One entry in the classification table.
struct Rule {
    intent: Intent,
    main: &'static LazyLock<Regex>,
    exclude: Option<&'static LazyLock<Regex>>,
}

/// Ordered rule table. First accepted rule wins.
static RULES: &[Rule] = &[
    Rule {
        intent: Intent::Pricing,
        main: &PRICING_RE,
        exclude: None,
    },
    Rule {
        intent: Intent::Support,
        main: &SUPPORT_RE,
        exclude: Some(&SUPPORT_EXCLUDE_RE),
    },
    Rule {
        intent: Intent::Abusive,
        main: &ABUSIVE_RE,
        exclude: None,
    },
];

/// Classify a query. Pure function of the query text; defaults to
/// [`Intent::General`] when no rule accepts.
pub fn classify(query: &str) -> Intent {
    let query = query.trim();

    for rule in RULES {
        if !rule.main.is_match(query) {
            continue;
        }
        if let Some(exclude) = rule.exclude {
            if exclude.is_match(query) {
                continue;
            }
        }
        return rule.intent;
    }

    Intent::General
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_queries() {
        assert_eq!(classify("how much does it cost?"), Intent::Pricing);
        assert_eq!(classify("what are your fees"), Intent::Pricing);
        assert_eq!(classify("pricing"), Intent::Pricing);
    }

    #[test]
    fn test_support_queries() {
        assert_eq!(classify("I want to talk to a human"), Intent::Support);
        assert_eq!(classify("can I speak with an agent"), Intent::Support);
        assert_eq!(classify("I need support with my account"), Intent::Support);
        assert_eq!(classify("help me please"), Intent::Support);
    }

    #[test]
    fn test_feature_question_is_not_support() {
        // "support" as a verb must not escalate to a human.
        assert_eq!(
            classify("does blawby support recurring payments"),
            Intent::General
        );
        assert_eq!(classify("it supports ACH, right?"), Intent::General);
    }

    #[test]
    fn test_abusive_queries() {
        assert_eq!(classify("this is a stupid bot"), Intent::Abusive);
        assert_eq!(classify("fuck this"), Intent::Abusive);
    }

    #[test]
    fn test_pricing_precedes_support() {
        // Matches both tables; pricing is checked first.
        assert_eq!(
            classify("I need support understanding your fees"),
            Intent::Pricing
        );
    }

    #[test]
    fn test_default_general() {
        assert_eq!(classify("how do I create an invoice?"), Intent::General);
        assert_eq!(classify(""), Intent::General);
    }

    #[test]
    fn test_exactly_one_label() {
        for q in [
            "pricing",
            "talk to a human",
            "stupid bot",
            "how do invoices work",
            "does it support webhooks",
        ] {
            let intent = classify(q);
            assert!(matches!(
                intent,
                Intent::Pricing | Intent::Support | Intent::Abusive | Intent::General
            ));
        }
    }
}
