//! Response assembly.
//!
//! Given a classified intent and the re-ranked matches, produce the chat
//! reply. Three of the four intents are deterministic: pricing renders
//! extracted fee facts, support and abusive return canned messages. Only
//! the general branch calls the text-generation service, with a grounding
//! prompt built from the retrieved snippets and a post-processing pass that
//! guarantees the answer carries at least one documentation link.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use serde::Serialize;
use tracing::warn;

use crate::config::Config;
use crate::generation;
use crate::intent::Intent;
use crate::models::Match;
use crate::pricing;

/// Substituted when the generation service returns a blank or unusable
/// completion.
const FALLBACK_MESSAGE: &str = "I couldn't find an answer to that in the documentation. \
Try rephrasing your question, or browse the docs for more detail.";

/// Assembled chat reply. `format` is always `"markdown"`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(rename = "messageFormat")]
    pub format: &'static str,
    pub matches: Vec<Match>,
}

impl ChatResponse {
    fn markdown(message: String, matches: Vec<Match>) -> Self {
        Self {
            message,
            format: "markdown",
            matches,
        }
    }
}

/// Assemble the reply for a classified query.
///
/// Matches must arrive in descending re-ranked order: the pricing branch
/// depends on it for its scan-order policy, and the general branch uses the
/// top match as the citation of last resort.
pub async fn respond(
    config: &Config,
    intent: Intent,
    matches: Vec<Match>,
    query: &str,
) -> Result<ChatResponse> {
    match intent {
        Intent::Pricing => {
            // Concatenate snippet text in rank order; extraction is
            // first-match-wins per field, so the most relevant snippet's
            // figure is the one reported.
            let text: String = matches
                .iter()
                .filter_map(|m| m.metadata.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n");
            let facts = pricing::extract(&text);
            let message = render_pricing_message(&facts, &config.site.pricing_path);
            Ok(ChatResponse::markdown(message, matches))
        }
        Intent::Support => {
            let message = format!(
                "It sounds like you'd like to reach a person. I can open a support case for \
                 you — use the **Create support case** button and a team member will follow up \
                 by email. For real-time help, join us at {}.",
                config.site.live_chat_url
            );
            Ok(ChatResponse::markdown(message, matches))
        }
        Intent::Abusive => {
            // Matches are discarded so unrelated context never amplifies
            // an abusive exchange.
            let message = "I understand this is frustrating. I'm here to help with questions \
                about the product and its documentation — could you rephrase what you're \
                trying to do? If you'd rather talk to a person, ask for support and I'll \
                open a case."
                .to_string();
            Ok(ChatResponse::markdown(message, Vec::new()))
        }
        Intent::General => {
            let prompt = build_grounding_prompt(&matches, query);
            let completion = generation::generate(&config.generation, &prompt).await?;

            let message = if completion.trim().is_empty() {
                warn!("generation returned blank completion, using fallback");
                FALLBACK_MESSAGE.to_string()
            } else {
                inject_citation(
                    &completion,
                    &matches,
                    config.site.canonical_lesson.as_deref(),
                )
            };

            Ok(ChatResponse::markdown(message, matches))
        }
    }
}

// ============ Pricing rendering ============

/// Fixed-template bullet list of whichever facts were found, ending with a
/// link to the pricing page.
fn render_pricing_message(facts: &pricing::PricingFacts, pricing_path: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    if facts.is_empty() {
        lines.push("I couldn't pull exact figures from the documentation.".to_string());
    } else {
        lines.push("Here's our pricing at a glance:".to_string());
        let labeled = [
            ("Monthly", &facts.monthly_fee),
            ("Card payments", &facts.card_fee),
            ("ACH transfers", &facts.ach_fee),
            ("Platform fee", &facts.platform_fee),
            ("Disputed payments", &facts.chargeback_fee),
        ];
        for (label, value) in labeled {
            if let Some(v) = value {
                lines.push(format!("- **{}**: {}", label, v));
            }
        }
        // Boolean facts stand on their own.
        for value in [&facts.setup_fee, &facts.hidden_fee].into_iter().flatten() {
            lines.push(format!("- {}", value));
        }
    }

    lines.push(String::new());
    lines.push(format!("Full details: [Pricing]({})", pricing_path));
    lines.join("\n")
}

// ============ Grounding prompt ============

/// Ensure a documentation link is site-rooted: relative paths get a leading
/// `/`, absolute URLs pass through unchanged.
pub fn normalize_link(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{}", url)
    }
}

/// Build the context block for one match: title, description or body text,
/// and a normalized link when present.
fn context_block(m: &Match) -> String {
    let mut block = String::new();
    if let Some(title) = &m.metadata.title {
        block.push_str(&format!("### {}\n", title));
    }
    if let Some(body) = m.metadata.description.as_deref().or(m.metadata.text.as_deref()) {
        block.push_str(body);
        block.push('\n');
    }
    if let Some(url) = &m.metadata.url {
        block.push_str(&format!("Link: {}\n", normalize_link(url)));
    }
    block
}

/// Grounding prompt: the generation service may use only the supplied
/// context, must stay short, and must cite a documentation link when the
/// context offers one.
fn build_grounding_prompt(matches: &[Match], query: &str) -> String {
    let context: String = matches
        .iter()
        .map(context_block)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a documentation assistant. Answer the user's question using ONLY the \
         context below. Reply in 2-3 sentences, formatted as Markdown. If the context \
         contains a documentation link, include at least one in your answer as a Markdown \
         link. If the context does not answer the question, say so briefly.\n\n\
         Context:\n{}\n\nQuestion: {}\n\nAnswer:",
        context, query
    )
}

// ============ Citation injection ============

static READ_MORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[Read more\]\(([^)]*)\)").expect("read-more marker regex is valid")
});

/// Guarantee the completion cites the documentation.
///
/// If the completion already contains any match-derived link it is returned
/// untouched. Otherwise the preferred link (the canonical lesson when one
/// of the matches carries it, else the top-ranked match) is injected:
/// a mismatched `[Read more](...)` marker has its URL replaced, or a
/// `Documentation:` line is appended.
pub fn inject_citation(
    completion: &str,
    matches: &[Match],
    canonical_lesson: Option<&str>,
) -> String {
    let links: Vec<String> = matches
        .iter()
        .filter_map(|m| m.metadata.url.as_deref())
        .map(normalize_link)
        .collect();

    if links.is_empty() || links.iter().any(|l| completion.contains(l.as_str())) {
        return completion.to_string();
    }

    let preferred = canonical_lesson
        .and_then(|fragment| links.iter().find(|l| l.contains(fragment)))
        .unwrap_or(&links[0]);

    if READ_MORE_RE.is_match(completion) {
        READ_MORE_RE
            .replace(completion, format!("[Read more]({})", preferred))
            .into_owned()
    } else {
        format!("{}\n\nDocumentation: {}", completion.trim_end(), preferred)
    }
}
