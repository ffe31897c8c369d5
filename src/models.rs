//! Core data models.
//!
//! These types flow through the retrieval and response pipeline (request
//! scoped) or are persisted by the support-case store (durable).

use serde::{Deserialize, Serialize};

/// Metadata carried alongside a snippet in the index and returned with
/// every match. All fields are optional; the offline indexer is not
/// guaranteed to supply any of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchMetadata {
    #[serde(rename = "docType", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A scored retrieval result tying a vector-index hit back to its source
/// snippet. Request-scoped. `raw_score` is the cosine similarity the index
/// produced; `score` is what re-ranking adjusts (and what clients see).
/// Keeping the raw value separate makes re-ranking idempotent: the
/// adjusted score is always recomputed from the raw one, never compounded.
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub id: String,
    pub score: f64,
    #[serde(skip)]
    pub raw_score: f64,
    pub metadata: MatchMetadata,
}

/// A durable record of an escalated conversation awaiting human follow-up.
/// Immutable after creation apart from attached feedback rows.
#[derive(Debug, Clone)]
pub struct SupportCase {
    pub id: String,
    pub user_id: String,
    pub chat_history: Vec<serde_json::Value>,
    pub other_context: Option<serde_json::Value>,
    pub created_at: i64,
}

/// A rating attached to a support case after the fact.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SupportFeedback {
    pub case_id: String,
    pub rating: i64,
    pub comments: Option<String>,
    pub created_at: i64,
}
