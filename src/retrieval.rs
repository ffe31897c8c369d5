//! Retrieval engine: embed the query, hit the snippet index, re-rank.
//!
//! Re-ranking multiplies each match's raw similarity by a fixed weight
//! keyed on its document type, biasing curated lesson content above looser
//! article and page matches of similar raw similarity.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::Config;
use crate::embedding;
use crate::index;
use crate::models::Match;

/// Weight applied to a match's raw similarity, keyed on `metadata.docType`.
/// Unknown or missing types are left at parity.
pub fn doc_type_weight(doc_type: Option<&str>) -> f64 {
    match doc_type {
        Some("lesson") => 2.0,
        Some("article") => 1.5,
        Some("page") => 1.2,
        _ => 1.0,
    }
}

/// Re-rank matches in place: adjusted score = raw similarity × doc-type
/// weight, then sort descending. Idempotent; the adjustment is recomputed
/// from `raw_score` each time, never compounded onto a prior adjustment.
/// Ties are left in whatever order the sort produces.
pub fn rerank(matches: &mut [Match]) {
    for m in matches.iter_mut() {
        m.score = m.raw_score * doc_type_weight(m.metadata.doc_type.as_deref());
    }
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Retrieve the `top_k` most relevant snippets for a query.
///
/// Embeds the trimmed query text, queries the snippet index, and re-ranks
/// by document-type weight. Any upstream failure aborts the call.
pub async fn retrieve(
    config: &Config,
    pool: &SqlitePool,
    query: &str,
    top_k: i64,
) -> Result<Vec<Match>> {
    let query_vec = embedding::embed_text(&config.embedding, query.trim())
        .await
        .context("Failed to embed query")?;

    let mut matches = index::query_index(pool, &query_vec, top_k).await?;
    rerank(&mut matches);

    debug!(count = matches.len(), "retrieval complete");
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchMetadata;

    fn make_match(id: &str, raw_score: f64, doc_type: Option<&str>) -> Match {
        Match {
            id: id.to_string(),
            score: raw_score,
            raw_score,
            metadata: MatchMetadata {
                doc_type: doc_type.map(|s| s.to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_weight_table() {
        assert_eq!(doc_type_weight(Some("lesson")), 2.0);
        assert_eq!(doc_type_weight(Some("article")), 1.5);
        assert_eq!(doc_type_weight(Some("page")), 1.2);
        assert_eq!(doc_type_weight(Some("blog")), 1.0);
        assert_eq!(doc_type_weight(None), 1.0);
    }

    #[test]
    fn test_rerank_biases_lessons() {
        // Raw similarity slightly favors the page; the lesson weight flips it.
        let mut matches = vec![
            make_match("page", 0.80, Some("page")),
            make_match("lesson", 0.70, Some("lesson")),
        ];
        rerank(&mut matches);

        assert_eq!(matches[0].id, "lesson");
        assert!((matches[0].score - 1.4).abs() < 1e-9);
        assert!((matches[1].score - 0.96).abs() < 1e-9);
    }

    #[test]
    fn test_rerank_is_idempotent() {
        let mut once = vec![
            make_match("a", 0.9, None),
            make_match("b", 0.5, Some("lesson")),
            make_match("c", 0.6, Some("article")),
        ];
        rerank(&mut once);

        let mut twice = once.clone();
        rerank(&mut twice);

        let order_once: Vec<&str> = once.iter().map(|m| m.id.as_str()).collect();
        let order_twice: Vec<&str> = twice.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order_once, order_twice);

        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.score, b.score, "weights must not compound");
        }
    }

    #[test]
    fn test_rerank_preserves_raw_score() {
        let mut matches = vec![make_match("a", 0.5, Some("lesson"))];
        rerank(&mut matches);
        assert_eq!(matches[0].raw_score, 0.5);
        assert_eq!(matches[0].score, 1.0);
    }
}
