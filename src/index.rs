//! Snippet index: vector similarity over the documentation corpus.
//!
//! Snippets arrive pre-chunked from an offline indexing step (via the
//! `/upsert-mdx` endpoint or the `upsert` CLI command) and are stored with
//! their embedding as a little-endian f32 BLOB. Queries scan every row and
//! score it by cosine similarity in-process; the corpus is a single
//! documentation site, small enough that no ANN structure is needed.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Match, MatchMetadata};

/// Insert or replace a snippet row. Upserting an existing id replaces the
/// row wholesale, so re-running the offline indexer is idempotent.
pub async fn upsert_snippet(
    pool: &SqlitePool,
    id: &str,
    metadata: &MatchMetadata,
    text: &str,
    embedding: &[f32],
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO snippets
            (id, doc_type, title, url, description, text, embedding, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(&metadata.doc_type)
    .bind(&metadata.title)
    .bind(&metadata.url)
    .bind(&metadata.description)
    .bind(text)
    .bind(vec_to_blob(embedding))
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;

    Ok(())
}

/// Query the index with an embedding vector, returning the `top_k` most
/// similar snippets with raw cosine scores and full metadata. Re-ranking
/// is the retrieval engine's job, not the index's.
pub async fn query_index(
    pool: &SqlitePool,
    query_vec: &[f32],
    top_k: i64,
) -> Result<Vec<Match>> {
    let rows = sqlx::query(
        "SELECT id, doc_type, title, url, description, text, embedding FROM snippets",
    )
    .fetch_all(pool)
    .await?;

    let mut matches: Vec<Match> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vec = blob_to_vec(&blob);
            let similarity = cosine_similarity(query_vec, &vec) as f64;
            Match {
                id: row.get("id"),
                score: similarity,
                raw_score: similarity,
                metadata: MatchMetadata {
                    doc_type: row.get("doc_type"),
                    title: row.get("title"),
                    url: row.get("url"),
                    description: row.get("description"),
                    text: row.get("text"),
                },
            }
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(top_k as usize);

    Ok(matches)
}
