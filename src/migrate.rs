use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema: the snippet index plus the durable support-case
/// tables. Idempotent; every statement is `IF NOT EXISTS`, so `init` can
/// be re-run safely.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Snippet index: one row per pre-chunked documentation snippet, with its
    // embedding stored as a little-endian f32 BLOB.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snippets (
            id TEXT PRIMARY KEY,
            doc_type TEXT,
            title TEXT,
            url TEXT,
            description TEXT,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Support cases are append-only; chat history and extra context are
    // serialized JSON TEXT columns.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS support_cases (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            chat_history TEXT NOT NULL,
            other_context TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // A case may accumulate any number of feedback rows.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS support_feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            case_id TEXT NOT NULL,
            rating INTEGER NOT NULL,
            comments TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (case_id) REFERENCES support_cases(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_feedback_case_id ON support_feedback(case_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_snippets_doc_type ON snippets(doc_type)")
        .execute(pool)
        .await?;

    Ok(())
}
