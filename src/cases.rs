//! Support-case store.
//!
//! Create-and-read operations over the durable tables: open a case, fetch
//! it back, attach feedback. Cases are immutable once written; the only
//! relation that grows afterwards is feedback.
//!
//! Chat history and extra context are stored as serialized JSON TEXT.
//! Reads go through [`parse_or_default`]: a case written in a legacy format
//! degrades to an empty history or null context instead of failing the
//! whole read.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::config::SiteConfig;
use crate::models::SupportCase;

/// Parse a stored JSON string, falling back to a typed default instead of
/// failing. The fallback path is explicit so it can be tested directly.
pub fn parse_or_default<T: serde::de::DeserializeOwned>(raw: &str, default: T) -> T {
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "stored JSON failed to parse, using default");
            default
        }
    }
}

/// Derive the public URL for a case.
pub fn case_url(site: &SiteConfig, case_id: &str) -> String {
    format!(
        "{}/support-case/{}",
        site.public_base_url.trim_end_matches('/'),
        case_id
    )
}

/// Best-effort description for prefilling an external contact form: the
/// text content of the most recent chat turn, or empty when the history is
/// empty or its turns are opaque.
pub fn prefilled_description(chat_history: &[serde_json::Value]) -> String {
    let Some(last) = chat_history.last() else {
        return String::new();
    };

    for key in ["content", "text", "message"] {
        if let Some(s) = last.get(key).and_then(|v| v.as_str()) {
            return s.to_string();
        }
    }

    last.as_str().unwrap_or("").to_string()
}

/// Insert a new case under a fresh random id and return it.
///
/// Input validation (non-empty user id, history shaped as an array) is the
/// router's job; by the time a call reaches here the fields are typed.
pub async fn create_case(
    pool: &SqlitePool,
    user_id: &str,
    chat_history: Vec<serde_json::Value>,
    other_context: Option<serde_json::Value>,
) -> Result<SupportCase> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().timestamp();

    let history_json = serde_json::to_string(&chat_history)?;
    let context_json = other_context
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO support_cases (id, user_id, chat_history, other_context, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(&history_json)
    .bind(&context_json)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(SupportCase {
        id,
        user_id: user_id.to_string(),
        chat_history,
        other_context,
        created_at,
    })
}

/// Fetch a case by id. Corrupt stored JSON degrades rather than erroring:
/// history falls back to `[]`, context to `None`.
pub async fn get_case(pool: &SqlitePool, case_id: &str) -> Result<Option<SupportCase>> {
    let row = sqlx::query(
        "SELECT id, user_id, chat_history, other_context, created_at FROM support_cases WHERE id = ?",
    )
    .bind(case_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let history_raw: String = row.get("chat_history");
    let context_raw: Option<String> = row.get("other_context");

    let chat_history = parse_or_default(&history_raw, Vec::new());
    let other_context = context_raw
        .map(|raw| parse_or_default(&raw, serde_json::Value::Null))
        .filter(|v| !v.is_null());

    Ok(Some(SupportCase {
        id: row.get("id"),
        user_id: row.get("user_id"),
        chat_history,
        other_context,
        created_at: row.get("created_at"),
    }))
}

/// Attach a feedback row to a case. Returns `false` when the case does not
/// exist: referential integrity is enforced here rather than trusting the
/// caller-supplied id.
pub async fn record_feedback(
    pool: &SqlitePool,
    case_id: &str,
    rating: i64,
    comments: Option<&str>,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM support_cases WHERE id = ?")
        .bind(case_id)
        .fetch_one(pool)
        .await?;

    if !exists {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO support_feedback (case_id, rating, comments, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(case_id)
    .bind(rating)
    .bind(comments)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn memory_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_parse_or_default() {
        let parsed: Vec<serde_json::Value> = parse_or_default(r#"[{"a":1}]"#, Vec::new());
        assert_eq!(parsed.len(), 1);

        let fallback: Vec<serde_json::Value> = parse_or_default("not json at all", Vec::new());
        assert!(fallback.is_empty());
    }

    #[test]
    fn test_case_url() {
        let site = crate::config::SiteConfig {
            public_base_url: "https://example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            case_url(&site, "abc-123"),
            "https://example.com/support-case/abc-123"
        );
    }

    #[test]
    fn test_prefilled_description() {
        let history = vec![
            serde_json::json!({"role": "user", "content": "first"}),
            serde_json::json!({"role": "user", "content": "latest question"}),
        ];
        assert_eq!(prefilled_description(&history), "latest question");

        assert_eq!(prefilled_description(&[]), "");

        let opaque = vec![serde_json::json!({"blob": 42})];
        assert_eq!(prefilled_description(&opaque), "");
    }

    #[tokio::test]
    async fn test_create_then_get_roundtrip() {
        let pool = memory_pool().await;

        let history = vec![serde_json::json!({"role": "user", "content": "help"})];
        let context = Some(serde_json::json!({"page": "/docs/billing"}));

        let created = create_case(&pool, "user-42", history.clone(), context.clone())
            .await
            .unwrap();
        let fetched = get_case(&pool, &created.id).await.unwrap().unwrap();

        assert_eq!(fetched.user_id, "user-42");
        assert_eq!(fetched.chat_history, history);
        assert_eq!(fetched.other_context, context);
        assert_eq!(fetched.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_get_unknown_case() {
        let pool = memory_pool().await;
        assert!(get_case(&pool, "no-such-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_tolerates_corrupt_history() {
        let pool = memory_pool().await;
        let created = create_case(&pool, "user-1", Vec::new(), None).await.unwrap();

        // Simulate a legacy row whose JSON no longer parses.
        sqlx::query("UPDATE support_cases SET chat_history = ?, other_context = ? WHERE id = ?")
            .bind("{{corrupt")
            .bind("also corrupt")
            .bind(&created.id)
            .execute(&pool)
            .await
            .unwrap();

        let fetched = get_case(&pool, &created.id).await.unwrap().unwrap();
        assert!(fetched.chat_history.is_empty());
        assert!(fetched.other_context.is_none());
    }

    #[tokio::test]
    async fn test_record_feedback() {
        let pool = memory_pool().await;
        let created = create_case(&pool, "user-1", Vec::new(), None).await.unwrap();

        assert!(record_feedback(&pool, &created.id, 5, Some("great"))
            .await
            .unwrap());
        assert!(record_feedback(&pool, &created.id, 3, None).await.unwrap());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM support_feedback WHERE case_id = ?")
            .bind(&created.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_feedback_unknown_case_rejected() {
        let pool = memory_pool().await;
        assert!(!record_feedback(&pool, "ghost", 4, None).await.unwrap());
    }
}
