//! HTTP server.
//!
//! Exposes the conversational search service and the support-case lifecycle
//! as a JSON API suitable for embedding in a documentation site's chat
//! widget.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Ranked snippet matches for a query |
//! | `POST` | `/chat` | Assembled conversational answer |
//! | `POST` | `/upsert-mdx` | Upsert one pre-chunked snippet into the index |
//! | `POST` | `/support-case/create` | Open a support case |
//! | `POST` | `/support-case/feedback` | Attach a rating to a case |
//! | `GET`  | `/support-case/{id}` | Fetch a case |
//! | `POST` | `/api/help-form` | Forward a contact-form submission by email |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Every handled path returns JSON with either a result or an `error` key:
//!
//! ```json
//! { "error": "Missing or empty query parameter" }
//! ```
//!
//! Client input problems → 400 with the message surfaced verbatim; unknown
//! case ids and unknown routes → 404; upstream failures (embedding, vector
//! query, generation, datastore, email) → 500 with the upstream error text
//! in a `details` field. No retries happen at this layer.
//!
//! # CORS
//!
//! Any origin; methods `GET`, `POST`, `OPTIONS`; the `Content-Type` header.
//! Preflight requests are answered by the CORS layer itself.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::{Arc, LazyLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::cases;
use crate::config::Config;
use crate::email;
use crate::embedding;
use crate::index;
use crate::intent;
use crate::models::{Match, MatchMetadata};
use crate::respond::{self, ChatResponse};
use crate::retrieval;

/// Shared application state: configuration plus the SQLite pool. Cloned
/// per request; both members are cheaply shareable.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
}

/// Start the server: connect the pool, ensure the schema, bind, serve.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = crate::db::connect(config).await?;
    crate::migrate::run_migrations(&pool).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
    };

    let app = build_router(state);

    info!("listening on http://{}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble the router. Separated from [`run_server`] so tests can mount
/// it on an ephemeral port.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/query", post(handle_query))
        .route("/chat", post(handle_chat))
        .route("/upsert-mdx", post(handle_upsert_mdx))
        .route("/support-case/create", post(handle_case_create))
        .route("/support-case/feedback", post(handle_case_feedback))
        .route("/support-case/{id}", get(handle_case_get))
        .route("/api/help-form", post(handle_help_form))
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error body: a human-readable `error` plus, for 500s, the upstream
/// error text in `details`.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error. The message is surfaced verbatim to
/// the caller.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
        details: None,
    }
}

/// Constructs a 404 Not Found error.
fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
        details: None,
    }
}

/// Constructs a 500 error for an upstream collaborator failure (embedding,
/// vector query, generation, datastore, email). The chain is carried in
/// `details` for diagnostics; nothing is retried.
fn upstream(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "Upstream service failure".to_string(),
        details: Some(format!("{:#}", err)),
    }
}

/// Unwrap a JSON body extraction, mapping rejections (malformed JSON, wrong
/// content type) to the uniform 400 envelope.
fn require_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(bad_request(format!("Invalid JSON body: {}", rejection))),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
}

#[derive(Serialize)]
struct QueryResponse {
    matches: Vec<Match>,
}

/// Handler for `POST /query`.
///
/// Retrieval only; no response assembly.
async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let req = require_json(payload)?;
    let query = req.query.trim();
    if query.is_empty() {
        return Err(bad_request("Missing or empty query parameter"));
    }

    let matches = retrieval::retrieve(&state.config, &state.pool, query, state.config.retrieval.top_k)
        .await
        .map_err(upstream)?;

    Ok(Json(QueryResponse { matches }))
}

// ============ POST /chat ============

/// Handler for `POST /chat`.
///
/// The full pipeline: retrieve, classify, assemble.
async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let req = require_json(payload)?;
    let query = req.query.trim();
    if query.is_empty() {
        return Err(bad_request("Missing or empty query parameter"));
    }

    let matches = retrieval::retrieve(&state.config, &state.pool, query, state.config.retrieval.top_k)
        .await
        .map_err(upstream)?;

    let intent = intent::classify(query);
    info!(intent = intent.as_str(), "classified query");

    let response = respond::respond(&state.config, intent, matches, query)
        .await
        .map_err(upstream)?;

    Ok(Json(response))
}

// ============ POST /upsert-mdx ============

#[derive(Deserialize)]
struct UpsertRequest {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metadata: Option<UpsertMetadata>,
}

#[derive(Deserialize)]
struct UpsertMetadata {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "docType", default)]
    doc_type: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Serialize)]
struct UpsertResponse {
    success: bool,
    id: String,
}

/// Handler for `POST /upsert-mdx`.
///
/// Embeds one pre-chunked snippet and upserts it into the index.
async fn handle_upsert_mdx(
    State(state): State<AppState>,
    payload: Result<Json<UpsertRequest>, JsonRejection>,
) -> Result<Json<UpsertResponse>, AppError> {
    let req = require_json(payload)?;

    let content = req.content.as_deref().unwrap_or("").trim().to_string();
    let id = req
        .metadata
        .as_ref()
        .and_then(|m| m.id.as_deref())
        .unwrap_or("")
        .trim()
        .to_string();
    if content.is_empty() || id.is_empty() {
        return Err(bad_request("Missing required fields: content and metadata.id"));
    }

    let meta = req.metadata.unwrap_or(UpsertMetadata {
        id: None,
        doc_type: None,
        title: None,
        url: None,
        description: None,
    });
    let metadata = MatchMetadata {
        doc_type: meta.doc_type,
        title: meta.title,
        url: meta.url,
        description: meta.description,
        text: None,
    };

    let vector = embedding::embed_text(&state.config.embedding, &content)
        .await
        .map_err(upstream)?;
    index::upsert_snippet(&state.pool, &id, &metadata, &content, &vector)
        .await
        .map_err(upstream)?;

    info!(id = %id, "snippet upserted");
    Ok(Json(UpsertResponse { success: true, id }))
}

// ============ POST /support-case/create ============

#[derive(Deserialize)]
struct CaseCreateRequest {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
    #[serde(rename = "chatHistory", default)]
    chat_history: Option<serde_json::Value>,
    #[serde(rename = "otherContext", default)]
    other_context: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct CaseCreateResponse {
    #[serde(rename = "caseId")]
    case_id: String,
    #[serde(rename = "caseUrl")]
    case_url: String,
    #[serde(rename = "prefilledFields")]
    prefilled_fields: PrefilledFields,
}

#[derive(Serialize)]
struct PrefilledFields {
    subject: String,
    description: String,
}

/// Handler for `POST /support-case/create`.
async fn handle_case_create(
    State(state): State<AppState>,
    payload: Result<Json<CaseCreateRequest>, JsonRejection>,
) -> Result<Json<CaseCreateResponse>, AppError> {
    let req = require_json(payload)?;

    let user_id = req.user_id.as_deref().unwrap_or("").trim().to_string();
    if user_id.is_empty() {
        return Err(bad_request("Missing or empty userId"));
    }

    let chat_history = match req.chat_history {
        Some(serde_json::Value::Array(turns)) => turns,
        _ => return Err(bad_request("chatHistory must be an array")),
    };

    let case = cases::create_case(&state.pool, &user_id, chat_history, req.other_context)
        .await
        .map_err(upstream)?;

    info!(case_id = %case.id, "support case created");

    let subject = format!("Support case {}", &case.id[..8]);
    let description = cases::prefilled_description(&case.chat_history);

    Ok(Json(CaseCreateResponse {
        case_url: cases::case_url(&state.config.site, &case.id),
        case_id: case.id,
        prefilled_fields: PrefilledFields {
            subject,
            description,
        },
    }))
}

// ============ POST /support-case/feedback ============

#[derive(Deserialize)]
struct FeedbackRequest {
    #[serde(rename = "caseId", default)]
    case_id: Option<String>,
    #[serde(default)]
    rating: Option<i64>,
    #[serde(default)]
    comments: Option<String>,
}

#[derive(Serialize)]
struct FeedbackResponse {
    ok: bool,
}

/// Handler for `POST /support-case/feedback`.
async fn handle_case_feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let req = require_json(payload)?;

    let case_id = req.case_id.as_deref().unwrap_or("").trim().to_string();
    if case_id.is_empty() {
        return Err(bad_request("Missing or empty caseId"));
    }

    let rating = req.rating.unwrap_or(0);
    if !(1..=5).contains(&rating) {
        return Err(bad_request("rating must be an integer between 1 and 5"));
    }

    let recorded = cases::record_feedback(&state.pool, &case_id, rating, req.comments.as_deref())
        .await
        .map_err(upstream)?;

    if !recorded {
        return Err(not_found("Support case not found"));
    }

    Ok(Json(FeedbackResponse { ok: true }))
}

// ============ GET /support-case/{id} ============

#[derive(Serialize)]
struct CaseGetResponse {
    #[serde(rename = "caseId")]
    case_id: String,
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "chatHistory")]
    chat_history: Vec<serde_json::Value>,
    #[serde(rename = "otherContext")]
    other_context: Option<serde_json::Value>,
    #[serde(rename = "createdAt")]
    created_at: String, // ISO8601
}

/// Handler for `GET /support-case/{id}`.
async fn handle_case_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CaseGetResponse>, AppError> {
    let case = cases::get_case(&state.pool, &id)
        .await
        .map_err(upstream)?
        .ok_or_else(|| not_found("Support case not found"))?;

    Ok(Json(CaseGetResponse {
        case_id: case.id,
        user_id: case.user_id,
        chat_history: case.chat_history,
        other_context: case.other_context,
        created_at: format_ts_iso(case.created_at),
    }))
}

// ============ POST /api/help-form ============

#[derive(Deserialize)]
struct HelpFormRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    description: Option<String>,
    /// Shorthand used by older widget versions: a single `message` stands
    /// in for both subject and description.
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct HelpFormResponse {
    success: bool,
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

/// Handler for `POST /api/help-form`.
///
/// Validates the submission and forwards it to the support inbox.
async fn handle_help_form(
    State(state): State<AppState>,
    payload: Result<Json<HelpFormRequest>, JsonRejection>,
) -> Result<Json<HelpFormResponse>, AppError> {
    let req = require_json(payload)?;

    let email_addr = req.email.as_deref().unwrap_or("").trim().to_string();
    let subject = req
        .subject
        .as_deref()
        .or(req.message.as_deref())
        .unwrap_or("")
        .trim()
        .to_string();
    let description = req
        .description
        .as_deref()
        .or(req.message.as_deref())
        .unwrap_or("")
        .trim()
        .to_string();

    if email_addr.is_empty() || subject.is_empty() || description.is_empty() {
        return Err(bad_request(
            "Missing required fields: email, subject, and description",
        ));
    }
    if !EMAIL_RE.is_match(&email_addr) {
        return Err(bad_request("Invalid email address"));
    }

    let name = req.name.as_deref().unwrap_or("(not given)");
    let body = format!(
        "New help-form submission\n\nFrom: {} <{}>\n\n{}",
        name, email_addr, description
    );

    email::send(
        &state.config.email,
        &format!("[help-form] {}", subject),
        &body,
        Some(email_addr.as_str()),
    )
    .await
    .map_err(upstream)?;

    Ok(Json(HelpFormResponse { success: true }))
}

// ============ Fallback ============

/// Any unrouted path.
async fn handle_not_found() -> AppError {
    not_found("Not found")
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_pattern() {
        assert!(EMAIL_RE.is_match("a@b.co"));
        assert!(EMAIL_RE.is_match("first.last+tag@sub.example.com"));
        assert!(!EMAIL_RE.is_match("not-an-email"));
        assert!(!EMAIL_RE.is_match("missing@tld"));
        assert!(!EMAIL_RE.is_match("spaces in@example.com"));
    }

    #[test]
    fn test_format_ts_iso() {
        assert_eq!(format_ts_iso(0), "1970-01-01T00:00:00Z");
    }
}
