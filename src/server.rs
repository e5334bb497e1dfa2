//! HTTP server for the portfolio assistant.
//!
//! Exposes the answering pipeline as a small JSON API suitable for a
//! browser widget embedded in the portfolio site.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Answer one visitor question |
//! | `POST` | `/clear-history` | Drop a session's conversation history |
//! | `GET`  | `/suggestions` | Example questions for the widget |
//! | `GET`  | `/health` | Health check (version + indexed chunk count) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//! Retrieval and generation failures never surface here — the chain
//! degrades them to fallback or apology answers, so `/chat` returns 200
//! with a valid body in those cases.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the widget can be
//! served from a different origin than the API.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::chain::{self, RagChain};
use crate::config::Config;
use crate::models::SourceRef;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    chain: Arc<RagChain>,
}

/// Starts the HTTP server.
///
/// Builds the full pipeline from configuration (including making the
/// index servable, rebuilding it if the corpus changed), binds to
/// `[server].bind`, and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let chain = RagChain::from_config(config).await?;
    let chunks = chain.indexed_chunks().await;
    tracing::info!(chunks, "index ready");

    let state = AppState {
        chain: Arc::new(chain),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/chat", post(handle_chat))
        .route("/clear-history", post(handle_clear_history))
        .route("/suggestions", get(handle_suggestions))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Assistant listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ POST /chat ============

/// JSON request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    /// The visitor's question.
    message: String,
    /// Session identifier; omitted on the first message, after which the
    /// client echoes back the `conversation_id` it received.
    #[serde(default)]
    session_id: Option<String>,
}

/// JSON response body for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    response: String,
    sources: Vec<SourceRef>,
    conversation_id: String,
    processing_time_seconds: f64,
}

/// Handler for `POST /chat`.
///
/// Answers one question in the context of the given session. When no
/// `session_id` is supplied a fresh one is minted and returned as
/// `conversation_id` so the client can continue the conversation.
async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let session_id = req
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = state.chain.query(message, &session_id).await;

    Ok(Json(ChatResponse {
        response: outcome.response,
        sources: outcome.sources,
        conversation_id: session_id,
        processing_time_seconds: outcome.processing_time_seconds,
    }))
}

// ============ POST /clear-history ============

/// JSON request body for `POST /clear-history`.
#[derive(Deserialize)]
struct ClearHistoryRequest {
    session_id: String,
}

#[derive(Serialize)]
struct ClearHistoryResponse {
    status: String,
}

/// Handler for `POST /clear-history`.
///
/// Drops the session's conversation history. Idempotent: clearing an
/// unknown session still returns `200`.
async fn handle_clear_history(
    State(state): State<AppState>,
    Json(req): Json<ClearHistoryRequest>,
) -> Result<Json<ClearHistoryResponse>, AppError> {
    if req.session_id.trim().is_empty() {
        return Err(bad_request("session_id must not be empty"));
    }

    state.chain.clear(&req.session_id);

    Ok(Json(ClearHistoryResponse {
        status: "cleared".to_string(),
    }))
}

// ============ GET /suggestions ============

#[derive(Serialize)]
struct SuggestionsResponse {
    suggestions: Vec<&'static str>,
}

/// Handler for `GET /suggestions`.
async fn handle_suggestions() -> Json<SuggestionsResponse> {
    Json(SuggestionsResponse {
        suggestions: chain::suggestions(),
    })
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
    /// Number of chunks the index currently serves.
    chunks_indexed: usize,
}

/// Handler for `GET /health`.
///
/// Used by uptime monitors; also reports the index size so an
/// accidentally-empty deployment is visible at a glance.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chunks_indexed: state.chain.indexed_chunks().await,
    })
}
