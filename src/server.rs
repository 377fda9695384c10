//! HTTP chat server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | `{message, session_id?}` → `{response, session_id}` |
//! | `POST` | `/quick-action` | `{action, session_id?}` → `{response, session_id, question}` |
//! | `GET`  | `/health` | Status, version, index size, live sessions |
//!
//! A request without `session_id` starts a new session; the generated id is
//! returned so the client can continue the conversation.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Message cannot be empty." } }
//! ```
//!
//! Malformed JSON, an empty message, or an unknown action → `bad_request`
//! (400). Answering itself never fails: provider errors become the fixed
//! apology text.
//!
//! # Sessions
//!
//! [`serve`] spawns a background task that drops sessions idle longer than
//! `sessions.timeout_minutes`, every `sessions.sweep_interval_secs`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use school_counselor_core::ConversationStore;

use crate::chat::{quick_action_question, ChatService};
use crate::config::Config;

/// Start the server and block until Ctrl-C.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let service = ChatService::from_config(config).await?;

    let sweeper = spawn_session_sweeper(
        service.sessions().clone(),
        Duration::from_secs(config.sessions.sweep_interval_secs),
        chrono::Duration::minutes(config.sessions.timeout_minutes as i64),
    );

    let app = router(service);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "chat server listening");
    println!("Counselor listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    sweeper.abort();
    info!("chat server stopped");
    Ok(())
}

/// Routes over `service`, with permissive CORS.
pub fn router(service: ChatService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/quick-action", post(handle_quick_action))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(service)
}

/// Periodically remove stale sessions. The first sweep runs one full
/// interval after start.
pub fn spawn_session_sweeper(
    sessions: Arc<ConversationStore>,
    every: Duration,
    timeout: chrono::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        loop {
            ticker.tick().await;
            let removed = sessions.sweep_stale(timeout);
            if removed > 0 {
                info!(removed, remaining = sessions.len(), "cleared stale sessions");
            } else {
                debug!(remaining = sessions.len(), "no stale sessions");
            }
        }
    })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

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

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn session_or_new(session_id: Option<String>) -> String {
    session_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    session_id: String,
}

async fn handle_chat(
    State(service): State<ChatService>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = request?;
    let message = request.message.trim();
    if message.is_empty() {
        return Err(bad_request("Message cannot be empty."));
    }

    let session_id = session_or_new(request.session_id);
    let answer = service.handle(&session_id, message).await;
    Ok(Json(ChatResponse {
        response: answer.text,
        session_id,
    }))
}

// ============ POST /quick-action ============

#[derive(Deserialize)]
struct QuickActionRequest {
    #[serde(default)]
    action: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct QuickActionResponse {
    response: String,
    session_id: String,
    question: String,
}

async fn handle_quick_action(
    State(service): State<ChatService>,
    request: Result<Json<QuickActionRequest>, JsonRejection>,
) -> Result<Json<QuickActionResponse>, AppError> {
    let Json(request) = request?;
    let question =
        quick_action_question(&request.action).ok_or_else(|| bad_request("Invalid action."))?;

    let session_id = session_or_new(request.session_id);
    let answer = service.handle(&session_id, question).await;
    Ok(Json(QuickActionResponse {
        response: answer.text,
        session_id,
        question: question.to_string(),
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    indexed_chunks: usize,
    sessions: usize,
}

async fn handle_health(State(service): State<ChatService>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        indexed_chunks: service.responder().index().len(),
        sessions: service.sessions().len(),
    })
}
