//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ChatRequest, ChatResponse, ErrorResponse, SuccessResponse, VersionResponse};
use super::AppState;
use crate::runtime::{RuntimeError, SseEvent};
use crate::state_machine::TransitionError;
use crate::system_prompt::{IntroContent, INTRO};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Snapshot of the conversation
        .route("/api/conversation", get(get_conversation))
        // Intro screen copy
        .route("/api/intro", get(get_intro))
        // User actions
        .route("/api/begin", post(begin))
        .route("/api/chat", post(send_chat))
        .route("/api/reset", post(reset))
        // SSE streaming
        .route("/api/stream", get(stream_conversation))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Conversation Retrieval
// ============================================================

async fn get_conversation(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let view = state.runtime.snapshot().await?;
    Ok(Json(view.to_json()))
}

async fn get_intro() -> Json<IntroContent> {
    Json(INTRO)
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_conversation(State(state): State<AppState>) -> Result<Response, AppError> {
    // Subscribe before taking the snapshot so no update falls in between
    let broadcast_rx = state.runtime.subscribe();
    let view = state.runtime.snapshot().await?;

    let init = SseEvent::Init {
        conversation: view.to_json(),
    };
    Ok(sse_stream(init, broadcast_rx).into_response())
}

// ============================================================
// User Actions
// ============================================================

async fn begin(State(state): State<AppState>) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.begin().await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn send_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    state.runtime.submit(req.text).await?;
    Ok((StatusCode::ACCEPTED, Json(ChatResponse { queued: true })))
}

async fn reset(State(state): State<AppState>) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.reset().await?;
    Ok(Json(SuccessResponse::ok()))
}

// ============================================================
// Version
// ============================================================

async fn get_version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: concat!("gita-essence ", env!("CARGO_PKG_VERSION")),
        model: state.model_id.clone(),
    })
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Conflict(&'static str, String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Rejected(TransitionError::EmptyInput) => {
                AppError::BadRequest(err.to_string())
            }
            RuntimeError::Rejected(TransitionError::AgentBusy) => {
                AppError::Conflict("busy", err.to_string())
            }
            RuntimeError::Rejected(TransitionError::NotStarted) => {
                AppError::Conflict("not_started", err.to_string())
            }
            RuntimeError::Rejected(TransitionError::StaleStreamEvent(_)) | RuntimeError::Closed => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            AppError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ErrorResponse::new(msg).with_code(code))
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(msg))
            }
        };

        (status, Json(body)).into_response()
    }
}
