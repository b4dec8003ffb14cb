//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ChatRequest, ChatResponse, ClearRequest, ClearResponse, DraftRequest, ErrorResponse,
    LoginRequest, LoginResponse, MessageView, MessagesResponse, ReplyRequest, SessionResponse,
    SuccessResponse,
};
use super::AppState;
use crate::runtime::{RuntimeError, SubmitOutcome};
use crate::session::{CLEAR_CONFIRMATION, LOGIN_FAILED_ALERT};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session gate
        .route("/api/session", get(get_session))
        .route("/api/login", post(login))
        // Conversation
        .route("/api/messages", get(list_messages))
        .route("/api/chat", post(send_chat))
        .route("/api/clear", post(clear_history))
        // Composer
        .route("/api/composer/draft", put(set_draft))
        .route(
            "/api/composer/reply",
            post(set_reply_target).delete(cancel_reply),
        )
        // SSE streaming
        .route("/api/stream", get(stream_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session Gate
// ============================================================

async fn get_session(State(state): State<AppState>) -> Result<Json<SessionResponse>, AppError> {
    let snapshot = state.chat.snapshot().await?;
    Ok(Json(SessionResponse {
        authenticated: snapshot.authenticated,
        awaiting_response: snapshot.state.is_awaiting(),
        state: snapshot.state,
        draft: snapshot.draft,
        reply_target: snapshot.reply_target,
        message_count: snapshot.messages.len(),
    }))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if state.chat.authenticate(req.passphrase).await? {
        Ok(Json(LoginResponse {
            authenticated: true,
        }))
    } else {
        Err(AppError::Unauthorized(LOGIN_FAILED_ALERT.to_string()))
    }
}

// ============================================================
// Conversation
// ============================================================

async fn list_messages(
    State(state): State<AppState>,
) -> Result<Json<MessagesResponse>, AppError> {
    let snapshot = state.chat.snapshot().await?;
    if !snapshot.authenticated {
        return Err(RuntimeError::Locked.into());
    }
    Ok(Json(MessagesResponse {
        messages: MessageView::from_conversation(&snapshot.messages),
    }))
}

async fn send_chat(
    State(state): State<AppState>,
    body: Option<Json<ChatRequest>>,
) -> Result<Json<ChatResponse>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let response = match state.chat.submit(req.text).await? {
        SubmitOutcome::Queued { message_id } => ChatResponse {
            queued: true,
            message_id: Some(message_id),
        },
        SubmitOutcome::Ignored => ChatResponse {
            queued: false,
            message_id: None,
        },
    };
    Ok(Json(response))
}

async fn clear_history(
    State(state): State<AppState>,
    body: Option<Json<ClearRequest>>,
) -> Result<Json<ClearResponse>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let cleared = state.chat.clear(req.confirmed).await?;
    Ok(Json(ClearResponse {
        cleared,
        confirmation: (!req.confirmed).then_some(CLEAR_CONFIRMATION),
    }))
}

// ============================================================
// Composer
// ============================================================

async fn set_draft(
    State(state): State<AppState>,
    Json(req): Json<DraftRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.chat.set_draft(req.text).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn set_reply_target(
    State(state): State<AppState>,
    Json(req): Json<ReplyRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    if req.message_id.trim().is_empty() {
        return Err(AppError::BadRequest("message_id is required".to_string()));
    }
    state.chat.set_reply_target(req.message_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn cancel_reply(State(state): State<AppState>) -> Result<Json<SuccessResponse>, AppError> {
    state.chat.cancel_reply().await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_session(State(state): State<AppState>) -> Result<Response, AppError> {
    // Subscribe first so nothing between the snapshot and the stream is lost
    let broadcast_rx = state.chat.subscribe();
    let snapshot = state.chat.snapshot().await?;
    if !snapshot.authenticated {
        return Err(RuntimeError::Locked.into());
    }
    Ok(sse_stream(snapshot, broadcast_rx).into_response())
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("companion-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::Locked => AppError::Forbidden(e.to_string()),
            RuntimeError::UnknownMessage(_) => AppError::NotFound(e.to_string()),
            RuntimeError::Storage(_) | RuntimeError::Closed => {
                tracing::error!(error = %e, "Request failed");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
