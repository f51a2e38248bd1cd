use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::Stream;

use crate::errors::AppError;
use crate::models::Session;
use crate::services::conversation::{self, ChatReply};
use crate::services::events::session_key;
use crate::state::AppState;

// POST /api/chat/start
pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<ChatReply>, AppError> {
    Ok(Json(conversation::start_session(&state).await?))
}

// POST /api/chat/message
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub session_id: String,
    pub message: String,
}

pub async fn message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<ChatReply>, AppError> {
    if req.session_id.trim().is_empty() {
        return Err(AppError::Validation("sessionId is required".to_string()));
    }
    Ok(Json(
        conversation::process_message(&state, req.session_id.trim(), &req.message).await?,
    ))
}

// GET /api/chat/:session_id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, AppError> {
    state
        .sessions
        .load(&session_id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("session not found".to_string()))
}

// GET /api/chat/:session_id/events
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    super::change_stream(&state.notifier, &session_key(&session_id), "session")
}
