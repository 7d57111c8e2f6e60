//! Chat Routes
//!
//! - POST /api/v1/chat - Send a message
//! - DELETE /api/v1/chat/:conversation_id - Forget a conversation
//! - GET /api/v1/chat/health - LLM and guide status

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{ChatRequest, ResetResponse};
use crate::api::error::ApiResult;
use crate::api::extract::ValidJson;
use crate::api::state::AppState;
use crate::chat::{ChatError, ChatHealth, ChatReply, ChatService};

fn chat_service(state: &AppState) -> Result<&Arc<ChatService>, ChatError> {
    state.chat.as_ref().ok_or(ChatError::Disabled)
}

/// POST /api/v1/chat
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    let chat = chat_service(&state)?;
    let reply = chat.respond(req.conversation_id, &req.message).await?;
    Ok(Json(reply))
}

/// DELETE /api/v1/chat/:conversation_id
pub async fn reset_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<ResetResponse>> {
    let chat = chat_service(&state)?;
    let reset = chat.reset(&conversation_id).await;

    tracing::info!(conversation_id = %conversation_id, existed = reset, "Conversation reset");

    Ok(Json(ResetResponse {
        conversation_id,
        reset,
    }))
}

/// GET /api/v1/chat/health
pub async fn chat_health(State(state): State<Arc<AppState>>) -> ApiResult<Json<ChatHealth>> {
    let chat = chat_service(&state)?;
    Ok(Json(chat.health().await))
}
