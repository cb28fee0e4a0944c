//! Conversation and message endpoints.
//!
//! Conversations are stored by the agent's store, so anything written here
//! is visible to the next turn as history.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use beacon_session::{ConversationStore, DEFAULT_LIST_LIMIT};
use beacon_types::{Conversation, ConversationId, Message, Role};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Upper bound for `?limit=`.
const MAX_LIST_LIMIT: usize = 500;

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// A conversation with its messages in append order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListConversationsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConversationsResponse {
    pub conversations: Vec<Conversation>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppendMessageRequest {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMessagesResponse {
    pub conversation_id: ConversationId,
    pub messages: Vec<Message>,
    pub count: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/conversations
///
/// The body is optional; an empty request creates an untitled conversation.
pub async fn create_conversation_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ConversationDetail>)> {
    let request: CreateConversationRequest = if body.is_empty() {
        CreateConversationRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ServerError::BadRequest(format!("invalid request body: {}", e)))?
    };
    let title = request
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let conversation = state.store.create_conversation(title).await?;
    tracing::info!(conversation_id = %conversation.id, "Conversation created");

    Ok((
        StatusCode::CREATED,
        Json(ConversationDetail {
            conversation,
            messages: Vec::new(),
        }),
    ))
}

/// GET /api/v1/conversations?limit=N - Most recently updated first.
pub async fn list_conversations_handler(
    State(state): State<AppState>,
    Query(query): Query<ListConversationsQuery>,
) -> Result<Json<ListConversationsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if limit == 0 || limit > MAX_LIST_LIMIT {
        return Err(ServerError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIST_LIMIT
        )));
    }

    let conversations = state.store.list_conversations(limit).await?;
    Ok(Json(ListConversationsResponse {
        count: conversations.len(),
        conversations,
    }))
}

/// GET /api/v1/conversations/{id}
pub async fn get_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetail>> {
    let id = ConversationId::from_string(id);
    let conversation = state.store.get_conversation(&id).await?;
    let messages = state.store.get_messages(&id).await?;
    Ok(Json(ConversationDetail {
        conversation,
        messages,
    }))
}

/// DELETE /api/v1/conversations/{id}
pub async fn delete_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = ConversationId::from_string(id);
    state.store.delete_conversation(&id).await?;
    tracing::info!(conversation_id = %id, "Conversation deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/conversations/{id}/messages - Append a message without
/// running a turn.
pub async fn append_message_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AppendMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    if request.content.trim().is_empty() {
        return Err(ServerError::BadRequest(
            "message content must not be empty".to_string(),
        ));
    }

    let id = ConversationId::from_string(id);
    let mut message = Message::new(request.role, request.content);
    if let Some(metadata) = request.metadata {
        message = message.with_metadata(metadata);
    }

    state.store.append_message(&id, message.clone()).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/v1/conversations/{id}/messages
pub async fn list_messages_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ListMessagesResponse>> {
    let id = ConversationId::from_string(id);
    let messages = state.store.get_messages(&id).await?;
    Ok(Json(ListMessagesResponse {
        conversation_id: id,
        count: messages.len(),
        messages,
    }))
}
