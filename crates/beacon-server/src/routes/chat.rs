//! Chat endpoints for running turns.
//!
//! `POST /chat` waits for the whole turn. `POST /chat/stream` relays the
//! turn's progress events as Server-Sent Events, one SSE event per stream
//! event, named after its type.

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use beacon_agent::{StreamEvent, TurnStatus};
use beacon_session::ConversationStore;
use beacon_types::{ConversationId, MessageId};

use crate::error::{Result, ServerError};
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for chat endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Conversation to continue. Create one first via `POST /conversations`.
    #[serde(default)]
    pub conversation_id: Option<String>,

    /// The user's message.
    pub message: String,
}

/// Response from the blocking chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: ConversationId,

    /// Id of the persisted assistant message.
    pub message_id: MessageId,

    /// The agent's answer.
    pub response: String,

    pub status: TurnStatus,

    /// Model rounds used.
    pub rounds: u32,

    /// Tool invocations made, direct and from programs.
    pub tool_calls: usize,

    /// Whether the turn hit the round cap.
    pub truncated: bool,
}

impl ChatRequest {
    /// Check the request and resolve its conversation.
    ///
    /// Fails with 400 on an empty message or a missing id, and with 404 if
    /// the conversation does not exist.
    async fn resolve(&self, state: &AppState) -> Result<ConversationId> {
        if self.message.trim().is_empty() {
            return Err(ServerError::BadRequest(
                "message must not be empty".to_string(),
            ));
        }

        let id = self
            .conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ConversationId::from_string)
            .ok_or_else(|| ServerError::BadRequest("conversation_id is required".to_string()))?;

        if !state.store.exists(&id).await? {
            return Err(ServerError::NotFound(format!(
                "Conversation {} not found",
                id
            )));
        }

        Ok(id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/chat - Run a turn and wait for the answer.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let conversation_id = request.resolve(&state).await?;

    // Run on its own task so a dropped connection does not abort the turn
    // halfway through persisting. Nobody reads the events here.
    let (handle, events) = state.agent.spawn_turn(
        conversation_id.clone(),
        request.message,
        CancellationToken::new(),
    );
    drop(events);

    let outcome = handle
        .await
        .map_err(|e| ServerError::Internal(format!("Turn task failed: {}", e)))??;

    Ok(Json(ChatResponse {
        conversation_id,
        message_id: outcome.message_id,
        response: outcome.text,
        status: outcome.status,
        rounds: outcome.rounds,
        tool_calls: outcome.tool_calls,
        truncated: outcome.truncated,
    }))
}

/// POST /api/v1/chat/stream - Run a turn and stream its events over SSE.
///
/// Validation happens before the stream opens, so errors still arrive as
/// plain JSON responses. Once streaming, failures arrive as an `error`
/// event and the stream ends after the terminal event.
pub async fn chat_stream_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let conversation_id = request.resolve(&state).await?;

    let cancellation = CancellationToken::new();
    let guard = state
        .config
        .cancel_on_disconnect
        .then(|| cancellation.clone().drop_guard());

    let events = state
        .agent
        .turn_stream(conversation_id.clone(), request.message, cancellation);

    let sse_stream = async_stream::stream! {
        use futures::StreamExt;

        // Dropping the stream (client gone) drops the guard and cancels the
        // turn, when enabled.
        let _guard = guard;

        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            let terminal = event.is_terminal();
            yield Ok(to_sse_event(&event));
            if terminal {
                break;
            }
        }

        tracing::debug!(%conversation_id, "Event stream closed");
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &StreamEvent) -> Event {
    Event::default()
        .event(event.event_type())
        .json_data(event)
        .unwrap_or_else(|_| Event::default().event("error"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::post,
    };
    use beacon_agent::Agent;
    use beacon_llm::MockGateway;
    use beacon_session::MemoryStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state(gateway: MockGateway) -> AppState {
        let agent = Agent::builder()
            .with_gateway(gateway)
            .with_store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();
        AppState::new(agent, ServerConfig::new())
    }

    fn create_test_router(state: AppState) -> Router {
        Router::new()
            .route("/chat", post(chat_handler))
            .route("/chat/stream", post(chat_stream_handler))
            .with_state(state)
    }

    fn chat_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chat_runs_turn_and_persists() {
        let state = create_test_state(MockGateway::with_text("Hello from the agent!"));
        let conversation = state.store.create_conversation(None).await.unwrap();
        let app = create_test_router(state.clone());

        let response = app
            .oneshot(chat_request(
                "/chat",
                serde_json::json!({"conversation_id": conversation.id, "message": "Hello"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let chat: ChatResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(chat.response, "Hello from the agent!");
        assert_eq!(chat.rounds, 1);
        assert!(!chat.truncated);

        let messages = state.store.get_messages(&conversation.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].id, chat.message_id);
    }

    #[tokio::test]
    async fn test_chat_validation() {
        let state = create_test_state(MockGateway::with_text("unused"));
        let conversation = state.store.create_conversation(None).await.unwrap();
        let app = create_test_router(state);

        for (uri, body, expected) in [
            (
                "/chat",
                serde_json::json!({"conversation_id": conversation.id, "message": "  "}),
                StatusCode::BAD_REQUEST,
            ),
            (
                "/chat",
                serde_json::json!({"message": "hi"}),
                StatusCode::BAD_REQUEST,
            ),
            (
                "/chat",
                serde_json::json!({"conversation_id": "conv_missing", "message": "hi"}),
                StatusCode::NOT_FOUND,
            ),
            (
                "/chat/stream",
                serde_json::json!({"conversation_id": conversation.id, "message": ""}),
                StatusCode::BAD_REQUEST,
            ),
            (
                "/chat/stream",
                serde_json::json!({"conversation_id": "conv_missing", "message": "hi"}),
                StatusCode::NOT_FOUND,
            ),
        ] {
            let response = app.clone().oneshot(chat_request(uri, body)).await.unwrap();
            assert_eq!(response.status(), expected, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_stream_names_events_by_type() {
        let state = create_test_state(MockGateway::with_text("streamed answer"));
        let conversation = state.store.create_conversation(None).await.unwrap();
        let app = create_test_router(state);

        let response = app
            .oneshot(chat_request(
                "/chat/stream",
                serde_json::json!({"conversation_id": conversation.id, "message": "Hello"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/event-stream"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let names: Vec<&str> = text
            .lines()
            .filter_map(|line| line.strip_prefix("event: "))
            .collect();
        assert_eq!(names, vec!["thinking", "response"]);
        assert!(text.contains(r#""content":"streamed answer""#));
    }

    #[test]
    fn test_sse_event_carries_type() {
        let event = StreamEvent::thinking("working");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "thinking");
        assert_eq!(event.event_type(), "thinking");
    }
}
