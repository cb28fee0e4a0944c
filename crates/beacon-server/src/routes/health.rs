//! Liveness plus a conversation store check.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use beacon_session::ConversationStore;

use crate::state::AppState;

/// Body of `GET /api/v1/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the store cannot be read.
    pub status: String,
    pub version: String,
    /// Registered tools.
    pub tools: usize,
    /// `ok`, or the store error.
    pub store: String,
}

/// Answers 503 when the conversation store fails a one-row read, since no
/// turn could be persisted.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, store) = match state.store.list_conversations(1).await {
        Ok(_) => (StatusCode::OK, "healthy", "ok".to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not read the store");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", e.to_string())
        }
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            tools: state.agent.tools().len(),
            store,
        }),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
