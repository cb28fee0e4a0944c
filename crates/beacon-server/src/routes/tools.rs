//! Tool catalog and read-only data endpoints.
//!
//! The data endpoints go through [`beacon_agent::ToolRegistry::invoke`], so
//! query parameters get the same schema validation a model call would.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use beacon_agent::ToolContext;
use beacon_types::ToolDefinition;

use crate::error::Result;
use crate::state::AppState;

/// Response for `GET /api/v1/tools/definitions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolDefinitionsResponse {
    pub tools: Vec<ToolDefinition>,
    pub count: usize,
}

/// GET /api/v1/tools/definitions - Every registered tool, sorted by name,
/// with its parameter schema and allowed call sites.
pub async fn tool_definitions_handler(
    State(state): State<AppState>,
) -> Json<ToolDefinitionsResponse> {
    let tools = state.agent.tools().definitions();
    Json(ToolDefinitionsResponse {
        count: tools.len(),
        tools,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Data endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// Records returned by a data endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolDataResponse {
    pub data: Value,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamMembersQuery {
    pub department: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectsQuery {
    pub team_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncidentsQuery {
    pub status: Option<String>,
    pub severity: Option<String>,
}

/// GET /api/v1/tools/team-members?department=
pub async fn team_members_handler(
    State(state): State<AppState>,
    Query(query): Query<TeamMembersQuery>,
) -> Result<Json<ToolDataResponse>> {
    invoke(&state, "get_team_members", [("department", query.department)]).await
}

/// GET /api/v1/tools/projects?team_id=
pub async fn projects_handler(
    State(state): State<AppState>,
    Query(query): Query<ProjectsQuery>,
) -> Result<Json<ToolDataResponse>> {
    invoke(&state, "get_projects", [("team_id", query.team_id)]).await
}

/// GET /api/v1/tools/incidents?status=&severity=
pub async fn incidents_handler(
    State(state): State<AppState>,
    Query(query): Query<IncidentsQuery>,
) -> Result<Json<ToolDataResponse>> {
    invoke(
        &state,
        "get_incidents",
        [("status", query.status), ("severity", query.severity)],
    )
    .await
}

/// Run a tool with the non-empty filters as parameters.
async fn invoke<const N: usize>(
    state: &AppState,
    tool: &str,
    filters: [(&str, Option<String>); N],
) -> Result<Json<ToolDataResponse>> {
    let params: Map<String, Value> = filters
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .filter(|v| !v.trim().is_empty())
                .map(|v| (name.to_string(), Value::String(v)))
        })
        .collect();

    let data = state
        .agent
        .tools()
        .invoke(tool, Value::Object(params), &ToolContext::default())
        .await?;
    let count = match &data {
        Value::Array(items) => items.len(),
        Value::Object(fields) => fields.len(),
        _ => 1,
    };

    Ok(Json(ToolDataResponse { data, count }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use beacon_agent::{Agent, builtin_registry};
    use beacon_llm::MockGateway;
    use beacon_session::MemoryStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_router() -> Router {
        let agent = Agent::builder()
            .with_gateway(MockGateway::with_text("ok"))
            .with_tools(builtin_registry())
            .with_store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();
        Router::new()
            .route("/tools/team-members", get(team_members_handler))
            .route("/tools/projects", get(projects_handler))
            .route("/tools/incidents", get(incidents_handler))
            .with_state(AppState::new(agent, ServerConfig::new()))
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let response = create_test_router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_team_members_by_department() {
        let (status, json) = get_json("/tools/team-members?department=design").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 3);
        assert_eq!(json["data"][0]["name"], "Iris Thompson");

        let (_, all) = get_json("/tools/team-members").await;
        assert_eq!(all["count"], 17);
    }

    #[tokio::test]
    async fn test_projects_empty_filter_means_all() {
        let (status, json) = get_json("/tools/projects?team_id=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 8);

        let (_, data) = get_json("/tools/projects?team_id=data").await;
        assert_eq!(data["count"], 2);
    }

    #[tokio::test]
    async fn test_incidents_filters() {
        let (status, json) = get_json("/tools/incidents?status=open&severity=P1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 1);
        assert_eq!(json["data"][0]["id"], "inc_012");
    }

    #[tokio::test]
    async fn test_invalid_filter_is_rejected() {
        let (status, json) = get_json("/tools/incidents?severity=P9").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "bad_request");
        assert!(json["message"].as_str().unwrap().contains("severity"));
    }
}
