//! Conversation, chat and tool catalog flows over a live server.

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn test_health() -> Result<()> {
    let server = common::TestServer::start().await?;

    let body: Value = server.get("/health").send().await?.json().await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "ok");
    assert_eq!(body["tools"], 8);

    Ok(())
}

#[tokio::test]
async fn test_conversation_lifecycle() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server
        .post("/conversations")
        .json(&json!({"title": "Quarterly review"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await?;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["message_count"], 0);

    let resp = server
        .post(&format!("/conversations/{}/messages", id))
        .json(&json!({"role": "user", "content": "seeded question"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let list: Value = server.get("/conversations").send().await?.json().await?;
    assert_eq!(list["count"], 1);
    assert_eq!(list["conversations"][0]["id"], id.as_str());
    assert_eq!(list["conversations"][0]["message_count"], 1);

    let resp = server.delete(&format!("/conversations/{}", id)).send().await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = server.get(&format!("/conversations/{}", id)).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let error: Value = resp.json().await?;
    assert_eq!(error["code"], "not_found");

    Ok(())
}

#[tokio::test]
async fn test_chat_sees_seeded_history() -> Result<()> {
    let server = common::TestServer::start().await?;
    let id = server.create_conversation().await?;

    server
        .post(&format!("/conversations/{}/messages", id))
        .json(&json!({"role": "user", "content": "earlier question"}))
        .send()
        .await?
        .error_for_status()?;

    let resp = server
        .post("/chat")
        .json(&json!({"conversation_id": id, "message": "follow up"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let chat: Value = resp.json().await?;
    assert_eq!(chat["response"], "Test response");
    assert_eq!(chat["status"], "completed");
    assert_eq!(chat["rounds"], 1);

    let history: Vec<String> = server.gateway.requests()[0]
        .context
        .messages
        .iter()
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(history, vec!["earlier question", "follow up"]);

    let detail: Value = server
        .get(&format!("/conversations/{}", id))
        .send()
        .await?
        .json()
        .await?;
    let messages = detail["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[2]["id"], chat["message_id"]);

    Ok(())
}

#[tokio::test]
async fn test_chat_rejects_bad_requests() -> Result<()> {
    let server = common::TestServer::start().await?;
    let id = server.create_conversation().await?;

    let resp = server
        .post("/chat")
        .json(&json!({"conversation_id": id, "message": ""}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = server
        .post("/chat")
        .json(&json!({"conversation_id": "conv_nope", "message": "hi"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(server.gateway.request_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_tool_definitions() -> Result<()> {
    let server = common::TestServer::start().await?;

    let body: Value = server.get("/tools/definitions").send().await?.json().await?;
    assert_eq!(body["count"], 8);

    let names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "calculator",
            "fetch_fact",
            "get_budgets",
            "get_customer_feedback",
            "get_deployments",
            "get_incidents",
            "get_projects",
            "get_team_members"
        ]
    );
    assert_eq!(
        body["tools"][0]["allowed_callers"],
        json!(["direct", "program"])
    );

    Ok(())
}
