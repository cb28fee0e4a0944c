//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use beacon_agent::{Agent, AgentConfig, builtin_registry};
use beacon_llm::MockGateway;
use beacon_session::{SharedStore, SqliteStore};
use beacon_server::{Server, ServerConfig};

/// A test server that runs in the background over a SQLite store.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    /// The scripted model behind the agent.
    pub gateway: Arc<MockGateway>,
    pub store: SharedStore,
    _handle: JoinHandle<()>,
    pub temp_dir: TempDir,
}

impl TestServer {
    /// Start a server whose model always answers "Test response".
    pub async fn start() -> Result<Self> {
        Self::start_with(MockGateway::with_text("Test response"), ServerConfig::new()).await
    }

    pub async fn start_with(gateway: MockGateway, config: ServerConfig) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let addr = find_available_port().await?;

        let gateway = Arc::new(gateway);
        let store: SharedStore = Arc::new(SqliteStore::open(temp_dir.path().join("beacon.db"))?);

        let agent = Agent::builder()
            .with_shared_gateway(gateway.clone())
            .with_tools(builtin_registry())
            .with_store(store.clone())
            .with_config(AgentConfig::new().with_retries(0, Duration::from_millis(1)))
            .build()?;

        let config = config.with_bind_address(addr).with_request_logging(false);

        let server = Server::new(agent, config);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            gateway,
            store,
            _handle: handle,
            temp_dir,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(format!("{}{}", self.base_url(), path))
    }

    /// Create a conversation and return its id.
    pub async fn create_conversation(&self) -> Result<String> {
        let body: Value = self
            .post("/conversations")
            .json(&serde_json::json!({}))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        body["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("missing conversation id"))
    }
}

/// One parsed Server-Sent Event.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event: String,
    pub data: Value,
}

/// Parse a complete `text/event-stream` body, skipping keep-alive comments.
pub fn parse_sse(body: &str) -> Vec<SseEvent> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = String::new();
            for line in block.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = Some(name.trim().to_string());
                } else if let Some(chunk) = line.strip_prefix("data:") {
                    data.push_str(chunk.trim_start());
                }
            }
            let event = event?;
            let data = serde_json::from_str(&data).ok()?;
            Some(SseEvent { event, data })
        })
        .collect()
}

async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/api/v1/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
