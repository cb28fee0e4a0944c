//! Anthropic Messages API gateway.
//!
//! Tools the registry allows for direct calls are sent as native tools.
//! Tools callable from programs are described inside a single
//! `run_program` tool whose `code` input becomes a [`Round::ProgramRequest`].

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use beacon_types::{CallSite, Role, Round, RoundRecord, ToolCall, ToolDefinition};

use crate::error::{LlmError, RateLimitInfo, Result};
use crate::gateway::{ModelGateway, ModelRequest, validate_round};

/// Default API base URL.
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Default API version.
const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Default model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Name of the synthetic tool through which the model submits programs.
pub const PROGRAM_TOOL_NAME: &str = "run_program";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Anthropic gateway.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Model identifier.
    pub model: String,

    /// Base URL for the API.
    pub base_url: String,

    /// API version header.
    pub api_version: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum tokens per response.
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_tokens: 4096,
        }
    }

    /// Create config from environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            LlmError::Config("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Anthropic Gateway
// ─────────────────────────────────────────────────────────────────────────────

/// Anthropic API gateway.
pub struct AnthropicGateway {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("Anthropic API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a gateway from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicConfig::from_env()?)
    }

    /// Build the messages endpoint URL.
    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// Add authentication and API headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header(header::CONTENT_TYPE, "application/json")
    }

    /// Build the Messages API request body.
    pub fn build_body(&self, request: &ModelRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": build_messages(request),
        });

        let tools = build_tools(&request.context.tools);
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
            // Each round carries at most one tool request.
            body["tool_choice"] = json!({ "type": "auto", "disable_parallel_tool_use": true });
        }
        if let Some(system) = &request.system_prompt {
            body["system"] = Value::String(system.clone());
        }
        body
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();

        let retry_after_header = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        match status.as_u16() {
            401 | 403 => LlmError::Auth(format!("Authentication failed: {}", message)),
            429 => LlmError::RateLimit(RateLimitInfo::from_header(
                message,
                retry_after_header.as_deref(),
            )),
            500..=599 => LlmError::Overloaded(format!("Server error: {}", message)),
            _ => LlmError::Backend(message),
        }
    }
}

#[async_trait]
impl ModelGateway for AnthropicGateway {
    async fn ask(&self, request: &ModelRequest) -> Result<Round> {
        let body = self.build_body(request);

        tracing::debug!(
            model = %self.config.model,
            messages = request.context.messages.len(),
            rounds = request.rounds.len(),
            "Sending Anthropic request"
        );

        let response = self
            .add_headers(self.client.post(self.messages_url()))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let text = response.text().await?;
        let parsed: ApiResponse = serde_json::from_str(&text)?;
        let round = parse_round(parsed)?;
        validate_round(&round)?;
        Ok(round)
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    async fn health_check(&self) -> Result<()> {
        if self.config.api_key.trim().is_empty() {
            return Err(LlmError::Config("Anthropic API key is empty".to_string()));
        }
        Ok(())
    }
}

/// Create a shared Anthropic gateway.
pub fn create_shared_gateway(config: AnthropicConfig) -> Result<Arc<dyn ModelGateway>> {
    Ok(Arc::new(AnthropicGateway::new(config)?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Native tools for direct calls, plus the program tool when any tool
/// is callable from programs.
fn build_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    let mut native: Vec<Value> = tools
        .iter()
        .filter(|t| t.allows(CallSite::Direct))
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.parameter_schema,
            })
        })
        .collect();

    let programmable: Vec<&ToolDefinition> =
        tools.iter().filter(|t| t.allows(CallSite::Program)).collect();
    if !programmable.is_empty() {
        native.push(json!({
            "name": PROGRAM_TOOL_NAME,
            "description": program_tool_description(&programmable),
            "input_schema": {
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Program source to run in the sandbox"
                    }
                },
                "required": ["code"]
            }
        }));
    }

    native
}

fn program_tool_description(tools: &[&ToolDefinition]) -> String {
    let mut out = String::from(
        "Run a short program that calls tools and processes their results. \
         Use this for multi-step data analysis.\n\n\
         Language: `let x = expr;`, `return expr;`, `if cond { } else { }`, \
         `for x in list { }`, `try { } catch err { }`. Expressions support literals, arrays, objects, \
         field access `a.b`, indexing `a[0]`, arithmetic, comparisons, `&&`, `||`, `!`.\n\
         Built-ins: call(name, params), parallel(call(..), call(..)), len, word_count, \
         sum, min, max, round, str, keys, pluck(list, field), filter(list, field, value), error(msg).\n\n\
         Tools callable from programs:\n",
    );
    for tool in tools {
        out.push_str(&format!(
            "- {}: {} Parameters: {}\n",
            tool.name, tool.description, tool.parameter_schema
        ));
    }
    out
}

/// Conversation history followed by this turn's rounds, replayed as
/// `tool_use` / `tool_result` pairs.
fn build_messages(request: &ModelRequest) -> Vec<Value> {
    let mut messages: Vec<Value> = request
        .context
        .messages
        .iter()
        .map(|m| {
            json!({
                "role": match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                "content": m.content,
            })
        })
        .collect();

    for record in &request.rounds {
        if let Some((assistant, user)) = replay_round(record) {
            messages.push(assistant);
            messages.push(user);
        }
    }

    messages
}

fn replay_round(record: &RoundRecord) -> Option<(Value, Value)> {
    let (id, name, input) = match &record.round {
        Round::FinalText { .. } => return None,
        Round::DirectToolRequest { call } => (
            call.id.to_string(),
            call.tool_name.clone(),
            call.parameters.clone(),
        ),
        Round::ProgramRequest { id, code, .. } => (
            id.clone(),
            PROGRAM_TOOL_NAME.to_string(),
            json!({ "code": code }),
        ),
    };

    let (content, is_error) = match &record.outcome {
        Some(outcome) => (outcome.to_model_content(), outcome.is_error()),
        None => ("No result was produced.".to_string(), true),
    };

    let assistant = json!({
        "role": "assistant",
        "content": [{ "type": "tool_use", "id": id, "name": name, "input": input }],
    });
    let user = json!({
        "role": "user",
        "content": [{
            "type": "tool_result",
            "tool_use_id": id,
            "content": content,
            "is_error": is_error,
        }],
    });
    Some((assistant, user))
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Mapping
// ─────────────────────────────────────────────────────────────────────────────

fn parse_round(response: ApiResponse) -> Result<Round> {
    let mut text = String::new();
    let mut tool_uses = Vec::new();

    for block in response.content {
        match block {
            ApiContentBlock::Text { text: t } => text.push_str(&t),
            ApiContentBlock::ToolUse { id, name, input } => tool_uses.push((id, name, input)),
            ApiContentBlock::Other => {}
        }
    }

    if tool_uses.len() > 1 {
        let names: Vec<&str> = tool_uses.iter().map(|(_, name, _)| name.as_str()).collect();
        return Err(LlmError::InvalidRequest(format!(
            "model requested {} tools in one response ({}); one per round is supported",
            tool_uses.len(),
            names.join(", ")
        )));
    }

    let Some((id, name, input)) = tool_uses.into_iter().next() else {
        return Ok(Round::text(text));
    };

    if name == PROGRAM_TOOL_NAME {
        let code = input
            .get("code")
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                LlmError::InvalidRequest(format!("{} input is missing 'code'", PROGRAM_TOOL_NAME))
            })?;
        return Ok(Round::program(id, code));
    }

    Ok(Round::tool(ToolCall::direct(name, input).with_id(id)))
}

#[derive(Debug, serde::Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, serde::Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorDetail {
    message: String,
}
