//! Tool declarations, invocations and results.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Timestamp, ToolCallId, now};

// ─────────────────────────────────────────────────────────────────────────────
// Call Sites
// ─────────────────────────────────────────────────────────────────────────────

/// Where a tool invocation originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSite {
    /// The model asked for the tool explicitly in its response.
    Direct,
    /// A model-authored program called the tool while running in the sandbox.
    Program,
}

impl std::fmt::Display for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallSite::Direct => f.write_str("direct"),
            CallSite::Program => f.write_str("program"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Definition
// ─────────────────────────────────────────────────────────────────────────────

/// Declaration of a callable tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the parameters object.
    pub parameter_schema: serde_json::Value,
    /// Call sites allowed to invoke this tool.
    pub allowed_callers: BTreeSet<CallSite>,
}

impl ToolDefinition {
    /// Create a definition callable from the direct call site only.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameter_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema,
            allowed_callers: BTreeSet::from([CallSite::Direct]),
        }
    }

    /// Replace the set of allowed call sites.
    pub fn with_allowed_callers(mut self, callers: impl IntoIterator<Item = CallSite>) -> Self {
        self.allowed_callers = callers.into_iter().collect();
        self
    }

    /// Whether the given call site may invoke this tool.
    pub fn allows(&self, call_site: CallSite) -> bool {
        self.allowed_callers.contains(&call_site)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Call
// ─────────────────────────────────────────────────────────────────────────────

/// One invocation attempt of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub tool_name: String,
    pub parameters: serde_json::Value,
    pub call_site: CallSite,
    pub started_at: Timestamp,
}

impl ToolCall {
    /// Create a call with a fresh identity.
    pub fn new(
        tool_name: impl Into<String>,
        parameters: serde_json::Value,
        call_site: CallSite,
    ) -> Self {
        Self {
            id: ToolCallId::new(),
            tool_name: tool_name.into(),
            parameters,
            call_site,
            started_at: now(),
        }
    }

    /// A call requested directly by the model.
    pub fn direct(tool_name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self::new(tool_name, parameters, CallSite::Direct)
    }

    /// A call issued from a sandboxed program.
    pub fn program(tool_name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self::new(tool_name, parameters, CallSite::Program)
    }

    /// Use a caller-supplied identity (e.g. the model's tool-use id).
    pub fn with_id(mut self, id: impl Into<ToolCallId>) -> Self {
        self.id = id.into();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal status of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Completed,
    Error,
}

/// Outcome of a [`ToolCall`]. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: ToolCallId,
    pub tool_name: String,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: Timestamp,
}

impl ToolResult {
    /// Successful result for `call`.
    pub fn completed(call: &ToolCall, value: serde_json::Value) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            status: ToolStatus::Completed,
            value: Some(value),
            error: None,
            finished_at: now(),
        }
    }

    /// Failed result for `call`.
    pub fn error(call: &ToolCall, message: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            status: ToolStatus::Error,
            value: None,
            error: Some(message.into()),
            finished_at: now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Completed
    }

    /// Render the result as text for the model.
    pub fn to_model_content(&self) -> String {
        match (&self.status, &self.value, &self.error) {
            (ToolStatus::Completed, Some(serde_json::Value::String(s)), _) => s.clone(),
            (ToolStatus::Completed, Some(value), _) => value.to_string(),
            (ToolStatus::Completed, None, _) => "null".to_string(),
            (ToolStatus::Error, _, Some(message)) => {
                format!("Error executing {}: {}", self.tool_name, message)
            }
            (ToolStatus::Error, _, None) => format!("Error executing {}", self.tool_name),
        }
    }
}
