//! Error types for the agent crate.

use thiserror::Error;

use beacon_types::CallSite;

use crate::sandbox::ProgramError;
use crate::tool::ValidationError;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Model gateway error.
    #[error("LLM error: {0}")]
    Llm(#[from] beacon_llm::LlmError),

    /// Tool execution error.
    #[error("Tool error: {0}")]
    Tool(String),

    /// A tool failure that may succeed if the call is repeated.
    #[error("Tool error (transient): {0}")]
    TransientTool(String),

    /// Tool not found in registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Parameters did not match the tool's schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A call site tried to invoke a tool it is not allowed to use.
    #[error("Tool '{tool}' cannot be called from the {call_site} call site")]
    CapabilityViolation { tool: String, call_site: CallSite },

    /// A tool invocation ran past its deadline.
    #[error("Tool '{tool}' timed out after {elapsed_ms}ms")]
    Timeout { tool: String, elapsed_ms: u64 },

    /// Conversation does not exist.
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// Conversation storage error.
    #[error("Storage error: {0}")]
    Store(beacon_session::Error),

    /// A model-authored program could not run to completion.
    #[error("Program execution failed: {0}")]
    Program(#[from] ProgramError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Turn was cancelled.
    #[error("Turn cancelled")]
    Cancelled,

    /// The turn asked the model more times than allowed.
    #[error("Round limit exceeded: {0}")]
    RoundLimitExceeded(u32),
}

impl From<beacon_session::Error> for AgentError {
    fn from(err: beacon_session::Error) -> Self {
        match err {
            beacon_session::Error::NotFound(id) => AgentError::ConversationNotFound(id),
            other => AgentError::Store(other),
        }
    }
}

impl AgentError {
    /// Create a tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a tool error worth retrying, such as a dropped connection.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientTool(msg.into())
    }

    /// Whether repeating the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentError::TransientTool(_))
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error ends the turn instead of being folded back to the
    /// model as a failed tool result.
    pub fn is_fatal(&self) -> bool {
        match self {
            AgentError::CapabilityViolation { .. } | AgentError::Cancelled => true,
            AgentError::Program(e) => e.is_fatal(),
            _ => false,
        }
    }
}
