//! Core types for the agent crate.
//!
//! - [`Turn`]: processing of one user message, round by round
//! - [`AgentConfig`]: runtime limits for the orchestration loop
//! - [`TurnOutcome`]: what a finished turn hands back to its caller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use beacon_types::{ConversationId, MessageId, RoundRecord};

// ─────────────────────────────────────────────────────────────────────────────
// ID Types
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(Uuid);

impl TurnId {
    /// Create a new random turn ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle status of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Running,
    Completed,
    Failed,
}

/// Processing of one user message into a final answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub conversation_id: ConversationId,
    /// The user's input message.
    pub input: String,
    /// Rounds taken so far, strictly in order.
    pub rounds: Vec<RoundRecord>,
    pub status: TurnStatus,
    /// The answer, once the turn has one.
    pub final_text: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Turn {
    /// Start a turn for the given input.
    pub fn new(conversation_id: ConversationId, input: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            conversation_id,
            input: input.into(),
            rounds: Vec::new(),
            status: TurnStatus::Running,
            final_text: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Record a finished round.
    pub fn push_round(&mut self, record: RoundRecord) {
        self.rounds.push(record);
    }

    /// Number of rounds taken.
    pub fn round_count(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// Mark the turn as completed with its answer.
    pub fn complete(&mut self, text: impl Into<String>) {
        self.final_text = Some(text.into());
        self.status = TurnStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the turn as failed, optionally with a text still shown to the user.
    pub fn fail(&mut self, text: Option<String>) {
        self.final_text = text;
        self.status = TurnStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_complete(&self) -> bool {
        self.status != TurnStatus::Running
    }

    /// Total tool calls across all rounds, including calls made by programs.
    pub fn tool_call_count(&self) -> usize {
        self.rounds
            .iter()
            .map(|record| match &record.outcome {
                Some(beacon_types::RoundOutcome::Tool(_)) => 1,
                Some(beacon_types::RoundOutcome::Program(outcome)) => outcome.trace.len(),
                None => 0,
            })
            .sum()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// What a program does when one of its tool calls fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolFailurePolicy {
    /// The first failed call aborts the program.
    #[default]
    Abort,
    /// A failed call raises an error the program can catch with `try`.
    Catch,
}

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// System prompt sent with every model request.
    pub system_prompt: Option<String>,
    /// Maximum model invocations per turn.
    pub max_rounds: u32,
    /// Deadline for one gateway attempt.
    pub model_timeout: Duration,
    /// Deadline for one tool invocation.
    pub tool_timeout: Duration,
    /// Deadline for a whole program run.
    pub program_timeout: Duration,
    /// Step budget for a program run.
    pub program_max_steps: u64,
    /// Retries for transient gateway failures.
    pub model_retries: u32,
    /// Retries for transient failures of idempotent tools.
    pub tool_retries: u32,
    /// Initial retry backoff, doubled per attempt.
    pub retry_backoff: Duration,
    /// Most recent messages included in the model context.
    pub history_limit: usize,
    /// Capacity of the event channel for streamed turns.
    pub event_buffer: usize,
    /// How long an emit may wait for the consumer before it detaches.
    pub emit_timeout: Duration,
    pub tool_failure: ToolFailurePolicy,
}

impl AgentConfig {
    pub fn new() -> Self {
        Self {
            system_prompt: None,
            max_rounds: 10,
            model_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(30),
            program_timeout: Duration::from_secs(60),
            program_max_steps: 10_000,
            model_retries: 2,
            tool_retries: 2,
            retry_backoff: Duration::from_millis(500),
            history_limit: 20,
            event_buffer: 64,
            emit_timeout: Duration::from_secs(5),
            tool_failure: ToolFailurePolicy::Abort,
        }
    }

    /// Set system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set max rounds.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_program_timeout(mut self, timeout: Duration) -> Self {
        self.program_timeout = timeout;
        self
    }

    /// Set retry count and initial backoff for transient model failures.
    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.model_retries = retries;
        self.retry_backoff = backoff;
        self
    }

    /// Set retry count for transient tool failures; shares the model backoff.
    pub fn with_tool_retries(mut self, retries: u32) -> Self {
        self.tool_retries = retries;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn with_emit_timeout(mut self, timeout: Duration) -> Self {
        self.emit_timeout = timeout;
        self
    }

    pub fn with_tool_failure(mut self, policy: ToolFailurePolicy) -> Self {
        self.tool_failure = policy;
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a finished turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub turn_id: TurnId,
    /// The text appended to the conversation as the assistant message.
    pub text: String,
    pub status: TurnStatus,
    /// Number of model rounds used.
    pub rounds: u32,
    /// Tool calls made, including those made by programs.
    pub tool_calls: usize,
    /// Id of the persisted assistant message.
    pub message_id: MessageId,
    /// Whether the round cap stopped the turn.
    pub truncated: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
