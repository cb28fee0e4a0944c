//! Shared data model for the Beacon agent.
//!
//! Everything that crosses a crate boundary lives here: conversation
//! messages, tool declarations, tool calls and their results, and the
//! per-round records the orchestration loop folds back into the model
//! context.

pub mod id;
pub mod message;
pub mod round;
pub mod tool;

pub use id::{ConversationId, MessageId, ToolCallId};
pub use message::{Conversation, Message, Role};
pub use round::{Context, ProgramOutcome, Round, RoundOutcome, RoundRecord};
pub use tool::{CallSite, ToolCall, ToolDefinition, ToolResult, ToolStatus};

/// Timestamp type used throughout the data model.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current time as a [`Timestamp`].
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
