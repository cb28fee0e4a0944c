//! Rounds: one model invocation's outcome within a turn.

use serde::{Deserialize, Serialize};

use crate::{Message, ToolCall, ToolDefinition, ToolResult};

/// What the model asked for in a single round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Round {
    /// A final answer; ends the turn.
    FinalText { text: String },
    /// An explicit request to invoke one tool.
    DirectToolRequest { call: ToolCall },
    /// A program to run in the sandbox.
    ///
    /// `calls` is empty when the model emits the program and is filled in
    /// with the execution trace once the program has run.
    ProgramRequest {
        id: String,
        code: String,
        #[serde(default)]
        calls: Vec<ToolCall>,
    },
}

impl Round {
    /// Final text round.
    pub fn text(text: impl Into<String>) -> Self {
        Round::FinalText { text: text.into() }
    }

    /// Direct tool request round.
    pub fn tool(call: ToolCall) -> Self {
        Round::DirectToolRequest { call }
    }

    /// Program request round.
    pub fn program(id: impl Into<String>, code: impl Into<String>) -> Self {
        Round::ProgramRequest {
            id: id.into(),
            code: code.into(),
            calls: Vec::new(),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Round::FinalText { .. } => "final_text",
            Round::DirectToolRequest { .. } => "direct_tool_request",
            Round::ProgramRequest { .. } => "program_request",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Round::FinalText { .. })
    }
}

/// Result of running a model-authored program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramOutcome {
    pub success: bool,
    /// The program's return value rendered as text, or the failure message.
    pub content: String,
    /// Results of every tool call the program made, in completion order.
    #[serde(default)]
    pub trace: Vec<ToolResult>,
}

impl ProgramOutcome {
    pub fn success(content: impl Into<String>, trace: Vec<ToolResult>) -> Self {
        Self {
            success: true,
            content: content.into(),
            trace,
        }
    }

    pub fn failure(message: impl Into<String>, trace: Vec<ToolResult>) -> Self {
        Self {
            success: false,
            content: message.into(),
            trace,
        }
    }
}

/// Result folded back into the model context after a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundOutcome {
    Tool(ToolResult),
    Program(ProgramOutcome),
}

impl RoundOutcome {
    /// Text the model sees for this outcome.
    pub fn to_model_content(&self) -> String {
        match self {
            RoundOutcome::Tool(result) => result.to_model_content(),
            RoundOutcome::Program(outcome) if outcome.success => outcome.content.clone(),
            RoundOutcome::Program(outcome) => {
                format!("Program execution failed: {}", outcome.content)
            }
        }
    }

    /// Whether the outcome represents a failure.
    pub fn is_error(&self) -> bool {
        match self {
            RoundOutcome::Tool(result) => !result.is_success(),
            RoundOutcome::Program(outcome) => !outcome.success,
        }
    }
}

/// A round plus the outcome that was folded back for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: Round,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RoundOutcome>,
}

impl RoundRecord {
    pub fn new(round: Round, outcome: Option<RoundOutcome>) -> Self {
        Self { round, outcome }
    }
}

/// Everything the model gateway needs to decide the next round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Prior messages in stored order.
    pub messages: Vec<Message>,
    /// Tool declarations, sorted by name.
    pub tools: Vec<ToolDefinition>,
}

impl Context {
    pub fn new(messages: Vec<Message>, tools: Vec<ToolDefinition>) -> Self {
        Self { messages, tools }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_serializes_with_type_tag() {
        let value = serde_json::to_value(Round::text("done")).unwrap();
        assert_eq!(value["type"], "final_text");
        assert_eq!(value["text"], "done");

        let value = serde_json::to_value(Round::program("prog_1", "return 1;")).unwrap();
        assert_eq!(value["type"], "program_request");
        assert_eq!(value["calls"], json!([]));
    }

    #[test]
    fn test_outcome_model_content() {
        let call = ToolCall::direct("fetch_fact", json!({"topic": "rust"}));
        let ok = RoundOutcome::Tool(ToolResult::completed(&call, json!("Rust is fast")));
        assert_eq!(ok.to_model_content(), "Rust is fast");
        assert!(!ok.is_error());

        let failed = RoundOutcome::Program(ProgramOutcome::failure("boom", vec![]));
        assert!(failed.is_error());
        assert_eq!(failed.to_model_content(), "Program execution failed: boom");
    }

    #[test]
    fn test_round_kind_labels() {
        let call = ToolCall::direct("calculator", json!({}));
        assert_eq!(Round::tool(call).kind(), "direct_tool_request");
        assert!(Round::text("x").is_final());
    }
}
