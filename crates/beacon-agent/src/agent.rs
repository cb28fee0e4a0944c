//! The orchestration loop.
//!
//! An [`Agent`] drives one turn at a time: it asks the model gateway for the
//! next round, acts on it (a direct tool call, a sandboxed program, or the
//! final answer), folds the outcome back, and repeats until the model answers
//! or the round cap is hit. Progress is reported through an [`EventEmitter`].

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use beacon_llm::{
    LlmError, ModelGateway, ModelRequest, SharedGateway, validate_round, with_retry,
};
use beacon_session::SharedStore;
use beacon_types::{
    ConversationId, Message, ProgramOutcome, Round, RoundOutcome, RoundRecord,
};

use crate::context::ContextBuilder;
use crate::error::{AgentError, Result};
use crate::event::{EventEmitter, EventStream, StreamEvent, channel_with_timeout};
use crate::sandbox::{ProgramError, RegistryBridge, Sandbox, SandboxConfig};
use crate::tool::{CallLimits, Tool, ToolContext, ToolRegistry};
use crate::types::{AgentConfig, Turn, TurnOutcome};

const THINKING: &str = "Analyzing your question...";
const THINKING_AGAIN: &str = "Reviewing results...";
const EMPTY_ANSWER: &str = "I processed your request but didn't generate a text response.";
const FAILED: &str = "I encountered an error processing your request.";
const CANCELLED: &str = "The request was cancelled.";

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// Runs turns against a model gateway, a tool registry and a conversation
/// store.
///
/// Cheap to clone; every clone shares the same gateway, tools and store.
#[derive(Clone)]
pub struct Agent {
    gateway: SharedGateway,
    tools: Arc<ToolRegistry>,
    store: SharedStore,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        gateway: SharedGateway,
        tools: ToolRegistry,
        store: SharedStore,
        config: AgentConfig,
    ) -> Self {
        Self {
            gateway,
            tools: Arc::new(tools),
            store,
            config,
        }
    }

    /// Create an agent builder for fluent construction.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn gateway(&self) -> SharedGateway {
        self.gateway.clone()
    }

    /// Process one user message to a final answer.
    ///
    /// The user message is persisted before the first model call and the
    /// answer after the last. Every path ends with exactly one terminal
    /// event on `emitter`: `response` when an answer (or the round-cap
    /// notice) was produced, `error` otherwise.
    pub async fn turn(
        &self,
        conversation_id: &ConversationId,
        input: &str,
        emitter: EventEmitter,
        cancellation: CancellationToken,
    ) -> Result<TurnOutcome> {
        let mut turn = Turn::new(conversation_id.clone(), input);
        let turn_id = turn.id;
        let started = Instant::now();

        tracing::info!(
            %conversation_id,
            %turn_id,
            message_len = input.len(),
            "Turn started"
        );

        match self.run(&mut turn, &emitter, &cancellation).await {
            Ok(outcome) => {
                tracing::info!(
                    %conversation_id,
                    %turn_id,
                    rounds = outcome.rounds,
                    tool_calls = outcome.tool_calls,
                    truncated = outcome.truncated,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Turn completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                turn.fail(None);
                let content = match e {
                    AgentError::Cancelled => CANCELLED,
                    _ => FAILED,
                };
                emitter.emit(StreamEvent::error(content, e.to_string())).await;
                tracing::error!(
                    %conversation_id,
                    %turn_id,
                    rounds = turn.round_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Turn failed"
                );
                Err(e)
            }
        }
    }

    /// Run a turn on its own task.
    ///
    /// The turn keeps going and persists its answer even if the returned
    /// stream is dropped.
    pub fn spawn_turn(
        &self,
        conversation_id: ConversationId,
        input: impl Into<String>,
        cancellation: CancellationToken,
    ) -> (JoinHandle<Result<TurnOutcome>>, EventStream) {
        let (emitter, stream) =
            channel_with_timeout(self.config.event_buffer, self.config.emit_timeout);
        let agent = self.clone();
        let input = input.into();

        let handle = tokio::spawn(async move {
            agent
                .turn(&conversation_id, &input, emitter, cancellation)
                .await
        });

        (handle, stream)
    }

    /// Run a turn on its own task and return its progress events.
    pub fn turn_stream(
        &self,
        conversation_id: ConversationId,
        input: impl Into<String>,
        cancellation: CancellationToken,
    ) -> EventStream {
        self.spawn_turn(conversation_id, input, cancellation).1
    }

    async fn run(
        &self,
        turn: &mut Turn,
        emitter: &EventEmitter,
        cancellation: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let conversation_id = turn.conversation_id.clone();
        let turn_id = turn.id;

        let user_message = Message::user(turn.input.as_str());
        let context = ContextBuilder::new(self.store.clone(), self.tools.clone())
            .with_history_limit(self.config.history_limit)
            .build_for_turn(&conversation_id, &user_message)
            .await?;
        self.store
            .append_message(&conversation_id, user_message)
            .await?;

        loop {
            if cancellation.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            if turn.round_count() >= self.config.max_rounds {
                return self.truncate(turn, emitter).await;
            }

            let round_number = turn.round_count() + 1;
            let status = if round_number == 1 {
                THINKING
            } else {
                THINKING_AGAIN
            };
            emitter.emit(StreamEvent::thinking(status)).await;

            let mut request = ModelRequest::new(context.clone()).with_rounds(turn.rounds.clone());
            if let Some(prompt) = &self.config.system_prompt {
                request = request.with_system_prompt(prompt.clone());
            }

            tracing::debug!(
                %conversation_id,
                %turn_id,
                round = round_number,
                gateway = self.gateway.name(),
                "Calling model"
            );

            let call_start = Instant::now();
            let round = self.ask(&request, cancellation).await?;

            tracing::debug!(
                %conversation_id,
                %turn_id,
                round = round_number,
                kind = round.kind(),
                elapsed_ms = call_start.elapsed().as_millis() as u64,
                "Model round received"
            );

            match round {
                Round::FinalText { text } => {
                    let text = if text.trim().is_empty() {
                        EMPTY_ANSWER.to_string()
                    } else {
                        text
                    };
                    turn.push_round(RoundRecord::new(Round::text(text.as_str()), None));
                    turn.complete(text.as_str());
                    return self.finish(turn, text, emitter, false).await;
                }
                Round::DirectToolRequest { call } => {
                    emitter.emit(StreamEvent::tool_call(&call)).await;

                    tracing::info!(
                        %conversation_id,
                        %turn_id,
                        round = round_number,
                        tool = %call.tool_name,
                        call_id = %call.id,
                        "Executing tool"
                    );

                    let ctx = ToolContext::new(conversation_id.clone(), turn_id, &call)
                        .with_cancellation(cancellation.clone());
                    let dispatched = self
                        .tools
                        .dispatch(&call, &ctx, CallLimits::from(&self.config))
                        .await;
                    let result = match dispatched {
                        Ok(result) => result,
                        Err(e @ AgentError::CapabilityViolation { .. }) => {
                            let rejected = beacon_types::ToolResult::error(&call, e.to_string());
                            emitter.emit(StreamEvent::tool_result(&rejected)).await;
                            return Err(e);
                        }
                        Err(e) => return Err(e),
                    };

                    emitter.emit(StreamEvent::tool_result(&result)).await;
                    turn.push_round(RoundRecord::new(
                        Round::tool(call),
                        Some(RoundOutcome::Tool(result)),
                    ));
                }
                Round::ProgramRequest { id, code, .. } => {
                    emitter.emit(StreamEvent::code_execution(code.as_str())).await;

                    tracing::info!(
                        %conversation_id,
                        %turn_id,
                        round = round_number,
                        program_id = %id,
                        "Executing program"
                    );

                    let bridge = RegistryBridge::new(
                        self.tools.clone(),
                        emitter.clone(),
                        conversation_id.clone(),
                        turn_id,
                    )
                    .with_cancellation(cancellation.clone())
                    .with_limits(CallLimits::from(&self.config));

                    let run = Sandbox::new(SandboxConfig::from(&self.config))
                        .run(&code, &bridge)
                        .await;

                    // A timed-out program leaves its in-flight calls unanswered.
                    let mut trace = run.trace;
                    if matches!(run.outcome, Err(ProgramError::Timeout(_))) {
                        trace.extend(bridge.abandon_pending("Timeout").await);
                    }

                    let outcome = match run.outcome {
                        Ok(value) => ProgramOutcome::success(program_text(&value), trace),
                        Err(ProgramError::CapabilityViolation { tool, call_site }) => {
                            return Err(AgentError::CapabilityViolation { tool, call_site });
                        }
                        Err(ProgramError::Cancelled) => return Err(AgentError::Cancelled),
                        Err(e) => {
                            tracing::debug!(
                                %conversation_id,
                                %turn_id,
                                round = round_number,
                                error = %e,
                                "Program failed, folding error back"
                            );
                            ProgramOutcome::failure(e.to_string(), trace)
                        }
                    };

                    turn.push_round(RoundRecord::new(
                        Round::ProgramRequest {
                            id,
                            code,
                            calls: bridge.calls(),
                        },
                        Some(RoundOutcome::Program(outcome)),
                    ));
                }
            }
        }
    }

    /// Ask the gateway for the next round, retrying transient failures.
    async fn ask(&self, request: &ModelRequest, cancellation: &CancellationToken) -> Result<Round> {
        let gateway = &self.gateway;
        let timeout = self.config.model_timeout;

        let attempts = with_retry(
            self.config.model_retries,
            self.config.retry_backoff,
            gateway.name(),
            || async move {
                match tokio::time::timeout(timeout, gateway.ask(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout(timeout)),
                }
            },
        );

        let round = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(AgentError::Cancelled),
            result = attempts => result?,
        };

        validate_round(&round)?;
        Ok(round)
    }

    /// Stop a turn that used up its rounds, still giving the user an answer.
    async fn truncate(&self, turn: &mut Turn, emitter: &EventEmitter) -> Result<TurnOutcome> {
        let limit = AgentError::RoundLimitExceeded(self.config.max_rounds);
        tracing::warn!(
            conversation_id = %turn.conversation_id,
            turn_id = %turn.id,
            rounds = turn.round_count(),
            error = %limit,
            "Round cap reached"
        );

        let text = format!(
            "I wasn't able to finish answering within {} steps. Try asking a narrower question.",
            self.config.max_rounds
        );
        turn.fail(Some(text.clone()));
        self.finish(turn, text, emitter, true).await
    }

    /// Persist the answer and emit the terminal `response`.
    async fn finish(
        &self,
        turn: &Turn,
        text: String,
        emitter: &EventEmitter,
        truncated: bool,
    ) -> Result<TurnOutcome> {
        let tool_calls = turn.tool_call_count();
        let message = Message::assistant(text.as_str()).with_metadata(json!({
            "turn_id": turn.id.to_string(),
            "rounds": turn.round_count(),
            "tool_calls": tool_calls,
            "truncated": truncated,
        }));
        let message_id = message.id.clone();
        self.store
            .append_message(&turn.conversation_id, message)
            .await?;

        emitter
            .emit(StreamEvent::response(text.as_str(), tool_calls))
            .await;

        Ok(TurnOutcome {
            turn_id: turn.id,
            text,
            status: turn.status,
            rounds: turn.round_count(),
            tool_calls,
            message_id,
            truncated,
        })
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("gateway", &self.gateway.name())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A program's return value as the model sees it.
fn program_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an [`Agent`] with fluent configuration.
pub struct AgentBuilder {
    gateway: Option<SharedGateway>,
    tools: ToolRegistry,
    store: Option<SharedStore>,
    config: AgentConfig,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            gateway: None,
            tools: ToolRegistry::new(),
            store: None,
            config: AgentConfig::default(),
        }
    }

    pub fn with_gateway(mut self, gateway: impl ModelGateway + 'static) -> Self {
        self.gateway = Some(Arc::new(gateway));
        self
    }

    pub fn with_shared_gateway(mut self, gateway: SharedGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Replace the tool registry.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Register one more tool.
    pub fn with_tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.config.max_rounds = max_rounds;
        self
    }

    /// Build the agent.
    pub fn build(self) -> Result<Agent> {
        let gateway = self
            .gateway
            .ok_or_else(|| AgentError::Config("model gateway is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| AgentError::Config("conversation store is required".to_string()))?;

        Ok(Agent::new(gateway, self.tools, store, self.config))
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
