//! [`ToolBridge`] backed by the tool registry.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use beacon_types::{ConversationId, ToolCall, ToolCallId, ToolResult};

use super::{ProgramError, ToolBridge};
use crate::error::AgentError;
use crate::event::{EventEmitter, StreamEvent};
use crate::tool::{CallLimits, ToolContext, ToolRegistry};
use crate::types::TurnId;

/// Routes program calls into the registry and reports each one as it runs.
///
/// Every call emits `tool_call` before dispatch and `tool_result` after, so
/// concurrent calls interleave but each pair stays ordered. Calls still in
/// flight when the program is abandoned are closed with
/// [`RegistryBridge::abandon_pending`].
pub struct RegistryBridge {
    tools: Arc<ToolRegistry>,
    emitter: EventEmitter,
    conversation_id: ConversationId,
    turn_id: TurnId,
    cancellation: CancellationToken,
    limits: CallLimits,
    calls: Mutex<Vec<ToolCall>>,
    pending: Mutex<Vec<ToolCall>>,
}

impl RegistryBridge {
    pub fn new(
        tools: Arc<ToolRegistry>,
        emitter: EventEmitter,
        conversation_id: ConversationId,
        turn_id: TurnId,
    ) -> Self {
        Self {
            tools,
            emitter,
            conversation_id,
            turn_id,
            cancellation: CancellationToken::new(),
            limits: CallLimits::new(Duration::from_secs(30)),
            calls: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Per-call deadline and retry budget.
    pub fn with_limits(mut self, limits: CallLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Calls received so far, in the order they were issued.
    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().clone()
    }

    /// Close every call that started but never finished.
    ///
    /// Used after the program itself is dropped, e.g. on its deadline. Each
    /// pending call gets an error `tool_result` so no call is left running.
    pub async fn abandon_pending(&self, reason: &str) -> Vec<ToolResult> {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut results = Vec::with_capacity(pending.len());
        for call in pending {
            tracing::debug!(
                tool = %call.tool_name,
                call_id = %call.id,
                reason,
                "Abandoning in-flight tool call"
            );
            let result = ToolResult::error(&call, reason);
            self.emitter.emit(StreamEvent::tool_result(&result)).await;
            results.push(result);
        }
        results
    }

    fn settle(&self, id: &ToolCallId) {
        self.pending.lock().retain(|call| &call.id != id);
    }
}

#[async_trait]
impl ToolBridge for RegistryBridge {
    async fn call(&self, call: ToolCall) -> Result<ToolResult, ProgramError> {
        if self.cancellation.is_cancelled() {
            return Err(ProgramError::Cancelled);
        }

        self.calls.lock().push(call.clone());
        self.pending.lock().push(call.clone());
        self.emitter.emit(StreamEvent::tool_call(&call)).await;

        let ctx = ToolContext::new(self.conversation_id.clone(), self.turn_id, &call)
            .with_cancellation(self.cancellation.clone());

        let dispatched = self.tools.dispatch(&call, &ctx, self.limits).await;
        self.settle(&call.id);

        match dispatched {
            Ok(result) => {
                self.emitter.emit(StreamEvent::tool_result(&result)).await;
                Ok(result)
            }
            Err(AgentError::CapabilityViolation { tool, call_site }) => {
                let error = ProgramError::CapabilityViolation { tool, call_site };
                let result = ToolResult::error(&call, error.to_string());
                self.emitter.emit(StreamEvent::tool_result(&result)).await;
                Err(error)
            }
            Err(AgentError::Cancelled) => Err(ProgramError::Cancelled),
            Err(other) => {
                let result = ToolResult::error(&call, other.to_string());
                self.emitter.emit(StreamEvent::tool_result(&result)).await;
                Ok(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::channel;
    use crate::sandbox::{Sandbox, SandboxConfig};
    use crate::tool::MockTool;
    use beacon_types::CallSite;
    use futures::StreamExt;
    use serde_json::json;

    fn registry() -> Arc<ToolRegistry> {
        let mut tools = ToolRegistry::new();
        tools.register(MockTool::new("lookup").with_response(json!({"ok": true})));
        tools.register(MockTool::new("direct_only").with_allowed_callers([CallSite::Direct]));
        Arc::new(tools)
    }

    #[tokio::test]
    async fn test_calls_emit_paired_events() {
        let (emitter, stream) = channel(16);
        let bridge = RegistryBridge::new(
            registry(),
            emitter.clone(),
            ConversationId::new(),
            TurnId::new(),
        );

        let run = Sandbox::default()
            .run(
                r#"return len(parallel(call("lookup", {}), call("lookup", {})));"#,
                &bridge,
            )
            .await;
        assert!(run.is_success());
        assert_eq!(bridge.calls().len(), 2);
        emitter.emit(StreamEvent::response("done", 2)).await;
        drop(bridge);
        drop(emitter);

        let events: Vec<StreamEvent> = stream.collect().await;
        let mut started = Vec::new();
        for event in &events {
            match event {
                StreamEvent::ToolCall { call_id, .. } => started.push(call_id.clone()),
                StreamEvent::ToolResult { call_id, .. } => assert!(started.contains(call_id)),
                _ => {}
            }
        }
        assert_eq!(started.len(), 2);
        assert!(events.last().is_some_and(StreamEvent::is_terminal));
    }

    #[tokio::test]
    async fn test_capability_violation_reported_then_fatal() {
        let (emitter, stream) = channel(16);
        let bridge = RegistryBridge::new(
            registry(),
            emitter.clone(),
            ConversationId::new(),
            TurnId::new(),
        );

        let run = Sandbox::default().run(r#"call("direct_only");"#, &bridge).await;
        assert!(matches!(
            run.outcome,
            Err(ProgramError::CapabilityViolation { call_site: CallSite::Program, .. })
        ));
        drop(bridge);
        drop(emitter);

        let events: Vec<StreamEvent> = stream.collect().await;
        let types: Vec<&str> = events.iter().map(StreamEvent::event_type).collect();
        assert_eq!(types, vec!["tool_call", "tool_result"]);
    }

    #[tokio::test]
    async fn test_timed_out_program_closes_pending_calls() {
        let mut tools = ToolRegistry::new();
        tools.register(MockTool::new("slow").with_delay(Duration::from_millis(500)));
        let (emitter, stream) = channel(16);
        let bridge = RegistryBridge::new(
            Arc::new(tools),
            emitter.clone(),
            ConversationId::new(),
            TurnId::new(),
        );

        let sandbox = Sandbox::new(SandboxConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        });
        let run = sandbox.run(r#"return call("slow");"#, &bridge).await;
        assert!(matches!(run.outcome, Err(ProgramError::Timeout(_))));

        let abandoned = bridge.abandon_pending("Timeout").await;
        assert_eq!(abandoned.len(), 1);
        assert_eq!(abandoned[0].error.as_deref(), Some("Timeout"));
        assert!(bridge.abandon_pending("Timeout").await.is_empty());
        drop(bridge);
        drop(emitter);

        let events: Vec<StreamEvent> = stream.collect().await;
        let types: Vec<&str> = events.iter().map(StreamEvent::event_type).collect();
        assert_eq!(types, vec!["tool_call", "tool_result"]);
        match (&events[0], &events[1]) {
            (
                StreamEvent::ToolCall { call_id: started, .. },
                StreamEvent::ToolResult { call_id, status, .. },
            ) => {
                assert_eq!(started, call_id);
                assert_eq!(*status, beacon_types::ToolStatus::Error);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finished_calls_are_not_pending() {
        let bridge = RegistryBridge::new(
            registry(),
            EventEmitter::detached(),
            ConversationId::new(),
            TurnId::new(),
        );
        let run = Sandbox::default().run(r#"return call("lookup");"#, &bridge).await;
        assert!(run.is_success());
        assert!(bridge.abandon_pending("Timeout").await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_bridge_refuses_calls() {
        let token = CancellationToken::new();
        token.cancel();
        let bridge = RegistryBridge::new(
            registry(),
            EventEmitter::detached(),
            ConversationId::new(),
            TurnId::new(),
        )
        .with_cancellation(token);

        let run = Sandbox::default().run(r#"call("lookup");"#, &bridge).await;
        assert_eq!(run.outcome, Err(ProgramError::Cancelled));
    }
}
