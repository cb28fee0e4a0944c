//! Progress events and the bounded channel that carries them.
//!
//! A turn reports its progress through an [`EventEmitter`]. The matching
//! [`EventStream`] is handed to whoever is watching (an SSE response, the
//! CLI). The channel is bounded: when the consumer goes away or stops
//! reading for longer than the emit timeout, the emitter detaches and the
//! turn carries on without it.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use beacon_types::{ToolCall, ToolCallId, ToolResult, ToolStatus};

/// Default wait for buffer space before an emitter detaches.
pub const DEFAULT_EMIT_TIMEOUT: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────────────────
// Stream Event
// ─────────────────────────────────────────────────────────────────────────────

/// A progress event emitted during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A model invocation started.
    Thinking { content: String },
    /// The model emitted a program.
    CodeExecution { code: String },
    /// A tool invocation started.
    ToolCall {
        call_id: ToolCallId,
        tool_name: String,
        parameters: serde_json::Value,
        status: String,
    },
    /// A tool invocation finished.
    ToolResult {
        call_id: ToolCallId,
        tool_name: String,
        status: ToolStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The final answer.
    Response {
        content: String,
        tool_calls_count: usize,
    },
    /// Unrecoverable failure.
    Error { content: String, error: String },
}

impl StreamEvent {
    pub fn thinking(content: impl Into<String>) -> Self {
        Self::Thinking {
            content: content.into(),
        }
    }

    pub fn code_execution(code: impl Into<String>) -> Self {
        Self::CodeExecution { code: code.into() }
    }

    /// A `tool_call` event in the running state.
    pub fn tool_call(call: &ToolCall) -> Self {
        Self::ToolCall {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            parameters: call.parameters.clone(),
            status: "running".to_string(),
        }
    }

    pub fn tool_result(result: &ToolResult) -> Self {
        Self::ToolResult {
            call_id: result.call_id.clone(),
            tool_name: result.tool_name.clone(),
            status: result.status,
            value: result.value.clone(),
            error: result.error.clone(),
        }
    }

    pub fn response(content: impl Into<String>, tool_calls_count: usize) -> Self {
        Self::Response {
            content: content.into(),
            tool_calls_count,
        }
    }

    pub fn error(content: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
            error: error.into(),
        }
    }

    /// Wire name of the event, also used as the SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::CodeExecution { .. } => "code_execution",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Response { .. } => "response",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Response { .. } | Self::Error { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Emitter
// ─────────────────────────────────────────────────────────────────────────────

/// A boxed stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send + 'static>>;

struct EmitterInner {
    tx: mpsc::Sender<StreamEvent>,
    timeout: Duration,
    detached: AtomicBool,
    finished: AtomicBool,
}

/// Sending half of a turn's event channel.
///
/// Cheap to clone; clones share detachment and terminal state.
#[derive(Clone, Default)]
pub struct EventEmitter {
    inner: Option<Arc<EmitterInner>>,
}

impl EventEmitter {
    /// An emitter with no consumer. Every event is dropped.
    pub fn detached() -> Self {
        Self { inner: None }
    }

    /// Deliver an event, waiting at most the emit timeout for buffer space.
    ///
    /// Returns whether the event was delivered. Events after a terminal
    /// event, or after the consumer went away, are dropped.
    pub async fn emit(&self, event: StreamEvent) -> bool {
        let Some(inner) = &self.inner else {
            return false;
        };

        if inner.finished.load(Ordering::Acquire) {
            tracing::trace!(event = event.event_type(), "Dropping event after terminal event");
            return false;
        }
        if event.is_terminal() && inner.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        if inner.detached.load(Ordering::Acquire) {
            return false;
        }

        let event_type = event.event_type();
        match inner.tx.send_timeout(event, inner.timeout).await {
            Ok(()) => true,
            Err(SendTimeoutError::Closed(_)) => {
                self.detach(event_type, "consumer dropped");
                false
            }
            Err(SendTimeoutError::Timeout(_)) => {
                self.detach(event_type, "consumer stalled");
                false
            }
        }
    }

    /// Whether the consumer is gone (or there never was one).
    pub fn is_detached(&self) -> bool {
        self.inner
            .as_ref()
            .is_none_or(|inner| inner.detached.load(Ordering::Acquire))
    }

    /// Whether a terminal event has been emitted.
    pub fn is_finished(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.finished.load(Ordering::Acquire))
    }

    fn detach(&self, event_type: &str, reason: &str) {
        if let Some(inner) = &self.inner
            && !inner.detached.swap(true, Ordering::AcqRel)
        {
            tracing::info!(event = event_type, reason, "Event consumer detached");
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("detached", &self.is_detached())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Create a bounded event channel with the default emit timeout.
pub fn channel(capacity: usize) -> (EventEmitter, EventStream) {
    channel_with_timeout(capacity, DEFAULT_EMIT_TIMEOUT)
}

/// Create a bounded event channel.
pub fn channel_with_timeout(capacity: usize, timeout: Duration) -> (EventEmitter, EventStream) {
    let (tx, mut rx) = mpsc::channel(capacity.max(1));
    let emitter = EventEmitter {
        inner: Some(Arc::new(EmitterInner {
            tx,
            timeout,
            detached: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        })),
    };

    let stream = Box::pin(async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            yield event;
            if terminal {
                break;
            }
        }
    });

    (emitter, stream)
}
