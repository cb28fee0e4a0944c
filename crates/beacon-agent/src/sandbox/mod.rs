//! Execution bridge for model-authored programs.
//!
//! # Flow
//!
//! 1. The model emits a program in a small expression language
//! 2. [`Program::parse`] turns it into an AST, rejecting malformed input
//! 3. [`Sandbox::run`] evaluates it under a wall-clock deadline and a step budget
//! 4. Every `call(...)` goes through a [`ToolBridge`], the program's only capability
//! 5. The return value and the trace of tool results flow back to the loop
//!
//! # Language
//!
//! ```text
//! let fact = call("fetch_fact", {topic: "rust"});
//! let words = word_count(fact);
//! let both = parallel(call("get_projects", {}), call("get_incidents", {status: "open"}));
//! let active = 0;
//! for p in both[0] { if p.status == "active" { active = active + 1; } }
//! try { call("calculator", {operation: "divide", a: words, b: 0}); } catch err { return err; }
//! return {words: words, active: active, incidents: len(both[1])};
//! ```
//!
//! Built-ins: `call`, `parallel`, `error`, `len`, `word_count`, `sum`, `min`,
//! `max`, `round`, `str`, `pluck`, `filter`, `keys`.

mod bridge;
mod builtins;
mod interpreter;
mod lexer;
mod parser;

pub use bridge::RegistryBridge;
pub use parser::Program;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use beacon_types::{CallSite, ToolCall, ToolResult};

use crate::types::{AgentConfig, ToolFailurePolicy};
use interpreter::Interpreter;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Why a program did not produce a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgramError {
    /// Source could not be tokenized or parsed.
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Uncaught runtime error.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A tool call failed and the failure policy aborts the program.
    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// The program ran more steps than allowed.
    #[error("step limit of {0} exceeded")]
    StepLimit(u64),

    /// The program ran past its deadline.
    #[error("program timed out after {0:?}")]
    Timeout(Duration),

    /// The program called a tool that does not allow program calls.
    #[error("tool '{tool}' cannot be called from the {call_site} call site")]
    CapabilityViolation { tool: String, call_site: CallSite },

    /// The turn was cancelled while the program ran.
    #[error("cancelled")]
    Cancelled,
}

impl ProgramError {
    /// Whether the error ends the whole turn rather than just the program.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProgramError::CapabilityViolation { .. } | ProgramError::Cancelled
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bridge
// ─────────────────────────────────────────────────────────────────────────────

/// The program's only way to reach the outside world.
///
/// A failed tool invocation is an `Ok` result with error status. `Err` is
/// reserved for conditions that must stop the program unconditionally.
#[async_trait]
pub trait ToolBridge: Send + Sync {
    async fn call(&self, call: ToolCall) -> Result<ToolResult, ProgramError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Sandbox
// ─────────────────────────────────────────────────────────────────────────────

/// Limits applied to one program run.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub timeout: Duration,
    pub max_steps: u64,
    pub tool_failure: ToolFailurePolicy,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_steps: 10_000,
            tool_failure: ToolFailurePolicy::Abort,
        }
    }
}

impl From<&AgentConfig> for SandboxConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            timeout: config.program_timeout,
            max_steps: config.program_max_steps,
            tool_failure: config.tool_failure,
        }
    }
}

/// Result of one program run.
#[derive(Debug, Clone)]
pub struct ProgramRun {
    /// The program's return value, or why it has none.
    pub outcome: Result<Value, ProgramError>,
    /// Every tool result the program received, in the order received.
    pub trace: Vec<ToolResult>,
    pub elapsed: Duration,
}

impl ProgramRun {
    pub fn return_value(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs programs against a [`ToolBridge`].
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Parse and run `code`.
    ///
    /// The trace is kept even when the program fails or times out.
    pub async fn run(&self, code: &str, bridge: &dyn ToolBridge) -> ProgramRun {
        let started = Instant::now();
        let trace = Arc::new(Mutex::new(Vec::new()));

        let outcome = match Program::parse(code) {
            Ok(program) => {
                let interpreter = Interpreter::new(
                    bridge,
                    self.config.tool_failure,
                    self.config.max_steps,
                    Arc::clone(&trace),
                );
                match tokio::time::timeout(self.config.timeout, interpreter.run(&program)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ProgramError::Timeout(self.config.timeout)),
                }
            }
            Err(e) => Err(e),
        };

        let trace = std::mem::take(&mut *trace.lock());
        let elapsed = started.elapsed();
        match &outcome {
            Ok(_) => tracing::debug!(
                tool_calls = trace.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Program completed"
            ),
            Err(e) => tracing::debug!(
                tool_calls = trace.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "Program failed"
            ),
        }

        ProgramRun {
            outcome,
            trace,
            elapsed,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers calls from a fixed table and tracks peak concurrency.
    #[derive(Default)]
    struct TableBridge {
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: Mutex<Vec<ToolCall>>,
    }

    impl TableBridge {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ToolBridge for TableBridge {
        async fn call(&self, call: ToolCall) -> Result<ToolResult, ProgramError> {
            self.calls.lock().push(call.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let result = match call.tool_name.as_str() {
                "fetch_fact" => ToolResult::completed(
                    &call,
                    json!("Rust is a systems programming language focused on safety"),
                ),
                "echo" => ToolResult::completed(&call, call.parameters["value"].clone()),
                "calculator" => {
                    let a = call.parameters["a"].as_f64().unwrap_or(0.0);
                    let b = call.parameters["b"].as_f64().unwrap_or(0.0);
                    if b == 0.0 {
                        ToolResult::error(&call, "Division by zero")
                    } else {
                        ToolResult::completed(&call, json!(a / b))
                    }
                }
                "get_budgets" => {
                    return Err(ProgramError::CapabilityViolation {
                        tool: call.tool_name.clone(),
                        call_site: call.call_site,
                    });
                }
                _ => ToolResult::error(&call, format!("Unknown tool '{}'", call.tool_name)),
            };
            Ok(result)
        }
    }

    fn catching() -> Sandbox {
        Sandbox::new(SandboxConfig {
            tool_failure: ToolFailurePolicy::Catch,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_sequential_composition() {
        let bridge = TableBridge::default();
        let run = Sandbox::default()
            .run(
                r#"
                let fact = call("fetch_fact", {topic: "rust"});
                let words = word_count(fact);
                let ratio = call("calculator", {operation: "divide", a: words, b: 3});
                return {words: words, ratio: ratio};
                "#,
                &bridge,
            )
            .await;

        assert_eq!(run.return_value(), Some(&json!({"words": 9, "ratio": 3.0})));
        assert_eq!(run.trace.len(), 2);

        let calls = bridge.calls.lock();
        assert_eq!(calls[1].parameters["a"], json!(9));
        assert!(calls.iter().all(|c| c.call_site == CallSite::Program));
    }

    #[tokio::test]
    async fn test_parallel_routes_by_identity() {
        let bridge = TableBridge::with_delay(Duration::from_millis(20));
        let run = Sandbox::default()
            .run(
                r#"return parallel(
                    call("echo", {value: "first"}),
                    call("echo", {value: "second"}),
                    call("echo", {value: "third"}),
                );"#,
                &bridge,
            )
            .await;

        assert_eq!(run.return_value(), Some(&json!(["first", "second", "third"])));
        assert_eq!(bridge.peak.load(Ordering::SeqCst), 3);

        let calls = bridge.calls.lock();
        for result in &run.trace {
            let call = calls.iter().find(|c| c.id == result.call_id).unwrap();
            assert_eq!(result.value.as_ref(), Some(&call.parameters["value"]));
        }
    }

    #[tokio::test]
    async fn test_tool_failure_aborts_by_default() {
        let bridge = TableBridge::default();
        let run = Sandbox::default()
            .run(
                r#"try { call("calculator", {a: 1, b: 0}); } catch e { return "caught"; }"#,
                &bridge,
            )
            .await;

        assert_eq!(
            run.outcome,
            Err(ProgramError::ToolFailed {
                tool: "calculator".to_string(),
                message: "Division by zero".to_string(),
            })
        );
        assert_eq!(run.trace.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_failure_catchable_when_configured() {
        let bridge = TableBridge::default();
        let run = catching()
            .run(
                r#"try { call("calculator", {a: 1, b: 0}); } catch e { return "caught: " + e; }"#,
                &bridge,
            )
            .await;

        assert_eq!(
            run.return_value(),
            Some(&json!("caught: calculator failed: Division by zero"))
        );
    }

    #[tokio::test]
    async fn test_runtime_errors_are_always_catchable() {
        let bridge = TableBridge::default();
        let run = Sandbox::default()
            .run(
                r#"
                let result = null;
                try { result = 1 / 0; } catch e { result = e; }
                return result;
                "#,
                &bridge,
            )
            .await;
        assert_eq!(run.return_value(), Some(&json!("division by zero")));

        let run = Sandbox::default().run(r#"error("bad input");"#, &bridge).await;
        assert_eq!(run.outcome, Err(ProgramError::Runtime("bad input".to_string())));
    }

    #[tokio::test]
    async fn test_capability_violation_is_fatal_even_in_try() {
        let bridge = TableBridge::default();
        let run = catching()
            .run(r#"try { call("get_budgets"); } catch e { return 0; }"#, &bridge)
            .await;

        let err = run.outcome.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ProgramError::CapabilityViolation { .. }));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let bridge = TableBridge::default();
        let run = Sandbox::default().run("let x = ;", &bridge).await;
        assert!(matches!(run.outcome, Err(ProgramError::Parse { line: 1, .. })));
        assert!(run.trace.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_keeps_trace() {
        let bridge = TableBridge::with_delay(Duration::from_millis(40));
        let sandbox = Sandbox::new(SandboxConfig {
            timeout: Duration::from_millis(60),
            ..Default::default()
        });
        let run = sandbox
            .run(
                r#"
                let a = call("echo", {value: 1});
                let b = call("echo", {value: 2});
                let c = call("echo", {value: 3});
                return a + b + c;
                "#,
                &bridge,
            )
            .await;

        assert!(matches!(run.outcome, Err(ProgramError::Timeout(_))));
        assert_eq!(run.trace.len(), 1);
    }

    #[tokio::test]
    async fn test_step_limit() {
        let bridge = TableBridge::default();
        let sandbox = Sandbox::new(SandboxConfig {
            max_steps: 50,
            ..Default::default()
        });
        let run = sandbox
            .run(
                "let n = 0; for i in [1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20] { n = n + i; } return n;",
                &bridge,
            )
            .await;
        assert_eq!(run.outcome, Err(ProgramError::StepLimit(50)));
    }

    #[tokio::test]
    async fn test_loops_and_aggregation() {
        let bridge = TableBridge::default();
        let run = Sandbox::default()
            .run(
                r#"
                let projects = [
                    {name: "Phoenix API", status: "active", budget: 450},
                    {name: "Cloud Migration", status: "active", budget: 900},
                    {name: "Design System", status: "planning", budget: 120},
                ];
                let active = filter(projects, "status", "active");
                let total = 0;
                for p in active { total = total + p.budget; }
                if total == sum(pluck(active, "budget")) { return {count: len(active), total: total}; }
                return null;
                "#,
                &bridge,
            )
            .await;
        assert_eq!(run.return_value(), Some(&json!({"count": 2, "total": 1350})));
    }

    #[tokio::test]
    async fn test_no_return_yields_null() {
        let bridge = TableBridge::default();
        let run = Sandbox::default().run("let a = 1;", &bridge).await;
        assert_eq!(run.return_value(), Some(&Value::Null));
    }
}
