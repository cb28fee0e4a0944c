//! Tool framework for agent capabilities.
//!
//! This module defines the [`Tool`] trait that all agent tools implement, the
//! [`ToolRegistry`] that owns them, and the parameter validation applied
//! before any tool runs.
//!
//! Every tool declares which call sites may invoke it. A tool that allows
//! only [`CallSite::Program`] can never be run by a direct model request, and
//! the registry enforces this before validation or execution.
//!
//! # Example
//!
//! ```rust,ignore
//! use beacon_agent::{Tool, ToolContext, ToolRegistry};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Tool for Echo {
//!     fn name(&self) -> &str { "echo" }
//!     fn description(&self) -> &str { "Returns its input" }
//!     fn parameters(&self) -> Value { json!({"type": "object"}) }
//!
//!     async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
//!         Ok(params)
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Echo);
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use beacon_types::{CallSite, ConversationId, ToolCall, ToolCallId, ToolDefinition, ToolResult};

use crate::error::{AgentError, Result};
use crate::types::{AgentConfig, TurnId};

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters did not satisfy a tool's schema.
///
/// All violations are collected so the model can fix them in one retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid parameters for '{tool}': {}", .violations.join("; "))]
pub struct ValidationError {
    pub tool: String,
    pub violations: Vec<String>,
}

/// Validate `params` against a JSON schema.
///
/// Supports the subset tool declarations use: `type`, `properties`,
/// `required`, `enum`, `additionalProperties: false`, `minimum`, `maximum`
/// and `items`.
pub fn validate_parameters(
    tool: &str,
    schema: &Value,
    params: &Value,
) -> std::result::Result<(), ValidationError> {
    let mut violations = Vec::new();
    check_value(schema, params, "params", &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            tool: tool.to_string(),
            violations,
        })
    }
}

fn check_value(schema: &Value, value: &Value, path: &str, violations: &mut Vec<String>) {
    let Some(schema) = schema.as_object() else {
        return;
    };

    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(t) => vec![t.as_str()],
            Value::Array(types) => types.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| matches_type(t, value)) {
            violations.push(format!(
                "{} must be {}, got {}",
                path,
                allowed.join(" or "),
                type_name(value)
            ));
            return;
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum")
        && !options.contains(value)
    {
        let options: Vec<String> = options.iter().map(Value::to_string).collect();
        violations.push(format!("{} must be one of [{}]", path, options.join(", ")));
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64)
            && n < min
        {
            violations.push(format!("{} must be >= {}", path, min));
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64)
            && n > max
        {
            violations.push(format!("{} must be <= {}", path, max));
        }
    }

    if let Value::Object(fields) = value {
        let properties = schema.get("properties").and_then(Value::as_object);

        if let Some(Value::Array(required)) = schema.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(name) {
                    violations.push(format!("{}.{} is required", path, name));
                }
            }
        }

        for (name, field) in fields {
            match properties.and_then(|p| p.get(name)) {
                Some(field_schema) => {
                    check_value(field_schema, field, &format!("{}.{}", path, name), violations)
                }
                None if schema.get("additionalProperties") == Some(&Value::Bool(false)) => {
                    violations.push(format!("{}.{} is not an allowed parameter", path, name));
                }
                None => {}
            }
        }
    }

    if let (Value::Array(items), Some(item_schema)) = (value, schema.get("items")) {
        for (i, item) in items.iter().enumerate() {
            check_value(item_schema, item, &format!("{}[{}]", path, i), violations);
        }
    }
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|n| n.fract() == 0.0)
        }
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Helpers for reading already-validated parameters.
pub trait ParamExt {
    /// Get a required string parameter.
    fn required_str(&self, name: &str) -> Result<&str>;

    /// Get an optional string parameter.
    fn optional_str(&self, name: &str) -> Option<&str>;

    /// Get a required numeric parameter.
    fn required_f64(&self, name: &str) -> Result<f64>;
}

impl ParamExt for Value {
    fn required_str(&self, name: &str) -> Result<&str> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::tool(format!("missing required parameter '{}'", name)))
    }

    fn optional_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    fn required_f64(&self, name: &str) -> Result<f64> {
        self.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| AgentError::tool(format!("missing required number '{}'", name)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for agent tools.
///
/// Each tool describes its parameters as a JSON Schema, declares the call
/// sites allowed to invoke it, and implements async execution returning a
/// JSON value.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of this tool.
    fn name(&self) -> &str;

    /// Get a human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// Get the JSON Schema for this tool's parameters.
    fn parameters(&self) -> Value;

    /// Call sites allowed to invoke this tool.
    fn allowed_callers(&self) -> BTreeSet<CallSite> {
        BTreeSet::from([CallSite::Direct])
    }

    /// Whether repeated calls with the same parameters return the same value
    /// without side effects.
    fn idempotent(&self) -> bool {
        true
    }

    /// Execute the tool with parameters that already passed validation.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;

    /// The declaration sent to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
            .with_allowed_callers(self.allowed_callers())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub conversation_id: ConversationId,
    pub turn_id: TurnId,
    /// Identity of the call being executed.
    pub call_id: ToolCallId,
    pub call_site: CallSite,
    /// Token to check for cancellation.
    pub cancellation: CancellationToken,
}

impl ToolContext {
    /// Create a context for one call.
    pub fn new(conversation_id: ConversationId, turn_id: TurnId, call: &ToolCall) -> Self {
        Self {
            conversation_id,
            turn_id,
            call_id: call.id.clone(),
            call_site: call.call_site,
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach the turn's cancellation token.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Check if execution has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            conversation_id: ConversationId::new(),
            turn_id: TurnId::new(),
            call_id: ToolCallId::new(),
            call_site: CallSite::Direct,
            cancellation: CancellationToken::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry for managing available tools.
///
/// Populated once at startup, then shared read-only across concurrent turns
/// behind an `Arc`.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Register a tool from an Arc.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Look up a tool's declaration.
    pub fn resolve(&self, name: &str) -> Result<ToolDefinition> {
        self.get(name)
            .map(|tool| tool.definition())
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))
    }

    /// Fail unless `call_site` may invoke the named tool.
    pub fn check_caller(&self, name: &str, call_site: CallSite) -> Result<()> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        if tool.allowed_callers().contains(&call_site) {
            Ok(())
        } else {
            Err(AgentError::CapabilityViolation {
                tool: name.to_string(),
                call_site,
            })
        }
    }

    /// Validate parameters and run a tool inline.
    pub async fn invoke(&self, name: &str, params: Value, ctx: &ToolContext) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        validate_parameters(name, &tool.parameters(), &params)?;
        tool.execute(params, ctx).await
    }

    /// Run one call to completion and turn its outcome into a [`ToolResult`].
    ///
    /// Unknown tools, invalid parameters, tool failures and timeouts come
    /// back as error results the model can react to. Only a capability
    /// violation or cancellation is returned as `Err`. Transient failures of
    /// idempotent tools are retried within `limits`; other tools run once.
    ///
    /// The tool runs on its own task. If the deadline passes or the turn is
    /// cancelled first, that task is left to finish and its value is dropped.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        limits: CallLimits,
    ) -> Result<ToolResult> {
        let Some(tool) = self.get(&call.tool_name) else {
            tracing::warn!(tool = %call.tool_name, call_id = %call.id, "Unknown tool requested");
            return Ok(ToolResult::error(
                call,
                format!("Unknown tool '{}'", call.tool_name),
            ));
        };

        if !tool.allowed_callers().contains(&call.call_site) {
            tracing::warn!(
                tool = %call.tool_name,
                call_id = %call.id,
                call_site = %call.call_site,
                "Tool call rejected by capability check"
            );
            return Err(AgentError::CapabilityViolation {
                tool: call.tool_name.clone(),
                call_site: call.call_site,
            });
        }

        if let Err(e) = validate_parameters(&call.tool_name, &tool.parameters(), &call.parameters)
        {
            tracing::debug!(tool = %call.tool_name, call_id = %call.id, error = %e, "Tool parameters rejected");
            return Ok(ToolResult::error(call, e.to_string()));
        }

        let started = Instant::now();
        let mut backoff = limits.backoff;
        let mut attempt = 0;

        let outcome = loop {
            match run_attempt(&tool, call, ctx, limits.timeout).await? {
                Some(Err(e)) if e.is_transient() && attempt < limits.retries => {
                    if !tool.idempotent() {
                        tracing::debug!(
                            tool = %call.tool_name,
                            call_id = %call.id,
                            error = %e,
                            "Transient failure of non-idempotent tool, not retrying"
                        );
                        break Some(Err(e));
                    }
                    tracing::warn!(
                        tool = %call.tool_name,
                        call_id = %call.id,
                        attempt = attempt + 1,
                        max_retries = limits.retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Tool call failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = ctx.cancellation.cancelled() => return Err(AgentError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff *= 2;
                    attempt += 1;
                }
                other => break other,
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let result = match outcome {
            Some(Ok(value)) => ToolResult::completed(call, value),
            Some(Err(e)) if e.is_fatal() => return Err(e),
            Some(Err(e)) => ToolResult::error(call, failure_message(e)),
            None => ToolResult::error(
                call,
                AgentError::Timeout {
                    tool: call.tool_name.clone(),
                    elapsed_ms,
                }
                .to_string(),
            ),
        };

        tracing::debug!(
            tool = %call.tool_name,
            call_id = %call.id,
            call_site = %call.call_site,
            success = result.is_success(),
            attempts = attempt + 1,
            elapsed_ms,
            "Tool: completed"
        );
        Ok(result)
    }

    /// All declarations, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|tool| tool.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Get all tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// One execution of `tool` on its own task.
///
/// `Ok(None)` means the deadline passed first.
async fn run_attempt(
    tool: &Arc<dyn Tool>,
    call: &ToolCall,
    ctx: &ToolContext,
    timeout: Duration,
) -> Result<Option<Result<Value>>> {
    if ctx.is_cancelled() {
        return Err(AgentError::Cancelled);
    }

    let tool = Arc::clone(tool);
    let params = call.parameters.clone();
    let task_ctx = ctx.clone();
    let handle = tokio::spawn(async move { tool.execute(params, &task_ctx).await });

    let joined = tokio::select! {
        biased;
        _ = ctx.cancellation.cancelled() => return Err(AgentError::Cancelled),
        joined = tokio::time::timeout(timeout, handle) => joined,
    };

    Ok(match joined {
        Ok(Ok(result)) => Some(result),
        Ok(Err(join_error)) => Some(Err(AgentError::tool(format!(
            "tool task failed: {}",
            join_error
        )))),
        Err(_) => None,
    })
}

fn failure_message(err: AgentError) -> String {
    match err {
        AgentError::Tool(message) => message,
        AgentError::TransientTool(message) => format!("{} (transient)", message),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Call Limits
// ─────────────────────────────────────────────────────────────────────────────

/// Deadline and retry budget for one dispatched call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallLimits {
    /// Deadline for each attempt.
    pub timeout: Duration,
    /// Extra attempts after a transient failure of an idempotent tool.
    pub retries: u32,
    /// Wait before the first retry, doubled per attempt.
    pub backoff: Duration,
}

impl CallLimits {
    /// A single attempt with the given deadline.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            retries: 0,
            backoff: Duration::from_millis(500),
        }
    }

    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.retries = retries;
        self.backoff = backoff;
        self
    }
}

impl From<&AgentConfig> for CallLimits {
    fn from(config: &AgentConfig) -> Self {
        Self::new(config.tool_timeout).with_retries(config.tool_retries, config.retry_backoff)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// A mock tool for testing.
///
/// Returns a configurable value or error and tracks calls for verification.
#[cfg(test)]
#[derive(Debug)]
pub struct MockTool {
    name: String,
    description: String,
    parameters: Value,
    allowed_callers: BTreeSet<CallSite>,
    response: parking_lot::Mutex<std::result::Result<Value, String>>,
    delay: Option<Duration>,
    transient_failures: std::sync::atomic::AtomicUsize,
    idempotent: bool,
    calls: parking_lot::Mutex<Vec<Value>>,
}

#[cfg(test)]
impl MockTool {
    /// Create a new mock tool callable from both call sites.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "A mock tool for testing".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            allowed_callers: BTreeSet::from([CallSite::Direct, CallSite::Program]),
            response: parking_lot::Mutex::new(Ok(Value::String("mock response".to_string()))),
            delay: None,
            transient_failures: std::sync::atomic::AtomicUsize::new(0),
            idempotent: true,
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Set the parameters schema.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_allowed_callers(mut self, callers: impl IntoIterator<Item = CallSite>) -> Self {
        self.allowed_callers = callers.into_iter().collect();
        self
    }

    /// Set the value to return.
    pub fn with_response(self, response: Value) -> Self {
        *self.response.lock() = Ok(response);
        self
    }

    /// Fail every call with `message`.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        *self.response.lock() = Err(message.into());
        self
    }

    /// Fail the first `count` calls with a transient error.
    pub fn with_transient_failures(self, count: usize) -> Self {
        self.transient_failures
            .store(count, std::sync::atomic::Ordering::SeqCst);
        self
    }

    /// Mark the tool as having side effects.
    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the calls that were made to this tool.
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    fn allowed_callers(&self) -> BTreeSet<CallSite> {
        self.allowed_callers.clone()
    }

    fn idempotent(&self) -> bool {
        self.idempotent
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        use std::sync::atomic::Ordering;

        self.calls.lock().push(params);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AgentError::transient("connection reset"));
        }
        self.response.lock().clone().map_err(AgentError::Tool)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn calculator_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["add", "subtract", "multiply", "divide"]},
                "a": {"type": "number"},
                "b": {"type": "number"}
            },
            "required": ["operation", "a", "b"],
            "additionalProperties": false
        })
    }

    #[test]
    fn test_validation_accepts_valid_params() {
        let params = json!({"operation": "add", "a": 1, "b": 2.5});
        assert!(validate_parameters("calculator", &calculator_schema(), &params).is_ok());
    }

    #[test]
    fn test_validation_collects_all_violations() {
        let params = json!({"operation": "pow", "a": "one", "extra": true});
        let err = validate_parameters("calculator", &calculator_schema(), &params).unwrap_err();

        assert_eq!(err.tool, "calculator");
        assert_eq!(err.violations.len(), 4);
        let text = err.to_string();
        assert!(text.contains("params.b is required"));
        assert!(text.contains("params.a must be number, got string"));
        assert!(text.contains("params.operation must be one of"));
        assert!(text.contains("params.extra is not an allowed parameter"));
    }

    #[test]
    fn test_validation_bounds_and_items() {
        let schema = json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "minimum": 1, "maximum": 10},
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        });
        let err = validate_parameters("t", &schema, &json!({"limit": 11, "tags": ["a", 2]}))
            .unwrap_err();
        assert_eq!(
            err.violations,
            vec![
                "params.limit must be <= 10".to_string(),
                "params.tags[1] must be string, got number".to_string(),
            ]
        );

        assert!(validate_parameters("t", &schema, &json!({"limit": 2.5})).is_err());
        assert!(validate_parameters("t", &schema, &json!({"limit": 3.0})).is_ok());
    }

    #[test]
    fn test_validation_rejects_non_object() {
        let err = validate_parameters("t", &json!({"type": "object"}), &json!("x")).unwrap_err();
        assert_eq!(err.violations, vec!["params must be object, got string"]);
    }

    #[test]
    fn test_registry_register_and_resolve() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.register(MockTool::new("zeta"));
        registry.register(MockTool::new("alpha").with_allowed_callers([CallSite::Program]));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("alpha"));
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);

        let def = registry.resolve("alpha").unwrap();
        assert!(def.allows(CallSite::Program));
        assert!(!def.allows(CallSite::Direct));
        assert!(matches!(
            registry.resolve("missing"),
            Err(AgentError::ToolNotFound(_))
        ));
    }

    #[test]
    fn test_definitions_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool::new("c"));
        registry.register(MockTool::new("a"));
        registry.register(MockTool::new("b"));

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_check_caller() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool::new("budgets").with_allowed_callers([CallSite::Program]));

        assert!(registry.check_caller("budgets", CallSite::Program).is_ok());
        assert!(matches!(
            registry.check_caller("budgets", CallSite::Direct),
            Err(AgentError::CapabilityViolation { call_site: CallSite::Direct, .. })
        ));
    }

    #[tokio::test]
    async fn test_invoke_validates_first() {
        let tool = Arc::new(MockTool::new("calc").with_parameters(calculator_schema()));
        let mut registry = ToolRegistry::new();
        registry.register_arc(tool.clone());

        let err = registry
            .invoke("calc", json!({"a": 1}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        assert_eq!(tool.call_count(), 0);

        let value = registry
            .invoke(
                "calc",
                json!({"operation": "add", "a": 1, "b": 2}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(value, json!("mock response"));
        assert_eq!(tool.call_count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_folds_failures() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool::new("broken").with_error("disk on fire"));
        let ctx = ToolContext::default();
        let timeout = CallLimits::new(Duration::from_secs(1));

        let result = registry
            .dispatch(&ToolCall::direct("broken", json!({})), &ctx, timeout)
            .await
            .unwrap();
        assert!(!result.is_success());
        assert_eq!(result.error.as_deref(), Some("disk on fire"));

        let result = registry
            .dispatch(&ToolCall::direct("nope", json!({})), &ctx, timeout)
            .await
            .unwrap();
        assert_eq!(result.error.as_deref(), Some("Unknown tool 'nope'"));
    }

    #[tokio::test]
    async fn test_dispatch_capability_violation_never_executes() {
        let tool = Arc::new(MockTool::new("budgets").with_allowed_callers([CallSite::Program]));
        let mut registry = ToolRegistry::new();
        registry.register_arc(tool.clone());

        let err = registry
            .dispatch(
                &ToolCall::direct("budgets", json!({})),
                &ToolContext::default(),
                CallLimits::new(Duration::from_secs(1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::CapabilityViolation { .. }));
        assert_eq!(tool.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_timeout() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool::new("slow").with_delay(Duration::from_secs(5)));

        let call = ToolCall::program("slow", json!({}));
        let result = registry
            .dispatch(
                &call,
                &ToolContext::default(),
                CallLimits::new(Duration::from_millis(20)),
            )
            .await
            .unwrap();
        assert_eq!(result.call_id, call.id);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_dispatch_cancelled() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool::new("slow").with_delay(Duration::from_secs(5)));

        let ctx = ToolContext::default();
        let token = ctx.cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let err = registry
            .dispatch(
                &ToolCall::direct("slow", json!({})),
                &ctx,
                CallLimits::new(Duration::from_secs(5)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }

    fn retrying() -> CallLimits {
        CallLimits::new(Duration::from_secs(1)).with_retries(2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_dispatch_retries_transient_failure() {
        let tool = Arc::new(
            MockTool::new("flaky")
                .with_response(json!(42))
                .with_transient_failures(1),
        );
        let mut registry = ToolRegistry::new();
        registry.register_arc(tool.clone());

        let call = ToolCall::program("flaky", json!({}));
        let result = registry
            .dispatch(&call, &ToolContext::default(), retrying())
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.value, Some(json!(42)));
        assert_eq!(tool.call_count(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_retry_budget_is_bounded() {
        let tool = Arc::new(MockTool::new("flaky").with_transient_failures(10));
        let mut registry = ToolRegistry::new();
        registry.register_arc(tool.clone());

        let result = registry
            .dispatch(
                &ToolCall::direct("flaky", json!({})),
                &ToolContext::default(),
                retrying(),
            )
            .await
            .unwrap();
        assert_eq!(
            result.error.as_deref(),
            Some("connection reset (transient)")
        );
        assert_eq!(tool.call_count(), 3);
    }

    #[tokio::test]
    async fn test_dispatch_never_retries_non_idempotent_tool() {
        let tool = Arc::new(
            MockTool::new("send_email")
                .with_response(json!("sent"))
                .with_transient_failures(1)
                .non_idempotent(),
        );
        let mut registry = ToolRegistry::new();
        registry.register_arc(tool.clone());

        let result = registry
            .dispatch(
                &ToolCall::direct("send_email", json!({})),
                &ToolContext::default(),
                retrying(),
            )
            .await
            .unwrap();
        assert!(!result.is_success());
        assert_eq!(tool.call_count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_does_not_retry_plain_failures() {
        let tool = Arc::new(MockTool::new("broken").with_error("bad input"));
        let mut registry = ToolRegistry::new();
        registry.register_arc(tool.clone());

        registry
            .dispatch(
                &ToolCall::direct("broken", json!({})),
                &ToolContext::default(),
                retrying(),
            )
            .await
            .unwrap();
        assert_eq!(tool.call_count(), 1);
    }

    #[test]
    fn test_call_limits_from_config() {
        let config = AgentConfig::new()
            .with_tool_timeout(Duration::from_secs(3))
            .with_tool_retries(4)
            .with_retries(1, Duration::from_millis(10));
        let limits = CallLimits::from(&config);
        assert_eq!(limits.timeout, Duration::from_secs(3));
        assert_eq!(limits.retries, 4);
        assert_eq!(limits.backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_param_ext() {
        let params = json!({"topic": "rust", "a": 3});
        assert_eq!(params.required_str("topic").unwrap(), "rust");
        assert_eq!(params.optional_str("missing"), None);
        assert_eq!(params.required_f64("a").unwrap(), 3.0);
        assert!(params.required_f64("b").is_err());
    }
}
