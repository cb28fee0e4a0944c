//! Two-operand arithmetic.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeSet;

use beacon_types::CallSite;

use crate::error::{AgentError, Result};
use crate::tool::{ParamExt, Tool, ToolContext};

#[derive(Debug, Default, Clone)]
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Apply an arithmetic operation to two numbers and return the result."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide"]
                },
                "a": { "type": "number", "description": "Left operand" },
                "b": { "type": "number", "description": "Right operand" }
            },
            "required": ["operation", "a", "b"],
            "additionalProperties": false
        })
    }

    fn allowed_callers(&self) -> BTreeSet<CallSite> {
        BTreeSet::from([CallSite::Direct, CallSite::Program])
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let operation = params.required_str("operation")?;
        let a = params.required_f64("a")?;
        let b = params.required_f64("b")?;

        let result = match operation {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" if b == 0.0 => return Err(AgentError::tool("division by zero")),
            "divide" => a / b,
            other => return Err(AgentError::tool(format!("unknown operation '{}'", other))),
        };

        Ok(json!({"operation": operation, "a": a, "b": b, "result": result}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn calc(operation: &str, a: f64, b: f64) -> Result<Value> {
        CalculatorTool
            .execute(
                json!({"operation": operation, "a": a, "b": b}),
                &ToolContext::default(),
            )
            .await
    }

    #[tokio::test]
    async fn test_operations() {
        assert_eq!(calc("add", 2.0, 3.0).await.unwrap()["result"], 5.0);
        assert_eq!(calc("subtract", 2.0, 3.0).await.unwrap()["result"], -1.0);
        assert_eq!(calc("multiply", 4.0, 2.5).await.unwrap()["result"], 10.0);
        assert_eq!(calc("divide", 9.0, 3.0).await.unwrap()["result"], 3.0);
    }

    #[tokio::test]
    async fn test_division_by_zero() {
        let err = calc("divide", 1.0, 0.0).await.unwrap_err();
        assert!(matches!(err, AgentError::Tool(msg) if msg == "division by zero"));
    }
}
