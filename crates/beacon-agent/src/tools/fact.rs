//! Reference fact lookup.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeSet;

use beacon_types::CallSite;

use super::data;
use crate::error::{AgentError, Result};
use crate::tool::{ParamExt, Tool, ToolContext};

/// Returns a short fact about the company for a topic.
#[derive(Debug, Default, Clone)]
pub struct FetchFactTool;

#[async_trait]
impl Tool for FetchFactTool {
    fn name(&self) -> &str {
        "fetch_fact"
    }

    fn description(&self) -> &str {
        "Fetch a one-sentence reference fact about the company. Known topics: mission, founding, headquarters, oncall, release."
    }

    fn parameters(&self) -> Value {
        let topics: Vec<&str> = data::FACTS.iter().map(|(topic, _)| *topic).collect();
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "Topic to look up",
                    "enum": topics
                }
            },
            "required": ["topic"],
            "additionalProperties": false
        })
    }

    fn allowed_callers(&self) -> BTreeSet<CallSite> {
        BTreeSet::from([CallSite::Direct, CallSite::Program])
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let topic = params.required_str("topic")?.to_lowercase();
        let fact = data::fact_for(&topic)
            .ok_or_else(|| AgentError::tool(format!("no fact about '{}'", topic)))?;
        Ok(json!({"topic": topic, "fact": fact}))
    }
}
