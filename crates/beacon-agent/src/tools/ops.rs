//! Read-only operations tools over the company dataset.
//!
//! These return whole record sets, so they are only callable from programs:
//! the program filters and aggregates in the sandbox and only the summary
//! reaches the model.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;

use beacon_types::CallSite;

use super::data::{self, DEPARTMENTS, DEPLOYMENT_STATUSES, INCIDENT_STATUSES, SEVERITIES};
use crate::error::{AgentError, Result};
use crate::tool::{ParamExt, Tool, ToolContext};

fn program_only() -> BTreeSet<CallSite> {
    BTreeSet::from([CallSite::Program])
}

fn department_schema(name: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            name: {
                "type": "string",
                "description": description,
                "enum": DEPARTMENTS
            }
        },
        "additionalProperties": false
    })
}

fn project_ids() -> Vec<&'static str> {
    data::PROJECTS.iter().map(|p| p.id).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Team Members
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct TeamMembersTool;

#[async_trait]
impl Tool for TeamMembersTool {
    fn name(&self) -> &str {
        "get_team_members"
    }

    fn description(&self) -> &str {
        "Get team members, optionally filtered by department. Returns employee records with id, name, email, department, role, level, and manager_id."
    }

    fn parameters(&self) -> Value {
        department_schema(
            "department",
            "Filter by department: engineering, product, design, data, or infrastructure",
        )
    }

    fn allowed_callers(&self) -> BTreeSet<CallSite> {
        program_only()
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let department = params.optional_str("department").map(str::to_lowercase);
        let members: Vec<_> = data::TEAM_MEMBERS
            .iter()
            .filter(|m| department.as_deref().is_none_or(|d| m.department == d))
            .collect();
        Ok(serde_json::to_value(members)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct ProjectsTool;

#[async_trait]
impl Tool for ProjectsTool {
    fn name(&self) -> &str {
        "get_projects"
    }

    fn description(&self) -> &str {
        "Get projects, optionally filtered by owning team. Returns project records with id, name, team_id, lead_id, status, and started_at."
    }

    fn parameters(&self) -> Value {
        department_schema(
            "team_id",
            "Filter by team: engineering, product, design, data, or infrastructure",
        )
    }

    fn allowed_callers(&self) -> BTreeSet<CallSite> {
        program_only()
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let team = params.optional_str("team_id").map(str::to_lowercase);
        let projects: Vec<_> = data::PROJECTS
            .iter()
            .filter(|p| team.as_deref().is_none_or(|t| p.team_id == t))
            .collect();
        Ok(serde_json::to_value(projects)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Incidents
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct IncidentsTool;

#[async_trait]
impl Tool for IncidentsTool {
    fn name(&self) -> &str {
        "get_incidents"
    }

    fn description(&self) -> &str {
        "Get incident reports, newest first, optionally filtered by status and/or severity. Returns incident records with id, title, severity, status, project_id, assigned_to, created_at, resolved_at, and service."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "Filter by status",
                    "enum": INCIDENT_STATUSES
                },
                "severity": {
                    "type": "string",
                    "description": "Filter by severity level",
                    "enum": SEVERITIES
                }
            },
            "additionalProperties": false
        })
    }

    fn allowed_callers(&self) -> BTreeSet<CallSite> {
        program_only()
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let status = params.optional_str("status").map(str::to_lowercase);
        let severity = params.optional_str("severity").map(str::to_uppercase);
        let incidents: Vec<_> = data::INCIDENTS
            .iter()
            .filter(|i| status.as_deref().is_none_or(|s| i.status == s))
            .filter(|i| severity.as_deref().is_none_or(|s| i.severity == s))
            .collect();
        Ok(serde_json::to_value(incidents)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Budgets
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct BudgetsTool;

#[async_trait]
impl Tool for BudgetsTool {
    fn name(&self) -> &str {
        "get_budgets"
    }

    fn description(&self) -> &str {
        "Get budget figures in thousands, keyed by department, optionally for one department. Each entry has allocated, spent, and q1_spent through q4_spent."
    }

    fn parameters(&self) -> Value {
        department_schema("department", "Only return this department's budget")
    }

    fn allowed_callers(&self) -> BTreeSet<CallSite> {
        program_only()
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let mut budgets = Map::new();
        match params.optional_str("department").map(str::to_lowercase) {
            Some(department) => {
                let budget = data::budget_for(&department).ok_or_else(|| {
                    AgentError::tool(format!("no budget for department '{}'", department))
                })?;
                budgets.insert(department, serde_json::to_value(budget)?);
            }
            None => {
                for (department, budget) in &data::BUDGETS {
                    budgets.insert(department.to_string(), serde_json::to_value(budget)?);
                }
            }
        }
        Ok(Value::Object(budgets))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Customer Feedback
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct CustomerFeedbackTool;

#[async_trait]
impl Tool for CustomerFeedbackTool {
    fn name(&self) -> &str {
        "get_customer_feedback"
    }

    fn description(&self) -> &str {
        "Get customer satisfaction keyed by project id, optionally for one project. Each entry has nps (-100 to 100), responses, trend (improving, stable, declining), and recent_comments with score and comment."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Only return this project's feedback",
                    "enum": project_ids()
                }
            },
            "additionalProperties": false
        })
    }

    fn allowed_callers(&self) -> BTreeSet<CallSite> {
        program_only()
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let mut feedback = Map::new();
        match params.optional_str("project_id") {
            Some(project_id) => {
                let entry = data::feedback_for(project_id).ok_or_else(|| {
                    AgentError::tool(format!("no feedback for project '{}'", project_id))
                })?;
                feedback.insert(project_id.to_string(), serde_json::to_value(entry)?);
            }
            None => {
                for (project_id, entry) in &data::FEEDBACK {
                    feedback.insert(project_id.to_string(), serde_json::to_value(entry)?);
                }
            }
        }
        Ok(Value::Object(feedback))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Deployments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct DeploymentsTool;

#[async_trait]
impl Tool for DeploymentsTool {
    fn name(&self) -> &str {
        "get_deployments"
    }

    fn description(&self) -> &str {
        "Get deployments, newest first, optionally filtered by project and/or status. Returns deployment records with id, project_id, version, deployed_by, deployed_at, status (success or failed), rollback, and environment."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Filter by project id",
                    "enum": project_ids()
                },
                "status": {
                    "type": "string",
                    "description": "Filter by outcome",
                    "enum": DEPLOYMENT_STATUSES
                }
            },
            "additionalProperties": false
        })
    }

    fn allowed_callers(&self) -> BTreeSet<CallSite> {
        program_only()
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let project_id = params.optional_str("project_id");
        let status = params.optional_str("status").map(str::to_lowercase);
        let deployments: Vec<_> = data::DEPLOYMENTS
            .iter()
            .filter(|d| project_id.is_none_or(|p| d.project_id == p))
            .filter(|d| status.as_deref().is_none_or(|s| d.status == s))
            .collect();
        Ok(serde_json::to_value(deployments)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(tool: &dyn Tool, params: Value) -> Value {
        tool.execute(params, &ToolContext::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_team_members_filter() {
        let all = run(&TeamMembersTool, json!({})).await;
        assert_eq!(all.as_array().unwrap().len(), 17);

        let design = run(&TeamMembersTool, json!({"department": "design"})).await;
        let names: Vec<&str> = design
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Iris Thompson", "Jake Anderson", "Karen Singh"]);
    }

    #[tokio::test]
    async fn test_projects_filter() {
        let data = run(&ProjectsTool, json!({"team_id": "data"})).await;
        let ids: Vec<&str> = data
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["proj_004", "proj_007"]);
    }

    #[tokio::test]
    async fn test_incident_filters_normalize_case() {
        let open_p3 = run(&IncidentsTool, json!({"status": "OPEN", "severity": "p3"})).await;
        let ids: Vec<&str> = open_p3
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["inc_010", "inc_003"]);
    }

    #[tokio::test]
    async fn test_budgets() {
        let all = run(&BudgetsTool, json!({})).await;
        assert_eq!(all.as_object().unwrap().len(), 5);
        assert_eq!(all["infrastructure"]["spent"], 3200);

        let one = run(&BudgetsTool, json!({"department": "product"})).await;
        assert_eq!(one, json!({"product": {
            "allocated": 800, "spent": 720,
            "q1_spent": 180, "q2_spent": 190, "q3_spent": 175, "q4_spent": 175
        }}));
    }

    #[tokio::test]
    async fn test_unknown_budget_department() {
        let err = BudgetsTool
            .execute(json!({"department": "legal"}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("legal"));
    }

    #[tokio::test]
    async fn test_customer_feedback() {
        let all = run(&CustomerFeedbackTool, json!({})).await;
        assert_eq!(all.as_object().unwrap().len(), 8);

        let one = run(&CustomerFeedbackTool, json!({"project_id": "proj_002"})).await;
        let entry = &one["proj_002"];
        assert_eq!(entry["nps"], 28);
        assert_eq!(entry["trend"], "declining");
        assert_eq!(entry["recent_comments"][2]["comment"], "Can't find basic features");
        assert_eq!(one.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deployments_filter() {
        let all = run(&DeploymentsTool, json!({})).await;
        assert_eq!(all.as_array().unwrap().len(), 24);

        let failed = run(&DeploymentsTool, json!({"status": "FAILED"})).await;
        assert_eq!(failed.as_array().unwrap().len(), 4);

        let migration = run(
            &DeploymentsTool,
            json!({"project_id": "proj_005", "status": "failed"}),
        )
        .await;
        let ids: Vec<&str> = migration
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["deploy_proj_005_003", "deploy_proj_005_001"]);
        assert_eq!(migration[0]["rollback"], true);
    }

    #[test]
    fn test_project_filters_are_enumerated() {
        let schema = DeploymentsTool.parameters();
        let ids = schema["properties"]["project_id"]["enum"].as_array().unwrap();
        assert_eq!(ids.len(), 8);
        assert!(crate::tool::validate_parameters(
            "get_customer_feedback",
            &CustomerFeedbackTool.parameters(),
            &json!({"project_id": "proj_999"})
        )
        .is_err());
    }

    #[test]
    fn test_program_only() {
        for tool in [
            &TeamMembersTool as &dyn Tool,
            &ProjectsTool,
            &IncidentsTool,
            &BudgetsTool,
            &CustomerFeedbackTool,
            &DeploymentsTool,
        ] {
            assert!(!tool.definition().allows(CallSite::Direct), "{}", tool.name());
            assert!(tool.definition().allows(CallSite::Program));
        }
    }
}
