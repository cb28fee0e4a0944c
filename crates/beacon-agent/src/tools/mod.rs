//! Built-in tools.
//!
//! The operations tools (`get_team_members`, `get_projects`, `get_incidents`,
//! `get_budgets`, `get_customer_feedback`, `get_deployments`) are
//! program-only. `fetch_fact` and `calculator` may be called either way.

mod calculator;
mod data;
mod fact;
mod ops;

pub use calculator::CalculatorTool;
pub use fact::FetchFactTool;
pub use ops::{
    BudgetsTool, CustomerFeedbackTool, DeploymentsTool, IncidentsTool, ProjectsTool,
    TeamMembersTool,
};

use crate::tool::ToolRegistry;

/// Register every built-in tool.
pub fn register_builtin_tools(registry: &mut ToolRegistry) {
    registry.register(TeamMembersTool);
    registry.register(ProjectsTool);
    registry.register(IncidentsTool);
    registry.register(BudgetsTool);
    registry.register(CustomerFeedbackTool);
    registry.register(DeploymentsTool);
    registry.register(FetchFactTool);
    registry.register(CalculatorTool);
}

/// A registry holding only the built-in tools.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry);
    registry
}
