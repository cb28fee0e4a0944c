//! Fixed operations dataset served by the business tools.

use serde::Serialize;

pub const DEPARTMENTS: [&str; 5] = ["engineering", "product", "design", "data", "infrastructure"];

pub const SEVERITIES: [&str; 4] = ["P0", "P1", "P2", "P3"];

pub const INCIDENT_STATUSES: [&str; 3] = ["open", "investigating", "resolved"];

pub const DEPLOYMENT_STATUSES: [&str; 2] = ["success", "failed"];

#[derive(Debug, Clone, Serialize)]
pub struct TeamMember {
    pub id: &'static str,
    pub name: &'static str,
    pub email: &'static str,
    pub department: &'static str,
    pub role: &'static str,
    pub level: &'static str,
    pub manager_id: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: &'static str,
    pub name: &'static str,
    pub team_id: &'static str,
    pub lead_id: &'static str,
    pub status: &'static str,
    pub started_at: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub id: &'static str,
    pub title: &'static str,
    pub severity: &'static str,
    pub status: &'static str,
    pub project_id: &'static str,
    pub assigned_to: &'static str,
    pub created_at: &'static str,
    pub resolved_at: Option<&'static str>,
    pub service: &'static str,
}

/// Budget figures in thousands.
#[derive(Debug, Clone, Serialize)]
pub struct Budget {
    pub allocated: u32,
    pub spent: u32,
    pub q1_spent: u32,
    pub q2_spent: u32,
    pub q3_spent: u32,
    pub q4_spent: u32,
}

/// NPS-style satisfaction for one project, -100 to 100.
#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    pub nps: i32,
    pub responses: u32,
    pub trend: &'static str,
    pub recent_comments: &'static [Comment],
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub score: u8,
    pub comment: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Deployment {
    pub id: &'static str,
    pub project_id: &'static str,
    pub version: &'static str,
    pub deployed_by: &'static str,
    pub deployed_at: &'static str,
    pub status: &'static str,
    pub rollback: bool,
    pub environment: &'static str,
}

const fn member(
    id: &'static str,
    name: &'static str,
    email: &'static str,
    department: &'static str,
    role: &'static str,
    level: &'static str,
    manager_id: Option<&'static str>,
) -> TeamMember {
    TeamMember {
        id,
        name,
        email,
        department,
        role,
        level,
        manager_id,
    }
}

pub static TEAM_MEMBERS: [TeamMember; 17] = [
    member("emp_001", "Alice Chen", "alice@structuredai.io", "engineering", "Senior Engineer", "L5", Some("emp_010")),
    member("emp_002", "Bob Martinez", "bob@structuredai.io", "engineering", "Engineer", "L4", Some("emp_010")),
    member("emp_003", "Carol Williams", "carol@structuredai.io", "engineering", "Engineer", "L4", Some("emp_010")),
    member("emp_004", "David Kim", "david@structuredai.io", "engineering", "Junior Engineer", "L3", Some("emp_001")),
    member("emp_010", "Eva Rodriguez", "eva@structuredai.io", "engineering", "Engineering Manager", "L6", None),
    member("emp_005", "Frank Liu", "frank@structuredai.io", "product", "Product Manager", "L5", Some("emp_011")),
    member("emp_006", "Grace Park", "grace@structuredai.io", "product", "Senior PM", "L6", Some("emp_011")),
    member("emp_011", "Henry Zhao", "henry@structuredai.io", "product", "Director of Product", "L7", None),
    member("emp_007", "Iris Thompson", "iris@structuredai.io", "design", "Senior Designer", "L5", Some("emp_012")),
    member("emp_008", "Jake Anderson", "jake@structuredai.io", "design", "Designer", "L4", Some("emp_012")),
    member("emp_012", "Karen Singh", "karen@structuredai.io", "design", "Design Lead", "L6", None),
    member("emp_013", "Leo Nakamura", "leo@structuredai.io", "data", "Data Scientist", "L5", Some("emp_015")),
    member("emp_014", "Maya Patel", "maya@structuredai.io", "data", "Data Engineer", "L4", Some("emp_015")),
    member("emp_015", "Noah Brown", "noah@structuredai.io", "data", "Data Lead", "L6", None),
    member("emp_016", "Olivia Davis", "olivia@structuredai.io", "infrastructure", "SRE", "L5", Some("emp_018")),
    member("emp_017", "Peter Wilson", "peter@structuredai.io", "infrastructure", "DevOps Engineer", "L4", Some("emp_018")),
    member("emp_018", "Quinn Foster", "quinn@structuredai.io", "infrastructure", "Infrastructure Lead", "L6", None),
];

pub static PROJECTS: [Project; 8] = [
    Project { id: "proj_001", name: "Phoenix API", team_id: "engineering", lead_id: "emp_001", status: "active", started_at: "2024-01-15" },
    Project { id: "proj_002", name: "Customer Portal v2", team_id: "engineering", lead_id: "emp_002", status: "active", started_at: "2024-03-01" },
    Project { id: "proj_003", name: "Mobile App Redesign", team_id: "design", lead_id: "emp_007", status: "active", started_at: "2024-02-10" },
    Project { id: "proj_004", name: "Data Pipeline Overhaul", team_id: "data", lead_id: "emp_013", status: "active", started_at: "2024-04-01" },
    Project { id: "proj_005", name: "Cloud Migration", team_id: "infrastructure", lead_id: "emp_016", status: "active", started_at: "2023-11-01" },
    Project { id: "proj_006", name: "Search Infrastructure", team_id: "engineering", lead_id: "emp_003", status: "active", started_at: "2024-05-15" },
    Project { id: "proj_007", name: "Analytics Dashboard", team_id: "data", lead_id: "emp_014", status: "completed", started_at: "2024-01-01" },
    Project { id: "proj_008", name: "Design System", team_id: "design", lead_id: "emp_008", status: "active", started_at: "2024-06-01" },
];

#[allow(clippy::too_many_arguments)]
const fn incident(
    id: &'static str,
    title: &'static str,
    severity: &'static str,
    status: &'static str,
    project_id: &'static str,
    assigned_to: &'static str,
    created_at: &'static str,
    resolved_at: Option<&'static str>,
    service: &'static str,
) -> Incident {
    Incident {
        id,
        title,
        severity,
        status,
        project_id,
        assigned_to,
        created_at,
        resolved_at,
        service,
    }
}

/// Newest first.
pub static INCIDENTS: [Incident; 12] = [
    incident("inc_012", "API latency spike in Phoenix API", "P1", "open", "proj_001", "emp_002", "2024-09-28T14:10:00", None, "Phoenix API"),
    incident("inc_011", "Memory leak in worker nodes", "P2", "investigating", "proj_005", "emp_017", "2024-09-27T09:45:00", None, "Workers"),
    incident("inc_010", "Search indexing delay", "P3", "open", "proj_006", "emp_003", "2024-09-25T16:20:00", None, "Search"),
    incident("inc_009", "Database connection pool exhausted", "P0", "resolved", "proj_001", "emp_016", "2024-09-24T02:05:00", Some("2024-09-24T05:35:00"), "Core DB"),
    incident("inc_008", "Customer Portal login failures", "P1", "resolved", "proj_002", "emp_001", "2024-09-22T11:30:00", Some("2024-09-22T19:00:00"), "Auth Service"),
    incident("inc_007", "Pipeline job failures", "P2", "open", "proj_004", "emp_004", "2024-09-20T07:15:00", None, "Data Pipeline"),
    incident("inc_006", "CDN cache invalidation issues", "P2", "resolved", "proj_005", "emp_018", "2024-09-18T13:00:00", Some("2024-09-21T10:00:00"), "CDN"),
    incident("inc_005", "SSL certificate expiration warning", "P3", "investigating", "proj_005", "emp_016", "2024-09-15T08:40:00", None, "Infrastructure"),
    incident("inc_004", "API latency spike in Phoenix API", "P2", "resolved", "proj_001", "emp_010", "2024-09-12T15:25:00", Some("2024-09-14T09:25:00"), "Phoenix API"),
    incident("inc_003", "Customer Portal login failures", "P3", "open", "proj_002", "emp_002", "2024-09-09T10:10:00", None, "Auth Service"),
    incident("inc_002", "Memory leak in worker nodes", "P1", "resolved", "proj_005", "emp_017", "2024-09-05T20:50:00", Some("2024-09-06T06:50:00"), "Workers"),
    incident("inc_001", "Search indexing delay", "P3", "resolved", "proj_006", "emp_003", "2024-09-01T12:00:00", Some("2024-09-04T18:00:00"), "Search"),
];

const fn budget(allocated: u32, spent: u32, quarters: [u32; 4]) -> Budget {
    Budget {
        allocated,
        spent,
        q1_spent: quarters[0],
        q2_spent: quarters[1],
        q3_spent: quarters[2],
        q4_spent: quarters[3],
    }
}

/// Department budgets, in [`DEPARTMENTS`] order.
pub static BUDGETS: [(&str, Budget); 5] = [
    ("engineering", budget(2500, 2340, [580, 620, 590, 550])),
    ("product", budget(800, 720, [180, 190, 175, 175])),
    ("design", budget(600, 680, [160, 170, 180, 170])),
    ("data", budget(1200, 1100, [270, 280, 275, 275])),
    ("infrastructure", budget(3000, 3200, [780, 800, 820, 800])),
];

const fn comment(score: u8, comment: &'static str) -> Comment {
    Comment { score, comment }
}

/// Customer feedback, in project order.
pub static FEEDBACK: [(&str, Feedback); 8] = [
    ("proj_001", Feedback { nps: 45, responses: 234, trend: "stable", recent_comments: &[
        comment(9, "API is fast and reliable"),
        comment(7, "Good but documentation could be better"),
        comment(8, "Love the new endpoints"),
    ] }),
    ("proj_002", Feedback { nps: 28, responses: 567, trend: "declining", recent_comments: &[
        comment(5, "Login is slow sometimes"),
        comment(6, "UI is confusing"),
        comment(4, "Can't find basic features"),
    ] }),
    ("proj_003", Feedback { nps: 62, responses: 189, trend: "improving", recent_comments: &[
        comment(9, "Beautiful new design!"),
        comment(10, "So much easier to use"),
        comment(8, "Great improvements"),
    ] }),
    ("proj_004", Feedback { nps: 51, responses: 45, trend: "stable", recent_comments: &[
        comment(8, "Data is more reliable now"),
        comment(7, "Reports are faster"),
    ] }),
    ("proj_005", Feedback { nps: 38, responses: 123, trend: "declining", recent_comments: &[
        comment(6, "Some downtime recently"),
        comment(5, "Performance issues"),
        comment(7, "Generally stable"),
    ] }),
    ("proj_006", Feedback { nps: 72, responses: 312, trend: "improving", recent_comments: &[
        comment(10, "Search is blazing fast now"),
        comment(9, "Finally finds what I need"),
        comment(9, "Huge improvement"),
    ] }),
    ("proj_007", Feedback { nps: 55, responses: 89, trend: "stable", recent_comments: &[
        comment(8, "Dashboards are useful"),
        comment(7, "Good data visualization"),
    ] }),
    ("proj_008", Feedback { nps: 41, responses: 67, trend: "stable", recent_comments: &[
        comment(7, "Components are consistent"),
        comment(6, "Some components missing"),
    ] }),
];

#[allow(clippy::too_many_arguments)]
const fn deployment(
    id: &'static str,
    project_id: &'static str,
    version: &'static str,
    deployed_by: &'static str,
    deployed_at: &'static str,
    status: &'static str,
    rollback: bool,
    environment: &'static str,
) -> Deployment {
    Deployment {
        id,
        project_id,
        version,
        deployed_by,
        deployed_at,
        status,
        rollback,
        environment,
    }
}

/// Newest first.
pub static DEPLOYMENTS: [Deployment; 24] = [
    deployment("deploy_proj_007_002", "proj_007", "v4.12.50", "emp_014", "2024-09-29T17:45:00", "success", false, "staging"),
    deployment("deploy_proj_006_001", "proj_006", "v4.11.87", "emp_004", "2024-09-27T15:30:00", "success", false, "production"),
    deployment("deploy_proj_004_002", "proj_004", "v3.11.76", "emp_014", "2024-09-22T10:30:00", "success", false, "staging"),
    deployment("deploy_proj_007_003", "proj_007", "v2.2.26", "emp_015", "2024-09-21T15:00:00", "success", false, "production"),
    deployment("deploy_proj_008_003", "proj_008", "v3.15.15", "emp_008", "2024-09-21T13:30:00", "success", false, "staging"),
    deployment("deploy_proj_002_001", "proj_002", "v1.7.5", "emp_001", "2024-09-19T18:45:00", "success", false, "production"),
    deployment("deploy_proj_003_002", "proj_003", "v3.7.23", "emp_007", "2024-09-19T16:30:00", "success", false, "production"),
    deployment("deploy_proj_003_003", "proj_003", "v3.14.36", "emp_007", "2024-09-19T13:45:00", "success", false, "production"),
    deployment("deploy_proj_001_002", "proj_001", "v1.2.55", "emp_002", "2024-09-19T09:15:00", "success", false, "production"),
    deployment("deploy_proj_003_001", "proj_003", "v4.17.54", "emp_008", "2024-09-19T09:10:00", "success", false, "staging"),
    deployment("deploy_proj_007_001", "proj_007", "v2.16.79", "emp_014", "2024-09-18T14:30:00", "success", false, "staging"),
    deployment("deploy_proj_004_001", "proj_004", "v3.4.62", "emp_014", "2024-09-17T15:15:00", "success", false, "production"),
    deployment("deploy_proj_006_003", "proj_006", "v3.9.0", "emp_003", "2024-09-16T18:15:00", "success", false, "staging"),
    deployment("deploy_proj_005_002", "proj_005", "v3.4.94", "emp_016", "2024-09-16T09:15:00", "success", false, "staging"),
    deployment("deploy_proj_005_003", "proj_005", "v2.14.51", "emp_017", "2024-09-13T16:00:00", "failed", true, "production"),
    deployment("deploy_proj_008_002", "proj_008", "v1.6.78", "emp_012", "2024-09-12T18:00:00", "success", false, "production"),
    deployment("deploy_proj_001_001", "proj_001", "v1.2.68", "emp_001", "2024-09-11T11:45:00", "success", false, "staging"),
    deployment("deploy_proj_005_001", "proj_005", "v1.14.45", "emp_016", "2024-09-10T15:30:00", "failed", false, "production"),
    deployment("deploy_proj_002_002", "proj_002", "v1.18.39", "emp_001", "2024-09-10T15:15:00", "failed", true, "production"),
    deployment("deploy_proj_001_003", "proj_001", "v1.18.15", "emp_001", "2024-09-08T10:45:00", "failed", false, "production"),
    deployment("deploy_proj_006_002", "proj_006", "v2.7.84", "emp_003", "2024-09-05T10:15:00", "success", false, "production"),
    deployment("deploy_proj_002_003", "proj_002", "v3.3.70", "emp_001", "2024-09-04T18:15:00", "success", false, "production"),
    deployment("deploy_proj_008_001", "proj_008", "v1.0.72", "emp_008", "2024-09-04T14:00:00", "success", false, "production"),
    deployment("deploy_proj_004_003", "proj_004", "v4.2.7", "emp_014", "2024-09-03T10:30:00", "success", false, "staging"),
];

/// Short reference facts keyed by topic.
pub static FACTS: [(&str, &str); 5] = [
    ("mission", "Structured AI builds reliable tooling for operations teams."),
    ("founding", "Structured AI was founded in 2019 by three engineers from the same startup."),
    ("headquarters", "The headquarters sits in Portland with satellite offices in Austin and Toronto."),
    ("oncall", "Every engineering team rotates weekly on call with a secondary backup engineer."),
    ("release", "Production releases ship on Tuesdays and Thursdays after staging sign off."),
];

pub fn budget_for(department: &str) -> Option<&'static Budget> {
    BUDGETS
        .iter()
        .find(|(name, _)| *name == department)
        .map(|(_, budget)| budget)
}

pub fn feedback_for(project_id: &str) -> Option<&'static Feedback> {
    FEEDBACK
        .iter()
        .find(|(id, _)| *id == project_id)
        .map(|(_, feedback)| feedback)
}

pub fn fact_for(topic: &str) -> Option<&'static str> {
    FACTS
        .iter()
        .find(|(key, _)| *key == topic)
        .map(|(_, fact)| *fact)
}
