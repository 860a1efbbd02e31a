//! Task plan produced by the planning service.
//!
//! A plan is created once per deployment and never mutated afterwards;
//! `roles[i]` maps to the i-th spawned team agent.

use serde::{Deserialize, Serialize};

/// Task complexity classification: solo agent or team of agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskComplexity {
    /// One agent.
    Solo,
    /// A coordinated team.
    Team,
}

/// A role for one agent in the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDef {
    /// Role name (e.g., `Researcher`).
    pub name: String,
    /// What the agent in this role should focus on.
    #[serde(default)]
    pub focus: String,
    /// Runtime override for this role.
    #[serde(default)]
    pub runtime: Option<String>,
}

/// Status of a single task node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskNodeStatus {
    /// Not yet started.
    #[default]
    Pending,
    /// In progress.
    Active,
    /// Finished.
    Done,
    /// Failed.
    Error,
}

/// A node in the task dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    /// Node identifier (e.g., `task-1`).
    #[serde(default)]
    pub id: String,
    /// Short description.
    pub label: String,
    /// Role name of the assignee.
    #[serde(default)]
    pub assignee: String,
    /// Node ids that must finish first.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Current status.
    #[serde(default)]
    pub status: TaskNodeStatus,
}

/// Deployment plan for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPlan {
    /// Solo or team.
    pub complexity: TaskComplexity,
    /// Role definitions in deployment order.
    #[serde(default)]
    pub roles: Vec<RoleDef>,
    /// Sub-task dependency graph.
    #[serde(default)]
    pub task_graph: Vec<TaskNode>,
    /// Suggested runtime for the whole deployment.
    #[serde(default)]
    pub runtime_recommendation: Option<String>,
    /// Human-readable time estimate.
    #[serde(default)]
    pub estimated_duration: Option<String>,
}

impl TaskPlan {
    /// Name of the first role, or `Worker` when the plan has none.
    #[must_use]
    pub fn lead_role_name(&self) -> &str {
        self.roles.first().map_or("Worker", |role| role.name.as_str())
    }
}
