//! Heuristic task planner.
//!
//! Classifies a task as solo or team work by keyword weights and structure,
//! and for team work derives roles with a linear dependency graph. Backends
//! without a model-driven classifier can serve `analyze_task` from here.

use crate::models::plan::{RoleDef, TaskComplexity, TaskNode, TaskNodeStatus, TaskPlan};
use crate::{AppError, Result};

/// Keyword signals and their weights toward team classification.
const TEAM_SIGNALS: &[(&str, u8)] = &[
    (" and ", 2),
    (" then ", 3),
    (" also ", 2),
    (" plus ", 2),
    ("parallel", 4),
    ("team", 4),
    ("concurrent", 4),
    ("simultaneously", 4),
    ("research", 2),
    ("analyze", 2),
    ("compare", 2),
    ("investigate", 2),
    ("report", 2),
    ("document", 1),
    ("write tests", 2),
    ("refactor", 1),
    ("multiple", 3),
    ("several", 3),
    ("each", 2),
    ("all of", 2),
];

/// Score at or above which a task needs a team.
pub const TEAM_THRESHOLD: u8 = 5;

/// Upper bound on generated team size.
pub const MAX_TEAM_AGENTS: usize = 6;

const LABEL_MAX_CHARS: usize = 80;

/// Analyze a task description and produce a deployment plan.
///
/// `project_context` only influences the runtime recommendation: a context
/// mentioning `codex` selects the Codex runtime.
///
/// # Errors
///
/// Returns `AppError::Precondition` if the task is blank.
pub fn analyze_task(task: &str, project_context: &str) -> Result<TaskPlan> {
    let trimmed = task.trim();
    if trimmed.is_empty() {
        return Err(AppError::Precondition(
            "task description cannot be empty".into(),
        ));
    }

    let runtime = runtime_from_context(project_context);
    if score_task(trimmed) >= TEAM_THRESHOLD {
        Ok(team_plan(trimmed, runtime))
    } else {
        Ok(solo_plan(trimmed, runtime))
    }
}

/// Complexity score for a task; see [`TEAM_THRESHOLD`].
#[must_use]
pub fn score_task(task: &str) -> u8 {
    let lower = task.to_lowercase();
    let mut score = TEAM_SIGNALS
        .iter()
        .filter(|(pattern, _)| lower.contains(pattern))
        .fold(0_u8, |acc, (_, weight)| acc.saturating_add(*weight));

    let sentences = task
        .split(['.', '!', '?', ';'])
        .filter(|s| s.trim().len() > 3)
        .count();
    if sentences >= 3 {
        score = score.saturating_add(3);
    } else if sentences == 2 {
        score = score.saturating_add(1);
    }

    if lower.contains("1.") && lower.contains("2.") {
        score = score.saturating_add(3);
    }

    score
}

fn runtime_from_context(context: &str) -> &'static str {
    if context.to_lowercase().contains("codex") {
        "codex"
    } else {
        "claude-code"
    }
}

/// Single-role plan with one task node.
#[must_use]
pub fn solo_plan(task: &str, runtime: &str) -> TaskPlan {
    TaskPlan {
        complexity: TaskComplexity::Solo,
        roles: vec![RoleDef {
            name: "Worker".into(),
            focus: task.to_owned(),
            runtime: Some(runtime.to_owned()),
        }],
        task_graph: vec![TaskNode {
            id: "task-1".into(),
            label: task.chars().take(LABEL_MAX_CHARS).collect(),
            assignee: "Worker".into(),
            depends_on: Vec::new(),
            status: TaskNodeStatus::Pending,
        }],
        runtime_recommendation: Some(runtime.to_owned()),
        estimated_duration: Some("~1 minute".into()),
    }
}

fn team_plan(task: &str, runtime: &str) -> TaskPlan {
    let lower = task.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let mut phases: Vec<(&str, String, &str)> = Vec::new();
    if has_any(&["research", "investigate", "analyze", "compare", "find"]) {
        phases.push(("Researcher", research_focus(&lower), "Research and gather information"));
    }
    if has_any(&["implement", "build", "create", "fix", "add", "write code", "develop"]) {
        phases.push(("Implementer", implement_focus(&lower), "Implement the solution"));
    }
    if has_any(&["test", "verify", "validate", "check"]) {
        phases.push((
            "Tester",
            "Verify correctness and write tests".into(),
            "Test and verify results",
        ));
    }
    if has_any(&["write", "document", "report", "summarize"]) {
        phases.push(("Writer", writing_focus(&lower), "Write documentation or report"));
    }

    let label: String = task.chars().take(LABEL_MAX_CHARS).collect();
    if phases.is_empty() {
        phases.push(("Lead", "Coordinate and plan the approach".into(), "Plan the approach"));
        phases.push(("Worker", label.clone(), label.as_str()));
    }
    phases.truncate(MAX_TEAM_AGENTS);

    let mut roles = Vec::with_capacity(phases.len());
    let mut graph: Vec<TaskNode> = Vec::with_capacity(phases.len());
    for (index, (name, focus, node_label)) in phases.into_iter().enumerate() {
        roles.push(RoleDef {
            name: name.to_owned(),
            focus,
            runtime: Some(runtime.to_owned()),
        });
        let depends_on = graph.last().map(|prev| prev.id.clone()).into_iter().collect();
        graph.push(TaskNode {
            id: format!("task-{}", index + 1),
            label: node_label.to_owned(),
            assignee: name.to_owned(),
            depends_on,
            status: TaskNodeStatus::Pending,
        });
    }

    let minutes = roles.len() * 2;
    TaskPlan {
        complexity: TaskComplexity::Team,
        roles,
        task_graph: graph,
        runtime_recommendation: Some(runtime.to_owned()),
        estimated_duration: Some(format!("~{minutes} minutes")),
    }
}

fn research_focus(lower: &str) -> String {
    if lower.contains("competitor") {
        "Research and analyze competitors".into()
    } else if lower.contains("compare") {
        "Research options and gather comparison data".into()
    } else {
        "Gather information and analyze findings".into()
    }
}

fn implement_focus(lower: &str) -> String {
    if lower.contains("fix") {
        "Diagnose and implement the fix".into()
    } else if lower.contains("refactor") {
        "Refactor and restructure the code".into()
    } else {
        "Build and implement the solution".into()
    }
}

fn writing_focus(lower: &str) -> String {
    if lower.contains("report") {
        "Write the final report".into()
    } else if lower.contains("document") {
        "Write documentation".into()
    } else {
        "Write and format the deliverable".into()
    }
}
