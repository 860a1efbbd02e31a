//! Unit tests for the heuristic task planner.

use agent_ensemble::models::plan::TaskComplexity;
use agent_ensemble::planner::{analyze_task, score_task, MAX_TEAM_AGENTS, TEAM_THRESHOLD};
use agent_ensemble::AppError;

#[test]
fn simple_task_is_solo() {
    let plan = analyze_task("fix bug", "").unwrap();

    assert_eq!(plan.complexity, TaskComplexity::Solo);
    assert_eq!(plan.roles.len(), 1);
    assert_eq!(plan.lead_role_name(), "Worker");
    assert_eq!(plan.task_graph.len(), 1);
    assert_eq!(plan.runtime_recommendation.as_deref(), Some("claude-code"));
}

#[test]
fn multi_part_task_is_team_with_detected_roles() {
    let plan = analyze_task(
        "Research competitor pricing and then implement a comparison page, then write a report",
        "",
    )
    .unwrap();

    assert_eq!(plan.complexity, TaskComplexity::Team);
    let roles: Vec<&str> = plan.roles.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(roles, vec!["Researcher", "Implementer", "Writer"]);
    assert_eq!(plan.roles[0].focus, "Research and analyze competitors");
}

#[test]
fn team_graph_is_a_linear_chain() {
    let plan = analyze_task(
        "Investigate the crash and fix it, then verify with tests and document the change",
        "",
    )
    .unwrap();

    assert_eq!(plan.complexity, TaskComplexity::Team);
    assert!(plan.task_graph[0].depends_on.is_empty());
    for pair in plan.task_graph.windows(2) {
        assert_eq!(pair[1].depends_on, vec![pair[0].id.clone()]);
    }
    for (node, role) in plan.task_graph.iter().zip(&plan.roles) {
        assert_eq!(node.assignee, role.name);
    }
}

#[test]
fn team_without_role_keywords_gets_lead_and_worker() {
    let plan = analyze_task("Do this in parallel with a team of helpers", "").unwrap();

    assert_eq!(plan.complexity, TaskComplexity::Team);
    let roles: Vec<&str> = plan.roles.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(roles, vec!["Lead", "Worker"]);
}

#[test]
fn team_size_is_bounded() {
    let plan = analyze_task(
        "Research, analyze and compare options, then build and fix it, test and verify, then write and document a report",
        "",
    )
    .unwrap();

    assert!(plan.roles.len() <= MAX_TEAM_AGENTS);
    assert_eq!(plan.roles.len(), plan.task_graph.len());
}

#[test]
fn numbered_lists_and_sentences_raise_the_score() {
    let flat = score_task("update the readme");
    let listed = score_task("1. Update the readme. 2. Bump the version. 3. Tag the release.");

    assert!(flat < TEAM_THRESHOLD);
    assert!(listed >= TEAM_THRESHOLD);
}

#[test]
fn codex_context_selects_codex_runtime() {
    let plan = analyze_task("fix bug", "This project is built with Codex CLI").unwrap();

    assert_eq!(plan.runtime_recommendation.as_deref(), Some("codex"));
    assert_eq!(plan.roles[0].runtime.as_deref(), Some("codex"));
}

#[test]
fn blank_task_is_rejected() {
    let err = analyze_task("   ", "").unwrap_err();

    assert!(matches!(err, AppError::Precondition(_)));
}
