//! Unit tests for the session lifecycle and the serialized data model.

use serde_json::json;

use agent_ensemble::models::event::{Event, EventKind};
use agent_ensemble::models::plan::{TaskComplexity, TaskPlan};
use agent_ensemble::models::session::{Session, SessionStatus};
use agent_ensemble::AppError;

fn plan(complexity: TaskComplexity) -> TaskPlan {
    TaskPlan {
        complexity,
        roles: Vec::new(),
        task_graph: Vec::new(),
        runtime_recommendation: None,
        estimated_duration: None,
    }
}

fn session(plan: Option<TaskPlan>) -> Session {
    Session::new(
        "s1".into(),
        "p1".into(),
        "fix bug".into(),
        "claude-code".into(),
        plan,
        None,
    )
}

#[test]
fn new_session_is_active() {
    let session = session(None);

    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.external_session_id.is_none());
}

#[test]
fn active_moves_to_either_terminal_status() {
    for next in [SessionStatus::Completed, SessionStatus::Cancelled] {
        let mut session = session(None);
        assert!(session.transition(next).unwrap());
        assert_eq!(session.status, next);
        assert!(session.status.is_terminal());
    }
}

#[test]
fn terminal_sessions_cannot_move() {
    let mut session = session(None);
    session.transition(SessionStatus::Cancelled).unwrap();

    let err = session.transition(SessionStatus::Completed).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    let err = session.transition(SessionStatus::Active).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    assert_eq!(session.status, SessionStatus::Cancelled);
}

#[test]
fn reapplying_status_is_a_noop() {
    let mut session = session(None);
    session.transition(SessionStatus::Completed).unwrap();

    assert!(!session.transition(SessionStatus::Completed).unwrap());
}

#[test]
fn team_detection_follows_plan_complexity() {
    assert!(session(Some(plan(TaskComplexity::Team))).is_team());
    assert!(!session(Some(plan(TaskComplexity::Solo))).is_team());
    assert!(!session(None).is_team());
}

#[test]
fn lead_role_defaults_to_worker() {
    assert_eq!(plan(TaskComplexity::Solo).lead_role_name(), "Worker");
}

#[test]
fn plan_deserializes_from_service_json() {
    let plan: TaskPlan = serde_json::from_value(json!({
        "complexity": "team",
        "roles": [ { "name": "Lead", "focus": "coordinate" }, { "name": "Tester" } ],
        "taskGraph": [ { "label": "write tests", "assignee": "Tester", "dependsOn": ["t0"] } ]
    }))
    .unwrap();

    assert_eq!(plan.complexity, TaskComplexity::Team);
    assert_eq!(plan.lead_role_name(), "Lead");
    assert_eq!(plan.roles[1].focus, "");
    assert_eq!(plan.task_graph[0].depends_on, vec!["t0"]);
}

#[test]
fn session_serializes_camel_case() {
    let value = serde_json::to_value(session(None)).unwrap();

    assert_eq!(value["projectId"], "p1");
    assert_eq!(value["status"], "active");
    assert!(value["externalSessionId"].is_null());
}

#[test]
fn event_serializes_kind_as_type() {
    let event = Event::new(
        "a1".into(),
        "Pip".into(),
        "claude-code".into(),
        EventKind::ToolCall,
        json!({ "tool": "Read" }),
        "Grabbing the right tool".into(),
    );

    let value = serde_json::to_value(&event).unwrap();

    assert_eq!(value["type"], "tool_call");
    assert_eq!(value["agentName"], "Pip");
    assert_eq!(value["funnyStatus"], "Grabbing the right tool");
    assert_eq!(EventKind::TaskUpdate.as_str(), "task_update");
}
