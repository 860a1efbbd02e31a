//! Shared test helpers for orchestrator-level integration tests.
//!
//! Provides a recording [`MockBackend`], plan builders, and a [`Harness`]
//! wiring an orchestrator to an in-process signal bus so individual test
//! modules can focus on behaviour rather than boilerplate.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use agent_ensemble::backend::signals::{BackendSignal, SignalBus};
use agent_ensemble::backend::{Backend, RunOptions};
use agent_ensemble::config::GlobalConfig;
use agent_ensemble::models::plan::{RoleDef, TaskComplexity, TaskPlan};
use agent_ensemble::orchestrator::personality::PersonalityGenerator;
use agent_ensemble::orchestrator::store::{SessionSnapshot, SessionStore};
use agent_ensemble::orchestrator::team::TeamOrchestrator;
use agent_ensemble::{AppError, Result};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartSolo {
        project_id: String,
        task: String,
        runtime: String,
    },
    StopSolo(String),
    StartTeam {
        project_id: String,
        task_label: String,
        roles: Vec<String>,
    },
    StopTeam(String),
    Analyze {
        task: String,
        project_id: String,
    },
    BuildContext(String),
    ExtractMemories(String),
}

/// Backend double that records calls and returns canned results.
pub struct MockBackend {
    calls: Mutex<Vec<Call>>,
    plan: Mutex<TaskPlan>,
    started: AtomicUsize,
    pub fail_start: AtomicBool,
    pub fail_analyze: AtomicBool,
    pub fail_context: AtomicBool,
    pub fail_memories: AtomicBool,
}

impl MockBackend {
    pub fn new(plan: TaskPlan) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            plan: Mutex::new(plan),
            started: AtomicUsize::new(0),
            fail_start: AtomicBool::new(false),
            fail_analyze: AtomicBool::new(false),
            fail_context: AtomicBool::new(false),
            fail_memories: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| pred(call)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_session_id(&self) -> String {
        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        format!("s{n}")
    }

    fn start_result(&self) -> Result<String> {
        if self.fail_start.load(Ordering::SeqCst) {
            Err(AppError::Backend("process failed to start".into()))
        } else {
            Ok(self.next_session_id())
        }
    }
}

impl Backend for MockBackend {
    fn start_solo(
        &self,
        project_id: &str,
        task: &str,
        runtime: &str,
        _options: &RunOptions,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let call = Call::StartSolo {
            project_id: project_id.to_owned(),
            task: task.to_owned(),
            runtime: runtime.to_owned(),
        };
        Box::pin(async move {
            self.record(call);
            self.start_result()
        })
    }

    fn stop_solo(&self, session_id: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let session_id = session_id.to_owned();
        Box::pin(async move {
            self.record(Call::StopSolo(session_id));
            Ok(())
        })
    }

    fn start_team(
        &self,
        project_id: &str,
        task_label: &str,
        plan: &TaskPlan,
        _options: &RunOptions,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let call = Call::StartTeam {
            project_id: project_id.to_owned(),
            task_label: task_label.to_owned(),
            roles: plan.roles.iter().map(|r| r.name.clone()).collect(),
        };
        Box::pin(async move {
            self.record(call);
            self.start_result()
        })
    }

    fn stop_team(&self, session_id: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let session_id = session_id.to_owned();
        Box::pin(async move {
            self.record(Call::StopTeam(session_id));
            Ok(())
        })
    }

    fn analyze_task(
        &self,
        task: &str,
        project_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<TaskPlan>> + Send + '_>> {
        let call = Call::Analyze {
            task: task.to_owned(),
            project_id: project_id.to_owned(),
        };
        Box::pin(async move {
            self.record(call);
            if self.fail_analyze.load(Ordering::SeqCst) {
                return Err(AppError::Backend("planner unavailable".into()));
            }
            Ok(self.plan.lock().unwrap().clone())
        })
    }

    fn build_project_context(
        &self,
        project_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let project_id = project_id.to_owned();
        Box::pin(async move {
            self.record(Call::BuildContext(project_id));
            if self.fail_context.load(Ordering::SeqCst) {
                return Err(AppError::Backend("context build failed".into()));
            }
            Ok("# Project context".into())
        })
    }

    fn extract_session_memories(
        &self,
        session_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let session_id = session_id.to_owned();
        Box::pin(async move {
            self.record(Call::ExtractMemories(session_id));
            if self.fail_memories.load(Ordering::SeqCst) {
                return Err(AppError::Backend("memory store offline".into()));
            }
            Ok(())
        })
    }
}

pub fn role(name: &str) -> RoleDef {
    RoleDef {
        name: name.into(),
        focus: String::new(),
        runtime: None,
    }
}

pub fn solo_plan(roles: &[&str]) -> TaskPlan {
    TaskPlan {
        complexity: TaskComplexity::Solo,
        roles: roles.iter().map(|name| role(name)).collect(),
        task_graph: Vec::new(),
        runtime_recommendation: None,
        estimated_duration: None,
    }
}

pub fn team_plan(roles: &[&str]) -> TaskPlan {
    TaskPlan {
        complexity: TaskComplexity::Team,
        ..solo_plan(roles)
    }
}

/// Orchestrator wired to a mock backend and an in-process bus.
pub struct Harness {
    pub orchestrator: TeamOrchestrator,
    pub backend: Arc<MockBackend>,
    pub bus: SignalBus,
    pub store: SessionStore,
}

impl Harness {
    pub fn new(plan: TaskPlan) -> Self {
        Self::with(MockBackend::new(plan), GlobalConfig::default())
    }

    pub fn with(backend: MockBackend, config: GlobalConfig) -> Self {
        Self::with_bus(backend, config, SignalBus::new())
    }

    pub fn with_bus(backend: MockBackend, config: GlobalConfig, bus: SignalBus) -> Self {
        let backend = Arc::new(backend);
        let store = SessionStore::with_status_lines(PersonalityGenerator::with_seed(1));
        let orchestrator = TeamOrchestrator::with_store(
            Arc::clone(&backend) as Arc<dyn Backend>,
            Arc::new(bus.clone()),
            config,
            store.clone(),
        );
        Self {
            orchestrator,
            backend,
            bus,
            store,
        }
    }

    /// Harness with project `p1` already active.
    pub async fn with_project(plan: TaskPlan) -> Self {
        let harness = Self::new(plan);
        harness.orchestrator.set_project(Some("p1".into())).await;
        harness
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.orchestrator
            .snapshot()
            .await
            .expect("a session should be present")
    }

    pub async fn output(&self, session_id: &str, record_kind: &str, payload: Value) {
        self.bus
            .publish(BackendSignal::AgentOutput {
                session_id: session_id.into(),
                record_kind: record_kind.into(),
                payload,
            })
            .await;
    }

    pub async fn complete(&self, session_id: &str) {
        self.bus
            .publish(BackendSignal::SessionCompleted {
                session_id: session_id.into(),
                needs_input: false,
                last_result: Some("done".into()),
                usage: None,
            })
            .await;
    }

    pub async fn cancel(&self, session_id: &str) {
        self.bus
            .publish(BackendSignal::SessionCancelled {
                session_id: session_id.into(),
            })
            .await;
    }
}

/// Let spawned tasks run without advancing the clock.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
