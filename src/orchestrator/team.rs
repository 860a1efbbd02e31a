//! Team orchestrator: deployment planning, agent creation and session control.
//!
//! The orchestrator is the boundary consumers drive. It asks the backend for
//! a plan, decides between a solo run and a team run (teams and forced team
//! mode always wait for approval), creates agents with personalities, roles
//! and a parent/child hierarchy, and wires the per-session router and stall
//! monitor.
//!
//! # Cancellation hierarchy
//!
//! ```text
//! root token (orchestrator lifetime)
//!   └── session scope (one per deployment)
//!         ├── event router
//!         ├── stall monitor
//!         └── activation timers
//! ```
//!
//! A new deployment, the session leaving `active`, or [`shutdown`](TeamOrchestrator::shutdown)
//! cancels the scope; nothing scheduled under it can touch the store afterwards.
//! A new deployment also asks the backend to stop a replaced session that
//! had not ended yet.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use super::personality::PersonalityGenerator;
use super::router::{EventRouter, RouterHandle};
use super::stall_monitor::{StallEvent, StallMonitor, StallMonitorHandle};
use super::store::{SessionSnapshot, SessionStore};
use crate::backend::signals::{BackendSignal, SignalSource};
use crate::backend::{Backend, RunOptions};
use crate::config::{GlobalConfig, Preferences};
use crate::models::agent::{Agent, AgentStatus};
use crate::models::event::EventKind;
use crate::models::plan::{RoleDef, TaskComplexity, TaskPlan};
use crate::models::session::Session;
use crate::{AppError, Result};

/// Role used when a plan carries none.
pub const FALLBACK_ROLE: &str = "Worker";

/// Result of [`TeamOrchestrator::deploy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// A solo session was started.
    Deployed {
        /// Backend session id.
        session_id: String,
    },
    /// The plan needs user approval; call [`TeamOrchestrator::deploy_approved_plan`].
    AwaitingApproval(TaskPlan),
}

#[derive(Debug, Clone)]
struct PendingPlan {
    task: String,
    plan: TaskPlan,
}

/// Handles owned by the current deployment.
struct ActiveSession {
    session_id: String,
    is_team: bool,
    scope: CancellationToken,
    _router: Option<RouterHandle>,
    stall: Option<StallMonitorHandle>,
}

impl ActiveSession {
    fn teardown(self) {
        self.scope.cancel();
        if let Some(stall) = self.stall.as_ref() {
            stall.stop();
        }
    }
}

/// One agent to create for a deployment.
struct Assignment {
    role: String,
    runtime: String,
}

/// Facade over deployment and session control.
pub struct TeamOrchestrator {
    backend: Arc<dyn Backend>,
    signals: Arc<dyn SignalSource>,
    store: SessionStore,
    config: Arc<GlobalConfig>,
    preferences: Arc<Preferences>,
    project: Mutex<Option<String>>,
    run_options: Mutex<RunOptions>,
    pending: Mutex<Option<PendingPlan>>,
    active: Mutex<Option<ActiveSession>>,
    stall_events: Option<mpsc::Sender<StallEvent>>,
    root: CancellationToken,
}

impl TeamOrchestrator {
    /// Construct an orchestrator with an empty store.
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        signals: Arc<dyn SignalSource>,
        config: GlobalConfig,
    ) -> Self {
        Self::with_store(backend, signals, config, SessionStore::new())
    }

    /// Construct an orchestrator over an existing store.
    #[must_use]
    pub fn with_store(
        backend: Arc<dyn Backend>,
        signals: Arc<dyn SignalSource>,
        config: GlobalConfig,
        store: SessionStore,
    ) -> Self {
        let preferences = Arc::new(Preferences::from_config(&config.preferences));
        Self {
            backend,
            signals,
            store,
            config: Arc::new(config),
            preferences,
            project: Mutex::new(None),
            run_options: Mutex::new(RunOptions::default()),
            pending: Mutex::new(None),
            active: Mutex::new(None),
            stall_events: None,
            root: CancellationToken::new(),
        }
    }

    /// Report stall transitions of deployed sessions on `tx`.
    #[must_use]
    pub fn with_stall_events(mut self, tx: mpsc::Sender<StallEvent>) -> Self {
        self.stall_events = Some(tx);
        self
    }

    /// Working memory shared with the router.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Runtime-adjustable preference flags.
    #[must_use]
    pub fn preferences(&self) -> &Arc<Preferences> {
        &self.preferences
    }

    /// Set (or clear with `None`) the active project.
    pub async fn set_project(&self, project_id: Option<String>) {
        *self.project.lock().await = project_id;
    }

    /// Options passed to subsequent backend start calls.
    pub async fn set_run_options(&self, options: RunOptions) {
        *self.run_options.lock().await = options;
    }

    /// Plan waiting for approval, if any.
    pub async fn pending_plan(&self) -> Option<TaskPlan> {
        self.pending.lock().await.as_ref().map(|p| p.plan.clone())
    }

    /// Deploy `task` in the active project.
    ///
    /// Solo plans start immediately. Team plans, and every plan while forced
    /// team mode is on, are held for approval and returned.
    ///
    /// # Errors
    ///
    /// - `AppError::Precondition` if no project is active; no state is created.
    /// - `AppError::Backend` if planning or the solo start fails.
    pub async fn deploy(&self, task: &str) -> Result<DeployOutcome> {
        let Some(project_id) = self.project.lock().await.clone() else {
            warn!("deploy requested with no active project");
            return Err(AppError::Precondition("no active project".into()));
        };

        self.spawn_context_build(&project_id);

        let mut plan = self.backend.analyze_task(task, &project_id).await?;
        info!(
            project_id,
            complexity = ?plan.complexity,
            roles = plan.roles.len(),
            "task analyzed"
        );

        if plan.complexity == TaskComplexity::Solo && self.preferences.force_team_mode() {
            info!("force team mode set, holding solo plan for approval");
            plan.complexity = TaskComplexity::Team;
        }

        if plan.complexity == TaskComplexity::Team {
            *self.pending.lock().await = Some(PendingPlan {
                task: task.to_owned(),
                plan: plan.clone(),
            });
            return Ok(DeployOutcome::AwaitingApproval(plan));
        }

        let session_id = self.deploy_solo(&project_id, task, plan).await?;
        Ok(DeployOutcome::Deployed { session_id })
    }

    /// Start the team for an approved plan.
    ///
    /// `plan` replaces the pending one, so the user may edit roles before
    /// approving. Returns the backend session id.
    ///
    /// # Errors
    ///
    /// - `AppError::Precondition` if no project is active or no plan is pending.
    /// - `AppError::Backend` if the team start fails; the plan stays pending.
    pub async fn deploy_approved_plan(&self, plan: TaskPlan) -> Result<String> {
        let Some(project_id) = self.project.lock().await.clone() else {
            warn!("approved plan with no active project");
            return Err(AppError::Precondition("no active project".into()));
        };
        let Some(pending) = self.pending.lock().await.clone() else {
            return Err(AppError::Precondition("no plan is awaiting approval".into()));
        };

        let subscription = self.subscribe();
        let options = self.run_options.lock().await.clone();
        let session_id = self
            .backend
            .start_team(&project_id, &pending.task, &plan, &options)
            .await?;
        self.pending.lock().await.take();

        let runtime = plan
            .runtime_recommendation
            .clone()
            .unwrap_or_else(|| self.config.default_runtime.clone());
        let assignments = assignments(&plan, &runtime);
        let session = Session::new(
            session_id.clone(),
            project_id,
            pending.task,
            runtime,
            Some(plan),
            Some(options),
        );
        self.begin_session(session, assignments, true, subscription)
            .await?;
        Ok(session_id)
    }

    /// Request backend teardown of the current session.
    ///
    /// Team sessions get a team stop, everything else a solo stop. State
    /// changes arrive later through the cancellation signal.
    ///
    /// # Errors
    ///
    /// - `AppError::Precondition` if no session is active.
    /// - `AppError::Backend` if the stop request fails.
    pub async fn stop(&self) -> Result<()> {
        let (session_id, is_team) = {
            let active = self.active.lock().await;
            match active.as_ref() {
                Some(current) if !current.scope.is_cancelled() => {
                    (current.session_id.clone(), current.is_team)
                }
                _ => return Err(AppError::Precondition("no active session".into())),
            }
        };

        info!(session_id, is_team, "stop requested");
        self.request_stop(&session_id, is_team).await
    }

    /// Whether the current session is stalled.
    pub async fn is_stalled(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .and_then(|current| current.stall.as_ref())
            .is_some_and(StallMonitorHandle::is_stalled)
    }

    /// Read-only copy of the current session, its agents and events.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        self.store.snapshot().await
    }

    /// Cancel every task owned by the orchestrator.
    pub async fn shutdown(&self) {
        if let Some(current) = self.active.lock().await.take() {
            current.teardown();
        }
        self.root.cancel();
        info!("orchestrator shut down");
    }

    async fn deploy_solo(&self, project_id: &str, task: &str, plan: TaskPlan) -> Result<String> {
        let role = plan.lead_role_name().to_owned();
        let runtime = plan
            .roles
            .first()
            .and_then(|role| role.runtime.clone())
            .or_else(|| plan.runtime_recommendation.clone())
            .unwrap_or_else(|| self.config.default_runtime.clone());

        let subscription = self.subscribe();
        let options = self.run_options.lock().await.clone();
        let session_id = self
            .backend
            .start_solo(project_id, task, &runtime, &options)
            .await?;

        let session = Session::new(
            session_id.clone(),
            project_id.to_owned(),
            task.to_owned(),
            runtime.clone(),
            Some(plan),
            Some(options),
        );
        let assignments = vec![Assignment { role, runtime }];
        self.begin_session(session, assignments, false, subscription)
            .await?;
        Ok(session_id)
    }

    async fn request_stop(&self, session_id: &str, is_team: bool) -> Result<()> {
        if is_team {
            self.backend.stop_team(session_id).await
        } else {
            self.backend.stop_solo(session_id).await
        }
    }

    /// Subscribe before the backend start so no early record is missed.
    fn subscribe(&self) -> Option<mpsc::Receiver<BackendSignal>> {
        match self.signals.subscribe() {
            Ok(rx) => Some(rx),
            Err(err) => {
                warn!(%err, "event subscription failed, continuing without events");
                None
            }
        }
    }

    async fn begin_session(
        &self,
        session: Session,
        assignments: Vec<Assignment>,
        is_team: bool,
        subscription: Option<mpsc::Receiver<BackendSignal>>,
    ) -> Result<()> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            let still_running = !previous.scope.is_cancelled();
            let (previous_id, previous_team) = (previous.session_id.clone(), previous.is_team);
            previous.teardown();
            // Signals of the replaced session are no longer routed.
            if still_running {
                info!(session_id = %previous_id, "stopping replaced session");
                if let Err(err) = self.request_stop(&previous_id, previous_team).await {
                    warn!(%err, session_id = %previous_id, "failed to stop replaced session");
                }
            }
        }

        let session_id = session.id.clone();
        let session_runtime = session.runtime.clone();
        let generation = self.store.open_session(session).await;
        let scope = self.root.child_token();

        let mut personalities = PersonalityGenerator::new();
        let mut root_agent_id: Option<String> = None;
        for (index, assignment) in assignments.into_iter().enumerate() {
            let agent = Agent::new(
                session_id.clone(),
                personalities.generate(),
                assignment.role,
                assignment.runtime,
                root_agent_id.clone(),
            );
            let agent_id = agent.id.clone();
            let payload = json!({
                "name": agent.name,
                "role": agent.role,
                "avatar": agent.avatar,
                "parentAgentId": agent.parent_agent_id,
            });
            self.store.add_agent(agent).await?;
            self.store
                .append_event(&session_id, &agent_id, EventKind::Spawn, payload)
                .await?;
            self.schedule_activation(
                generation,
                agent_id.clone(),
                self.config.timing.activation_delay(index),
                scope.clone(),
            );
            if root_agent_id.is_none() {
                root_agent_id = Some(agent_id);
            }
        }

        let router = subscription.map(|rx| {
            EventRouter::new(
                session_id.clone(),
                session_runtime,
                generation,
                self.store.clone(),
                Arc::clone(&self.backend),
                Arc::clone(&self.preferences),
                self.config.timing.clone(),
                scope.clone(),
                self.root.clone(),
            )
            .spawn(rx)
        });

        let stall = self.config.stall.enabled.then(|| {
            let monitor = StallMonitor::new(
                session_id.clone(),
                self.config.stall.poll_interval(),
                self.config.stall.threshold(),
                self.store.clone(),
                scope.child_token(),
            );
            match self.stall_events.clone() {
                Some(tx) => monitor.with_events(tx).spawn(),
                None => monitor.spawn(),
            }
        });

        info!(session_id, is_team, generation, "session deployed");
        *active = Some(ActiveSession {
            session_id,
            is_team,
            scope,
            _router: router,
            stall,
        });
        Ok(())
    }

    /// Move a still-spawning agent to `working` after `delay`.
    fn schedule_activation(
        &self,
        generation: u64,
        agent_id: String,
        delay: Duration,
        scope: CancellationToken,
    ) {
        let store = self.store.clone();
        tokio::spawn(
            async move {
                tokio::select! {
                    () = scope.cancelled() => {}
                    () = tokio::time::sleep(delay) => {
                        store
                            .promote_if_spawning(generation, &agent_id, AgentStatus::Working)
                            .await;
                    }
                }
            }
            .instrument(info_span!("activation_timer")),
        );
    }

    fn spawn_context_build(&self, project_id: &str) {
        let backend = Arc::clone(&self.backend);
        let project_id = project_id.to_owned();
        tokio::spawn(
            async move {
                if let Err(err) = backend.build_project_context(&project_id).await {
                    warn!(%err, project_id, "project context build failed");
                }
            }
            .instrument(info_span!("context_build")),
        );
    }
}

/// One assignment per role, in plan order; a role-less plan gets one fallback.
fn assignments(plan: &TaskPlan, default_runtime: &str) -> Vec<Assignment> {
    let fallback = [RoleDef {
        name: FALLBACK_ROLE.into(),
        focus: String::new(),
        runtime: None,
    }];
    let roles = if plan.roles.is_empty() {
        &fallback[..]
    } else {
        &plan.roles[..]
    };
    roles
        .iter()
        .map(|role| Assignment {
            role: role.name.clone(),
            runtime: role
                .runtime
                .clone()
                .unwrap_or_else(|| default_runtime.to_owned()),
        })
        .collect()
}

impl Drop for TeamOrchestrator {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
