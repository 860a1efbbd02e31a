//! Working memory for the current session.
//!
//! [`SessionStore`] is the single owned source of truth for the session,
//! its agents and its events. Only the router and the deployment steps of
//! the orchestrator mutate it; everyone else reads [`SessionSnapshot`]s.
//!
//! Each opened session gets a fresh generation number. Delayed callbacks
//! capture the generation at creation and are ignored once it is stale, so
//! a timer from a torn-down deployment can never touch its successor.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tracing::{debug, info};

use super::personality::PersonalityGenerator;
use crate::models::agent::{Agent, AgentStatus};
use crate::models::event::{Event, EventKind};
use crate::models::session::{Session, SessionStatus, SessionUsage};
use crate::{AppError, Result};

const NOTICE_CAPACITY: usize = 64;

/// Read-only copy of the current session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// The session.
    pub session: Session,
    /// Agents in creation order; index 0 is the root.
    pub agents: Vec<Agent>,
    /// Events in append order.
    pub events: Vec<Event>,
    /// Epoch milliseconds of the last observed activity, `0` if none.
    pub last_event_at: i64,
}

impl SessionSnapshot {
    /// The parentless agent, if one was created.
    #[must_use]
    pub fn root_agent(&self) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.is_root())
    }

    /// Look up an agent by id.
    #[must_use]
    pub fn agent(&self, agent_id: &str) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id == agent_id)
    }
}

/// Lifecycle notices published by the store.
#[derive(Debug, Clone)]
pub enum StoreNotice {
    /// A session reached a terminal status; carries the observed final state.
    SessionEnded {
        /// State at the moment the terminal status was applied.
        snapshot: Box<SessionSnapshot>,
    },
    /// A session was removed from working memory.
    SessionCleared {
        /// Id of the cleared session.
        session_id: String,
    },
}

/// Liveness inputs for the stall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    /// Epoch milliseconds of the last activity, `0` if none.
    pub last_event_at: i64,
    /// Time since the last activity on the runtime clock, `None` if none.
    pub idle: Option<Duration>,
    /// Whether the session is still active.
    pub is_active: bool,
}

#[derive(Debug)]
struct SessionState {
    snapshot: SessionSnapshot,
    generation: u64,
    /// Runtime-clock instant of the last activity; drives stall detection.
    last_activity: Option<Instant>,
}

impl SessionState {
    fn touch(&mut self, at_ms: i64) {
        self.snapshot.last_event_at = at_ms;
        self.last_activity = Some(Instant::now());
    }
}

#[derive(Debug)]
struct Inner {
    current: Option<SessionState>,
    next_generation: u64,
    status_lines: PersonalityGenerator,
}

impl Inner {
    /// The current session when its id matches and it is still active.
    fn active_state_mut(&mut self, session_id: &str) -> Result<&mut SessionState> {
        match self.current.as_mut() {
            Some(state) if state.snapshot.session.id == session_id => {
                if state.snapshot.session.status.is_terminal() {
                    Err(AppError::Precondition(format!(
                        "session {session_id} is no longer active"
                    )))
                } else {
                    Ok(state)
                }
            }
            _ => Err(AppError::NotFound(format!("session {session_id}"))),
        }
    }

    fn active_mut(&mut self, session_id: &str) -> Result<&mut SessionSnapshot> {
        self.active_state_mut(session_id).map(|state| &mut state.snapshot)
    }
}

/// Shared handle to the working memory. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<Inner>>,
    notices: broadcast::Sender<StoreNotice>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_status_lines(PersonalityGenerator::new())
    }

    /// Create an empty store drawing funny status lines from `status_lines`.
    #[must_use]
    pub fn with_status_lines(status_lines: PersonalityGenerator) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                current: None,
                next_generation: 1,
                status_lines,
            })),
            notices,
        }
    }

    /// Subscribe to lifecycle notices.
    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<StoreNotice> {
        self.notices.subscribe()
    }

    /// Make `session` the current one, replacing any previous session.
    ///
    /// Returns the generation assigned to it.
    pub async fn open_session(&self, session: Session) -> u64 {
        let mut inner = self.inner.lock().await;
        let generation = inner.next_generation;
        inner.next_generation += 1;
        if let Some(previous) = inner.current.take() {
            debug!(session_id = %previous.snapshot.session.id, "replacing previous session");
        }
        info!(session_id = %session.id, generation, "session opened");
        inner.current = Some(SessionState {
            snapshot: SessionSnapshot {
                session,
                agents: Vec::new(),
                events: Vec::new(),
                last_event_at: 0,
            },
            generation,
            last_activity: None,
        });
        generation
    }

    /// Add an agent to its (active) session.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the agent's session is not current.
    /// - `AppError::Precondition` if the session is terminal, or the parent
    ///   agent does not exist yet in the session.
    pub async fn add_agent(&self, agent: Agent) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let snapshot = inner.active_mut(&agent.session_id)?;
        if let Some(parent_id) = agent.parent_agent_id.as_deref() {
            if snapshot.agent(parent_id).is_none() {
                return Err(AppError::Precondition(format!(
                    "parent agent {parent_id} does not exist in session {}",
                    agent.session_id
                )));
            }
        }
        debug!(
            session_id = %agent.session_id,
            agent_id = %agent.id,
            role = %agent.role,
            "agent added"
        );
        snapshot.agents.push(agent);
        Ok(())
    }

    /// Append an event attributed to `agent_id`; refreshes liveness.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the session is not current or the agent is unknown.
    /// - `AppError::Precondition` if the session is terminal.
    pub async fn append_event(
        &self,
        session_id: &str,
        agent_id: &str,
        kind: EventKind,
        payload: Value,
    ) -> Result<Event> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let funny_status = inner.status_lines.funny_status(kind);
        let state = inner.active_state_mut(session_id)?;
        let agent = state
            .snapshot
            .agent(agent_id)
            .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} in session {session_id}")))?;
        let event = Event::new(
            agent.id.clone(),
            agent.name.clone(),
            agent.runtime.clone(),
            kind,
            payload,
            funny_status,
        );
        state.touch(event.timestamp.timestamp_millis());
        state.snapshot.events.push(event.clone());
        Ok(event)
    }

    /// Move an agent to `status`. Re-applying the current status is a no-op.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the session is not current or the agent is unknown.
    /// - `AppError::InvalidTransition` if the agent state machine forbids it.
    pub async fn transition_agent(
        &self,
        session_id: &str,
        agent_id: &str,
        status: AgentStatus,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let snapshot = inner.active_mut(session_id)?;
        let agent = snapshot
            .agents
            .iter_mut()
            .find(|agent| agent.id == agent_id)
            .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} in session {session_id}")))?;
        agent.transition(status, Utc::now())
    }

    /// Agent a record is attributed to: the one whose name or role equals
    /// `hint`, otherwise the root agent.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the session is not current or has no agents.
    /// - `AppError::Precondition` if the session is terminal.
    pub async fn owning_agent(&self, session_id: &str, hint: Option<&str>) -> Result<String> {
        let mut inner = self.inner.lock().await;
        let snapshot: &SessionSnapshot = inner.active_mut(session_id)?;
        hint.and_then(|hint| {
            snapshot
                .agents
                .iter()
                .find(|agent| agent.name == hint || agent.role == hint)
        })
        .or_else(|| snapshot.root_agent())
        .map(|agent| agent.id.clone())
        .ok_or_else(|| AppError::NotFound(format!("no agents in session {session_id}")))
    }

    /// Record a tool name on an agent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session is not current or the agent is unknown.
    pub async fn record_tool(&self, session_id: &str, agent_id: &str, tool: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let snapshot = inner.active_mut(session_id)?;
        let agent = snapshot
            .agents
            .iter_mut()
            .find(|agent| agent.id == agent_id)
            .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} in session {session_id}")))?;
        agent.record_tool(tool);
        Ok(())
    }

    /// Activation timer callback: promote an agent still in `spawning`.
    ///
    /// Returns `false` without effect when `generation` is stale, the session
    /// is terminal, or the agent already left `spawning`.
    pub async fn promote_if_spawning(
        &self,
        generation: u64,
        agent_id: &str,
        status: AgentStatus,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(state) = inner.current.as_mut() else {
            return false;
        };
        if state.generation != generation || state.snapshot.session.status.is_terminal() {
            return false;
        }
        match state
            .snapshot
            .agents
            .iter_mut()
            .find(|agent| agent.id == agent_id)
        {
            Some(agent) if agent.status == AgentStatus::Spawning => {
                agent.transition(status, Utc::now()).unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Refresh the liveness timestamp to now.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the session is not current.
    /// - `AppError::Precondition` if the session is terminal.
    pub async fn mark_record_seen(&self, session_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .active_state_mut(session_id)?
            .touch(Utc::now().timestamp_millis());
        Ok(())
    }

    /// Store the agent process's own session identifier.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the session is not current.
    /// - `AppError::Precondition` if the session is terminal.
    pub async fn set_external_id(&self, session_id: &str, external_id: String) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let snapshot = inner.active_mut(session_id)?;
        snapshot.session.external_session_id = Some(external_id);
        Ok(())
    }

    /// Complete the session: every agent goes to `done`, one celebration
    /// `task_update` event naming the root agent is appended, and the
    /// session becomes `completed`. Reported `usage` is kept on the session
    /// and copied into the celebration payload. Publishes [`StoreNotice::SessionEnded`].
    ///
    /// Returns `Ok(false)` if `session_id` is not the current active session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` if a status change is rejected.
    pub async fn complete(
        &self,
        session_id: &str,
        needs_input: bool,
        last_result: Option<String>,
        usage: Option<SessionUsage>,
    ) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let funny_status = inner.status_lines.funny_status(EventKind::TaskUpdate);
        let Ok(snapshot) = inner.active_mut(session_id) else {
            debug!(session_id, "completion for a session that is not active, ignoring");
            return Ok(false);
        };

        finish_agents(snapshot)?;

        if let Some(root) = snapshot.root_agent() {
            let message = if snapshot.agents.len() > 1 {
                format!("{} and the team finished the task!", root.name)
            } else {
                format!("{} finished the task!", root.name)
            };
            let mut payload = json!({ "message": message, "needsInput": needs_input });
            if let Some(map) = payload.as_object_mut() {
                if let Some(result) = last_result {
                    map.insert("lastResult".into(), Value::String(result));
                }
                if let Some(usage) = usage {
                    map.insert("usage".into(), json!(usage));
                }
            }
            let event = Event::new(
                root.id.clone(),
                root.name.clone(),
                root.runtime.clone(),
                EventKind::TaskUpdate,
                payload,
                funny_status,
            );
            snapshot.last_event_at = event.timestamp.timestamp_millis();
            snapshot.events.push(event);
        }

        snapshot.session.usage = usage;
        snapshot.session.transition(SessionStatus::Completed)?;
        info!(session_id, agents = snapshot.agents.len(), "session completed");
        let ended = snapshot.clone();
        drop(guard);
        self.notify(StoreNotice::SessionEnded {
            snapshot: Box::new(ended),
        });
        Ok(true)
    }

    /// Cancel the session: every agent goes to `done` and the session
    /// becomes `cancelled`. Publishes [`StoreNotice::SessionEnded`].
    ///
    /// Returns `Ok(false)` if `session_id` is not the current active session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` if a status change is rejected.
    pub async fn cancel(&self, session_id: &str) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        let Ok(snapshot) = guard.active_mut(session_id) else {
            debug!(session_id, "cancellation for a session that is not active, ignoring");
            return Ok(false);
        };

        finish_agents(snapshot)?;
        snapshot.session.transition(SessionStatus::Cancelled)?;
        info!(session_id, "session cancelled");
        let ended = snapshot.clone();
        drop(guard);
        self.notify(StoreNotice::SessionEnded {
            snapshot: Box::new(ended),
        });
        Ok(true)
    }

    /// Remove the session from working memory if it still belongs to `generation`.
    pub async fn clear_if(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock().await;
        let matches = inner
            .current
            .as_ref()
            .is_some_and(|state| state.generation == generation);
        if !matches {
            return false;
        }
        let Some(state) = inner.current.take() else {
            return false;
        };
        drop(inner);
        let session_id = state.snapshot.session.id;
        info!(session_id, generation, "session cleared");
        self.notify(StoreNotice::SessionCleared { session_id });
        true
    }

    /// Copy of the current session state.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let inner = self.inner.lock().await;
        inner.current.as_ref().map(|state| state.snapshot.clone())
    }

    /// Id and generation of the current session.
    pub async fn current(&self) -> Option<(String, u64)> {
        let inner = self.inner.lock().await;
        inner
            .current
            .as_ref()
            .map(|state| (state.snapshot.session.id.clone(), state.generation))
    }

    /// Liveness inputs for `session_id`; inactive if it is not current.
    pub async fn liveness(&self, session_id: &str) -> Liveness {
        let inner = self.inner.lock().await;
        match inner.current.as_ref() {
            Some(state) if state.snapshot.session.id == session_id => Liveness {
                last_event_at: state.snapshot.last_event_at,
                idle: state.last_activity.map(|at| at.elapsed()),
                is_active: state.snapshot.session.status == SessionStatus::Active,
            },
            _ => Liveness {
                last_event_at: 0,
                idle: None,
                is_active: false,
            },
        }
    }

    fn notify(&self, notice: StoreNotice) {
        // No receivers is fine.
        let _ = self.notices.send(notice);
    }
}

/// Drive every non-terminal agent to `done`.
fn finish_agents(snapshot: &mut SessionSnapshot) -> Result<()> {
    let now = Utc::now();
    for agent in &mut snapshot.agents {
        if !agent.status.is_terminal() {
            agent.transition(AgentStatus::Done, now)?;
        }
    }
    Ok(())
}
