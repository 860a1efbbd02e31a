//! Agent model and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orchestrator::personality::Personality;
use crate::{AppError, Result};

/// Status of a single agent within a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Created, process not yet producing work.
    Spawning,
    /// Reasoning.
    Thinking,
    /// Calling tools or producing output.
    Working,
    /// Blocked on something external.
    Waiting,
    /// Talking to another agent.
    Chatting,
    /// Idle.
    Sleeping,
    /// Finished.
    Done,
    /// Failed.
    Error,
}

impl AgentStatus {
    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether the status is one of the in-flight working states.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Thinking | Self::Working | Self::Waiting | Self::Chatting | Self::Sleeping
        )
    }

    /// Determine whether moving from `self` to `next` is permitted.
    ///
    /// `spawning` may go anywhere but back to itself, active states move
    /// freely among themselves and into a terminal state, terminal states
    /// never move.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Spawning => next != Self::Spawning,
            s if s.is_active() => next.is_active() || next.is_terminal(),
            _ => false,
        }
    }
}

/// One coordinated worker unit within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Unique agent identifier.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Display name.
    pub name: String,
    /// Task role from the plan.
    pub role: String,
    /// Display avatar glyph.
    pub avatar: String,
    /// Display color (hex).
    pub color: String,
    /// Personality quirk line.
    pub quirk: String,
    /// Runtime executing this agent.
    pub runtime: String,
    /// Current status.
    pub status: AgentStatus,
    /// Creation timestamp.
    pub spawned_at: DateTime<Utc>,
    /// Set once, on the first transition into a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
    /// Coordinating agent for team members; `None` for the root.
    pub parent_agent_id: Option<String>,
    /// Distinct tool names this agent has invoked, in first-use order.
    pub tools_used: Vec<String>,
}

impl Agent {
    /// Construct a new agent in `spawning` status.
    #[must_use]
    pub fn new(
        session_id: String,
        personality: Personality,
        role: String,
        runtime: String,
        parent_agent_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            name: personality.name,
            role,
            avatar: personality.avatar,
            color: personality.color,
            quirk: personality.quirk,
            runtime,
            status: AgentStatus::Spawning,
            spawned_at: Utc::now(),
            finished_at: None,
            parent_agent_id,
            tools_used: Vec::new(),
        }
    }

    /// Whether this agent is the hierarchy root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_agent_id.is_none()
    }

    /// Apply a status transition.
    ///
    /// Re-applying the current status is a no-op and returns `Ok(false)`.
    /// `finished_at` is stamped only on the first entry into a terminal status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` if the state machine forbids it.
    pub fn transition(&mut self, next: AgentStatus, at: DateTime<Utc>) -> Result<bool> {
        if self.status == next {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "agent {} cannot move from {:?} to {next:?}",
                self.id, self.status
            )));
        }
        self.status = next;
        if next.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(at);
        }
        Ok(true)
    }

    /// Record a tool invocation, keeping each tool name once.
    pub fn record_tool(&mut self, tool: &str) {
        if !tool.is_empty() && !self.tools_used.iter().any(|t| t == tool) {
            self.tools_used.push(tool.to_owned());
        }
    }
}
