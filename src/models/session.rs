//! Session model and lifecycle helpers.

use serde::{Deserialize, Serialize};

use super::plan::{TaskComplexity, TaskPlan};
use crate::backend::RunOptions;
use crate::{AppError, Result};

/// Lifecycle status for a deployed session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session is running; agents may still change status.
    Active,
    /// The backend reported the task finished.
    Completed,
    /// The user stopped the task.
    Cancelled,
}

impl SessionStatus {
    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// One end-to-end task execution, solo or team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Identifier returned by the backend on start.
    pub id: String,
    /// Project the task was deployed in.
    pub project_id: String,
    /// Task text as submitted.
    pub task: String,
    /// Runtime the session records are produced by.
    pub runtime: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Plan the session was deployed from, if one was used.
    pub plan: Option<TaskPlan>,
    /// Options passed to the backend start call.
    pub applied_options: Option<RunOptions>,
    /// Identifier assigned by the agent process itself (used for resume).
    pub external_session_id: Option<String>,
    /// Token and cost totals reported by the final result record.
    pub usage: Option<SessionUsage>,
}

/// Token and cost totals for a finished run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUsage {
    /// Total tokens, or input plus output when no total was reported.
    pub total_tokens: u64,
    /// Total cost in USD.
    pub cost_usd: f64,
}

impl Session {
    /// Construct a new active session.
    #[must_use]
    pub fn new(
        id: String,
        project_id: String,
        task: String,
        runtime: String,
        plan: Option<TaskPlan>,
        applied_options: Option<RunOptions>,
    ) -> Self {
        Self {
            id,
            project_id,
            task,
            runtime,
            status: SessionStatus::Active,
            plan,
            applied_options,
            external_session_id: None,
            usage: None,
        }
    }

    /// Whether the session was deployed as a team.
    #[must_use]
    pub fn is_team(&self) -> bool {
        self.plan
            .as_ref()
            .is_some_and(|plan| plan.complexity == TaskComplexity::Team)
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self.status, next),
            (
                SessionStatus::Active,
                SessionStatus::Completed | SessionStatus::Cancelled
            )
        )
    }

    /// Apply a lifecycle transition.
    ///
    /// Returns `Ok(false)` when the session already has `next` status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` when leaving a terminal status.
    pub fn transition(&mut self, next: SessionStatus) -> Result<bool> {
        if self.status == next {
            return Ok(false);
        }
        if !self.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "session {} cannot move from {:?} to {next:?}",
                self.id, self.status
            )));
        }
        self.status = next;
        Ok(true)
    }
}
