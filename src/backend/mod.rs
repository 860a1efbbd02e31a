//! Backend boundary consumed by the engine.
//!
//! The [`Backend`] trait decouples orchestration from process spawning,
//! persistence and task classification. Every call is asynchronous and
//! never blocks the event loop; implementations own the transport.
//! Records and lifecycle signals flow back through [`signals`].

pub mod signals;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::models::plan::TaskPlan;
use crate::Result;

/// Options forwarded to the agent process on start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
    /// Permission mode passed to the agent CLI.
    #[serde(default)]
    pub permission_mode: Option<String>,
    /// Turn limit for the run.
    #[serde(default)]
    pub max_turns: Option<u32>,
    /// Extra system prompt appended to the runtime's own.
    #[serde(default)]
    pub append_system_prompt: Option<String>,
}

/// Interface between the engine and the environment running agent processes.
pub trait Backend: Send + Sync {
    /// Start a single-agent process and return its session id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Backend`](crate::AppError::Backend) if the process cannot be started.
    fn start_solo(
        &self,
        project_id: &str,
        task: &str,
        runtime: &str,
        options: &RunOptions,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Request teardown of a single-agent session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Backend`](crate::AppError::Backend) if the stop request fails.
    fn stop_solo(&self, session_id: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Start a team process for `plan` and return its session id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Backend`](crate::AppError::Backend) if the process cannot be started.
    fn start_team(
        &self,
        project_id: &str,
        task_label: &str,
        plan: &TaskPlan,
        options: &RunOptions,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Request teardown of a team session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Backend`](crate::AppError::Backend) if the stop request fails.
    fn stop_team(&self, session_id: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Classify a task and produce its deployment plan.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Backend`](crate::AppError::Backend) if the planning service fails.
    fn analyze_task(
        &self,
        task: &str,
        project_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<TaskPlan>> + Send + '_>>;

    /// Build the project context document. Called fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Backend`](crate::AppError::Backend) on failure; callers only log it.
    fn build_project_context(
        &self,
        project_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Extract memories from a finished session. Called fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Backend`](crate::AppError::Backend) on failure; callers only log it.
    fn extract_session_memories(
        &self,
        session_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
