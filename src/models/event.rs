//! Canonical domain event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of a canonical event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An agent was created.
    Spawn,
    /// Agent reasoning.
    Thinking,
    /// Agent invoked a tool.
    ToolCall,
    /// A tool returned.
    ToolResult,
    /// Agent produced narration or a final result.
    Output,
    /// Inter-agent message.
    Chat,
    /// Session-level progress or completion notice.
    TaskUpdate,
    /// Agent changed files.
    FileChange,
}

impl EventKind {
    /// Wire name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spawn => "spawn",
            Self::Thinking => "thinking",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::Output => "output",
            Self::Chat => "chat",
            Self::TaskUpdate => "task_update",
            Self::FileChange => "file_change",
        }
    }
}

/// Append-only record of agent activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event identifier.
    pub id: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Agent the event is attributed to.
    pub agent_id: String,
    /// Display name of that agent at creation time.
    pub agent_name: String,
    /// Runtime that produced the underlying record.
    pub runtime: String,
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Kind-specific payload object.
    pub payload: Value,
    /// Light-hearted status line shown alongside the event.
    pub funny_status: String,
}

impl Event {
    /// Construct a new event stamped with the current time.
    #[must_use]
    pub fn new(
        agent_id: String,
        agent_name: String,
        runtime: String,
        kind: EventKind,
        payload: Value,
        funny_status: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            agent_id,
            agent_name,
            runtime,
            kind,
            payload,
            funny_status,
        }
    }
}
