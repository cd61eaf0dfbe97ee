use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::spec::ValueMap;

/// Agent status within one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Dependencies not yet all completed
    Pending,
    /// All dependencies completed; eligible for dispatch
    Ready,
    /// Dispatched to the task runner
    Running,
    /// Runner returned outputs
    Completed,
    /// Runner returned an error
    Failed,
    /// A transitive dependency failed, was blocked or was cancelled
    Blocked,
    /// The run was cancelled or timed out before this agent finished
    Cancelled,
}

impl AgentStatus {
    pub const ALL: [AgentStatus; 7] = [
        AgentStatus::Pending,
        AgentStatus::Ready,
        AgentStatus::Running,
        AgentStatus::Completed,
        AgentStatus::Failed,
        AgentStatus::Blocked,
        AgentStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Blocked | Self::Cancelled
        )
    }

    /// Terminal states other than `Completed`: dependents of such an agent can never run.
    pub fn blocks_dependents(self) -> bool {
        matches!(self, Self::Failed | Self::Blocked | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-time record of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    pub status: AgentStatus,

    /// Outputs of a completed agent
    #[serde(default)]
    pub output: ValueMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl AgentState {
    pub fn pending() -> Self {
        Self {
            status: AgentStatus::Pending,
            output: ValueMap::new(),
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Wall time between dispatch and the terminal transition.
    pub fn duration_ms(&self) -> Option<u64> {
        let (start, end) = (self.started_at?, self.completed_at?);
        u64::try_from((end - start).num_milliseconds()).ok()
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::pending()
    }
}
