use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{AgentState, AgentStatus};
use crate::error::ErrorCode;

/// How the run as a whole ended, independent of individual agent outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// The caller's cancellation signal fired.
    pub cancelled: bool,
    /// The run-level timeout elapsed.
    pub timed_out: bool,
}

/// Aggregate result of one execution of a stack.
///
/// Built once by [`SummaryReporter::report`]; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    execution_id: String,
    stack_name: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    total_agents: usize,
    completed_count: usize,
    failed_count: usize,
    blocked_count: usize,
    cancelled_count: usize,
    #[serde(default)]
    cancelled: bool,
    #[serde(default)]
    timed_out: bool,
    agents: BTreeMap<String, AgentState>,
}

impl ExecutionSummary {
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn total_agents(&self) -> usize {
        self.total_agents
    }

    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked_count
    }

    pub fn cancelled_count(&self) -> usize {
        self.cancelled_count
    }

    /// The caller cancelled the run.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn agents(&self) -> &BTreeMap<String, AgentState> {
        &self.agents
    }

    pub fn state(&self, id: &str) -> Option<&AgentState> {
        self.agents.get(id)
    }

    pub fn status(&self, id: &str) -> Option<AgentStatus> {
        self.agents.get(id).map(|s| s.status)
    }

    /// Agent ids with the given status, sorted by id.
    pub fn ids_with(&self, status: AgentStatus) -> Vec<&str> {
        self.agents
            .iter()
            .filter(|(_, s)| s.status == status)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn duration_ms(&self) -> u64 {
        u64::try_from((self.end_time - self.start_time).num_milliseconds()).unwrap_or(0)
    }

    /// Every agent completed and the run was neither cancelled nor timed out.
    pub fn is_success(&self) -> bool {
        !self.cancelled && !self.timed_out && self.completed_count == self.total_agents
    }

    /// Outcome code for embedding applications.
    pub fn error_code(&self) -> ErrorCode {
        if self.timed_out {
            ErrorCode::Timeout
        } else if self.cancelled {
            ErrorCode::Cancelled
        } else if self.is_success() {
            ErrorCode::Success
        } else {
            ErrorCode::GeneralError
        }
    }

    /// The four terminal counters account for every agent.
    pub fn is_terminal(&self) -> bool {
        self.completed_count + self.failed_count + self.blocked_count + self.cancelled_count
            == self.total_agents
    }
}

/// Reduces the final per-agent state map into an [`ExecutionSummary`].
pub struct SummaryReporter;

impl SummaryReporter {
    pub fn report(
        execution_id: impl Into<String>,
        stack_name: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        outcome: RunOutcome,
        agents: BTreeMap<String, AgentState>,
    ) -> ExecutionSummary {
        let count = |status: AgentStatus| agents.values().filter(|s| s.status == status).count();

        ExecutionSummary {
            execution_id: execution_id.into(),
            stack_name: stack_name.into(),
            start_time,
            end_time,
            total_agents: agents.len(),
            completed_count: count(AgentStatus::Completed),
            failed_count: count(AgentStatus::Failed),
            blocked_count: count(AgentStatus::Blocked),
            cancelled_count: count(AgentStatus::Cancelled),
            cancelled: outcome.cancelled,
            timed_out: outcome.timed_out,
            agents,
        }
    }
}
