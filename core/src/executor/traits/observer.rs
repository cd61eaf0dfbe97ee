/// Execution observer (lifecycle notifications)
pub trait ExecutionObserver: Send + Sync {
    fn name(&self) -> &str;
    fn on_event(&self, event: &ExecutionEvent);
}

/// Lifecycle event emitted by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    RunStarted {
        execution_id: String,
        stack_name: String,
        total_agents: usize,
    },
    Plan {
        execution_id: String,
        levels: Vec<Vec<String>>,
    },
    AgentStarted {
        execution_id: String,
        agent_id: String,
    },
    AgentCompleted {
        execution_id: String,
        agent_id: String,
        duration_ms: Option<u64>,
    },
    AgentFailed {
        execution_id: String,
        agent_id: String,
        error: String,
    },
    AgentBlocked {
        execution_id: String,
        agent_id: String,
    },
    AgentCancelled {
        execution_id: String,
        agent_id: String,
    },
    RunFinished {
        execution_id: String,
        completed: usize,
        failed: usize,
        blocked: usize,
        cancelled: usize,
        duration_ms: u64,
    },
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> &str {
        match self {
            Self::RunStarted { execution_id, .. }
            | Self::Plan { execution_id, .. }
            | Self::AgentStarted { execution_id, .. }
            | Self::AgentCompleted { execution_id, .. }
            | Self::AgentFailed { execution_id, .. }
            | Self::AgentBlocked { execution_id, .. }
            | Self::AgentCancelled { execution_id, .. }
            | Self::RunFinished { execution_id, .. } => execution_id,
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::AgentStarted { agent_id, .. }
            | Self::AgentCompleted { agent_id, .. }
            | Self::AgentFailed { agent_id, .. }
            | Self::AgentBlocked { agent_id, .. }
            | Self::AgentCancelled { agent_id, .. } => Some(agent_id),
            _ => None,
        }
    }
}
