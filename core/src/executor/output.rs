use tracing::{debug, info, warn};

use super::traits::{ExecutionEvent, ExecutionObserver};

/// Default observer: structured `tracing` events for every lifecycle step.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn name(&self) -> &str {
        "tracing"
    }

    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted {
                execution_id,
                stack_name,
                total_agents,
            } => {
                info!(%execution_id, stack = %stack_name, total_agents, "stack run started");
            }
            ExecutionEvent::Plan {
                execution_id,
                levels,
            } => {
                for (level, ids) in levels.iter().enumerate() {
                    debug!(%execution_id, level, agents = %ids.join(", "), "execution plan");
                }
            }
            ExecutionEvent::AgentStarted {
                execution_id,
                agent_id,
            } => {
                debug!(%execution_id, %agent_id, "agent dispatched");
            }
            ExecutionEvent::AgentCompleted {
                execution_id,
                agent_id,
                duration_ms,
            } => {
                info!(%execution_id, %agent_id, duration_ms = duration_ms.unwrap_or(0), "agent completed");
            }
            ExecutionEvent::AgentFailed {
                execution_id,
                agent_id,
                error,
            } => {
                warn!(%execution_id, %agent_id, %error, "agent failed");
            }
            ExecutionEvent::AgentBlocked {
                execution_id,
                agent_id,
            } => {
                warn!(%execution_id, %agent_id, "agent blocked by upstream failure");
            }
            ExecutionEvent::AgentCancelled {
                execution_id,
                agent_id,
            } => {
                warn!(%execution_id, %agent_id, "agent cancelled");
            }
            ExecutionEvent::RunFinished {
                execution_id,
                completed,
                failed,
                blocked,
                cancelled,
                duration_ms,
            } => {
                info!(
                    %execution_id,
                    completed,
                    failed,
                    blocked,
                    cancelled,
                    duration_ms,
                    "stack run finished"
                );
            }
        }
    }
}
