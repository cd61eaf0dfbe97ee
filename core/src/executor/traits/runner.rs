use async_trait::async_trait;

use crate::error::TaskError;
use crate::executor::cancel::CancelSignal;
use crate::spec::{AgentSpec, ValueMap};

/// Per-invocation context handed to a [`TaskRunner`].
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub execution_id: String,
    pub agent_id: String,
    /// Fires when the run is cancelled or times out. Runners should stop promptly.
    pub cancel: CancelSignal,
}

/// Runs a single agent.
///
/// The engine never looks at `agent.uses`; dispatching on it is the runner's job.
/// Implementations are invoked concurrently for distinct agents.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(
        &self,
        ctx: &TaskContext,
        agent: &AgentSpec,
        inputs: ValueMap,
    ) -> Result<ValueMap, TaskError>;
}
