use std::collections::HashMap;
use std::sync::Arc;

use agentstack_core::api::{AgentSpec, TaskContext, TaskError, TaskRunner, ValueMap};
use async_trait::async_trait;

/// Dispatches each agent to the runner registered for its `uses` reference.
#[derive(Default, Clone)]
pub struct UsesRouter {
    routes: HashMap<String, Arc<dyn TaskRunner>>,
    fallback: Option<Arc<dyn TaskRunner>>,
}

impl UsesRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, uses: impl Into<String>, runner: Arc<dyn TaskRunner>) -> Self {
        self.routes.insert(uses.into(), runner);
        self
    }

    /// Runner for agents whose `uses` has no route.
    pub fn fallback(mut self, runner: Arc<dyn TaskRunner>) -> Self {
        self.fallback = Some(runner);
        self
    }

    fn resolve(&self, uses: &str) -> Option<&Arc<dyn TaskRunner>> {
        self.routes.get(uses).or(self.fallback.as_ref())
    }
}

#[async_trait]
impl TaskRunner for UsesRouter {
    async fn run(
        &self,
        ctx: &TaskContext,
        agent: &AgentSpec,
        inputs: ValueMap,
    ) -> Result<ValueMap, TaskError> {
        match self.resolve(&agent.uses) {
            Some(runner) => runner.run(ctx, agent, inputs).await,
            None => Err(TaskError::failed(format!(
                "no runner registered for '{}'",
                agent.uses
            ))),
        }
    }
}
