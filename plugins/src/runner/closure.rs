use std::future::Future;
use std::sync::Arc;

use agentstack_core::api::{AgentSpec, TaskContext, TaskError, TaskRunner, ValueMap};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};

type RunFn =
    dyn Fn(TaskContext, AgentSpec, ValueMap) -> BoxFuture<'static, Result<ValueMap, TaskError>>
        + Send
        + Sync;

/// Adapts an async closure into a [`TaskRunner`].
///
/// The closure receives owned copies of the context, the agent and its merged inputs.
#[derive(Clone)]
pub struct FnRunner {
    name: String,
    f: Arc<RunFn>,
}

impl FnRunner {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(TaskContext, AgentSpec, ValueMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ValueMap, TaskError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(move |ctx: TaskContext, agent: AgentSpec, inputs: ValueMap| {
                f(ctx, agent, inputs).boxed()
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl TaskRunner for FnRunner {
    async fn run(
        &self,
        ctx: &TaskContext,
        agent: &AgentSpec,
        inputs: ValueMap,
    ) -> Result<ValueMap, TaskError> {
        tracing::debug!(
            runner = %self.name,
            agent_id = %agent.id,
            uses = %agent.uses,
            "invoking closure runner"
        );
        (self.f)(ctx.clone(), agent.clone(), inputs).await
    }
}
