use std::sync::Arc;

use uuid::Uuid;

use crate::error::StackError;
use crate::spec::{validate, StackSpec, ValueMap};
use crate::state::ExecutionSummary;

use super::cancel::CancelSignal;
use super::graph::DependencyGraph;
use super::output::TracingObserver;
use super::scheduler::Scheduler;
use super::traits::{ExecutionObserver, SummarySink, TaskRunner};
use super::types::ExecutionOpts;

/// Execution engine for agent stacks
pub struct StackEngine {
    runner: Arc<dyn TaskRunner>,
    observer: Arc<dyn ExecutionObserver>,
    sink: Option<Arc<dyn SummarySink>>,
    opts: ExecutionOpts,
}

pub struct StackEngineBuilder {
    runner: Arc<dyn TaskRunner>,
    observer: Arc<dyn ExecutionObserver>,
    sink: Option<Arc<dyn SummarySink>>,
    opts: ExecutionOpts,
}

impl StackEngine {
    pub fn new(runner: Arc<dyn TaskRunner>) -> Self {
        Self::builder(runner).build()
    }

    pub fn builder(runner: Arc<dyn TaskRunner>) -> StackEngineBuilder {
        StackEngineBuilder::new(runner)
    }

    pub fn opts(&self) -> &ExecutionOpts {
        &self.opts
    }

    /// Execute an already built graph.
    ///
    /// `spec` is validated first and `graph` must have been built from it. Per-agent
    /// failures never surface as `Err`; they are recorded in the returned summary.
    pub async fn execute(
        &self,
        graph: &DependencyGraph,
        spec: &StackSpec,
        global_inputs: &ValueMap,
        cancel: &CancelSignal,
    ) -> Result<ExecutionSummary, StackError> {
        validate(spec)?;
        if !graph.matches(spec) {
            return Err(StackError::GraphMismatch(spec.name.clone()));
        }

        let execution_id = self
            .opts
            .execution_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let scheduler = Scheduler {
            graph,
            spec,
            runner: self.runner.clone(),
            observer: self.observer.clone(),
            opts: &self.opts,
            execution_id,
        };

        scheduler.run(global_inputs, cancel).await
    }

    /// Validate, build and execute `spec`, then hand the summary to the configured sink.
    pub async fn run(
        &self,
        spec: &StackSpec,
        global_inputs: &ValueMap,
        cancel: &CancelSignal,
    ) -> Result<ExecutionSummary, StackError> {
        validate(spec)?;
        let graph = DependencyGraph::build(spec)?;
        let summary = self.execute(&graph, spec, global_inputs, cancel).await?;

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record(&spec.name, &summary).await {
                tracing::warn!(
                    execution_id = %summary.execution_id(),
                    sink = sink.name(),
                    error = %e,
                    "failed to record execution summary"
                );
            }
        }

        Ok(summary)
    }
}

impl StackEngineBuilder {
    pub fn new(runner: Arc<dyn TaskRunner>) -> Self {
        Self {
            runner,
            observer: Arc::new(TracingObserver),
            sink: None,
            opts: ExecutionOpts::default(),
        }
    }

    pub fn observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn SummarySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn opts(mut self, opts: ExecutionOpts) -> Self {
        self.opts = opts;
        self
    }

    pub fn build(self) -> StackEngine {
        StackEngine {
            runner: self.runner,
            observer: self.observer,
            sink: self.sink,
            opts: self.opts,
        }
    }
}

/// Run a stack to completion with a fresh cancellation signal.
///
/// This is the main entry point for callers that need neither a sink nor a custom observer.
pub async fn execute_stack(
    spec: &StackSpec,
    runner: Arc<dyn TaskRunner>,
    global_inputs: &ValueMap,
    opts: ExecutionOpts,
) -> Result<ExecutionSummary, StackError> {
    let engine = StackEngine::builder(runner).opts(opts).build();
    engine.run(spec, global_inputs, &CancelSignal::new()).await
}
