use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{StackError, TaskError};
use crate::spec::{AgentSpec, StackSpec, ValueMap};
use crate::state::{AgentStatus, ExecutionSummary, RunOutcome, StateTracker, SummaryReporter};

use super::cancel::CancelSignal;
use super::graph::DependencyGraph;
use super::input::merge_inputs;
use super::traits::{ExecutionEvent, ExecutionObserver, TaskContext, TaskRunner};
use super::types::ExecutionOpts;

type Dispatched = BoxFuture<'static, (String, Result<ValueMap, TaskError>)>;

/// Readiness-driven scheduler for one execution.
///
/// A single loop owns the [`StateTracker`]; dispatched agents run as futures in a
/// `FuturesUnordered` and only hand their result back to the loop.
pub(crate) struct Scheduler<'a> {
    pub graph: &'a DependencyGraph,
    pub spec: &'a StackSpec,
    pub runner: Arc<dyn TaskRunner>,
    pub observer: Arc<dyn ExecutionObserver>,
    pub opts: &'a ExecutionOpts,
    pub execution_id: String,
}

impl<'a> Scheduler<'a> {
    pub async fn run(
        self,
        global_inputs: &ValueMap,
        cancel: &CancelSignal,
    ) -> Result<ExecutionSummary, StackError> {
        let start_time = Utc::now();
        let agents: HashMap<&str, &AgentSpec> =
            self.spec.agents.iter().map(|a| (a.id.as_str(), a)).collect();

        let mut tracker = StateTracker::new(self.graph);
        let run_signal = CancelSignal::new();
        let slots = self.opts.max_parallel.map(|n| Arc::new(Semaphore::new(n.max(1))));
        let mut in_flight: FuturesUnordered<Dispatched> = FuturesUnordered::new();
        let mut outcome = RunOutcome::default();

        self.emit(ExecutionEvent::RunStarted {
            execution_id: self.execution_id.clone(),
            stack_name: self.spec.name.clone(),
            total_agents: self.graph.len(),
        });
        self.emit(ExecutionEvent::Plan {
            execution_id: self.execution_id.clone(),
            levels: self.graph.levels(),
        });

        let timeout = async {
            match self.opts.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timeout);

        loop {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            self.dispatch_ready(
                &mut tracker,
                &agents,
                &mut in_flight,
                slots.as_ref(),
                global_inputs,
                &run_signal,
            )?;

            if in_flight.is_empty() {
                if tracker.has_pending() {
                    // Nothing running and nothing ready: the remaining agents can never start.
                    let stalled = tracker.block_stalled()?;
                    tracing::warn!(
                        execution_id = %self.execution_id,
                        count = stalled.len(),
                        "no runnable agents left; blocking the rest"
                    );
                    self.emit_for(&stalled, AgentStatus::Blocked);
                }
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    outcome.cancelled = true;
                    break;
                }
                _ = &mut timeout => {
                    outcome.timed_out = true;
                    break;
                }
                Some((agent_id, result)) = in_flight.next() => {
                    self.record(&mut tracker, &agent_id, result, false)?;
                }
            }
        }

        if outcome.cancelled || outcome.timed_out {
            self.wind_down(&mut tracker, &mut in_flight, &run_signal, outcome)
                .await?;
        }

        let end_time = Utc::now();
        let summary = SummaryReporter::report(
            self.execution_id.clone(),
            self.spec.name.clone(),
            start_time,
            end_time,
            outcome,
            tracker.into_states(),
        );

        self.emit(ExecutionEvent::RunFinished {
            execution_id: self.execution_id.clone(),
            completed: summary.completed_count(),
            failed: summary.failed_count(),
            blocked: summary.blocked_count(),
            cancelled: summary.cancelled_count(),
            duration_ms: summary.duration_ms(),
        });

        Ok(summary)
    }

    /// Dispatch every `Ready` agent that fits in the worker pool.
    fn dispatch_ready(
        &self,
        tracker: &mut StateTracker<'_>,
        agents: &HashMap<&str, &AgentSpec>,
        in_flight: &mut FuturesUnordered<Dispatched>,
        slots: Option<&Arc<Semaphore>>,
        global_inputs: &ValueMap,
        run_signal: &CancelSignal,
    ) -> Result<(), StackError> {
        for agent_id in tracker.ready_ids() {
            let permit: Option<OwnedSemaphorePermit> = match slots {
                Some(sem) => match sem.clone().try_acquire_owned() {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                },
                None => None,
            };

            let Some(agent) = agents.get(agent_id.as_str()) else {
                return Err(StackError::GraphMismatch(self.spec.name.clone()));
            };

            let inputs = merge_inputs(agent, |dep| tracker.output(dep), global_inputs);
            tracker.mark_running(&agent_id)?;

            self.emit(ExecutionEvent::AgentStarted {
                execution_id: self.execution_id.clone(),
                agent_id: agent_id.clone(),
            });

            let runner = self.runner.clone();
            let agent = (*agent).clone();
            let ctx = TaskContext {
                execution_id: self.execution_id.clone(),
                agent_id,
                cancel: run_signal.clone(),
            };

            in_flight.push(Box::pin(async move {
                let _permit = permit;
                let result = AssertUnwindSafe(runner.run(&ctx, &agent, inputs))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(TaskError::failed(format!(
                            "agent panicked: {}",
                            panic_message(panic.as_ref())
                        )))
                    });
                (ctx.agent_id, result)
            }));
        }

        Ok(())
    }

    /// Apply one runner result and re-evaluate the agents waiting on it.
    fn record(
        &self,
        tracker: &mut StateTracker<'_>,
        agent_id: &str,
        result: Result<ValueMap, TaskError>,
        cancelling: bool,
    ) -> Result<(), StackError> {
        match result {
            Ok(output) => {
                tracker.mark_completed(agent_id, output)?;
                self.emit(ExecutionEvent::AgentCompleted {
                    execution_id: self.execution_id.clone(),
                    agent_id: agent_id.to_string(),
                    duration_ms: tracker.state(agent_id).and_then(|s| s.duration_ms()),
                });
            }
            Err(err) if cancelling && err.is_cancelled() => {
                tracker.mark_cancelled(agent_id, Some(err.to_string()))?;
                self.emit(ExecutionEvent::AgentCancelled {
                    execution_id: self.execution_id.clone(),
                    agent_id: agent_id.to_string(),
                });
            }
            Err(err) => {
                let message = err.to_string();
                tracker.mark_failed(agent_id, message.clone())?;
                self.emit(ExecutionEvent::AgentFailed {
                    execution_id: self.execution_id.clone(),
                    agent_id: agent_id.to_string(),
                    error: message,
                });
            }
        }

        for (id, status) in tracker.propagate()? {
            if status == AgentStatus::Blocked {
                self.emit_for(&[id], AgentStatus::Blocked);
            }
        }

        Ok(())
    }

    /// Stop dispatching, cancel everything not yet started, and give in-flight agents
    /// `cancel_grace` to observe the signal before abandoning them.
    async fn wind_down(
        &self,
        tracker: &mut StateTracker<'_>,
        in_flight: &mut FuturesUnordered<Dispatched>,
        run_signal: &CancelSignal,
        outcome: RunOutcome,
    ) -> Result<(), StackError> {
        tracing::warn!(
            execution_id = %self.execution_id,
            cancelled = outcome.cancelled,
            timed_out = outcome.timed_out,
            in_flight = in_flight.len(),
            "stopping stack run"
        );

        run_signal.cancel();
        let cancelled = tracker.cancel_pending()?;
        self.emit_for(&cancelled, AgentStatus::Cancelled);

        let grace = tokio::time::sleep(self.opts.cancel_grace);
        tokio::pin!(grace);

        while !in_flight.is_empty() {
            tokio::select! {
                _ = &mut grace => break,
                Some((agent_id, result)) = in_flight.next() => {
                    self.record(tracker, &agent_id, result, true)?;
                }
            }
        }

        // Dropping the futures is the only abort available for runners that ignore the signal.
        in_flight.clear();
        let abandoned = tracker.cancel_running()?;
        self.emit_for(&abandoned, AgentStatus::Cancelled);

        Ok(())
    }

    fn emit(&self, event: ExecutionEvent) {
        self.observer.on_event(&event);
    }

    fn emit_for(&self, ids: &[String], status: AgentStatus) {
        for agent_id in ids {
            let execution_id = self.execution_id.clone();
            let agent_id = agent_id.clone();
            let event = match status {
                AgentStatus::Blocked => ExecutionEvent::AgentBlocked {
                    execution_id,
                    agent_id,
                },
                _ => ExecutionEvent::AgentCancelled {
                    execution_id,
                    agent_id,
                },
            };
            self.emit(event);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
