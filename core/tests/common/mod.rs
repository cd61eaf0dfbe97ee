#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use agentstack_core::api::{
    AgentSpec, ExecutionEvent, ExecutionObserver, ExecutionSummary, SummarySink, TaskContext,
    TaskError, TaskRunner, ValueMap,
};
use async_trait::async_trait;
use serde_json::json;

/// What a scripted agent does when it is run.
#[derive(Debug, Clone)]
pub enum Behavior {
    Output(ValueMap),
    Fail(String),
    /// Sleep, then return the output. Stops early with `Cancelled` when the run is cancelled.
    Sleep(Duration, ValueMap),
    /// Sleep without ever looking at the cancel signal.
    Stubborn(Duration),
    WaitForCancel,
    Panic(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    Started(String),
    Finished(String),
}

/// Runner driven by a per-agent script.
///
/// Agents without a script echo their inputs back with `"<id>": "done"` added.
#[derive(Default)]
pub struct ScriptedRunner {
    script: HashMap<String, Behavior>,
    log: Mutex<Vec<Mark>>,
    inputs: Mutex<HashMap<String, ValueMap>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, agent_id: &str, behavior: Behavior) -> Self {
        self.script.insert(agent_id.to_string(), behavior);
        self
    }

    pub fn log(&self) -> Vec<Mark> {
        self.log.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|m| match m {
                Mark::Started(id) => Some(id),
                Mark::Finished(_) => None,
            })
            .collect()
    }

    pub fn inputs_of(&self, agent_id: &str) -> Option<ValueMap> {
        self.inputs.lock().unwrap().get(agent_id).cloned()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self, agent_id: &str) {
        self.log
            .lock()
            .unwrap()
            .push(Mark::Started(agent_id.to_string()));
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self, agent_id: &str) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push(Mark::Finished(agent_id.to_string()));
    }
}

#[async_trait]
impl TaskRunner for ScriptedRunner {
    async fn run(
        &self,
        ctx: &TaskContext,
        agent: &AgentSpec,
        inputs: ValueMap,
    ) -> Result<ValueMap, TaskError> {
        self.enter(&agent.id);
        self.inputs
            .lock()
            .unwrap()
            .insert(agent.id.clone(), inputs.clone());

        let result = match self.script.get(&agent.id).cloned() {
            None => {
                let mut out = inputs;
                out.insert(agent.id.clone(), json!("done"));
                Ok(out)
            }
            Some(Behavior::Output(out)) => Ok(out),
            Some(Behavior::Fail(msg)) => Err(TaskError::failed(msg)),
            Some(Behavior::Sleep(d, out)) => {
                tokio::select! {
                    _ = tokio::time::sleep(d) => Ok(out),
                    _ = ctx.cancel.cancelled() => Err(TaskError::Cancelled),
                }
            }
            Some(Behavior::Stubborn(d)) => {
                tokio::time::sleep(d).await;
                Ok(ValueMap::new())
            }
            Some(Behavior::WaitForCancel) => {
                ctx.cancel.cancelled().await;
                Err(TaskError::Cancelled)
            }
            Some(Behavior::Panic(msg)) => panic!("{msg}"),
        };

        self.leave(&agent.id);
        result
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ExecutionObserver for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }

    fn on_event(&self, event: &ExecutionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub fail: bool,
    records: Mutex<Vec<(String, ExecutionSummary)>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<(String, ExecutionSummary)> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl SummarySink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn record(&self, stack_id: &str, summary: &ExecutionSummary) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("sink unavailable");
        }
        self.records
            .lock()
            .unwrap()
            .push((stack_id.to_string(), summary.clone()));
        Ok(())
    }
}

pub fn agent(id: &str) -> AgentSpec {
    AgentSpec::new(id, "scripted")
}

/// Index of the first mark equal to `mark`.
pub fn position(log: &[Mark], mark: &Mark) -> Option<usize> {
    log.iter().position(|m| m == mark)
}
