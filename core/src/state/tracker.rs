use std::collections::BTreeMap;

use chrono::Utc;

use crate::error::StackError;
use crate::executor::DependencyGraph;
use crate::spec::ValueMap;

use super::transitions::{StatusTransition, TransitionError};
use super::types::{AgentState, AgentStatus};

/// Owns the status map of one execution.
///
/// Every mutation goes through [`StatusTransition::validate`], so terminal states are
/// never revisited. The tracker is single-writer: only the scheduler loop holds it.
#[derive(Debug)]
pub struct StateTracker<'g> {
    graph: &'g DependencyGraph,
    /// Topological order; a single pass in this order propagates blocking transitively.
    order: Vec<String>,
    states: BTreeMap<String, AgentState>,
}

impl<'g> StateTracker<'g> {
    /// One `Pending` entry per agent; agents without dependencies start `Ready`.
    pub fn new(graph: &'g DependencyGraph) -> Self {
        let order = graph.topological_order();
        let states = order
            .iter()
            .map(|id| {
                let mut state = AgentState::pending();
                if graph.dependencies(id).is_empty() {
                    state.status = AgentStatus::Ready;
                }
                (id.clone(), state)
            })
            .collect();

        Self {
            graph,
            order,
            states,
        }
    }

    pub fn status(&self, id: &str) -> Option<AgentStatus> {
        self.states.get(id).map(|s| s.status)
    }

    pub fn state(&self, id: &str) -> Option<&AgentState> {
        self.states.get(id)
    }

    /// Outputs of `id`, if it completed.
    pub fn output(&self, id: &str) -> Option<&ValueMap> {
        self.states
            .get(id)
            .filter(|s| s.status == AgentStatus::Completed)
            .map(|s| &s.output)
    }

    pub fn into_states(self) -> BTreeMap<String, AgentState> {
        self.states
    }

    pub fn count(&self, status: AgentStatus) -> usize {
        self.states.values().filter(|s| s.status == status).count()
    }

    /// Ready agents in declaration order.
    pub fn ready_ids(&self) -> Vec<String> {
        self.graph
            .ids()
            .iter()
            .filter(|id| self.status(id) == Some(AgentStatus::Ready))
            .cloned()
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.count(AgentStatus::Pending) > 0
    }

    /// True when every agent reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.states.values().all(|s| s.status.is_terminal())
    }

    /// `Ready -> Running`. Refuses unless every dependency is `Completed`.
    pub fn mark_running(&mut self, id: &str) -> Result<(), StackError> {
        for dep in self.graph.dependencies(id) {
            let status = self.status(dep).unwrap_or(AgentStatus::Pending);
            if status != AgentStatus::Completed {
                return Err(StackError::Transition {
                    agent_id: id.to_string(),
                    source: TransitionError::DependencyNotCompleted {
                        dependency: dep.clone(),
                        status,
                    },
                });
            }
        }

        let state = self.transition(id, AgentStatus::Running)?;
        state.started_at = Some(Utc::now());
        Ok(())
    }

    /// `Running -> Completed` with the runner's outputs.
    pub fn mark_completed(&mut self, id: &str, output: ValueMap) -> Result<(), StackError> {
        let state = self.transition(id, AgentStatus::Completed)?;
        state.output = output;
        state.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `Running -> Failed` with the runner's error text.
    pub fn mark_failed(&mut self, id: &str, message: impl Into<String>) -> Result<(), StackError> {
        let state = self.transition(id, AgentStatus::Failed)?;
        state.error_message = Some(message.into());
        state.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `Running -> Cancelled` for a runner that gave up on cancellation.
    pub fn mark_cancelled(&mut self, id: &str, message: Option<String>) -> Result<(), StackError> {
        let state = self.transition(id, AgentStatus::Cancelled)?;
        state.error_message = message;
        state.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Re-evaluate every `Pending`/`Ready` agent.
    ///
    /// An agent with a dependency in `Failed`, `Blocked` or `Cancelled` becomes `Blocked`;
    /// a `Pending` agent whose dependencies all completed becomes `Ready`. Walking in
    /// topological order makes blocking transitive in a single pass.
    ///
    /// Returns the agents that changed, with their new status, in walk order.
    pub fn propagate(&mut self) -> Result<Vec<(String, AgentStatus)>, StackError> {
        let mut changed = Vec::new();

        for index in 0..self.order.len() {
            let id = self.order[index].clone();
            let current = self.status(&id).unwrap_or(AgentStatus::Pending);
            if !matches!(current, AgentStatus::Pending | AgentStatus::Ready) {
                continue;
            }

            let mut all_completed = true;
            let mut blocked_by = None;
            for dep in self.graph.dependencies(&id) {
                match self.status(dep) {
                    Some(AgentStatus::Completed) => {}
                    Some(status) if status.blocks_dependents() => {
                        blocked_by = Some(dep.clone());
                        break;
                    }
                    _ => all_completed = false,
                }
            }

            if let Some(dep) = blocked_by {
                let state = self.transition(&id, AgentStatus::Blocked)?;
                state.error_message = Some(format!("dependency '{dep}' did not complete"));
                state.completed_at = Some(Utc::now());
                changed.push((id, AgentStatus::Blocked));
            } else if current == AgentStatus::Pending && all_completed {
                self.transition(&id, AgentStatus::Ready)?;
                changed.push((id, AgentStatus::Ready));
            }
        }

        Ok(changed)
    }

    /// `Pending`/`Ready -> Cancelled`. Returns the cancelled ids.
    pub fn cancel_pending(&mut self) -> Result<Vec<String>, StackError> {
        self.move_all(
            &[AgentStatus::Pending, AgentStatus::Ready],
            AgentStatus::Cancelled,
            "run cancelled before agent started",
        )
    }

    /// `Running -> Cancelled` for in-flight agents whose results were abandoned.
    pub fn cancel_running(&mut self) -> Result<Vec<String>, StackError> {
        self.move_all(
            &[AgentStatus::Running],
            AgentStatus::Cancelled,
            "run cancelled while agent was running",
        )
    }

    /// `Pending -> Blocked` for agents that can no longer become ready.
    pub fn block_stalled(&mut self) -> Result<Vec<String>, StackError> {
        self.move_all(
            &[AgentStatus::Pending],
            AgentStatus::Blocked,
            "no runnable path to agent",
        )
    }

    fn move_all(
        &mut self,
        from: &[AgentStatus],
        to: AgentStatus,
        reason: &str,
    ) -> Result<Vec<String>, StackError> {
        let ids: Vec<String> = self
            .order
            .iter()
            .filter(|id| self.status(id).is_some_and(|s| from.contains(&s)))
            .cloned()
            .collect();

        let now = Utc::now();
        for id in &ids {
            let state = self.transition(id, to)?;
            state.error_message.get_or_insert_with(|| reason.to_string());
            state.completed_at = Some(now);
        }

        Ok(ids)
    }

    fn transition(&mut self, id: &str, to: AgentStatus) -> Result<&mut AgentState, StackError> {
        let Some(state) = self.states.get_mut(id) else {
            return Err(StackError::Transition {
                agent_id: id.to_string(),
                source: TransitionError::UnknownAgent,
            });
        };

        StatusTransition::validate(state.status, to).map_err(|source| {
            StackError::Transition {
                agent_id: id.to_string(),
                source,
            }
        })?;

        tracing::debug!(agent_id = %id, from = %state.status, to = %to, "agent status change");
        state.status = to;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{AgentSpec, StackSpec};
    use serde_json::json;

    fn chain() -> DependencyGraph {
        // a -> b -> c, plus an independent d
        let spec = StackSpec::new("chain")
            .with_agent(AgentSpec::new("a", "t"))
            .with_agent(AgentSpec::new("b", "t").with_input_from(["a"]))
            .with_agent(AgentSpec::new("c", "t").with_depends(["b"]))
            .with_agent(AgentSpec::new("d", "t"));
        DependencyGraph::build(&spec).unwrap()
    }

    fn out(v: i64) -> ValueMap {
        let mut m = ValueMap::new();
        m.insert("v".into(), json!(v));
        m
    }

    #[test]
    fn test_initial_states() {
        let graph = chain();
        let tracker = StateTracker::new(&graph);
        assert_eq!(tracker.ready_ids(), vec!["a", "d"]);
        assert_eq!(tracker.status("b"), Some(AgentStatus::Pending));
        assert_eq!(tracker.count(AgentStatus::Pending), 2);
        assert!(!tracker.is_settled());
    }

    #[test]
    fn test_completion_promotes_dependents() {
        let graph = chain();
        let mut tracker = StateTracker::new(&graph);

        tracker.mark_running("a").unwrap();
        tracker.mark_completed("a", out(1)).unwrap();
        let changed = tracker.propagate().unwrap();

        assert_eq!(changed, vec![("b".to_string(), AgentStatus::Ready)]);
        assert_eq!(tracker.output("a"), Some(&out(1)));
        assert!(tracker.state("a").unwrap().started_at.is_some());
    }

    #[test]
    fn test_failure_blocks_transitively_in_one_pass() {
        let graph = chain();
        let mut tracker = StateTracker::new(&graph);

        tracker.mark_running("a").unwrap();
        tracker.mark_failed("a", "boom").unwrap();
        let changed = tracker.propagate().unwrap();

        assert_eq!(
            changed,
            vec![
                ("b".to_string(), AgentStatus::Blocked),
                ("c".to_string(), AgentStatus::Blocked),
            ]
        );
        assert_eq!(tracker.status("d"), Some(AgentStatus::Ready));
        assert_eq!(
            tracker.state("a").unwrap().error_message.as_deref(),
            Some("boom")
        );
        assert_eq!(tracker.output("a"), None);
    }

    #[test]
    fn test_running_requires_completed_dependencies() {
        let graph = chain();
        let mut tracker = StateTracker::new(&graph);

        let err = tracker.mark_running("b").unwrap_err();
        assert!(matches!(
            err,
            StackError::Transition {
                source: TransitionError::DependencyNotCompleted { .. },
                ..
            }
        ));
        assert_eq!(tracker.status("b"), Some(AgentStatus::Pending));
    }

    #[test]
    fn test_terminal_state_is_never_revisited() {
        let graph = chain();
        let mut tracker = StateTracker::new(&graph);
        tracker.mark_running("d").unwrap();
        tracker.mark_completed("d", ValueMap::new()).unwrap();

        assert!(tracker.mark_failed("d", "late").is_err());
        assert_eq!(tracker.status("d"), Some(AgentStatus::Completed));
    }

    #[test]
    fn test_cancel_pending_and_running() {
        let graph = chain();
        let mut tracker = StateTracker::new(&graph);
        tracker.mark_running("a").unwrap();

        let cancelled = tracker.cancel_pending().unwrap();
        assert_eq!(cancelled, vec!["b", "c", "d"]);
        assert_eq!(tracker.status("a"), Some(AgentStatus::Running));

        let abandoned = tracker.cancel_running().unwrap();
        assert_eq!(abandoned, vec!["a"]);
        assert!(tracker.is_settled());
        assert_eq!(tracker.count(AgentStatus::Cancelled), 4);
    }

    #[test]
    fn test_block_stalled() {
        let graph = chain();
        let mut tracker = StateTracker::new(&graph);
        let blocked = tracker.block_stalled().unwrap();
        assert_eq!(blocked, vec!["b", "c"]);
        assert_eq!(tracker.ready_ids(), vec!["a", "d"]);
    }

    #[test]
    fn test_unknown_agent() {
        let graph = chain();
        let mut tracker = StateTracker::new(&graph);
        assert!(matches!(
            tracker.mark_completed("zzz", ValueMap::new()),
            Err(StackError::Transition {
                source: TransitionError::UnknownAgent,
                ..
            })
        ));
    }
}
