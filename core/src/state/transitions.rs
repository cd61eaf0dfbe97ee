//! Agent state machine rules

use super::types::AgentStatus;
use thiserror::Error;

/// State transition error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: AgentStatus, to: AgentStatus },

    #[error("cannot transition from terminal state {state}")]
    FromTerminalState { state: AgentStatus },

    #[error("dependency '{dependency}' is {status}, not completed")]
    DependencyNotCompleted {
        dependency: String,
        status: AgentStatus,
    },

    #[error("unknown agent")]
    UnknownAgent,
}

/// Agent status transitions
pub struct StatusTransition;

impl StatusTransition {
    /// Check that `from -> to` is an edge of the state machine.
    pub fn validate(from: AgentStatus, to: AgentStatus) -> Result<(), TransitionError> {
        // Terminal states are never revisited
        if from.is_terminal() {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let is_valid = match (from, to) {
            (AgentStatus::Pending, AgentStatus::Ready) => true,

            // Failure upstream, or the run was cancelled before dispatch
            (AgentStatus::Pending | AgentStatus::Ready, AgentStatus::Blocked) => true,
            (AgentStatus::Pending | AgentStatus::Ready, AgentStatus::Cancelled) => true,

            // Only the scheduler dispatches
            (AgentStatus::Ready, AgentStatus::Running) => true,

            (AgentStatus::Running, AgentStatus::Completed)
            | (AgentStatus::Running, AgentStatus::Failed)
            | (AgentStatus::Running, AgentStatus::Cancelled) => true,

            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    /// Statuses reachable from `from` in one step.
    pub fn successors(from: AgentStatus) -> Vec<AgentStatus> {
        AgentStatus::ALL
            .into_iter()
            .filter(|to| Self::validate(from, *to).is_ok())
            .collect()
    }
}
