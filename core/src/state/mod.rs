//! Per-agent run state.
//!
//! The [`StateTracker`] owns the status map for one execution and is only ever
//! mutated by the coordinating scheduler loop. [`StatusTransition`] holds the legal
//! edges of the agent state machine and [`SummaryReporter`] reduces the final map
//! into an immutable [`ExecutionSummary`].

pub mod summary;
pub mod tracker;
pub mod transitions;
pub mod types;

pub use summary::{ExecutionSummary, RunOutcome, SummaryReporter};
pub use tracker::StateTracker;
pub use transitions::{StatusTransition, TransitionError};
pub use types::{AgentState, AgentStatus};
