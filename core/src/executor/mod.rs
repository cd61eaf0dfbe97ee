//! Stack execution engine.
//!
//! Builds the dependency graph of a stack, validates it, and drives every agent through
//! its state machine with a readiness loop:
//! - Dependency graph construction and cycle detection
//! - Deterministic topological order and level view for plan logging
//! - Concurrent dispatch of ready agents with an optional worker-pool limit
//! - Input propagation from upstream outputs
//! - Cancellation, run timeout and grace period for in-flight agents
//!
//! # Architecture
//!
//! ```text
//! StackSpec
//!   ↓
//! validate() → DependencyGraph::build() → detect_cycle()
//!   ↓
//! StackEngine::execute()
//!   ↓
//! Scheduler loop ──dispatch──▶ TaskRunner (FuturesUnordered)
//!   ↑          ◀──result────┘
//!   ↓
//! StateTracker → SummaryReporter → ExecutionSummary → SummarySink
//! ```

mod cancel;
mod engine;
mod graph;
mod input;
mod output;
mod scheduler;
pub mod traits;
pub mod types;

pub use cancel::CancelSignal;
pub use engine::{execute_stack, StackEngine, StackEngineBuilder};
pub use graph::DependencyGraph;
pub use input::{merge_inputs, value_map};
pub use output::TracingObserver;
pub use traits::{
    ExecutionEvent, ExecutionObserver, SummarySink, TaskContext, TaskRunner,
};
pub use types::ExecutionOpts;
