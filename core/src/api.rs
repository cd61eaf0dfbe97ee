//! Stable re-exports for consumers (`plugins` and external crates).
//!
//! Prefer importing from `agentstack_core::api` instead of reaching into internal modules.

pub use crate::config::{
    load_default, load_from_path, AppConfig, ExecutorConfig, HistoryConfig, LoggingConfig,
    RetryConfig,
};
pub use crate::error::{ErrorCode, StackError, TaskError, ValidationError};
pub use crate::executor::{
    execute_stack, merge_inputs, value_map, CancelSignal, DependencyGraph, ExecutionEvent,
    ExecutionObserver, ExecutionOpts, StackEngine, StackEngineBuilder, SummarySink, TaskContext,
    TaskRunner, TracingObserver,
};
pub use crate::spec::{validate, AgentSpec, StackSpec, ValueMap};
pub use crate::state::{
    AgentState, AgentStatus, ExecutionSummary, RunOutcome, StateTracker, StatusTransition,
    SummaryReporter, TransitionError,
};
