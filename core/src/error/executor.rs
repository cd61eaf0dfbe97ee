use thiserror::Error;

use super::code::ErrorCode;
use super::validation::ValidationError;
use crate::state::TransitionError;

/// Run-level errors: the stack could not be executed at all.
///
/// Per-agent failures never show up here; they are recorded in the
/// [`ExecutionSummary`](crate::state::ExecutionSummary).
#[derive(Error, Debug)]
pub enum StackError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("cyclic dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("dependency graph does not match stack '{0}'")]
    GraphMismatch(String),

    #[error("invalid state transition for agent '{agent_id}': {source}")]
    Transition {
        agent_id: String,
        #[source]
        source: TransitionError,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl StackError {
    /// Map the error to its protocol error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation(ValidationError::UnknownDependency { .. }) => {
                ErrorCode::DependencyError
            }
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::CircularDependency { .. } => ErrorCode::CircularDependency,
            Self::GraphMismatch(_) | Self::Transition { .. } => ErrorCode::InternalError,
            Self::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// True for errors detected before any agent was dispatched.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::CircularDependency { .. } | Self::GraphMismatch(_)
        )
    }
}
