use thiserror::Error;

/// Structural problems in a stack definition.
///
/// Raised before any graph is built; a spec with any of these is rejected whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("stack name is empty")]
    EmptyName,

    #[error("stack declares no agents")]
    EmptyAgents,

    #[error("agent at index {index} has an empty id")]
    EmptyAgentId { index: usize },

    #[error("duplicate agent id: {0}")]
    DuplicateAgentId(String),

    #[error("agent '{agent}' depends on unknown agent '{dependency}'")]
    UnknownDependency { agent: String, dependency: String },
}
