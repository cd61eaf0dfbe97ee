//! Static description of a stack: agents and the edges between them.

pub mod types;
pub mod validate;

pub use types::{AgentSpec, StackSpec, ValueMap};
pub use validate::validate;
