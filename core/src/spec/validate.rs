use std::collections::HashSet;

use crate::error::ValidationError;

use super::types::StackSpec;

/// Check the structural rules of a stack spec.
///
/// Reports the first violation found, in this order: empty name, empty agent list,
/// empty or duplicate ids (declaration order), then unknown dependency references.
/// Cycles are detected later by [`DependencyGraph::build`](crate::executor::DependencyGraph::build).
pub fn validate(spec: &StackSpec) -> Result<(), ValidationError> {
    if spec.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if spec.agents.is_empty() {
        return Err(ValidationError::EmptyAgents);
    }

    let mut ids: HashSet<&str> = HashSet::with_capacity(spec.agents.len());
    for (index, agent) in spec.agents.iter().enumerate() {
        if agent.id.trim().is_empty() {
            return Err(ValidationError::EmptyAgentId { index });
        }
        if !ids.insert(agent.id.as_str()) {
            return Err(ValidationError::DuplicateAgentId(agent.id.clone()));
        }
    }

    for agent in &spec.agents {
        for dep in agent.dependencies() {
            if !ids.contains(dep) {
                return Err(ValidationError::UnknownDependency {
                    agent: agent.id.clone(),
                    dependency: dep.to_string(),
                });
            }
        }
    }

    Ok(())
}
