use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{StackError, ValidationError};
use crate::spec::StackSpec;

/// Agent dependency graph (DAG)
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Dependency edges: agent_id -> agents it depends on (declared order, de-duplicated)
    edges: HashMap<String, Vec<String>>,

    /// Reverse edges: agent_id -> agents that depend on it
    reverse_edges: HashMap<String, Vec<String>>,

    /// Original declaration order (for stable sorting)
    insertion_order: Vec<String>,

    /// agent_id -> position in `insertion_order`
    positions: HashMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

impl DependencyGraph {
    /// Construct the dependency graph of a stack.
    ///
    /// Edges are the union of `input_from` and `depends`. Duplicate ids and dangling
    /// references are rejected here as well, so the builder is safe to call on a spec
    /// that skipped [`validate`](crate::spec::validate). Any cycle is fatal.
    pub fn build(spec: &StackSpec) -> Result<Self, StackError> {
        let mut edges = HashMap::with_capacity(spec.agents.len());
        let mut reverse_edges: HashMap<String, Vec<String>> = HashMap::new();
        let mut insertion_order = Vec::with_capacity(spec.agents.len());
        let mut positions = HashMap::with_capacity(spec.agents.len());

        for (index, agent) in spec.agents.iter().enumerate() {
            if positions.insert(agent.id.clone(), index).is_some() {
                return Err(ValidationError::DuplicateAgentId(agent.id.clone()).into());
            }
            insertion_order.push(agent.id.clone());
            reverse_edges.entry(agent.id.clone()).or_default();
        }

        for agent in &spec.agents {
            let dependencies: Vec<String> =
                agent.dependencies().into_iter().map(str::to_string).collect();

            for dep in &dependencies {
                let Some(dependents) = reverse_edges.get_mut(dep) else {
                    return Err(ValidationError::UnknownDependency {
                        agent: agent.id.clone(),
                        dependency: dep.clone(),
                    }
                    .into());
                };
                dependents.push(agent.id.clone());
            }

            edges.insert(agent.id.clone(), dependencies);
        }

        // Dependents listed in declaration order regardless of how edges were declared.
        for dependents in reverse_edges.values_mut() {
            dependents.sort_by_key(|id| positions.get(id).copied().unwrap_or(usize::MAX));
        }

        let graph = Self {
            edges,
            reverse_edges,
            insertion_order,
            positions,
        };

        if let Some(cycle) = graph.detect_cycle() {
            return Err(StackError::CircularDependency { cycle });
        }

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.insertion_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion_order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Agent ids in declaration order.
    pub fn ids(&self) -> &[String] {
        &self.insertion_order
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Direct dependencies of `id` (`input_from` then `depends`).
    pub fn dependencies(&self, id: &str) -> &[String] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Agents that directly depend on `id`, in declaration order.
    pub fn dependents(&self, id: &str) -> &[String] {
        self.reverse_edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when this graph was built from exactly the agents and edges of `spec`.
    pub fn matches(&self, spec: &StackSpec) -> bool {
        self.insertion_order.len() == spec.agents.len()
            && spec
                .agents
                .iter()
                .zip(&self.insertion_order)
                .all(|(agent, id)| {
                    &agent.id == id
                        && self
                            .dependencies(id)
                            .iter()
                            .map(String::as_str)
                            .eq(agent.dependencies())
                })
    }

    /// Deterministic topological order (Kahn's algorithm).
    ///
    /// Among agents whose dependencies have all been emitted, the one declared
    /// earliest in the stack goes next. Advisory only: dispatch is readiness-driven.
    pub fn topological_order(&self) -> Vec<String> {
        let mut in_degree: Vec<usize> = self
            .insertion_order
            .iter()
            .map(|id| self.dependencies(id).len())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(index, _)| Reverse(index))
            .collect();

        let mut order = Vec::with_capacity(self.insertion_order.len());

        while let Some(Reverse(index)) = ready.pop() {
            let id = &self.insertion_order[index];
            order.push(id.clone());

            for dependent in self.dependents(id) {
                let Some(pos) = self.position(dependent) else {
                    continue;
                };
                in_degree[pos] -= 1;
                if in_degree[pos] == 0 {
                    ready.push(Reverse(pos));
                }
            }
        }

        order
    }

    /// Group agents into levels by longest dependency path.
    ///
    /// Level 0 holds agents without dependencies; every agent sits one level below its
    /// deepest dependency. Within a level agents keep declaration order.
    pub fn levels(&self) -> Vec<Vec<String>> {
        let mut depth: Vec<usize> = vec![0; self.len()];
        let mut levels: Vec<Vec<String>> = Vec::new();

        for id in self.topological_order() {
            let level = self
                .dependencies(&id)
                .iter()
                .filter_map(|dep| self.position(dep))
                .map(|pos| depth[pos] + 1)
                .max()
                .unwrap_or(0);

            if let Some(pos) = self.position(&id) {
                depth[pos] = level;
            }
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(id);
        }

        for level in &mut levels {
            level.sort_by_key(|id| self.position(id).unwrap_or(usize::MAX));
        }

        levels
    }

    /// Depth-first search with white/gray/black marking.
    ///
    /// Roots are visited in declaration order and dependencies in declared order, so the
    /// reported cycle is stable. The path starts and ends on the same agent.
    fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut marks: HashMap<&str, Mark> = self
            .insertion_order
            .iter()
            .map(|id| (id.as_str(), Mark::White))
            .collect();
        let mut path: Vec<&str> = Vec::new();

        for id in &self.insertion_order {
            if marks.get(id.as_str()) == Some(&Mark::White) {
                if let Some(cycle) = self.visit(id, &mut marks, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::Gray);
        path.push(node);

        for dep in self.dependencies(node) {
            match marks.get(dep.as_str()).copied().unwrap_or(Mark::White) {
                Mark::Gray => {
                    let start = path.iter().position(|n| *n == dep.as_str()).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                Mark::White => {
                    if let Some(cycle) = self.visit(dep, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Black => {}
            }
        }

        path.pop();
        marks.insert(node, Mark::Black);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::AgentSpec;

    fn agent(id: &str) -> AgentSpec {
        AgentSpec::new(id, "tool")
    }

    fn diamond() -> StackSpec {
        StackSpec::new("diamond")
            .with_agent(agent("d").with_input_from(["b", "c"]))
            .with_agent(agent("c").with_depends(["a"]))
            .with_agent(agent("b").with_input_from(["a"]))
            .with_agent(agent("a"))
    }

    #[test]
    fn test_build_edges_and_reverse_edges() {
        let graph = DependencyGraph::build(&diamond()).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.dependencies("d"), ["b".to_string(), "c".to_string()]);
        assert_eq!(graph.dependents("a"), ["c".to_string(), "b".to_string()]);
        assert!(graph.dependencies("a").is_empty());
        assert!(graph.matches(&diamond()));
    }

    #[test]
    fn test_matches_compares_edges() {
        let graph = DependencyGraph::build(&diamond()).unwrap();
        let rewired = StackSpec::new("diamond")
            .with_agent(agent("d").with_input_from(["b"]))
            .with_agent(agent("c").with_depends(["a"]))
            .with_agent(agent("b").with_input_from(["a"]))
            .with_agent(agent("a"));
        assert!(!graph.matches(&rewired));

        // Same edge set, moved from `input_from` to `depends`: still the same graph.
        let moved = StackSpec::new("diamond")
            .with_agent(agent("d").with_input_from(["b"]).with_depends(["c"]))
            .with_agent(agent("c").with_depends(["a"]))
            .with_agent(agent("b").with_input_from(["a"]))
            .with_agent(agent("a"));
        assert!(graph.matches(&moved));
    }

    #[test]
    fn test_topological_order_respects_edges_and_declaration() {
        let graph = DependencyGraph::build(&diamond()).unwrap();
        assert_eq!(graph.topological_order(), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_topological_order_is_stable() {
        let spec = StackSpec::new("wide")
            .with_agent(agent("x"))
            .with_agent(agent("y"))
            .with_agent(agent("z").with_depends(["y"]))
            .with_agent(agent("w"));
        let graph = DependencyGraph::build(&spec).unwrap();
        let first = graph.topological_order();
        assert_eq!(first, vec!["x", "y", "z", "w"]);
        assert_eq!(first, graph.topological_order());
        assert_eq!(first, DependencyGraph::build(&spec).unwrap().topological_order());
    }

    #[test]
    fn test_levels() {
        let graph = DependencyGraph::build(&diamond()).unwrap();
        assert_eq!(
            graph.levels(),
            vec![
                vec!["a".to_string()],
                vec!["c".to_string(), "b".to_string()],
                vec!["d".to_string()],
            ]
        );
    }

    #[test]
    fn test_two_node_cycle() {
        let spec = StackSpec::new("loop")
            .with_agent(agent("a").with_input_from(["b"]))
            .with_agent(agent("b").with_depends(["a"]));
        match DependencyGraph::build(&spec) {
            Err(StackError::CircularDependency { cycle }) => {
                assert_eq!(cycle, vec!["a", "b", "a"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_reports_only_participants() {
        let spec = StackSpec::new("tail")
            .with_agent(agent("entry").with_depends(["x"]))
            .with_agent(agent("x").with_depends(["y"]))
            .with_agent(agent("y").with_depends(["z"]))
            .with_agent(agent("z").with_depends(["x"]));
        match DependencyGraph::build(&spec) {
            Err(StackError::CircularDependency { cycle }) => {
                assert_eq!(cycle, vec!["x", "y", "z", "x"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let spec = StackSpec::new("self").with_agent(agent("a").with_depends(["a"]));
        assert!(matches!(
            DependencyGraph::build(&spec),
            Err(StackError::CircularDependency { cycle }) if cycle == vec!["a", "a"]
        ));
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let spec = StackSpec::new("dangling").with_agent(agent("a").with_input_from(["nope"]));
        assert!(matches!(
            DependencyGraph::build(&spec),
            Err(StackError::Validation(ValidationError::UnknownDependency { .. }))
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let spec = StackSpec::new("dup").with_agent(agent("a")).with_agent(agent("a"));
        assert!(matches!(
            DependencyGraph::build(&spec),
            Err(StackError::Validation(ValidationError::DuplicateAgentId(id))) if id == "a"
        ));
    }
}
