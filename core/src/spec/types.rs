use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value map used for params, inputs and outputs.
pub type ValueMap = BTreeMap<String, Value>;

/// A named collection of agents to be executed together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub version: String,

    /// Agents in declaration order. The order is the tie-break for topological ordering.
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

impl StackSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_agent(mut self, agent: AgentSpec) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn agent(&self, id: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|a| a.id.as_str())
    }
}

/// One unit of work within a stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    pub id: String,

    /// Reference to the runnable unit. Opaque to the engine.
    #[serde(default)]
    pub uses: String,

    /// Upstream agents whose outputs are merged into this agent's inputs.
    #[serde(default)]
    pub input_from: Vec<String>,

    /// Upstream agents that must complete first. No data flows along these edges.
    #[serde(default)]
    pub depends: Vec<String>,

    #[serde(default)]
    pub params: ValueMap,
}

impl AgentSpec {
    pub fn new(id: impl Into<String>, uses: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uses: uses.into(),
            ..Self::default()
        }
    }

    pub fn with_input_from<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_from.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_depends<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Union of `input_from` and `depends`, de-duplicated, `input_from` first.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::with_capacity(self.input_from.len() + self.depends.len());
        for dep in self.input_from.iter().chain(self.depends.iter()) {
            if !deps.contains(&dep.as_str()) {
                deps.push(dep);
            }
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dependencies_union_is_ordered_and_unique() {
        let agent = AgentSpec::new("c", "tool")
            .with_input_from(["a", "b"])
            .with_depends(["b", "x"]);
        assert_eq!(agent.dependencies(), vec!["a", "b", "x"]);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let raw = json!({
            "name": "research",
            "agents": [
                { "id": "fetch", "uses": "http" },
                { "id": "summarize", "uses": "llm", "inputFrom": ["fetch"], "params": { "tone": "dry" } }
            ]
        });
        let spec: StackSpec = serde_json::from_value(raw).unwrap();
        assert_eq!(spec.agents.len(), 2);
        assert_eq!(spec.agents[1].input_from, vec!["fetch".to_string()]);
        assert!(spec.agents[1].depends.is_empty());
        assert_eq!(spec.agents[1].params.get("tone"), Some(&json!("dry")));
        assert_eq!(spec.agent("fetch").map(|a| a.uses.as_str()), Some("http"));
    }

    #[test]
    fn test_toml_round_trip_shape() {
        let raw = r#"
            name = "nightly"
            version = "1"

            [[agents]]
            id = "build"
            uses = "shell"

            [[agents]]
            id = "test"
            uses = "shell"
            depends = ["build"]
        "#;
        let spec: StackSpec = toml::from_str(raw).unwrap();
        assert_eq!(spec.ids().collect::<Vec<_>>(), vec!["build", "test"]);
        assert_eq!(spec.agents[1].dependencies(), vec!["build"]);
    }
}
