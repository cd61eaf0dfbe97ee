use serde_json::Value;

use crate::spec::{AgentSpec, ValueMap};

/// Build the input map handed to the task runner for `agent`.
///
/// Precedence is params > upstream outputs > global inputs, first writer wins:
/// start from the agent's own `params`, add keys from each `input_from` agent's
/// output in declared order, then fill remaining gaps from `global`. `depends`
/// edges carry no data. A missing upstream output contributes nothing.
pub fn merge_inputs<'a, F>(agent: &AgentSpec, upstream_output: F, global: &ValueMap) -> ValueMap
where
    F: Fn(&str) -> Option<&'a ValueMap>,
{
    let mut merged = agent.params.clone();

    for source in &agent.input_from {
        if let Some(output) = upstream_output(source) {
            fill_missing(&mut merged, output);
        }
    }

    fill_missing(&mut merged, global);
    merged
}

fn fill_missing(target: &mut ValueMap, source: &ValueMap) {
    for (key, value) in source {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Convenience for building a [`ValueMap`] from pairs.
pub fn value_map<I, K, V>(pairs: I) -> ValueMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_precedence_params_upstream_global() {
        let agent = AgentSpec::new("b", "tool")
            .with_input_from(["a"])
            .with_param("x", 1);
        let outputs: HashMap<String, ValueMap> =
            HashMap::from([("a".to_string(), value_map([("x", 2), ("y", 3)]))]);
        let global = value_map([("x", 4), ("y", 5), ("z", 6)]);

        let merged = merge_inputs(&agent, |id| outputs.get(id), &global);

        assert_eq!(merged, value_map([("x", 1), ("y", 3), ("z", 6)]));
    }

    #[test]
    fn test_earlier_input_from_wins() {
        let agent = AgentSpec::new("c", "tool").with_input_from(["second", "first"]);
        let outputs: HashMap<String, ValueMap> = HashMap::from([
            ("first".to_string(), value_map([("k", json!("first")), ("only_first", json!(true))])),
            ("second".to_string(), value_map([("k", json!("second"))])),
        ]);

        let merged = merge_inputs(&agent, |id| outputs.get(id), &ValueMap::new());

        assert_eq!(merged.get("k"), Some(&json!("second")));
        assert_eq!(merged.get("only_first"), Some(&json!(true)));
    }

    #[test]
    fn test_depends_carries_no_data() {
        let agent = AgentSpec::new("c", "tool").with_depends(["a"]);
        let outputs: HashMap<String, ValueMap> =
            HashMap::from([("a".to_string(), value_map([("leak", 1)]))]);

        let merged = merge_inputs(&agent, |id| outputs.get(id), &ValueMap::new());

        assert!(merged.is_empty());
    }

    #[test]
    fn test_missing_upstream_output_is_skipped() {
        let agent = AgentSpec::new("c", "tool").with_input_from(["gone"]);
        let global = value_map([("g", 1)]);
        let merged = merge_inputs(&agent, |_| None, &global);
        assert_eq!(merged, global);
    }
}
