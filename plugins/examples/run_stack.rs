//! Runs a stack end to end with the configured engine.
//!
//! ```text
//! cargo run -p agentstack-plugins --example run_stack [stack.toml] [key=value ...]
//! ```
//!
//! Without a stack file a small built-in pipeline is used. Agents with `uses = "echo"`
//! return their inputs merged with their params; `uses = "upper"` upper-cases every
//! string input. The summary is printed to stdout as JSON.

use std::sync::Arc;

use agentstack_core::api::{
    load_default, validate, CancelSignal, StackSpec, TaskError, TaskRunner, ValueMap,
};
use agentstack_plugins::factory::build_engine;
use agentstack_plugins::observability::init_tracing;
use agentstack_plugins::runner::{FnRunner, UsesRouter};
use anyhow::Context;
use serde_json::Value;

const BUILTIN_STACK: &str = r#"
name = "greeting"
description = "built-in demo stack"

[[agents]]
id = "fetch"
uses = "echo"
params = { text = "hello" }

[[agents]]
id = "shout"
uses = "upper"
inputFrom = ["fetch"]

[[agents]]
id = "report"
uses = "echo"
inputFrom = ["shout"]
depends = ["fetch"]
params = { channel = "stdout" }
"#;

fn load_stack(path: Option<&str>) -> anyhow::Result<StackSpec> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read stack file {path}"))?,
        None => BUILTIN_STACK.to_string(),
    };
    let spec: StackSpec = toml::from_str(&raw).context("invalid stack definition")?;
    validate(&spec)?;
    Ok(spec)
}

fn parse_inputs<'a>(args: impl Iterator<Item = &'a str>) -> anyhow::Result<ValueMap> {
    args.map(|arg| {
        let (key, value) = arg
            .split_once('=')
            .with_context(|| format!("expected key=value, got '{arg}'"))?;
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
        Ok((key.trim().to_string(), value))
    })
    .collect()
}

fn demo_runner() -> Arc<dyn TaskRunner> {
    let echo = FnRunner::new("echo", |_, agent, mut inputs| async move {
        inputs.extend(agent.params);
        Ok::<_, TaskError>(inputs)
    });
    let upper = FnRunner::new("upper", |_, _, inputs| async move {
        Ok::<_, TaskError>(
            inputs
                .into_iter()
                .map(|(key, value)| match value {
                    Value::String(s) => (key, Value::String(s.to_uppercase())),
                    other => (key, other),
                })
                .collect(),
        )
    });

    Arc::new(
        UsesRouter::new()
            .route("echo", Arc::new(echo))
            .route("upper", Arc::new(upper)),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_default()?;
    init_tracing(&cfg.logging)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (stack_path, rest) = match args.split_first() {
        Some((first, rest)) if !first.contains('=') => (Some(first.as_str()), rest),
        _ => (None, args.as_slice()),
    };
    let spec = load_stack(stack_path)?;
    let global = parse_inputs(rest.iter().map(String::as_str))?;

    let engine = build_engine(&cfg, demo_runner())?;
    let summary = engine.run(&spec, &global, &CancelSignal::new()).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !summary.is_success() {
        std::process::exit(i32::from(summary.error_code().as_u16()));
    }
    Ok(())
}
