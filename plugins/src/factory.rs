use std::sync::Arc;

use agentstack_core::api::{
    AppConfig, ExecutionOpts, HistoryConfig, RetryConfig, StackEngine, StackError, SummarySink,
    TaskRunner,
};

use crate::runner::{ExponentialBackoff, LinearRetry, RetryStrategy, RetryingRunner};
use crate::sink::JsonlSummarySink;

pub fn build_retry_strategy(
    cfg: &RetryConfig,
) -> Result<Option<Arc<dyn RetryStrategy>>, StackError> {
    if cfg.max_attempts <= 1 {
        return Ok(None);
    }

    match cfg.strategy.trim() {
        "none" | "" => Ok(None),
        "exponential-backoff" => Ok(Some(Arc::new(ExponentialBackoff::new(cfg.clone())))),
        "linear" => Ok(Some(Arc::new(LinearRetry::new(cfg.clone())))),
        other => Err(StackError::Config(format!(
            "unknown retry strategy '{other}' (expected exponential-backoff, linear or none)"
        ))),
    }
}

/// Wrap `base` with the configured retry policy, if any.
pub fn build_runner(
    cfg: &AppConfig,
    base: Arc<dyn TaskRunner>,
) -> Result<Arc<dyn TaskRunner>, StackError> {
    match build_retry_strategy(&cfg.retry)? {
        Some(strategy) => Ok(Arc::new(RetryingRunner::new(base, strategy))),
        None => Ok(base),
    }
}

pub fn build_sink(cfg: &HistoryConfig) -> Option<Arc<dyn SummarySink>> {
    if !cfg.enabled || cfg.path.trim().is_empty() {
        return None;
    }
    Some(Arc::new(JsonlSummarySink::new(cfg.path.clone())))
}

pub fn build_engine(
    cfg: &AppConfig,
    base: Arc<dyn TaskRunner>,
) -> Result<StackEngine, StackError> {
    let runner = build_runner(cfg, base)?;
    let mut builder =
        StackEngine::builder(runner).opts(ExecutionOpts::from_config(&cfg.executor));
    if let Some(sink) = build_sink(&cfg.history) {
        builder = builder.sink(sink);
    }
    Ok(builder.build())
}
