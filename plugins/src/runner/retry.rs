use std::sync::Arc;
use std::time::Duration;

use agentstack_core::api::{AgentSpec, RetryConfig, TaskContext, TaskError, TaskRunner, ValueMap};
use async_trait::async_trait;

/// Decides whether and when a failed attempt is retried.
pub trait RetryStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `attempt` is the zero-based index of the attempt that just failed.
    fn next_delay(&self, attempt: u32, error: &str) -> Option<Duration>;

    /// Total attempts, the first one included.
    fn max_attempts(&self) -> u32;
}

pub struct ExponentialBackoff {
    config: RetryConfig,
}

pub struct LinearRetry {
    config: RetryConfig,
}

impl ExponentialBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl LinearRetry {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        if attempt.saturating_add(1) >= self.config.max_attempts {
            return None;
        }
        let exp = 1u64 << attempt.min(30);
        let delay = self.config.base_delay_ms.saturating_mul(exp);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

impl RetryStrategy for LinearRetry {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        if attempt.saturating_add(1) >= self.config.max_attempts {
            return None;
        }
        let multiplier = attempt.saturating_add(1) as u64;
        let delay = self.config.base_delay_ms.saturating_mul(multiplier);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

/// Wraps a runner and retries failed attempts according to a [`RetryStrategy`].
///
/// Cancellation is never retried, and a cancel signal that fires while waiting out a
/// delay ends the agent with [`TaskError::Cancelled`].
pub struct RetryingRunner {
    inner: Arc<dyn TaskRunner>,
    strategy: Arc<dyn RetryStrategy>,
}

impl RetryingRunner {
    pub fn new(inner: Arc<dyn TaskRunner>, strategy: Arc<dyn RetryStrategy>) -> Self {
        Self { inner, strategy }
    }
}

#[async_trait]
impl TaskRunner for RetryingRunner {
    async fn run(
        &self,
        ctx: &TaskContext,
        agent: &AgentSpec,
        inputs: ValueMap,
    ) -> Result<ValueMap, TaskError> {
        let mut attempt: u32 = 0;

        loop {
            let err = match self.inner.run(ctx, agent, inputs.clone()).await {
                Ok(output) => return Ok(output),
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => err,
            };

            let message = err.to_string();
            let Some(delay) = self.strategy.next_delay(attempt, &message) else {
                if attempt > 0 {
                    tracing::warn!(
                        execution_id = %ctx.execution_id,
                        agent_id = %ctx.agent_id,
                        attempts = attempt + 1,
                        strategy = self.strategy.name(),
                        "retries exhausted"
                    );
                }
                return Err(err);
            };

            tracing::info!(
                execution_id = %ctx.execution_id,
                agent_id = %ctx.agent_id,
                attempt = attempt + 1,
                max_attempts = self.strategy.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                error = %message,
                "agent attempt failed; retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancel.cancelled() => return Err(TaskError::Cancelled),
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::FnRunner;
    use agentstack_core::api::{value_map, CancelSignal};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cfg(strategy: &str, max_attempts: u32) -> RetryConfig {
        RetryConfig {
            strategy: strategy.to_string(),
            base_delay_ms: 1,
            max_delay_ms: 5,
            max_attempts,
        }
    }

    fn ctx(cancel: CancelSignal) -> TaskContext {
        TaskContext {
            execution_id: "exec".into(),
            agent_id: "flaky".into(),
            cancel,
        }
    }

    /// Fails the first `failures` calls, then succeeds.
    fn flaky(failures: u32, calls: Arc<AtomicU32>) -> Arc<dyn TaskRunner> {
        Arc::new(FnRunner::new("flaky", move |_, _, _| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    Err(TaskError::failed(format!("attempt {n} failed")))
                } else {
                    Ok(value_map([("attempts", n + 1)]))
                }
            }
        }))
    }

    #[test]
    fn test_exponential_backoff() {
        let cfg = RetryConfig {
            base_delay_ms: 100,
            max_delay_ms: 1000,
            max_attempts: 4,
            strategy: "exponential-backoff".to_string(),
        };
        let strategy = ExponentialBackoff::new(cfg);
        assert_eq!(strategy.next_delay(0, "err").unwrap().as_millis(), 100);
        assert_eq!(strategy.next_delay(1, "err").unwrap().as_millis(), 200);
        assert_eq!(strategy.next_delay(2, "err").unwrap().as_millis(), 400);
        assert_eq!(strategy.next_delay(3, "err"), None);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let cfg = RetryConfig {
            base_delay_ms: 400,
            max_delay_ms: 1000,
            max_attempts: 10,
            strategy: "exponential-backoff".to_string(),
        };
        let strategy = ExponentialBackoff::new(cfg);
        assert_eq!(strategy.next_delay(5, "err").unwrap().as_millis(), 1000);
    }

    #[test]
    fn test_linear_backoff() {
        let cfg = RetryConfig {
            base_delay_ms: 50,
            max_delay_ms: 200,
            max_attempts: 5,
            strategy: "linear".to_string(),
        };
        let strategy = LinearRetry::new(cfg);
        assert_eq!(strategy.next_delay(0, "err").unwrap().as_millis(), 50);
        assert_eq!(strategy.next_delay(2, "err").unwrap().as_millis(), 150);
        assert_eq!(strategy.next_delay(3, "err").unwrap().as_millis(), 200);
        assert_eq!(strategy.next_delay(4, "err"), None);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let runner = RetryingRunner::new(
            flaky(2, calls.clone()),
            Arc::new(ExponentialBackoff::new(cfg("exponential-backoff", 3))),
        );

        let out = runner
            .run(&ctx(CancelSignal::new()), &AgentSpec::new("flaky", "x"), ValueMap::new())
            .await
            .unwrap();
        assert_eq!(out["attempts"], 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let runner = RetryingRunner::new(
            flaky(10, calls.clone()),
            Arc::new(LinearRetry::new(cfg("linear", 2))),
        );

        let err = runner
            .run(&ctx(CancelSignal::new()), &AgentSpec::new("flaky", "x"), ValueMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "attempt 1 failed");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_stops_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let runner = RetryingRunner::new(
            flaky(10, calls.clone()),
            Arc::new(LinearRetry::new(RetryConfig {
                strategy: "linear".into(),
                base_delay_ms: 60_000,
                max_delay_ms: 60_000,
                max_attempts: 5,
            })),
        );
        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = runner
            .run(&ctx(cancel), &AgentSpec::new("flaky", "x"), ValueMap::new())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
