use std::time::Duration;

use crate::config::ExecutorConfig;

const DEFAULT_CANCEL_GRACE_MS: u64 = 5_000;

/// Execution options for one run.
#[derive(Debug, Clone)]
pub struct ExecutionOpts {
    /// Upper bound on concurrently running agents; `None` means unbounded.
    pub max_parallel: Option<usize>,

    /// Run-level timeout. Fires the same path as caller cancellation.
    pub timeout: Option<Duration>,

    /// How long in-flight agents may keep running after cancellation
    /// before their results are abandoned.
    pub cancel_grace: Duration,

    /// Use this execution id instead of a generated UUID.
    pub execution_id: Option<String>,
}

impl Default for ExecutionOpts {
    fn default() -> Self {
        Self {
            max_parallel: None,
            timeout: None,
            cancel_grace: Duration::from_millis(DEFAULT_CANCEL_GRACE_MS),
            execution_id: None,
        }
    }
}

impl ExecutionOpts {
    pub fn from_config(cfg: &ExecutorConfig) -> Self {
        Self {
            max_parallel: cfg.max_parallel.filter(|n| *n > 0),
            timeout: cfg.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs),
            cancel_grace: Duration::from_millis(cfg.cancel_grace_ms),
            execution_id: None,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel.max(1));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    pub fn with_execution_id(mut self, id: impl Into<String>) -> Self {
        self.execution_id = Some(id.into());
        self
    }
}
