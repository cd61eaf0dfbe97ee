use async_trait::async_trait;

use crate::state::ExecutionSummary;

/// Receives finished execution summaries, e.g. to persist run history.
#[async_trait]
pub trait SummarySink: Send + Sync {
    fn name(&self) -> &str;

    async fn record(&self, stack_id: &str, summary: &ExecutionSummary) -> anyhow::Result<()>;
}
