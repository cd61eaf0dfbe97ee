use std::path::Path;

use agentstack_core::api::{ExecutionSummary, SummarySink};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Local;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const STDOUT_TARGET: &str = "stdout:";

/// Appends one JSON line per finished execution.
///
/// `path` may be `stdout:` to write to standard output instead of a file.
pub struct JsonlSummarySink {
    path: String,
    // Serializes appends so concurrent runs never interleave lines.
    write_lock: Mutex<()>,
}

impl JsonlSummarySink {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn to_line(stack_id: &str, summary: &ExecutionSummary) -> anyhow::Result<String> {
        let record: Value = json!({
            "v": 1,
            "event_type": "stack.summary",
            "ts": Local::now().to_rfc3339(),
            "stack_id": stack_id,
            "summary": serde_json::to_value(summary)?,
        });
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        Ok(line)
    }

    async fn append(&self, line: &str) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;

        if self.path == STDOUT_TARGET {
            let mut out = tokio::io::stdout();
            out.write_all(line.as_bytes()).await?;
            out.flush().await?;
            return Ok(());
        }

        if let Some(parent) = Path::new(&self.path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("create history dir {}", parent.display()))?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("open history file {}", self.path))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl SummarySink for JsonlSummarySink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn record(&self, stack_id: &str, summary: &ExecutionSummary) -> anyhow::Result<()> {
        let line = Self::to_line(stack_id, summary)?;
        self.append(&line).await?;
        tracing::debug!(
            execution_id = %summary.execution_id(),
            path = %self.path,
            bytes = line.len(),
            "execution summary recorded"
        );
        Ok(())
    }
}
