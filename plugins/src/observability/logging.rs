use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use agentstack_core::api::LoggingConfig;
use anyhow::Context;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the file writer flushing until process exit.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_PREFIX: &str = "agentstack.log";

/// Install the global tracing subscriber described by `logging`.
///
/// Console output goes to stderr so stdout stays free for `stdout:` history sinks.
/// File output rolls daily under `logging.directory` or `<tmp>/agentstack`. A valid
/// `RUST_LOG` overrides `logging.level`. Fails when a global subscriber is already installed.
pub fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    if !logging.enabled {
        return Ok(());
    }
    if !logging.console && !logging.file {
        anyhow::bail!("logging enabled but both console and file output are off");
    }

    let filter = build_filter(logging)?;
    let file_writer = if logging.file {
        Some(open_file_writer(&log_directory(logging))?)
    } else {
        None
    };

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });
    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_ids(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::debug!(level = %logging.level, file = logging.file, "tracing initialised");
    Ok(())
}

fn build_filter(logging: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&logging.level)
        .with_context(|| format!("invalid log level '{}'", logging.level))
}

fn open_file_writer(dir: &Path) -> anyhow::Result<NonBlocking> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // A second call keeps the first guard; its writer is dropped with the failed init.
    let _ = LOG_GUARD.set(guard);
    Ok(writer)
}

/// Directory for log files: the configured one, else `<tmp>/agentstack`.
fn log_directory(logging: &LoggingConfig) -> PathBuf {
    logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("agentstack"))
}
