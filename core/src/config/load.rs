use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::{default_history_path, AppConfig};

const ENV_MAX_PARALLEL: &str = "AGENTSTACK_MAX_PARALLEL";
const ENV_TIMEOUT_SECS: &str = "AGENTSTACK_TIMEOUT_SECS";
const ENV_LOG_LEVEL: &str = "AGENTSTACK_LOG_LEVEL";

/// Get the default agentstack data directory: ~/.agentstack
pub fn get_agentstack_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".agentstack"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.agentstack/config.toml
    let data_dir = get_agentstack_data_dir()?;
    let user_config = data_dir.join("config.toml");

    // Priority 2: ./agentstack.toml (current directory)
    let local_config = Path::new("agentstack.toml");

    let mut cfg = if user_config.exists() {
        load_from_path(&user_config)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    // Keep history under the data directory unless a path was configured
    if cfg.history.enabled && cfg.history.path == default_history_path() {
        let history_dir = data_dir.join("history");
        std::fs::create_dir_all(&history_dir)?;
        cfg.history.path = history_dir
            .join("runs.jsonl")
            .to_string_lossy()
            .to_string();
    }

    if cfg.logging.file
        && cfg
            .logging
            .directory
            .as_ref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    {
        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    // Environment variable overrides (Priority 0: highest)
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;

    Ok(cfg)
}

pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str::<AppConfig>(&s)
        .with_context(|| format!("invalid config file {}", path.display()))
}

fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = lookup(ENV_MAX_PARALLEL) {
        let n: usize = v
            .trim()
            .parse()
            .with_context(|| format!("{ENV_MAX_PARALLEL} must be a non-negative integer, got '{v}'"))?;
        cfg.executor.max_parallel = Some(n);
    }
    if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
        let secs: u64 = v
            .trim()
            .parse()
            .with_context(|| format!("{ENV_TIMEOUT_SECS} must be a number of seconds, got '{v}'"))?;
        cfg.executor.timeout_secs = Some(secs);
    }
    if let Some(v) = lookup(ENV_LOG_LEVEL) {
        cfg.logging.level = v.trim().to_string();
    }

    Ok(())
}
