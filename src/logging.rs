use anyhow::{anyhow, Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_ENV: &str = "PIPELINE_CLIENT_LOG";
pub const LOG_LEVEL_ENV: &str = "PIPELINE_CLIENT_LOG_LEVEL";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. The interactive UI owns the terminal, so
/// events go to `PIPELINE_CLIENT_LOG` when set, to stderr when `to_stderr`,
/// and nowhere otherwise.
pub fn init_logging(to_stderr: bool) -> Result<()> {
    if let Some(path) = std::env::var_os(LOG_FILE_ENV) {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.to_string_lossy()))?;
        return tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
            .map_err(|e| anyhow!(e));
    }
    if to_stderr {
        return tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow!(e));
    }
    Ok(())
}
