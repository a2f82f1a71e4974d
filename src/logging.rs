//! Logging initialization
//!
//! Console logging for interactive use and an optional JSON file layer for
//! post-hoc inspection of agent runs. Filtering follows `RUST_LOG` with an
//! `info` default.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::core::{AgentError, AgentResult};

/// Initialize console logging.
///
/// Safe to call once per process; a second call reports the subscriber
/// conflict as `InvalidConfig`.
pub fn init_logging() -> AgentResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init()
        .map_err(|e| AgentError::InvalidConfig(format!("failed to init logging: {}", e)))?;
    Ok(())
}

/// Initialize logging with an additional daily-rolling JSON file in `dir`.
///
/// The returned guard must be held for the process lifetime; dropping it
/// stops the background writer and loses buffered lines.
pub fn init_file_logging(dir: impl AsRef<Path>) -> AgentResult<WorkerGuard> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::daily(dir, "agent.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(writer)
        .try_init()
        .map_err(|e| AgentError::InvalidConfig(format!("failed to init logging: {}", e)))?;

    Ok(guard)
}
