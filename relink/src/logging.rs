//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `RELINK_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`

use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::fmt;

pub const LOG_ENV: &str = "RELINK_LOG";

/// Install the global subscriber. Logs go to stderr so reports on stdout stay parseable.
pub fn init_logging(cli_level: Option<&str>) -> Result<()> {
    let env_level = std::env::var(LOG_ENV).ok();
    let level = resolve_level(cli_level, env_level.as_deref());

    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

pub fn resolve_level(cli_level: Option<&str>, env_level: Option<&str>) -> Level {
    cli_level
        .and_then(parse_level_str)
        .or_else(|| env_level.and_then(parse_level_str))
        .unwrap_or(Level::INFO)
}

pub fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
