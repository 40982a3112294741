// src/logging.rs

//! Logging for the `drawbot` binary.
//!
//! One fmt subscriber on stderr; stdout is reserved for the run summary and
//! the `--dry-run` report, so both can be piped without log noise.
//!
//! The level comes from `--log-level`, else `DRAWBOT_LOG`, else `info`.
//! What each level shows:
//!
//! - `info`: state transitions, progress, run summary, serial open/close.
//! - `debug`: sink lifecycle calls, skipped comments, preview saves.
//! - `trace`: the serial conversation, one `->` line per command sent and one
//!   `<-` line per board reply.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Environment variable consulted when `--log-level` is absent.
pub const LOG_ENV: &str = "DRAWBOT_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let level = resolve_level(cli_level, env.as_deref());

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

/// Flag beats environment beats `info`. An unrecognised environment value is
/// ignored rather than treated as an error.
fn resolve_level(cli_level: Option<LogLevel>, env: Option<&str>) -> Level {
    if let Some(lvl) = cli_level {
        return match lvl {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        };
    }
    env.and_then(parse_level_str).unwrap_or(Level::INFO)
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" | "serial" => Some(Level::TRACE),
        _ => None,
    }
}
