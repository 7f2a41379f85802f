//! Logging setup
//!
//! The library emits `tracing` events and spans at every stage of the
//! pipeline; this module installs a `tracing-subscriber` to print them.
//!
//! # Usage
//!
//! ```rust,no_run
//! use topoforge::core::logging::init_logging;
//!
//! // Level and format from the environment, falling back to info/compact
//! init_logging(None, None)?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # What gets logged where
//!
//! - `trace`: individual store mutations and validation results
//! - `debug`: gesture transitions, plan construction, record conversion
//! - `info`: project load/save and export summaries
//! - `warn`: export warnings and skipped legacy records
//!
//! # Environment Variables
//!
//! - `TOPOFORGE_LOG_LEVEL`: trace|debug|info|warn|error|off
//! - `TOPOFORGE_LOG_FORMAT`: compact|pretty|json
//! - `RUST_LOG`: standard `EnvFilter` directives, e.g.
//!   `RUST_LOG="info,topoforge::export=trace"`

use std::str::FromStr;

use anyhow::{anyhow, Result};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact single-line format
    Compact,
    /// Pretty multi-line format with colors
    Pretty,
    /// JSON format for log aggregation
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

impl LogFormat {
    /// Get all valid format names
    pub fn variants() -> &'static [&'static str] {
        &["compact", "pretty", "json"]
    }
}

/// Resolve the filter directive from the argument, the environment or `info`
fn resolve_level(level: Option<&str>) -> String {
    level
        .map(|s| s.to_string())
        .or_else(|| std::env::var("TOPOFORGE_LOG_LEVEL").ok())
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string())
}

fn resolve_format(format: Option<&str>) -> String {
    format
        .map(|s| s.to_string())
        .or_else(|| std::env::var("TOPOFORGE_LOG_FORMAT").ok())
        .unwrap_or_else(|| "compact".to_string())
}

/// Build the filter for a level directive. `off` always wins over `RUST_LOG`.
fn build_filter(level: &str) -> EnvFilter {
    if level == "off" {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// `level` and `format` override `TOPOFORGE_LOG_LEVEL` and
/// `TOPOFORGE_LOG_FORMAT`. Fails on an unknown format or when a global
/// subscriber is already installed.
pub fn init_logging(level: Option<&str>, format: Option<&str>) -> Result<()> {
    let filter = build_filter(&resolve_level(level));
    let format = LogFormat::from_str(&resolve_format(format))
        .map_err(|e| anyhow!("Invalid log format: {}", e))?;

    let layer = fmt::Layer::default().with_writer(std::io::stderr);

    match format {
        LogFormat::Compact => Registry::default()
            .with(filter)
            .with(
                layer
                    .with_target(false)
                    .with_level(true)
                    .with_span_events(FmtSpan::NONE)
                    .compact(),
            )
            .try_init()?,
        LogFormat::Pretty => Registry::default()
            .with(filter)
            .with(
                layer
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::ACTIVE)
                    .pretty(),
            )
            .try_init()?,
        LogFormat::Json => Registry::default()
            .with(filter)
            .with(
                layer
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .json(),
            )
            .try_init()?,
    }

    Ok(())
}

/// Initialize logging with default settings (info level, compact format)
pub fn init_default_logging() -> Result<()> {
    init_logging(None, None)
}
