//! `tracing` subscriber setup.

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingConfig};

/// Filter directive for the CLI `-v` count, `None` keeps the configured level.
#[must_use]
pub fn level_from_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Builds the filter: `RUST_LOG`, else `-v`, else the configured level.
///
/// # Errors
/// Returns an error when the resulting directive does not parse.
pub fn build_filter(config: &LoggingConfig, verbose: u8) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = level_from_verbosity(verbose).unwrap_or(config.level.as_str());
    EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))
}

/// Installs the global subscriber.
///
/// # Errors
/// Returns an error when the filter is invalid or a subscriber is already set.
pub fn init_logging(config: &LoggingConfig, verbose: u8) -> anyhow::Result<()> {
    let filter = build_filter(config, verbose)?;
    let (text, json) = match config.format {
        LogFormat::Text => (Some(fmt::layer().with_target(true)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_current_span(true))),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}
