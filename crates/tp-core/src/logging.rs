//! Tracing subscriber setup.
//!
//! Logs go to stderr; stdout carries the progress line.

use crate::error::IngestError;
use clap::ValueEnum;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Log line encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Build the event filter. `RUST_LOG`, when set, wins over `level`.
pub fn filter(level: &str) -> Result<EnvFilter, IngestError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| {
        IngestError::Config(tp_config::ConfigError::Invalid {
            field: "log_level",
            reason: e.to_string(),
        })
    })
}

/// Install the global subscriber.
pub fn init(level: &str, format: LogFormat) -> Result<(), IngestError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(level)?)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| IngestError::Internal(format!("logging init failed: {e}")))
}
