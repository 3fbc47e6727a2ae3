//! Telemetry processor configuration.
//!
//! This crate provides:
//! - [`IngestConfig`], the fully resolved settings of an ingest run
//! - [`ConfigFile`], the optional TOML file layer
//! - Resolution (CLI → env → file → defaults) and validation

pub mod error;
pub mod ingest;

pub use error::ConfigError;
pub use ingest::{ConfigFile, ConfigOverrides, IngestConfig};

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "TELEMETRY_PROCESSOR_CONFIG";

/// Records handed to the store per bulk insert.
pub const DEFAULT_BATCH_SIZE: usize = 500_000;

/// Records read between progress line refreshes.
pub const DEFAULT_PROGRESS_EVERY: u64 = 10_000;
