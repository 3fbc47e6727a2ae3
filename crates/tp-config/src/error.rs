//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("no database url given (use --database-url, DATABASE_URL or the config file)")]
    MissingDatabaseUrl,

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::Io { .. } => 10,
            ConfigError::Parse { .. } => 11,
            ConfigError::MissingDatabaseUrl => 12,
            ConfigError::Invalid { .. } => 13,
        }
    }
}
