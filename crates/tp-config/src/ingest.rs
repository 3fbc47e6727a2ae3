//! Ingest run settings and their resolution.

use crate::error::ConfigError;
use crate::{DEFAULT_BATCH_SIZE, DEFAULT_PROGRESS_EVERY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tp_format::RecordLayout;

/// Fully resolved settings of an ingest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestConfig {
    /// Store connection string.
    pub database_url: String,
    /// Directory tree searched for telemetry files.
    pub root: PathBuf,
    /// Records per bulk insert.
    pub batch_size: usize,
    pub record_layout: RecordLayout,
    /// Records read between progress refreshes.
    pub progress_every: u64,
    /// Substring a file name must contain to be ingested.
    pub name_contains: String,
    /// Suffix a file name must end with to be ingested.
    pub suffix: String,
}

/// Optional TOML layer. Every key may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub record_layout: Option<RecordLayout>,
    #[serde(default)]
    pub progress_every: Option<u64>,
    #[serde(default)]
    pub name_contains: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

/// Values supplied on the command line or through the environment.
///
/// clap folds the environment into these, so they already carry the
/// CLI-over-env precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub root: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub record_layout: Option<RecordLayout>,
}

impl IngestConfig {
    /// Merge overrides over the file layer over defaults, then validate.
    pub fn resolve(
        overrides: ConfigOverrides,
        file: Option<ConfigFile>,
    ) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();
        let database_url = overrides
            .database_url
            .or(file.database_url)
            .ok_or(ConfigError::MissingDatabaseUrl)?;
        let config = Self {
            database_url,
            root: overrides
                .root
                .or(file.root)
                .unwrap_or_else(|| PathBuf::from(".")),
            batch_size: overrides
                .batch_size
                .or(file.batch_size)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            record_layout: overrides
                .record_layout
                .or(file.record_layout)
                .unwrap_or_default(),
            progress_every: file.progress_every.unwrap_or(DEFAULT_PROGRESS_EVERY),
            name_contains: file
                .name_contains
                .unwrap_or_else(|| "telemetry".to_string()),
            suffix: file.suffix.unwrap_or_else(|| ".bin".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "database_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.progress_every == 0 {
            return Err(ConfigError::Invalid {
                field: "progress_every",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.suffix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "suffix",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
