//! Run-level error type.

use crate::exit_codes::ExitCode;
use std::path::PathBuf;
use thiserror::Error;
use tp_common::DimensionError;
use tp_config::ConfigError;
use tp_format::FormatError;
use tp_store::{ResolveError, StoreError};
use tp_telemetry::ProjectionError;

/// Any failure that aborts an ingest run.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("malformed telemetry file: {0}")]
    Format(#[from] FormatError),

    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to write {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| IngestError::Io { path, source }
    }

    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            IngestError::Config(e) => e.code(),
            IngestError::Io { .. } | IngestError::Walk(_) | IngestError::Report { .. } => 60,
            IngestError::Format(e) => e.code(),
            IngestError::Dimension(e) => e.code(),
            IngestError::Store(e) => e.code(),
            IngestError::Internal(_) => 99,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            IngestError::Config(_) => ExitCode::ConfigError,
            IngestError::Io { .. } | IngestError::Walk(_) | IngestError::Report { .. } => {
                ExitCode::IoError
            }
            IngestError::Format(_) => ExitCode::FormatError,
            IngestError::Dimension(_) => ExitCode::DimensionError,
            IngestError::Store(_) => ExitCode::StoreError,
            IngestError::Internal(_) => ExitCode::InternalError,
        }
    }
}

impl From<ResolveError> for IngestError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Dimension(e) => IngestError::Dimension(e),
            ResolveError::Store(e) => IngestError::Store(e),
        }
    }
}

impl From<ProjectionError> for IngestError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::Format(e) => IngestError::Format(e),
            other => IngestError::Internal(other.to_string()),
        }
    }
}
