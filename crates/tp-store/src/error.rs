//! Store errors.

use thiserror::Error;
use tp_common::DimensionError;

/// Errors raised by the database layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Query or statement failure
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL query, COPY or protocol failure
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// The database could not be opened
    #[error("cannot open store at '{url}': {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Connection string names a backend this build cannot reach
    #[error("unsupported database url '{0}' (expected postgres://..., sqlite://PATH, a file path or :memory:)")]
    UnsupportedUrl(String),

    /// Async runtime for the PostgreSQL driver could not start
    #[error("cannot start database runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Database was created by a newer release
    #[error("store schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i64, supported: i64 },

    /// Bulk insert wrote fewer rows than handed to it
    #[error("bulk insert wrote {inserted} of {expected} rows")]
    RowCountMismatch { expected: u64, inserted: u64 },

    /// Unsigned value outside the signed integer column range
    #[error("value {value} in column '{column}' exceeds the signed 64-bit range")]
    IntegerOverflow { column: String, value: u64 },

    /// Batch columns do not match `telemetry_point`
    #[error("batch column {index} is '{found}', expected '{expected}'")]
    SchemaMismatch {
        index: usize,
        expected: String,
        found: String,
    },
}

impl StoreError {
    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            StoreError::Sqlite(_) => 30,
            StoreError::Connect { .. } => 31,
            StoreError::UnsupportedUrl(_) => 32,
            StoreError::UnsupportedSchema { .. } => 33,
            StoreError::RowCountMismatch { .. } => 34,
            StoreError::IntegerOverflow { .. } => 35,
            StoreError::SchemaMismatch { .. } => 36,
            StoreError::Postgres(_) => 37,
            StoreError::Runtime(_) => 38,
        }
    }
}

/// Failure while resolving file-level dimensions.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
