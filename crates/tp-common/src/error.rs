//! Dimension errors.

use thiserror::Error;

/// Errors raised while resolving file-level dimensions.
///
/// These are integrity failures, not transient ones: a file that trips any of
/// them must not be ingested.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DimensionError {
    /// A required header name is absent from the dictionary or the header map.
    #[error("file header does not bind required key '{name}'")]
    MissingBinding { name: String },

    /// A required header name is bound to a non-text value.
    #[error("file header key '{name}' must be text, found {found}")]
    BindingType { name: String, found: String },

    /// The (test run, role) pair was already imported.
    #[error("test run role '{role}' already exists for test run '{testrun}' - duplicate import?")]
    DuplicateImport { testrun: String, role: String },
}

impl DimensionError {
    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            DimensionError::MissingBinding { .. } => 21,
            DimensionError::BindingType { .. } => 22,
            DimensionError::DuplicateImport { .. } => 23,
        }
    }
}
