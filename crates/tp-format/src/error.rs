//! Error types for decoding telemetry files.

use thiserror::Error;

/// Structural errors found while decoding a telemetry file.
#[derive(Error, Debug)]
pub enum FormatError {
    /// I/O error other than a short read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes were available than a fixed-size field needs
    #[error("unexpected end of data reading {what} at offset {offset}")]
    Truncated { what: &'static str, offset: u64 },

    /// A length prefix points past the end of the readable region
    #[error("{what} at offset {offset} declares {declared} bytes but only {remaining} remain")]
    LengthOverrun {
        what: &'static str,
        offset: u64,
        declared: u64,
        remaining: u64,
    },

    /// File too short to hold the dictionary offset
    #[error("file is {len} bytes, too short for a dictionary trailer")]
    MissingTrailer { len: u64 },

    /// Dictionary offset points outside the file
    #[error("dictionary offset {offset} lies beyond the trailer at {trailer}")]
    BadDictionaryOffset { offset: u64, trailer: u64 },

    /// Two dictionary entries share a name or a tag
    #[error("duplicate dictionary entry: {0}")]
    DuplicateKey(String),

    /// Text payload or key name is not UTF-8
    #[error("{what} at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { what: &'static str, offset: u64 },

    /// A tagged map declared zero entries
    #[error("tagged map at offset {offset} has no entries")]
    EmptyMap { offset: u64 },

    /// Value discriminator outside the six known payload kinds
    #[error("unknown value type {discriminator} for tag {tag} at offset {offset}")]
    UnknownValueType {
        discriminator: i8,
        tag: u16,
        offset: u64,
    },

    /// Tag missing from the file dictionary
    #[error("tag {tag} is not bound in the file dictionary")]
    UnboundTag { tag: u16 },

    /// Value kind does not match what the destination column accepts
    #[error("attribute '{name}' must be {expected}, found {found}")]
    ValueTypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl FormatError {
    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            FormatError::Io(_) => 60,
            FormatError::Truncated { .. } => 10,
            FormatError::LengthOverrun { .. } => 11,
            FormatError::MissingTrailer { .. } => 12,
            FormatError::BadDictionaryOffset { .. } => 13,
            FormatError::DuplicateKey(_) => 14,
            FormatError::InvalidUtf8 { .. } => 15,
            FormatError::EmptyMap { .. } => 16,
            FormatError::UnknownValueType { .. } => 17,
            FormatError::UnboundTag { .. } => 18,
            FormatError::ValueTypeMismatch { .. } => 19,
        }
    }
}

/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, FormatError>;
