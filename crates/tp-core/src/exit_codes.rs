//! Exit codes for the telemetry-processor CLI.
//!
//! Exit codes communicate the outcome of a run without requiring output
//! parsing. They are stable.

/// Exit codes for telemetry-processor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every discovered file was ingested
    Clean = 0,

    /// Configuration error
    ConfigError = 10,

    /// I/O or discovery error
    IoError = 13,

    /// Malformed telemetry file
    FormatError = 20,

    /// Missing header binding or duplicate import
    DimensionError = 21,

    /// Database error
    StoreError = 30,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
