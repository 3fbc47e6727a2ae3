//! Store schema versioning and dimension tables.

use std::fmt;

/// Schema version stamped by the store bootstrap (`PRAGMA user_version`).
pub const SCHEMA_VERSION: i64 = 1;

/// Fact table receiving one row per decoded telemetry record.
pub const FACT_TABLE: &str = "telemetry_point";

/// Header keys every telemetry file must bind.
pub const HEADER_TESTRUN_ID: &str = "testrun_id";
pub const HEADER_TESTRUN_ROLE: &str = "testrun_role";
pub const HEADER_AWS_INSTANCE: &str = "aws_instance";
pub const HEADER_AWS_REGION: &str = "aws_region";

/// Dimension tables resolved by a single natural key.
///
/// `testrunrole` is keyed by a pair and handled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    TestRun,
    Region,
    Measurement,
}

impl Dimension {
    /// Table holding the dimension rows.
    pub fn table(self) -> &'static str {
        match self {
            Dimension::TestRun => "testrun",
            Dimension::Region => "region",
            Dimension::Measurement => "measurement",
        }
    }

    /// Column holding the natural key.
    pub fn key_column(self) -> &'static str {
        match self {
            Dimension::TestRun => "testcontroller_id",
            Dimension::Region | Dimension::Measurement => "name",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}
