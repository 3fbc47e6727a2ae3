//! Surrogate id types for the dimension tables.
//!
//! Each dimension gets its own newtype so a region id can never be stored in
//! a test-run column by accident.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Surrogate id of a `testrun` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestRunId(pub i64);

impl fmt::Display for TestRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TestRunId {
    fn from(id: i64) -> Self {
        TestRunId(id)
    }
}

/// Surrogate id of a `region` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub i64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RegionId {
    fn from(id: i64) -> Self {
        RegionId(id)
    }
}

/// Surrogate id of a `testrunrole` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestRunRoleId(pub i64);

impl fmt::Display for TestRunRoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TestRunRoleId {
    fn from(id: i64) -> Self {
        TestRunRoleId(id)
    }
}

/// Surrogate id of a `measurement` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementId(pub i64);

impl fmt::Display for MeasurementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MeasurementId {
    fn from(id: i64) -> Self {
        MeasurementId(id)
    }
}

/// Dimension ids resolved once from a file header and stamped on every
/// fact row of that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDimensions {
    pub testrun: TestRunId,
    pub region: RegionId,
    pub testrun_role: TestRunRoleId,
}
