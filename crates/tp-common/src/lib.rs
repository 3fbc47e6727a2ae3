//! Telemetry processor common types, ids, and errors.
//!
//! This crate provides foundational types shared across the ingestion crates:
//! - Typed surrogate ids for the dimension tables
//! - Dimension errors (missing header bindings, duplicate imports)
//! - Store schema versioning and table names

pub mod error;
pub mod id;
pub mod schema;

pub use error::DimensionError;
pub use id::{FileDimensions, MeasurementId, RegionId, TestRunId, TestRunRoleId};
pub use schema::{Dimension, SCHEMA_VERSION};
