//! Telemetry fact table.
//!
//! This crate provides:
//! - The Arrow schema of the `telemetry_point` table
//! - The mapping from attribute names to destination columns
//! - Projection of decoded record batches into Arrow record batches

pub mod projection;
pub mod schema;

pub use projection::{project_batch, ColumnBindings, PointBatchBuilder, ProjectionError};
pub use schema::{
    column_names, telemetry_point_schema, AttributeColumn, ColumnType, KEY_COLUMNS,
};
