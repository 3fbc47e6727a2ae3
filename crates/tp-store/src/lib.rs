//! Relational store for ingested telemetry.
//!
//! [`TelemetryStore`] is the seam between the ingest pipeline and the
//! database. [`SqliteStore`] and [`PgStore`] implement it, and
//! [`StoreBackend`] picks one from the connection string.
//! [`DimensionResolver`] layers the get-or-create and duplicate-import rules
//! on top.

pub mod backend;
mod columns;
pub mod error;
pub mod postgres;
pub mod resolver;
pub mod sqlite;

pub use backend::StoreBackend;
pub use error::{ResolveError, StoreError};
pub use postgres::{is_postgres_url, PgStore};
pub use resolver::{CacheStats, DimensionResolver, MeasurementCache};
pub use sqlite::SqliteStore;

use arrow_array::RecordBatch;
use tp_common::{Dimension, RegionId, TestRunId, TestRunRoleId};

/// Operations the ingest pipeline needs from a database.
///
/// Every method is a single round-trip.
pub trait TelemetryStore {
    /// Create missing tables and stamp the schema version. Idempotent.
    fn migrate(&mut self) -> Result<(), StoreError>;

    /// Id of the row keyed by `key`, inserting it if absent.
    fn get_or_insert_dimension(&mut self, dimension: Dimension, key: &str)
        -> Result<i64, StoreError>;

    fn find_testrun_role(
        &mut self,
        testrun: TestRunId,
        role: &str,
    ) -> Result<Option<TestRunRoleId>, StoreError>;

    fn insert_testrun_role(
        &mut self,
        testrun: TestRunId,
        role: &str,
        instance: &str,
        region: RegionId,
    ) -> Result<TestRunRoleId, StoreError>;

    /// Insert every row of `batch` into `telemetry_point` atomically.
    ///
    /// Returns the number of rows written, which equals `batch.num_rows()`
    /// on success.
    fn insert_points(&mut self, batch: &RecordBatch) -> Result<u64, StoreError>;

    fn begin(&mut self) -> Result<(), StoreError>;
    fn commit(&mut self) -> Result<(), StoreError>;
    fn rollback(&mut self) -> Result<(), StoreError>;
}
