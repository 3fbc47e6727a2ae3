//! Store selected by connection-string scheme.

use crate::error::StoreError;
use crate::postgres::{is_postgres_url, PgStore};
use crate::sqlite::SqliteStore;
use crate::TelemetryStore;
use arrow_array::RecordBatch;
use tp_common::{Dimension, RegionId, TestRunId, TestRunRoleId};

/// Either backend, chosen from `DATABASE_URL`.
pub enum StoreBackend {
    Sqlite(SqliteStore),
    Postgres(PgStore),
}

impl StoreBackend {
    /// `postgres://` and `postgresql://` URLs reach PostgreSQL; anything
    /// else is handed to SQLite.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        if is_postgres_url(url) {
            Ok(Self::Postgres(PgStore::connect(url)?))
        } else {
            Ok(Self::Sqlite(SqliteStore::open(url)?))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
        }
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            StoreBackend::Sqlite($store) => $call,
            StoreBackend::Postgres($store) => $call,
        }
    };
}

impl TelemetryStore for StoreBackend {
    fn migrate(&mut self) -> Result<(), StoreError> {
        delegate!(self, s => s.migrate())
    }

    fn get_or_insert_dimension(
        &mut self,
        dimension: Dimension,
        key: &str,
    ) -> Result<i64, StoreError> {
        delegate!(self, s => s.get_or_insert_dimension(dimension, key))
    }

    fn find_testrun_role(
        &mut self,
        testrun: TestRunId,
        role: &str,
    ) -> Result<Option<TestRunRoleId>, StoreError> {
        delegate!(self, s => s.find_testrun_role(testrun, role))
    }

    fn insert_testrun_role(
        &mut self,
        testrun: TestRunId,
        role: &str,
        instance: &str,
        region: RegionId,
    ) -> Result<TestRunRoleId, StoreError> {
        delegate!(self, s => s.insert_testrun_role(testrun, role, instance, region))
    }

    fn insert_points(&mut self, batch: &RecordBatch) -> Result<u64, StoreError> {
        delegate!(self, s => s.insert_points(batch))
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        delegate!(self, s => s.begin())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        delegate!(self, s => s.commit())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        delegate!(self, s => s.rollback())
    }
}
