//! Get-or-create resolution of dimension rows.
//!
//! Measurement ids are resolved once per record, so they go through an
//! in-process cache that is consulted before the store. Test runs and
//! regions are resolved once per file and are not cached.

use crate::error::{ResolveError, StoreError};
use crate::TelemetryStore;
use std::collections::HashMap;
use tp_common::{
    Dimension, DimensionError, FileDimensions, MeasurementId, RegionId, TestRunId, TestRunRoleId,
};
use tp_format::FileHeader;
use tracing::{debug, error, info};

/// Hit and miss totals of a [`MeasurementCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Name to id mapping for the `measurement` table.
#[derive(Debug, Default)]
pub struct MeasurementCache {
    ids: HashMap<String, MeasurementId>,
    hits: u64,
    misses: u64,
}

impl MeasurementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `name`, counting the hit or miss.
    pub fn get(&mut self, name: &str) -> Option<MeasurementId> {
        match self.ids.get(name) {
            Some(id) => {
                self.hits += 1;
                Some(*id)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, name: &str, id: MeasurementId) {
        self.ids.insert(name.to_string(), id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.ids.len(),
        }
    }
}

/// Resolves natural keys to surrogate ids against a [`TelemetryStore`].
pub struct DimensionResolver<S> {
    store: S,
    measurements: MeasurementCache,
}

impl<S: TelemetryStore> DimensionResolver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            measurements: MeasurementCache::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.measurements.stats()
    }

    /// Id for `key` in `dimension`, inserting the row on a miss. Uncached.
    pub fn resolve_or_create(&mut self, dimension: Dimension, key: &str) -> Result<i64, StoreError> {
        self.store.get_or_insert_dimension(dimension, key)
    }

    /// Id of measurement `name`, from the cache when possible.
    pub fn resolve_measurement(&mut self, name: &str) -> Result<MeasurementId, StoreError> {
        if let Some(id) = self.measurements.get(name) {
            return Ok(id);
        }
        let id = MeasurementId(
            self.store
                .get_or_insert_dimension(Dimension::Measurement, name)?,
        );
        debug!(measurement = name, %id, "measurement cached");
        self.measurements.insert(name, id);
        Ok(id)
    }

    /// Insert the role row for (`testrun`, `role`).
    ///
    /// An existing row means the file was already imported and is an error.
    pub fn create_test_run_role(
        &mut self,
        testrun: TestRunId,
        testrun_key: &str,
        role: &str,
        instance: &str,
        region: RegionId,
    ) -> Result<TestRunRoleId, ResolveError> {
        if self.store.find_testrun_role(testrun, role)?.is_some() {
            return Err(DimensionError::DuplicateImport {
                testrun: testrun_key.to_string(),
                role: role.to_string(),
            }
            .into());
        }
        Ok(self
            .store
            .insert_testrun_role(testrun, role, instance, region)?)
    }

    /// Resolve the test run, region and role of a file in one transaction.
    ///
    /// On any failure the transaction is rolled back, so a rejected file
    /// leaves no dimension rows behind.
    pub fn resolve_header(&mut self, header: &FileHeader) -> Result<FileDimensions, ResolveError> {
        self.store.begin()?;
        match self.resolve_header_rows(header) {
            Ok(dims) => {
                self.store.commit()?;
                info!(
                    testrun = %header.testrun_id,
                    role = %header.testrun_role,
                    trid = %dims.testrun,
                    trrid = %dims.testrun_role,
                    "file dimensions resolved"
                );
                Ok(dims)
            }
            Err(err) => {
                if let Err(rollback) = self.store.rollback() {
                    error!(error = %rollback, "rollback of header resolution failed");
                }
                Err(err)
            }
        }
    }

    fn resolve_header_rows(&mut self, header: &FileHeader) -> Result<FileDimensions, ResolveError> {
        let testrun = TestRunId(self.resolve_or_create(Dimension::TestRun, &header.testrun_id)?);
        let region = RegionId(self.resolve_or_create(Dimension::Region, &header.aws_region)?);
        let testrun_role = self.create_test_run_role(
            testrun,
            &header.testrun_id,
            &header.testrun_role,
            &header.aws_instance,
            region,
        )?;
        Ok(FileDimensions {
            testrun,
            region,
            testrun_role,
        })
    }
}
