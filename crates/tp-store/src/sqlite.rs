//! SQLite implementation of [`TelemetryStore`].

use crate::columns::{bind_columns, Cell};
use crate::error::StoreError;
use crate::TelemetryStore;
use arrow_array::RecordBatch;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;
use tp_common::schema::{FACT_TABLE, SCHEMA_VERSION};
use tp_common::{Dimension, RegionId, TestRunId, TestRunRoleId};
use tracing::{debug, info};

const SCHEMA_SQL: &str = include_str!("schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a connection string points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Memory,
    File(String),
}

fn parse_url(url: &str) -> Result<Target, StoreError> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    if rest.contains("://") {
        return Err(StoreError::UnsupportedUrl(url.to_string()));
    }
    match rest {
        "" => Err(StoreError::UnsupportedUrl(url.to_string())),
        ":memory:" => Ok(Target::Memory),
        path => Ok(Target::File(path.to_string())),
    }
}

/// Store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the database named by `url` (`sqlite://PATH`, `sqlite::memory:`,
    /// a bare path or `:memory:`).
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let conn = match parse_url(url)? {
            Target::Memory => Connection::open_in_memory(),
            Target::File(path) => Connection::open(Path::new(&path)),
        }
        .map_err(|source| StoreError::Connect {
            url: url.to_string(),
            source: source.into(),
        })?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Schema version stamped on the database.
    pub fn schema_version(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", table.replace('"', "\"\""));
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Raw connection, for ad-hoc queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl TelemetryStore for SqliteStore {
    fn migrate(&mut self) -> Result<(), StoreError> {
        let found = self.schema_version()?;
        if found > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        let tx = self.conn.transaction()?;
        tx.execute_batch(SCHEMA_SQL)?;
        tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
        tx.commit()?;
        info!(from = found, to = SCHEMA_VERSION, "store schema ready");
        Ok(())
    }

    fn get_or_insert_dimension(
        &mut self,
        dimension: Dimension,
        key: &str,
    ) -> Result<i64, StoreError> {
        let sql = format!(
            "INSERT INTO {table} ({col}) VALUES (?1) \
             ON CONFLICT ({col}) DO UPDATE SET {col} = excluded.{col} \
             RETURNING id",
            table = dimension.table(),
            col = dimension.key_column(),
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let id: i64 = stmt.query_row(params![key], |row| row.get(0))?;
        debug!(%dimension, key, id, "dimension resolved");
        Ok(id)
    }

    fn find_testrun_role(
        &mut self,
        testrun: TestRunId,
        role: &str,
    ) -> Result<Option<TestRunRoleId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id FROM testrunrole WHERE testrun_id = ?1 AND role_name = ?2")?;
        let id: Option<i64> = stmt
            .query_row(params![testrun.0, role], |row| row.get(0))
            .optional()?;
        Ok(id.map(TestRunRoleId))
    }

    fn insert_testrun_role(
        &mut self,
        testrun: TestRunId,
        role: &str,
        instance: &str,
        region: RegionId,
    ) -> Result<TestRunRoleId, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO testrunrole (testrun_id, role_name, instance_id, rid) \
             VALUES (?1, ?2, ?3, ?4) RETURNING id",
        )?;
        let id: i64 = stmt.query_row(params![testrun.0, role, instance, region.0], |row| {
            row.get(0)
        })?;
        Ok(TestRunRoleId(id))
    }

    fn insert_points(&mut self, batch: &RecordBatch) -> Result<u64, StoreError> {
        let columns = bind_columns(batch)?;
        let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {FACT_TABLE} ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        );

        let expected = batch.num_rows() as u64;
        let sp = self.conn.savepoint()?;
        let mut inserted = 0u64;
        {
            let mut stmt = sp.prepare_cached(&sql)?;
            let mut row_values: Vec<ToSqlOutput<'_>> = Vec::with_capacity(columns.len());
            for row in 0..batch.num_rows() {
                row_values.clear();
                for column in &columns {
                    row_values.push(to_sql(column.cell(row)?));
                }
                inserted += stmt.execute(rusqlite::params_from_iter(row_values.iter()))? as u64;
            }
        }
        if inserted != expected {
            // dropping the savepoint rolls the batch back
            return Err(StoreError::RowCountMismatch { expected, inserted });
        }
        sp.commit()?;
        debug!(rows = inserted, "bulk insert committed");
        Ok(inserted)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

fn to_sql(cell: Cell<'_>) -> ToSqlOutput<'_> {
    match cell {
        Cell::Null => ToSqlOutput::Owned(Value::Null),
        Cell::Int(v) => ToSqlOutput::Owned(Value::Integer(v)),
        Cell::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
    }
}
