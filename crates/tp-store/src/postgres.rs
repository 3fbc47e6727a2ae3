//! PostgreSQL implementation of [`TelemetryStore`].
//!
//! The driver is async; every call runs to completion on a private
//! current-thread runtime, so the store looks synchronous to the pipeline.
//! Bulk inserts stream the batch with `COPY ... FROM STDIN` in text format.

use crate::columns::{bind_columns, BoundColumn, Cell};
use crate::error::StoreError;
use crate::TelemetryStore;
use arrow_array::RecordBatch;
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tokio::runtime::{Builder, Runtime};
use tp_common::schema::{FACT_TABLE, SCHEMA_VERSION};
use tp_common::{Dimension, RegionId, TestRunId, TestRunRoleId};
use tracing::{debug, info};

const SCHEMA_SQL: &str = include_str!("schema_postgres.sql");
const POINTS_SAVEPOINT: &str = "tp_points";

/// Whether `url` names a PostgreSQL server.
pub fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}

/// Store backed by a single PostgreSQL connection.
pub struct PgStore {
    runtime: Runtime,
    conn: PgConnection,
    in_transaction: bool,
}

impl PgStore {
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StoreError::Runtime)?;
        let conn = runtime
            .block_on(PgConnection::connect(url))
            .map_err(|source| StoreError::Connect {
                url: url.to_string(),
                source: source.into(),
            })?;
        Ok(Self {
            runtime,
            conn,
            in_transaction: false,
        })
    }

    /// Schema version recorded by a previous bootstrap, 0 if none.
    pub fn schema_version(&mut self) -> Result<i64, StoreError> {
        let exists: bool = self.runtime.block_on(
            sqlx::query_scalar("SELECT to_regclass('schema_version') IS NOT NULL")
                .fetch_one(&mut self.conn),
        )?;
        if !exists {
            return Ok(0);
        }
        let version: i64 = self.runtime.block_on(
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&mut self.conn),
        )?;
        Ok(version)
    }

    /// Number of rows in `table`.
    pub fn row_count(&mut self, table: &str) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", table.replace('"', "\"\""));
        Ok(self
            .runtime
            .block_on(sqlx::query_scalar(&sql).fetch_one(&mut self.conn))?)
    }

    fn run(&mut self, sql: &str) -> Result<(), StoreError> {
        self.runtime
            .block_on(sqlx::raw_sql(sql).execute(&mut self.conn))?;
        Ok(())
    }

    /// Stream `payload` through COPY and return the rows the server took.
    fn copy(&mut self, statement: &str, payload: Vec<u8>) -> Result<u64, StoreError> {
        let conn = &mut self.conn;
        self.runtime.block_on(async move {
            let mut copy = conn.copy_in_raw(statement).await?;
            let sent = copy.send(payload).await.map(|_| ());
            if let Err(err) = sent {
                // the connection stays usable only after the server sees the abort
                let _ = copy.abort(err.to_string()).await;
                return Err(err.into());
            }
            Ok(copy.finish().await?)
        })
    }
}

impl TelemetryStore for PgStore {
    fn migrate(&mut self) -> Result<(), StoreError> {
        let found = self.schema_version()?;
        if found > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        self.run("BEGIN")?;
        let applied = self.run(SCHEMA_SQL).and_then(|()| {
            self.run(&format!(
                "DELETE FROM schema_version; INSERT INTO schema_version (version) VALUES ({SCHEMA_VERSION})"
            ))
        });
        match applied {
            Ok(()) => self.run("COMMIT")?,
            Err(err) => {
                let _ = self.run("ROLLBACK");
                return Err(err);
            }
        }
        info!(from = found, to = SCHEMA_VERSION, "store schema ready");
        Ok(())
    }

    fn get_or_insert_dimension(
        &mut self,
        dimension: Dimension,
        key: &str,
    ) -> Result<i64, StoreError> {
        let sql = format!(
            "INSERT INTO {table} ({col}) VALUES ($1) \
             ON CONFLICT ({col}) DO UPDATE SET {col} = EXCLUDED.{col} \
             RETURNING id",
            table = dimension.table(),
            col = dimension.key_column(),
        );
        let id: i64 = self
            .runtime
            .block_on(sqlx::query_scalar(&sql).bind(key).fetch_one(&mut self.conn))?;
        debug!(%dimension, key, id, "dimension resolved");
        Ok(id)
    }

    fn find_testrun_role(
        &mut self,
        testrun: TestRunId,
        role: &str,
    ) -> Result<Option<TestRunRoleId>, StoreError> {
        let id: Option<i64> = self.runtime.block_on(
            sqlx::query_scalar("SELECT id FROM testrunrole WHERE testrun_id = $1 AND role_name = $2")
                .bind(testrun.0)
                .bind(role)
                .fetch_optional(&mut self.conn),
        )?;
        Ok(id.map(TestRunRoleId))
    }

    fn insert_testrun_role(
        &mut self,
        testrun: TestRunId,
        role: &str,
        instance: &str,
        region: RegionId,
    ) -> Result<TestRunRoleId, StoreError> {
        let id: i64 = self.runtime.block_on(
            sqlx::query_scalar(
                "INSERT INTO testrunrole (testrun_id, role_name, instance_id, rid) \
                 VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(testrun.0)
            .bind(role)
            .bind(instance)
            .bind(region.0)
            .fetch_one(&mut self.conn),
        )?;
        Ok(TestRunRoleId(id))
    }

    fn insert_points(&mut self, batch: &RecordBatch) -> Result<u64, StoreError> {
        let columns = bind_columns(batch)?;
        let payload = copy_payload(&columns, batch.num_rows())?;
        let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
        let statement = format!("COPY {FACT_TABLE} ({}) FROM STDIN", names.join(", "));
        let expected = batch.num_rows() as u64;

        let (open, release, undo) = if self.in_transaction {
            (
                format!("SAVEPOINT {POINTS_SAVEPOINT}"),
                format!("RELEASE SAVEPOINT {POINTS_SAVEPOINT}"),
                format!("ROLLBACK TO SAVEPOINT {POINTS_SAVEPOINT}"),
            )
        } else {
            ("BEGIN".to_string(), "COMMIT".to_string(), "ROLLBACK".to_string())
        };

        self.run(&open)?;
        let inserted = match self.copy(&statement, payload) {
            Ok(inserted) => inserted,
            Err(err) => {
                let _ = self.run(&undo);
                return Err(err);
            }
        };
        if inserted != expected {
            self.run(&undo)?;
            return Err(StoreError::RowCountMismatch { expected, inserted });
        }
        self.run(&release)?;
        debug!(rows = inserted, "copy committed");
        Ok(inserted)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.run("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.in_transaction = false;
        self.run("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.in_transaction = false;
        self.run("ROLLBACK")
    }
}

/// Render rows as COPY text: tab separated, `\N` for NULL, bytea as hex.
fn copy_payload(columns: &[BoundColumn<'_>], rows: usize) -> Result<Vec<u8>, StoreError> {
    let mut out = Vec::with_capacity(rows * columns.len() * 8);
    for row in 0..rows {
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                out.push(b'\t');
            }
            match column.cell(row)? {
                Cell::Null => out.extend_from_slice(b"\\N"),
                Cell::Int(v) => out.extend_from_slice(v.to_string().as_bytes()),
                Cell::Bytes(b) => {
                    // COPY text unescapes `\\x` to the bytea hex prefix `\x`
                    out.extend_from_slice(b"\\\\x");
                    out.extend_from_slice(hex::encode(b).as_bytes());
                }
            }
        }
        out.push(b'\n');
    }
    Ok(out)
}
