//! Integration tests for file ingestion into SQLite.
//!
//! Tests cover:
//! - Two-record file ingested as two single-record batches
//! - Duplicate import rejection
//! - Truncated record handling
//! - Directory runs with a JSON summary

use std::io::Cursor;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tp_core::{discover, IngestError, Ingestor, Progress};
use tp_format::{RecordLayout, TaggedValue, TelemetryWriter};
use tp_store::{SqliteStore, StoreError, TelemetryStore};

fn header(role: &str) -> Vec<(&'static str, TaggedValue)> {
    vec![
        ("testrun_id", "abc".into()),
        ("testrun_role", role.into()),
        ("aws_instance", "i-1".into()),
        ("aws_region", "us-east-1".into()),
    ]
}

/// Two records: `latency` then `outcome`.
fn two_record_file(role: &str, layout: RecordLayout) -> Vec<u8> {
    let mut w = TelemetryWriter::new(Vec::new(), &header(role), layout).unwrap();
    w.log(
        "latency",
        &[
            ("latency", TaggedValue::Int(250)),
            ("txid", TaggedValue::Hash([9; 32])),
            ("ticket_number", TaggedValue::UInt(17)),
        ],
        1_000,
    )
    .unwrap();
    w.log(
        "outcome",
        &[
            ("outcome", TaggedValue::Byte(1)),
            ("txid", TaggedValue::Hash([9; 32])),
        ],
        2_000,
    )
    .unwrap();
    w.finish().unwrap()
}

fn migrated_store() -> SqliteStore {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store.migrate().unwrap();
    store
}

fn ingestor(batch_size: usize, layout: RecordLayout) -> Ingestor<SqliteStore> {
    Ingestor::new(migrated_store(), batch_size, layout, Progress::silent())
}

fn count(ingestor: &Ingestor<SqliteStore>, table: &str) -> i64 {
    ingestor.resolver().store().row_count(table).unwrap()
}

mod end_to_end {
    use super::*;

    #[test]
    fn two_records_with_threshold_one() {
        let mut ing = ingestor(1, RecordLayout::MapFirst);
        let summary = ing
            .ingest_reader(
                Cursor::new(two_record_file("leader", RecordLayout::MapFirst)),
                Path::new("node_telemetry.bin"),
            )
            .unwrap();

        assert_eq!(summary.stats.records, 2);
        assert_eq!(summary.stats.batches, 2);
        assert_eq!(summary.stats.inserted, 2);
        assert_eq!(summary.testrun_id, "abc");

        let cache = ing.resolver().cache_stats();
        assert_eq!(cache.misses, 2);
        assert_eq!(cache.entries, 2);

        assert_eq!(count(&ing, "measurement"), 2);
        assert_eq!(count(&ing, "testrun"), 1);
        assert_eq!(count(&ing, "region"), 1);
        assert_eq!(count(&ing, "testrunrole"), 1);
        assert_eq!(count(&ing, "telemetry_point"), 2);

        let conn = ing.resolver().store().connection();
        let (role_name, instance): (String, String) = conn
            .query_row(
                "SELECT role_name, instance_id FROM testrunrole",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(role_name, "leader");
        assert_eq!(instance, "i-1");

        let mut stmt = conn
            .prepare(
                "SELECT p.trid, p.trrid, m.name, p.ts, p.latency, p.outcome, p.tn, p.txid \
                 FROM telemetry_point p JOIN measurement m ON m.id = p.mid ORDER BY p.ts",
            )
            .unwrap();
        type Row = (
            i64,
            i64,
            String,
            i64,
            Option<i64>,
            Option<i64>,
            Option<i64>,
            Option<Vec<u8>>,
        );
        let rows: Vec<Row> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.0, summary.dimensions.testrun.0);
            assert_eq!(row.1, summary.dimensions.testrun_role.0);
            assert_eq!(row.7.as_deref(), Some(&[9u8; 32][..]));
        }
        assert_eq!(rows[0].2, "latency");
        assert_eq!(rows[0].3, 1_000);
        assert_eq!(rows[0].4, Some(250));
        assert_eq!(rows[0].5, None);
        assert_eq!(rows[0].6, Some(17));
        assert_eq!(rows[1].2, "outcome");
        assert_eq!(rows[1].4, None);
        assert_eq!(rows[1].5, Some(1));
    }

    #[test]
    fn measurement_first_layout_ingests_writer_output() {
        let mut ing = ingestor(500_000, RecordLayout::MeasurementFirst);
        let summary = ing
            .ingest_reader(
                Cursor::new(two_record_file("leader", RecordLayout::MeasurementFirst)),
                Path::new("node_telemetry.bin"),
            )
            .unwrap();
        assert_eq!(summary.stats.batches, 1);
        assert_eq!(count(&ing, "telemetry_point"), 2);
    }

    #[test]
    fn measurements_are_shared_across_files() {
        let mut ing = ingestor(10, RecordLayout::MapFirst);
        for role in ["leader", "follower"] {
            ing.ingest_reader(
                Cursor::new(two_record_file(role, RecordLayout::MapFirst)),
                Path::new("node_telemetry.bin"),
            )
            .unwrap();
        }
        assert_eq!(count(&ing, "measurement"), 2);
        assert_eq!(count(&ing, "testrun"), 1);
        assert_eq!(count(&ing, "testrunrole"), 2);
        assert_eq!(count(&ing, "telemetry_point"), 4);
        assert_eq!(ing.resolver().cache_stats().hits, 2);
    }
}

mod rejection {
    use super::*;
    use tp_common::DimensionError;
    use tp_format::FormatError;

    #[test]
    fn reingesting_a_file_is_a_duplicate_import() {
        let bytes = two_record_file("leader", RecordLayout::MapFirst);
        let mut ing = ingestor(1, RecordLayout::MapFirst);
        ing.ingest_reader(Cursor::new(bytes.clone()), Path::new("a_telemetry.bin"))
            .unwrap();

        let err = ing
            .ingest_reader(Cursor::new(bytes), Path::new("a_telemetry.bin"))
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Dimension(DimensionError::DuplicateImport { .. })
        ));
        assert_eq!(err.exit_code().as_i32(), 21);
        assert_eq!(count(&ing, "telemetry_point"), 2);
        assert_eq!(count(&ing, "testrunrole"), 1);
    }

    #[test]
    fn header_without_region_is_rejected_before_any_row() {
        let mut w = TelemetryWriter::new(
            Vec::new(),
            &[
                ("testrun_id", "abc".into()),
                ("testrun_role", "leader".into()),
                ("aws_instance", "i-1".into()),
            ],
            RecordLayout::MapFirst,
        )
        .unwrap();
        w.log("latency", &[("latency", TaggedValue::Int(1))], 1)
            .unwrap();
        let bytes = w.finish().unwrap();

        let mut ing = ingestor(1, RecordLayout::MapFirst);
        let err = ing
            .ingest_reader(Cursor::new(bytes), Path::new("x_telemetry.bin"))
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Dimension(DimensionError::MissingBinding { .. })
        ));
        assert_eq!(count(&ing, "testrun"), 0);
    }

    #[test]
    fn wrong_attribute_type_aborts_the_batch() {
        let mut w =
            TelemetryWriter::new(Vec::new(), &header("leader"), RecordLayout::MapFirst).unwrap();
        w.log("latency", &[("latency", TaggedValue::Text("fast".into()))], 1)
            .unwrap();
        let bytes = w.finish().unwrap();

        let mut ing = ingestor(1, RecordLayout::MapFirst);
        let err = ing
            .ingest_reader(Cursor::new(bytes), Path::new("x_telemetry.bin"))
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Format(FormatError::ValueTypeMismatch { .. })
        ));
        assert_eq!(count(&ing, "telemetry_point"), 0);
    }

    #[test]
    fn oversized_ticket_number_is_a_store_error() {
        let mut w =
            TelemetryWriter::new(Vec::new(), &header("leader"), RecordLayout::MapFirst).unwrap();
        w.log(
            "latency",
            &[("ticket_number", TaggedValue::UInt(u64::MAX))],
            1,
        )
        .unwrap();
        let bytes = w.finish().unwrap();

        let mut ing = ingestor(1, RecordLayout::MapFirst);
        let err = ing
            .ingest_reader(Cursor::new(bytes), Path::new("x_telemetry.bin"))
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Store(StoreError::IntegerOverflow { .. })
        ));
    }
}

mod corruption {
    use super::*;
    use tp_format::FormatError;

    const MARKER: &[u8] = b"corrupt-me-7f3a9c";

    /// Three records; the second carries `MARKER` as a text value whose
    /// length prefix is then overwritten with 1000.
    fn corrupted_file() -> Vec<u8> {
        let mut w =
            TelemetryWriter::new(Vec::new(), &header("leader"), RecordLayout::MapFirst).unwrap();
        w.log("latency", &[("latency", TaggedValue::Int(1))], 1)
            .unwrap();
        w.log(
            "latency",
            &[(
                "note",
                TaggedValue::Text(String::from_utf8(MARKER.to_vec()).unwrap()),
            )],
            2,
        )
        .unwrap();
        w.log("latency", &[("latency", TaggedValue::Int(3))], 3)
            .unwrap();
        let mut bytes = w.finish().unwrap();

        let at = bytes
            .windows(MARKER.len())
            .position(|window| window == MARKER)
            .unwrap();
        let len_at = at - 8;
        assert_eq!(
            &bytes[len_at..at],
            &(MARKER.len() as u64).to_le_bytes()
        );
        bytes[len_at..at].copy_from_slice(&1000u64.to_le_bytes());
        bytes
    }

    #[test]
    fn overlong_length_fails_without_inserting_the_record() {
        let mut ing = ingestor(1, RecordLayout::MapFirst);
        let err = ing
            .ingest_reader(Cursor::new(corrupted_file()), Path::new("c_telemetry.bin"))
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Format(FormatError::LengthOverrun { declared: 1000, .. })
        ));
        assert_eq!(err.exit_code().as_i32(), 20);

        // only the record handed off before the corruption is stored
        let conn = ing.resolver().store().connection();
        let timestamps: Vec<i64> = conn
            .prepare("SELECT ts FROM telemetry_point")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(timestamps, vec![1]);
    }

    #[test]
    fn overlong_length_in_a_pending_batch_stores_nothing() {
        let mut ing = ingestor(500_000, RecordLayout::MapFirst);
        assert!(ing
            .ingest_reader(Cursor::new(corrupted_file()), Path::new("c_telemetry.bin"))
            .is_err());
        assert_eq!(count(&ing, "telemetry_point"), 0);
    }

    #[test]
    fn truncated_file_is_a_format_error() {
        let mut ing = ingestor(1, RecordLayout::MapFirst);
        let err = ing
            .ingest_reader(Cursor::new(vec![1u8, 2, 3]), Path::new("t_telemetry.bin"))
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Format(FormatError::MissingTrailer { len: 3 })
        ));
    }
}

mod directory_run {
    use super::*;

    fn write(dir: &Path, name: &str, role: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, two_record_file(role, RecordLayout::MapFirst)).unwrap();
        path
    }

    #[test]
    fn ingests_discovered_files_and_writes_summary() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "leader_telemetry.bin", "leader");
        write(dir.path(), "follower_telemetry.bin", "follower");
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let files = discover(dir.path(), "telemetry", ".bin").unwrap();
        assert_eq!(files.len(), 2);

        let mut ing = ingestor(1, RecordLayout::MapFirst);
        let summary = ing.run(&files).unwrap();
        assert_eq!(summary.files.len(), 2);
        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.total_inserted, 4);
        assert_eq!(summary.files[0].testrun_role, "follower");
        assert_eq!(ing.progress().read(), 4);
        assert_eq!(ing.progress().inserted(), 4);

        let out = dir.path().join("summary.json");
        summary.write_json(&out).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["total_inserted"], 4);
        assert_eq!(json["files"][0]["batches"], 2);
    }

    #[test]
    fn run_stops_at_the_first_failing_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a_telemetry.bin", "leader");
        write(dir.path(), "b_telemetry.bin", "leader");
        write(dir.path(), "c_telemetry.bin", "follower");

        let files = discover(dir.path(), "telemetry", ".bin").unwrap();
        let mut ing = ingestor(1, RecordLayout::MapFirst);
        assert!(matches!(
            ing.run(&files),
            Err(IngestError::Dimension(_))
        ));
        assert_eq!(count(&ing, "testrunrole"), 1);
        assert_eq!(count(&ing, "telemetry_point"), 2);
    }

    #[test]
    fn file_backed_store_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "leader_telemetry.bin", "leader");
        let url = format!("sqlite://{}", dir.path().join("out.db").display());

        let mut store = SqliteStore::open(&url).unwrap();
        store.migrate().unwrap();
        let mut ing = Ingestor::new(store, 1, RecordLayout::MapFirst, Progress::silent());
        ing.ingest_file(&path).unwrap();
        drop(ing);

        let reopened = SqliteStore::open(&url).unwrap();
        assert_eq!(reopened.row_count("telemetry_point").unwrap(), 2);
    }
}
