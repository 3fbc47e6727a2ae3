//! Projection of decoded records into `telemetry_point` rows.
//!
//! Each record becomes one row: the file-level dimension ids, the resolved
//! measurement id and the timestamp, followed by whichever attribute columns
//! its map binds. Attribute names without a column are skipped. A tag that
//! the dictionary never bound, or a value whose kind the column cannot hold,
//! aborts the batch.

use crate::schema::{telemetry_point_schema, AttributeColumn, ColumnType};
use arrow_array::builder::{BinaryBuilder, Int64Builder, UInt64Builder, UInt8Builder};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::ArrowError;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tp_common::{FileDimensions, MeasurementId};
use tp_format::{FormatError, KeyDictionary, TaggedValue, TelemetryRecord};

/// Errors raised while projecting a batch.
#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("{records} records but {ids} measurement ids")]
    LengthMismatch { records: usize, ids: usize },
}

/// Per-file mapping from dictionary tag to destination column.
#[derive(Debug, Clone, Default)]
pub struct ColumnBindings {
    by_tag: HashMap<u16, Option<AttributeColumn>>,
}

impl ColumnBindings {
    pub fn from_dictionary(dict: &KeyDictionary) -> Self {
        let by_tag = dict
            .entries()
            .into_iter()
            .map(|(tag, name)| (tag, AttributeColumn::from_attribute(name)))
            .collect();
        Self { by_tag }
    }

    /// Column fed by `tag`, `None` when the name has no column.
    pub fn column_for(&self, tag: u16) -> Result<Option<AttributeColumn>, FormatError> {
        self.by_tag
            .get(&tag)
            .copied()
            .ok_or(FormatError::UnboundTag { tag })
    }

    /// Number of dictionary tags that feed a column.
    pub fn mapped(&self) -> usize {
        self.by_tag.values().filter(|c| c.is_some()).count()
    }
}

enum AttributeBuilder {
    Int64(Int64Builder),
    UInt64(UInt64Builder),
    UInt8(UInt8Builder),
    Bytes(BinaryBuilder),
}

impl AttributeBuilder {
    fn new(column_type: ColumnType, capacity: usize) -> Self {
        match column_type {
            ColumnType::Int64 => Self::Int64(Int64Builder::with_capacity(capacity)),
            ColumnType::UInt64 => Self::UInt64(UInt64Builder::with_capacity(capacity)),
            ColumnType::UInt8 => Self::UInt8(UInt8Builder::with_capacity(capacity)),
            ColumnType::Bytes => Self::Bytes(BinaryBuilder::with_capacity(capacity, capacity * 32)),
        }
    }

    fn append(
        &mut self,
        column: AttributeColumn,
        value: Option<&TaggedValue>,
    ) -> Result<(), FormatError> {
        match (self, value) {
            (Self::Int64(b), None) => b.append_null(),
            (Self::Int64(b), Some(TaggedValue::Int(v))) => b.append_value(*v),
            (Self::UInt64(b), None) => b.append_null(),
            (Self::UInt64(b), Some(TaggedValue::UInt(v))) => b.append_value(*v),
            (Self::UInt8(b), None) => b.append_null(),
            (Self::UInt8(b), Some(TaggedValue::Byte(v))) => b.append_value(*v),
            (Self::Bytes(b), None) => b.append_null(),
            (Self::Bytes(b), Some(TaggedValue::Hash(h))) => b.append_value(h),
            (Self::Bytes(b), Some(TaggedValue::Blob(v))) => b.append_value(v),
            (_, Some(other)) => {
                return Err(FormatError::ValueTypeMismatch {
                    name: column.attribute_name().to_string(),
                    expected: column.column_type().name(),
                    found: other.kind().name(),
                })
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            Self::Int64(b) => Arc::new(b.finish()),
            Self::UInt64(b) => Arc::new(b.finish()),
            Self::UInt8(b) => Arc::new(b.finish()),
            Self::Bytes(b) => Arc::new(b.finish()),
        }
    }
}

/// Column builders for one `telemetry_point` batch.
pub struct PointBatchBuilder {
    trid: Int64Builder,
    trrid: Int64Builder,
    mid: Int64Builder,
    ts: Int64Builder,
    attributes: Vec<AttributeBuilder>,
    rows: usize,
}

impl PointBatchBuilder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            trid: Int64Builder::with_capacity(capacity),
            trrid: Int64Builder::with_capacity(capacity),
            mid: Int64Builder::with_capacity(capacity),
            ts: Int64Builder::with_capacity(capacity),
            attributes: AttributeColumn::ALL
                .iter()
                .map(|col| AttributeBuilder::new(col.column_type(), capacity))
                .collect(),
            rows: 0,
        }
    }

    /// Append the row for `record`.
    ///
    /// On error the builder is left partially filled and must be discarded.
    pub fn push(
        &mut self,
        record: &TelemetryRecord,
        measurement: MeasurementId,
        dims: FileDimensions,
        bindings: &ColumnBindings,
    ) -> Result<(), FormatError> {
        let mut slots: [Option<&TaggedValue>; 12] = [None; 12];
        for (tag, value) in record.attributes.iter() {
            if let Some(column) = bindings.column_for(tag)? {
                slots[column.index()] = Some(value);
            }
        }

        self.trid.append_value(dims.testrun.0);
        self.trrid.append_value(dims.testrun_role.0);
        self.mid.append_value(measurement.0);
        self.ts.append_value(record.timestamp);
        for (column, builder) in AttributeColumn::ALL.iter().zip(self.attributes.iter_mut()) {
            builder.append(*column, slots[column.index()])?;
        }
        self.rows += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn finish(mut self) -> Result<RecordBatch, ArrowError> {
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(self.trid.finish()),
            Arc::new(self.trrid.finish()),
            Arc::new(self.mid.finish()),
            Arc::new(self.ts.finish()),
        ];
        columns.extend(self.attributes.iter_mut().map(AttributeBuilder::finish));
        RecordBatch::try_new(telemetry_point_schema(), columns)
    }
}

/// Project `records` into one batch. `measurements[i]` is the id of
/// `records[i].measurement`.
pub fn project_batch(
    records: &[TelemetryRecord],
    measurements: &[MeasurementId],
    dims: FileDimensions,
    bindings: &ColumnBindings,
) -> Result<RecordBatch, ProjectionError> {
    if records.len() != measurements.len() {
        return Err(ProjectionError::LengthMismatch {
            records: records.len(),
            ids: measurements.len(),
        });
    }
    let mut builder = PointBatchBuilder::with_capacity(records.len());
    for (record, mid) in records.iter().zip(measurements) {
        builder.push(record, *mid, dims, bindings)?;
    }
    Ok(builder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Array, BinaryArray, Int64Array, UInt64Array, UInt8Array};
    use tp_common::{RegionId, TestRunId, TestRunRoleId};

    fn dict() -> KeyDictionary {
        KeyDictionary::from_entries(
            vec![
                ("txid".to_string(), 0),
                ("ticket_number".to_string(), 1),
                ("outcome".to_string(), 2),
                ("latency".to_string(), 3),
                ("address2".to_string(), 5),
                ("note".to_string(), 12),
            ],
            0,
        )
        .unwrap()
    }

    fn dims() -> FileDimensions {
        FileDimensions {
            testrun: TestRunId(1),
            region: RegionId(2),
            testrun_role: TestRunRoleId(3),
        }
    }

    fn record(attrs: Vec<(u16, TaggedValue)>) -> TelemetryRecord {
        TelemetryRecord {
            measurement: 3,
            timestamp: 99,
            attributes: attrs.into_iter().collect(),
        }
    }

    #[test]
    fn bindings_skip_names_without_columns() {
        let bindings = ColumnBindings::from_dictionary(&dict());
        assert_eq!(bindings.column_for(5).unwrap(), Some(AttributeColumn::TxAddress2));
        assert_eq!(bindings.column_for(12).unwrap(), None);
        assert!(matches!(
            bindings.column_for(40),
            Err(FormatError::UnboundTag { tag: 40 })
        ));
        assert_eq!(bindings.mapped(), 5);
    }

    #[test]
    fn projects_values_into_typed_columns() {
        let bindings = ColumnBindings::from_dictionary(&dict());
        let records = vec![
            record(vec![
                (3, TaggedValue::Int(250)),
                (2, TaggedValue::Byte(1)),
                (1, TaggedValue::UInt(u64::MAX)),
                (0, TaggedValue::Hash([7; 32])),
                (12, TaggedValue::Text("ignored".into())),
            ]),
            record(vec![(5, TaggedValue::Blob(vec![1, 2]))]),
        ];
        let batch = project_batch(
            &records,
            &[MeasurementId(10), MeasurementId(11)],
            dims(),
            &bindings,
        )
        .unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 16);
        let trrid = batch
            .column_by_name("trrid")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(trrid.value(1), 3);
        let mid = batch
            .column_by_name("mid")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(mid.value(1), 11);
        let latency = batch
            .column_by_name("latency")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(latency.value(0), 250);
        assert!(latency.is_null(1));
        let tn = batch
            .column_by_name("tn")
            .unwrap()
            .as_any()
            .downcast_ref::<UInt64Array>()
            .unwrap();
        assert_eq!(tn.value(0), u64::MAX);
        let outcome = batch
            .column_by_name("outcome")
            .unwrap()
            .as_any()
            .downcast_ref::<UInt8Array>()
            .unwrap();
        assert_eq!(outcome.value(0), 1);
        let txid = batch
            .column_by_name("txid")
            .unwrap()
            .as_any()
            .downcast_ref::<BinaryArray>()
            .unwrap();
        assert_eq!(txid.value(0), &[7u8; 32][..]);
        assert!(txid.is_null(1));
        let address2 = batch
            .column_by_name("txaddress2")
            .unwrap()
            .as_any()
            .downcast_ref::<BinaryArray>()
            .unwrap();
        assert_eq!(address2.value(1), &[1u8, 2][..]);
    }

    #[test]
    fn kind_mismatch_is_fatal() {
        let bindings = ColumnBindings::from_dictionary(&dict());
        let records = vec![record(vec![(3, TaggedValue::UInt(5))])];
        let err = project_batch(&records, &[MeasurementId(1)], dims(), &bindings).unwrap_err();
        match err {
            ProjectionError::Format(FormatError::ValueTypeMismatch {
                name,
                expected,
                found,
            }) => {
                assert_eq!(name, "latency");
                assert_eq!(expected, "i64");
                assert_eq!(found, "u64");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unbound_attribute_tag_is_fatal() {
        let bindings = ColumnBindings::from_dictionary(&dict());
        let records = vec![record(vec![(77, TaggedValue::Int(1))])];
        let err = project_batch(&records, &[MeasurementId(1)], dims(), &bindings).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::Format(FormatError::UnboundTag { tag: 77 })
        ));
    }

    #[test]
    fn measurement_ids_must_line_up() {
        let bindings = ColumnBindings::from_dictionary(&dict());
        let records = vec![record(vec![(3, TaggedValue::Int(1))])];
        assert!(matches!(
            project_batch(&records, &[], dims(), &bindings),
            Err(ProjectionError::LengthMismatch { records: 1, ids: 0 })
        ));
    }
}
