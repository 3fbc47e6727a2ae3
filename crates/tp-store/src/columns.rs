//! Typed access to the columns of a projected `telemetry_point` batch.

use crate::error::StoreError;
use arrow_array::{Array, ArrayRef, BinaryArray, Int64Array, RecordBatch, UInt64Array, UInt8Array};
use arrow_schema::DataType;

/// One value ready for a backend, already range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cell<'a> {
    Null,
    Int(i64),
    Bytes(&'a [u8]),
}

#[derive(Clone, Copy)]
enum ColumnValues<'a> {
    Int64(&'a Int64Array),
    UInt64(&'a UInt64Array),
    UInt8(&'a UInt8Array),
    Binary(&'a BinaryArray),
}

pub(crate) struct BoundColumn<'a> {
    pub(crate) name: &'static str,
    values: ColumnValues<'a>,
    nulls: &'a ArrayRef,
}

impl<'a> BoundColumn<'a> {
    /// Value at `row`. Unsigned values above `i64::MAX` are an error.
    pub(crate) fn cell(&self, row: usize) -> Result<Cell<'a>, StoreError> {
        if self.nulls.is_null(row) {
            return Ok(Cell::Null);
        }
        let cell = match self.values {
            ColumnValues::Int64(a) => Cell::Int(a.value(row)),
            ColumnValues::UInt64(a) => {
                let raw = a.value(row);
                Cell::Int(
                    i64::try_from(raw).map_err(|_| StoreError::IntegerOverflow {
                        column: self.name.to_string(),
                        value: raw,
                    })?,
                )
            }
            ColumnValues::UInt8(a) => Cell::Int(i64::from(a.value(row))),
            ColumnValues::Binary(a) => Cell::Bytes(a.value(row)),
        };
        Ok(cell)
    }
}

/// Check `batch` against the fact table layout and borrow its typed arrays.
pub(crate) fn bind_columns(batch: &RecordBatch) -> Result<Vec<BoundColumn<'_>>, StoreError> {
    let expected = tp_telemetry::column_names();
    let schema = batch.schema();
    if schema.fields().len() != expected.len() {
        return Err(StoreError::SchemaMismatch {
            index: schema.fields().len().min(expected.len()),
            expected: expected.join(","),
            found: format!("{} columns", schema.fields().len()),
        });
    }

    let mut bound = Vec::with_capacity(expected.len());
    for (index, (name, array)) in expected.iter().zip(batch.columns()).enumerate() {
        let field = schema.field(index);
        let mismatch = || StoreError::SchemaMismatch {
            index,
            expected: (*name).to_string(),
            found: format!("{} {}", field.name(), field.data_type()),
        };
        if field.name().as_str() != *name {
            return Err(mismatch());
        }
        let values = match array.data_type() {
            DataType::Int64 => array
                .as_any()
                .downcast_ref::<Int64Array>()
                .map(ColumnValues::Int64),
            DataType::UInt64 => array
                .as_any()
                .downcast_ref::<UInt64Array>()
                .map(ColumnValues::UInt64),
            DataType::UInt8 => array
                .as_any()
                .downcast_ref::<UInt8Array>()
                .map(ColumnValues::UInt8),
            DataType::Binary => array
                .as_any()
                .downcast_ref::<BinaryArray>()
                .map(ColumnValues::Binary),
            _ => None,
        }
        .ok_or_else(mismatch)?;
        bound.push(BoundColumn {
            name: *name,
            values,
            nulls: array,
        });
    }
    Ok(bound)
}
