//! Arrow schema of the `telemetry_point` fact table.

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;
use tp_format::ValueKind;

/// Columns populated for every row, in table order.
pub const KEY_COLUMNS: [&str; 4] = ["trid", "trrid", "mid", "ts"];

/// Storage type of an attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    UInt64,
    UInt8,
    /// Raw bytes; accepts both hash and blob values.
    Bytes,
}

impl ColumnType {
    /// Whether a decoded value of `kind` may be stored in this column.
    pub fn accepts(self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (ColumnType::Int64, ValueKind::Int)
                | (ColumnType::UInt64, ValueKind::UInt)
                | (ColumnType::UInt8, ValueKind::Byte)
                | (ColumnType::Bytes, ValueKind::Hash | ValueKind::Blob)
        )
    }

    pub fn data_type(self) -> DataType {
        match self {
            ColumnType::Int64 => DataType::Int64,
            ColumnType::UInt64 => DataType::UInt64,
            ColumnType::UInt8 => DataType::UInt8,
            ColumnType::Bytes => DataType::Binary,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int64 => "i64",
            ColumnType::UInt64 => "u64",
            ColumnType::UInt8 => "u8",
            ColumnType::Bytes => "bytes",
        }
    }
}

/// Nullable attribute columns of `telemetry_point`, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeColumn {
    Tn,
    Txid,
    Latency,
    Outcome,
    TxAddress,
    TxAddress2,
    StoKey,
    StoValue,
    CodeOffset,
    LockType,
    Tn2,
    StoKey2,
}

impl AttributeColumn {
    pub const ALL: [AttributeColumn; 12] = [
        AttributeColumn::Tn,
        AttributeColumn::Txid,
        AttributeColumn::Latency,
        AttributeColumn::Outcome,
        AttributeColumn::TxAddress,
        AttributeColumn::TxAddress2,
        AttributeColumn::StoKey,
        AttributeColumn::StoValue,
        AttributeColumn::CodeOffset,
        AttributeColumn::LockType,
        AttributeColumn::Tn2,
        AttributeColumn::StoKey2,
    ];

    /// Destination column name.
    pub fn column_name(self) -> &'static str {
        match self {
            AttributeColumn::Tn => "tn",
            AttributeColumn::Txid => "txid",
            AttributeColumn::Latency => "latency",
            AttributeColumn::Outcome => "outcome",
            AttributeColumn::TxAddress => "txaddress",
            AttributeColumn::TxAddress2 => "txaddress2",
            AttributeColumn::StoKey => "stokey",
            AttributeColumn::StoValue => "stovalue",
            AttributeColumn::CodeOffset => "codeoffset",
            AttributeColumn::LockType => "locktype",
            AttributeColumn::Tn2 => "tn2",
            AttributeColumn::StoKey2 => "stokey2",
        }
    }

    /// Attribute name, as found in a file dictionary, feeding this column.
    pub fn attribute_name(self) -> &'static str {
        match self {
            AttributeColumn::Tn => "ticket_number",
            AttributeColumn::Txid => "txid",
            AttributeColumn::Latency => "latency",
            AttributeColumn::Outcome => "outcome",
            AttributeColumn::TxAddress => "address",
            AttributeColumn::TxAddress2 => "address2",
            AttributeColumn::StoKey => "storagekey",
            AttributeColumn::StoValue => "storagevalue",
            AttributeColumn::CodeOffset => "codeoffset",
            AttributeColumn::LockType => "locktype",
            AttributeColumn::Tn2 => "ticket_number2",
            AttributeColumn::StoKey2 => "storagekey2",
        }
    }

    pub fn from_attribute(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|col| col.attribute_name() == name)
    }

    pub fn column_type(self) -> ColumnType {
        match self {
            AttributeColumn::Latency => ColumnType::Int64,
            AttributeColumn::Tn | AttributeColumn::CodeOffset | AttributeColumn::Tn2 => {
                ColumnType::UInt64
            }
            AttributeColumn::Outcome | AttributeColumn::LockType => ColumnType::UInt8,
            AttributeColumn::Txid
            | AttributeColumn::TxAddress
            | AttributeColumn::TxAddress2
            | AttributeColumn::StoKey
            | AttributeColumn::StoValue
            | AttributeColumn::StoKey2 => ColumnType::Bytes,
        }
    }

    /// Position among the attribute columns.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// All sixteen column names in table order.
pub fn column_names() -> Vec<&'static str> {
    KEY_COLUMNS
        .iter()
        .copied()
        .chain(AttributeColumn::ALL.iter().map(|c| c.column_name()))
        .collect()
}

/// Arrow schema for the `telemetry_point` table.
pub fn telemetry_point_schema() -> SchemaRef {
    let mut fields: Vec<Field> = KEY_COLUMNS
        .iter()
        .map(|name| Field::new(*name, DataType::Int64, false))
        .collect();
    fields.extend(
        AttributeColumn::ALL
            .iter()
            .map(|col| Field::new(col.column_name(), col.column_type().data_type(), true)),
    );
    Arc::new(Schema::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_matches_table_column_order() {
        let schema = telemetry_point_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec![
                "trid", "trrid", "mid", "ts", "tn", "txid", "latency", "outcome", "txaddress",
                "txaddress2", "stokey", "stovalue", "codeoffset", "locktype", "tn2", "stokey2"
            ]
        );
        assert_eq!(names, column_names());
        assert!(!schema.field(0).is_nullable());
        assert!(schema.field(4).is_nullable());
    }

    #[test]
    fn index_follows_declaration_order() {
        for (i, col) in AttributeColumn::ALL.iter().enumerate() {
            assert_eq!(col.index(), i);
        }
    }

    #[test]
    fn attribute_names_map_to_columns() {
        assert_eq!(
            AttributeColumn::from_attribute("address2"),
            Some(AttributeColumn::TxAddress2)
        );
        assert_eq!(
            AttributeColumn::from_attribute("ticket_number"),
            Some(AttributeColumn::Tn)
        );
        assert_eq!(AttributeColumn::from_attribute("testrun_id"), None);
    }

    #[test]
    fn bytes_columns_accept_hash_and_blob_only() {
        assert!(ColumnType::Bytes.accepts(ValueKind::Hash));
        assert!(ColumnType::Bytes.accepts(ValueKind::Blob));
        assert!(!ColumnType::Bytes.accepts(ValueKind::Text));
        assert!(!ColumnType::UInt64.accepts(ValueKind::Int));
    }
}
