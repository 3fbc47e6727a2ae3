//! Store-free decoding of a single telemetry file.

use crate::error::IngestError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tp_format::{
    BodyReader, FileHeader, KeyDictionary, RecordLayout, RecordStream, TaggedMap, TaggedValue,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DictionaryEntry {
    pub tag: u16,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderEntry {
    pub name: String,
    pub kind: &'static str,
    pub value: String,
}

/// What a telemetry file contains.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub layout: RecordLayout,
    pub dictionary_offset: u64,
    pub dictionary: Vec<DictionaryEntry>,
    pub header: Vec<HeaderEntry>,
    /// Required bindings, when all four are present.
    pub file_header: Option<FileHeader>,
    pub records: u64,
    /// Record count per measurement name.
    pub measurements: BTreeMap<String, u64>,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
}

pub fn inspect_file(path: &Path, layout: RecordLayout) -> Result<InspectReport, IngestError> {
    let file = File::open(path).map_err(IngestError::io(path))?;
    inspect_reader(file, layout)
}

/// Decode every record of `src` without touching a store.
pub fn inspect_reader<R: Read + Seek>(
    mut src: R,
    layout: RecordLayout,
) -> Result<InspectReport, IngestError> {
    let dict = KeyDictionary::read_from(&mut src)?;
    src.seek(SeekFrom::Start(0))
        .map_err(IngestError::io("<input>"))?;
    let mut reader = BodyReader::new(BufReader::new(src), 0, dict.start_offset());
    let header_map = TaggedMap::decode(&mut reader)?;

    let mut header = Vec::with_capacity(header_map.len());
    for (tag, value) in header_map.iter() {
        header.push(HeaderEntry {
            name: dict.resolve(tag)?.to_string(),
            kind: value.kind().name(),
            value: describe(value),
        });
    }

    let mut report = InspectReport {
        layout,
        dictionary_offset: dict.start_offset(),
        dictionary: dict
            .entries()
            .into_iter()
            .map(|(tag, name)| DictionaryEntry {
                tag,
                name: name.to_string(),
            })
            .collect(),
        header,
        file_header: FileHeader::from_map(&header_map, &dict).ok(),
        records: 0,
        measurements: BTreeMap::new(),
        first_timestamp: None,
        last_timestamp: None,
    };

    for record in RecordStream::new(reader, layout) {
        let record = record?;
        dict.ensure_bound(&record.attributes)?;
        let name = dict.resolve(record.measurement)?;
        *report.measurements.entry(name.to_string()).or_default() += 1;
        report.records += 1;
        report.first_timestamp.get_or_insert(record.timestamp);
        report.last_timestamp = Some(record.timestamp);
    }
    Ok(report)
}

fn describe(value: &TaggedValue) -> String {
    match value {
        TaggedValue::Int(v) => v.to_string(),
        TaggedValue::Text(s) => s.clone(),
        TaggedValue::Byte(v) => v.to_string(),
        TaggedValue::UInt(v) => v.to_string(),
        TaggedValue::Hash(bytes) => hex::encode(bytes),
        TaggedValue::Blob(bytes) => hex::encode(bytes),
    }
}
