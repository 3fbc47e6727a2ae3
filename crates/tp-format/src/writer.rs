//! Encoder for telemetry files.
//!
//! Names are assigned tags on first use. The twelve standard attribute keys
//! always hold tags 0 through 11 so files from different writers agree on
//! them.

use crate::dictionary::KeyDictionary;
use crate::record::{RecordLayout, TelemetryRecord};
use crate::tagged_map::TaggedMap;
use crate::value::TaggedValue;
use std::collections::HashMap;
use std::io::{self, Write};

/// Pre-assigned attribute keys, indexed by tag.
pub const STANDARD_KEYS: [&str; 12] = [
    "txid",
    "ticket_number",
    "outcome",
    "latency",
    "address",
    "address2",
    "storagekey",
    "storagevalue",
    "codeoffset",
    "locktype",
    "ticket_number2",
    "storagekey2",
];

struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streams a header, records and the trailing dictionary to `W`.
pub struct TelemetryWriter<W: Write> {
    out: CountingWriter<W>,
    tags: HashMap<String, u16>,
    names: Vec<String>,
    layout: RecordLayout,
}

impl<W: Write> TelemetryWriter<W> {
    /// Create a writer and emit the header map.
    pub fn new(out: W, header: &[(&str, TaggedValue)], layout: RecordLayout) -> io::Result<Self> {
        let mut writer = Self {
            out: CountingWriter {
                inner: out,
                written: 0,
            },
            tags: HashMap::new(),
            names: Vec::new(),
            layout,
        };
        for name in STANDARD_KEYS {
            writer.key(name)?;
        }
        let header = writer.compact(header)?;
        header.encode(&mut writer.out)?;
        Ok(writer)
    }

    /// Tag for `name`, assigning the next free one on first use.
    pub fn key(&mut self, name: &str) -> io::Result<u16> {
        if let Some(tag) = self.tags.get(name) {
            return Ok(*tag);
        }
        let tag = u16::try_from(self.names.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "dictionary is full"))?;
        self.tags.insert(name.to_string(), tag);
        self.names.push(name.to_string());
        Ok(tag)
    }

    fn compact(&mut self, details: &[(&str, TaggedValue)]) -> io::Result<TaggedMap> {
        let mut map = TaggedMap::with_capacity(details.len());
        for (name, value) in details {
            let tag = self.key(name)?;
            map.insert(tag, value.clone());
        }
        Ok(map)
    }

    /// Append one record.
    pub fn log(
        &mut self,
        measurement: &str,
        details: &[(&str, TaggedValue)],
        timestamp: i64,
    ) -> io::Result<()> {
        let measurement = self.key(measurement)?;
        let attributes = self.compact(details)?;
        TelemetryRecord {
            measurement,
            timestamp,
            attributes,
        }
        .encode(&mut self.out, self.layout)
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.out.written
    }

    /// Write the dictionary and its offset, returning the sink.
    pub fn finish(mut self) -> io::Result<W> {
        let offset = self.out.written;
        let entries = self
            .names
            .iter()
            .enumerate()
            .map(|(tag, name)| (name.clone(), tag as u16));
        let dict = KeyDictionary::from_entries(entries, offset)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        dict.encode(&mut self.out)?;
        self.out.write_all(&offset.to_le_bytes())?;
        self.out.flush()?;
        Ok(self.out.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn standard_keys_hold_fixed_tags() {
        let mut w = TelemetryWriter::new(Vec::new(), &[], RecordLayout::MapFirst).unwrap();
        assert_eq!(w.key("txid").unwrap(), 0);
        assert_eq!(w.key("storagekey2").unwrap(), 11);
        assert_eq!(w.key("custom").unwrap(), 12);
        assert_eq!(w.key("custom").unwrap(), 12);
    }

    #[test]
    fn trailer_points_at_dictionary() {
        let mut w = TelemetryWriter::new(
            Vec::new(),
            &[("testrun_id", "abc".into())],
            RecordLayout::MapFirst,
        )
        .unwrap();
        w.log("latency", &[("latency", TaggedValue::Int(5))], 1).unwrap();
        let body_end = w.position();
        let bytes = w.finish().unwrap();

        let dict = KeyDictionary::read_from(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(dict.start_offset(), body_end);
        assert_eq!(dict.tag_of("testrun_id"), Some(12));
        assert_eq!(dict.tag_of("latency"), Some(3));
    }
}
