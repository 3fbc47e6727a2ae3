//! Telemetry records and forward streaming over the record body.

use crate::error::Result;
use crate::reader::BodyReader;
use crate::tagged_map::TaggedMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

/// Field order of a record on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordLayout {
    /// Attribute map, then measurement tag, then timestamp.
    #[default]
    MapFirst,
    /// Measurement tag, then attribute map, then timestamp.
    MeasurementFirst,
}

impl fmt::Display for RecordLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MapFirst => write!(f, "map-first"),
            Self::MeasurementFirst => write!(f, "measurement-first"),
        }
    }
}

impl FromStr for RecordLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "map-first" => Ok(Self::MapFirst),
            "measurement-first" => Ok(Self::MeasurementFirst),
            other => Err(format!(
                "unknown record layout '{other}' (expected map-first or measurement-first)"
            )),
        }
    }
}

/// One decoded measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    /// Dictionary tag naming the measurement.
    pub measurement: u16,
    /// Event time in nanoseconds since the epoch.
    pub timestamp: i64,
    pub attributes: TaggedMap,
}

impl TelemetryRecord {
    pub fn decode<R: Read>(reader: &mut BodyReader<R>, layout: RecordLayout) -> Result<Self> {
        let (measurement, attributes) = match layout {
            RecordLayout::MapFirst => {
                let attributes = TaggedMap::decode(reader)?;
                let measurement = reader.read_u16("measurement tag")?;
                (measurement, attributes)
            }
            RecordLayout::MeasurementFirst => {
                let measurement = reader.read_u16("measurement tag")?;
                let attributes = TaggedMap::decode(reader)?;
                (measurement, attributes)
            }
        };
        let timestamp = reader.read_i64("timestamp")?;
        Ok(Self {
            measurement,
            timestamp,
            attributes,
        })
    }

    pub fn encode<W: Write>(&self, out: &mut W, layout: RecordLayout) -> io::Result<()> {
        match layout {
            RecordLayout::MapFirst => {
                self.attributes.encode(out)?;
                out.write_all(&self.measurement.to_le_bytes())?;
            }
            RecordLayout::MeasurementFirst => {
                out.write_all(&self.measurement.to_le_bytes())?;
                self.attributes.encode(out)?;
            }
        }
        out.write_all(&self.timestamp.to_le_bytes())
    }
}

/// Iterator over the records between the header and the dictionary.
///
/// Stops after the first error; a corrupt body never yields records past the
/// corruption.
pub struct RecordStream<R> {
    reader: BodyReader<R>,
    layout: RecordLayout,
    failed: bool,
}

impl<R: Read> RecordStream<R> {
    pub fn new(reader: BodyReader<R>, layout: RecordLayout) -> Self {
        Self {
            reader,
            layout,
            failed: false,
        }
    }

    /// Absolute offset of the next record.
    pub fn position(&self) -> u64 {
        self.reader.position()
    }
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = Result<TelemetryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.at_end() {
            return None;
        }
        let record = TelemetryRecord::decode(&mut self.reader, self.layout);
        if record.is_err() {
            self.failed = true;
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TaggedValue;
    use crate::FormatError;
    use std::io::Cursor;

    fn sample() -> TelemetryRecord {
        TelemetryRecord {
            measurement: 12,
            timestamp: 1_700_000_000_000,
            attributes: vec![(3, TaggedValue::Int(250))].into_iter().collect(),
        }
    }

    fn stream(bytes: Vec<u8>, layout: RecordLayout) -> RecordStream<Cursor<Vec<u8>>> {
        let end = bytes.len() as u64;
        RecordStream::new(BodyReader::new(Cursor::new(bytes), 0, end), layout)
    }

    #[test]
    fn layouts_parse_and_display() {
        for layout in [RecordLayout::MapFirst, RecordLayout::MeasurementFirst] {
            assert_eq!(layout.to_string().parse::<RecordLayout>().unwrap(), layout);
        }
        assert!("tag-first".parse::<RecordLayout>().is_err());
        assert_eq!(RecordLayout::default(), RecordLayout::MapFirst);
    }

    #[test]
    fn map_first_puts_measurement_after_attributes() {
        let mut bytes = Vec::new();
        sample().encode(&mut bytes, RecordLayout::MapFirst).unwrap();
        // count(8) + tag(2) + disc(1) + i64(8)
        assert_eq!(&bytes[19..21], &12u16.to_le_bytes());
    }

    #[test]
    fn stream_yields_records_until_end() {
        let mut bytes = Vec::new();
        for record in [sample(), sample()] {
            record
                .encode(&mut bytes, RecordLayout::MeasurementFirst)
                .unwrap();
        }
        let records: Vec<_> = stream(bytes, RecordLayout::MeasurementFirst)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records, vec![sample(), sample()]);
    }

    #[test]
    fn stream_stops_after_first_error() {
        let mut bytes = Vec::new();
        sample().encode(&mut bytes, RecordLayout::MapFirst).unwrap();
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 10]);
        let mut s = stream(bytes, RecordLayout::MapFirst);
        assert!(s.next().unwrap().is_ok());
        assert!(matches!(
            s.next().unwrap(),
            Err(FormatError::EmptyMap { .. })
        ));
        assert!(s.next().is_none());
    }
}
