//! Tagged attribute maps.

use crate::error::{FormatError, Result};
use crate::reader::BodyReader;
use crate::value::{TaggedValue, ValueKind};
use std::collections::HashMap;
use std::io::{self, Read, Write};

/// Smallest possible encoded entry: tag, discriminator, one-byte payload.
const MIN_ENTRY_LEN: u64 = 2 + 1 + 1;

/// Numeric-tag to value map, decoded for one record or one file header.
///
/// Entries keep their wire order; inserting an existing tag replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedMap {
    entries: Vec<(u16, TaggedValue)>,
    /// Position of each tag in `entries`.
    index: HashMap<u16, usize>,
}

impl TaggedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a value, returning the one it replaced.
    pub fn insert(&mut self, tag: u16, value: TaggedValue) -> Option<TaggedValue> {
        match self.index.get(&tag) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(tag, self.entries.len());
                self.entries.push((tag, value));
                None
            }
        }
    }

    pub fn get(&self, tag: u16) -> Option<&TaggedValue> {
        self.index.get(&tag).map(|&pos| &self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &TaggedValue)> + '_ {
        self.entries.iter().map(|(t, v)| (*t, v))
    }

    pub fn tags(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|(t, _)| *t)
    }

    /// Decode one map at the reader's current position.
    ///
    /// A map with zero entries is a structural error.
    pub fn decode<R: Read>(reader: &mut BodyReader<R>) -> Result<Self> {
        let offset = reader.position();
        let count = reader.read_u64("tagged map entry count")?;
        if count == 0 {
            return Err(FormatError::EmptyMap { offset });
        }
        let remaining = reader.remaining();
        if count > remaining / MIN_ENTRY_LEN {
            return Err(FormatError::LengthOverrun {
                what: "tagged map entries",
                offset,
                declared: count.saturating_mul(MIN_ENTRY_LEN),
                remaining,
            });
        }

        let mut map = TaggedMap::with_capacity(count as usize);
        for _ in 0..count {
            let tag = reader.read_u16("tag")?;
            let discriminator_offset = reader.position();
            let discriminator = reader.read_i8("value type")?;
            let kind = ValueKind::from_discriminator(discriminator).ok_or(
                FormatError::UnknownValueType {
                    discriminator,
                    tag,
                    offset: discriminator_offset,
                },
            )?;
            let value = TaggedValue::decode_payload(kind, reader)?;
            map.insert(tag, value);
        }
        Ok(map)
    }

    /// Write the entry count followed by each entry.
    pub fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&(self.entries.len() as u64).to_le_bytes())?;
        for (tag, value) in &self.entries {
            out.write_all(&tag.to_le_bytes())?;
            value.encode(out)?;
        }
        Ok(())
    }
}

impl FromIterator<(u16, TaggedValue)> for TaggedMap {
    fn from_iter<I: IntoIterator<Item = (u16, TaggedValue)>>(iter: I) -> Self {
        let mut map = TaggedMap::new();
        for (tag, value) in iter {
            map.insert(tag, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode(bytes: Vec<u8>) -> Result<TaggedMap> {
        let end = bytes.len() as u64;
        let mut reader = BodyReader::new(Cursor::new(bytes), 0, end);
        TaggedMap::decode(&mut reader)
    }

    #[test]
    fn zero_entries_is_an_error() {
        let err = decode(0u64.to_le_bytes().to_vec()).unwrap_err();
        assert!(matches!(err, FormatError::EmptyMap { offset: 0 }));
    }

    #[test]
    fn unknown_discriminator_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.push(9);
        bytes.push(0);
        match decode(bytes).unwrap_err() {
            FormatError::UnknownValueType {
                discriminator,
                tag,
                offset,
            } => {
                assert_eq!(discriminator, 9);
                assert_eq!(tag, 4);
                assert_eq!(offset, 10);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn absurd_entry_count_fails_fast() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        assert!(matches!(
            decode(bytes).unwrap_err(),
            FormatError::LengthOverrun { .. }
        ));
    }

    #[test]
    fn repeated_tag_keeps_last_value() {
        let map: TaggedMap = vec![
            (1, TaggedValue::Int(1)),
            (2, TaggedValue::Byte(2)),
            (1, TaggedValue::Int(3)),
        ]
        .into_iter()
        .collect();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(1), Some(&TaggedValue::Int(3)));
    }

    #[test]
    fn wide_map_with_repeats_decodes_in_wire_order() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(2 * 5000u64).to_le_bytes());
        for round in 0..2i64 {
            for tag in 0..5000u16 {
                bytes.extend_from_slice(&tag.to_le_bytes());
                TaggedValue::Int(round * 10_000 + i64::from(tag))
                    .encode(&mut bytes)
                    .unwrap();
            }
        }
        let map = decode(bytes).unwrap();
        assert_eq!(map.len(), 5000);
        assert!(map.tags().eq(0..5000u16));
        assert_eq!(map.get(0), Some(&TaggedValue::Int(10_000)));
        assert_eq!(map.get(4999), Some(&TaggedValue::Int(14_999)));
        assert_eq!(map.get(5000), None);
    }

    #[test]
    fn encoded_map_decodes_back() {
        let map: TaggedMap = vec![
            (0, TaggedValue::Hash([9; 32])),
            (3, TaggedValue::Int(-12)),
            (7, TaggedValue::Blob(vec![])),
        ]
        .into_iter()
        .collect();
        let mut bytes = Vec::new();
        map.encode(&mut bytes).unwrap();
        assert_eq!(decode(bytes).unwrap(), map);
    }
}
