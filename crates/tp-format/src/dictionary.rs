//! Trailing key dictionary.
//!
//! The dictionary sits at the end of the file, followed by an 8-byte offset
//! pointing at its first byte:
//!
//! ```text
//! [u64 count] ([u64 len][name bytes][u16 tag])* [u64 dictionary offset]
//! ```

use crate::error::{FormatError, Result};
use crate::reader::BodyReader;
use crate::tagged_map::TaggedMap;
use crate::value::write_len_prefixed;
use crate::TRAILER_LEN;
use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use tracing::debug;

/// Smallest possible encoded entry: empty name length plus tag.
const MIN_ENTRY_LEN: u64 = 8 + 2;

/// Bidirectional name/tag mapping for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDictionary {
    names: HashMap<u16, String>,
    tags: HashMap<String, u16>,
    start_offset: u64,
}

impl KeyDictionary {
    /// Build a dictionary from `(name, tag)` pairs.
    ///
    /// `start_offset` is where the dictionary begins in its file, i.e. the
    /// end of the record body.
    pub fn from_entries<I>(entries: I, start_offset: u64) -> Result<Self>
    where
        I: IntoIterator<Item = (String, u16)>,
    {
        let mut dict = KeyDictionary {
            start_offset,
            ..Default::default()
        };
        for (name, tag) in entries {
            dict.bind(name, tag)?;
        }
        Ok(dict)
    }

    fn bind(&mut self, name: String, tag: u16) -> Result<()> {
        if self.names.contains_key(&tag) {
            return Err(FormatError::DuplicateKey(format!("tag {tag}")));
        }
        if self.tags.contains_key(&name) {
            return Err(FormatError::DuplicateKey(format!("name '{name}'")));
        }
        self.tags.insert(name.clone(), tag);
        self.names.insert(tag, name);
        Ok(())
    }

    /// Read the dictionary from the end of a seekable source.
    ///
    /// Leaves the source positioned somewhere inside the dictionary; callers
    /// rewind before decoding the body.
    pub fn read_from<R: Read + Seek>(src: &mut R) -> Result<Self> {
        let len = src.seek(SeekFrom::End(0))?;
        if len < TRAILER_LEN {
            return Err(FormatError::MissingTrailer { len });
        }
        let trailer = len - TRAILER_LEN;
        src.seek(SeekFrom::Start(trailer))?;
        let mut raw = [0u8; 8];
        src.read_exact(&mut raw).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => FormatError::Truncated {
                what: "dictionary offset",
                offset: trailer,
            },
            _ => FormatError::Io(e),
        })?;
        let start_offset = u64::from_le_bytes(raw);
        if start_offset > trailer {
            return Err(FormatError::BadDictionaryOffset {
                offset: start_offset,
                trailer,
            });
        }

        src.seek(SeekFrom::Start(start_offset))?;
        let mut reader = BodyReader::new(&mut *src, start_offset, trailer);
        let count = reader.read_u64("dictionary entry count")?;
        let remaining = reader.remaining();
        if count > remaining / MIN_ENTRY_LEN {
            return Err(FormatError::LengthOverrun {
                what: "dictionary entries",
                offset: start_offset,
                declared: count.saturating_mul(MIN_ENTRY_LEN),
                remaining,
            });
        }

        let mut dict = KeyDictionary {
            names: HashMap::with_capacity(count as usize),
            tags: HashMap::with_capacity(count as usize),
            start_offset,
        };
        for _ in 0..count {
            let name = reader.read_string("dictionary key name")?;
            let tag = reader.read_u16("dictionary key tag")?;
            dict.bind(name, tag)?;
        }
        if !reader.at_end() {
            debug!(
                unread = reader.remaining(),
                "ignoring bytes between dictionary and trailer"
            );
        }
        Ok(dict)
    }

    /// Write the dictionary entries ordered by tag.
    pub fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&(self.names.len() as u64).to_le_bytes())?;
        for (tag, name) in self.entries() {
            write_len_prefixed(out, name.as_bytes())?;
            out.write_all(&tag.to_le_bytes())?;
        }
        Ok(())
    }

    /// Name bound to `tag`.
    pub fn name_of(&self, tag: u16) -> Option<&str> {
        self.names.get(&tag).map(String::as_str)
    }

    /// Tag bound to `name`.
    pub fn tag_of(&self, name: &str) -> Option<u16> {
        self.tags.get(name).copied()
    }

    /// Name bound to `tag`, or [`FormatError::UnboundTag`].
    pub fn resolve(&self, tag: u16) -> Result<&str> {
        self.name_of(tag).ok_or(FormatError::UnboundTag { tag })
    }

    /// Fail on the first tag of `map` with no dictionary entry.
    pub fn ensure_bound(&self, map: &TaggedMap) -> Result<()> {
        for tag in map.tags() {
            self.resolve(tag)?;
        }
        Ok(())
    }

    /// Offset where the dictionary starts, i.e. the end of the record body.
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All `(tag, name)` pairs ordered by tag.
    pub fn entries(&self) -> Vec<(u16, &str)> {
        let mut entries: Vec<(u16, &str)> = self
            .names
            .iter()
            .map(|(tag, name)| (*tag, name.as_str()))
            .collect();
        entries.sort_unstable_by_key(|(tag, _)| *tag);
        entries
    }
}
