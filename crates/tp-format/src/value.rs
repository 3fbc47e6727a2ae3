//! Runtime-typed attribute values.

use crate::error::Result;
use crate::reader::BodyReader;
use crate::HASH_LEN;
use std::fmt;
use std::io::{self, Read, Write};

/// The six payload kinds a tagged value can carry.
///
/// The discriminator is the byte written before each payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Text,
    Hash,
    Byte,
    UInt,
    Blob,
}

impl ValueKind {
    /// Wire discriminator for this kind.
    pub fn discriminator(self) -> i8 {
        match self {
            ValueKind::Int => 0,
            ValueKind::Text => 1,
            ValueKind::Hash => 2,
            ValueKind::Byte => 3,
            ValueKind::UInt => 4,
            ValueKind::Blob => 5,
        }
    }

    /// Kind for a wire discriminator, if it is one of the six known ones.
    pub fn from_discriminator(discriminator: i8) -> Option<Self> {
        match discriminator {
            0 => Some(ValueKind::Int),
            1 => Some(ValueKind::Text),
            2 => Some(ValueKind::Hash),
            3 => Some(ValueKind::Byte),
            4 => Some(ValueKind::UInt),
            5 => Some(ValueKind::Blob),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Int => "i64",
            ValueKind::Text => "text",
            ValueKind::Hash => "hash",
            ValueKind::Byte => "u8",
            ValueKind::UInt => "u64",
            ValueKind::Blob => "blob",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaggedValue {
    Int(i64),
    Text(String),
    Hash([u8; HASH_LEN]),
    Byte(u8),
    UInt(u64),
    Blob(Vec<u8>),
}

impl TaggedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TaggedValue::Int(_) => ValueKind::Int,
            TaggedValue::Text(_) => ValueKind::Text,
            TaggedValue::Hash(_) => ValueKind::Hash,
            TaggedValue::Byte(_) => ValueKind::Byte,
            TaggedValue::UInt(_) => ValueKind::UInt,
            TaggedValue::Blob(_) => ValueKind::Blob,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TaggedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of a hash or blob payload.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TaggedValue::Hash(h) => Some(h),
            TaggedValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Decode the payload of a value whose discriminator has been read.
    pub fn decode_payload<R: Read>(kind: ValueKind, reader: &mut BodyReader<R>) -> Result<Self> {
        let value = match kind {
            ValueKind::Int => TaggedValue::Int(reader.read_i64("i64 value")?),
            ValueKind::Text => TaggedValue::Text(reader.read_string("text value")?),
            ValueKind::Hash => TaggedValue::Hash(reader.read_array("hash value")?),
            ValueKind::Byte => TaggedValue::Byte(reader.read_u8("u8 value")?),
            ValueKind::UInt => TaggedValue::UInt(reader.read_u64("u64 value")?),
            ValueKind::Blob => TaggedValue::Blob(reader.read_len_prefixed("blob value")?),
        };
        Ok(value)
    }

    /// Write the discriminator followed by the payload.
    pub fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.kind().discriminator().to_le_bytes())?;
        match self {
            TaggedValue::Int(v) => out.write_all(&v.to_le_bytes()),
            TaggedValue::Text(s) => write_len_prefixed(out, s.as_bytes()),
            TaggedValue::Hash(h) => out.write_all(h),
            TaggedValue::Byte(b) => out.write_all(&[*b]),
            TaggedValue::UInt(v) => out.write_all(&v.to_le_bytes()),
            TaggedValue::Blob(b) => write_len_prefixed(out, b),
        }
    }
}

pub(crate) fn write_len_prefixed<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    out.write_all(&(bytes.len() as u64).to_le_bytes())?;
    out.write_all(bytes)
}

impl From<i64> for TaggedValue {
    fn from(v: i64) -> Self {
        TaggedValue::Int(v)
    }
}

impl From<u64> for TaggedValue {
    fn from(v: u64) -> Self {
        TaggedValue::UInt(v)
    }
}

impl From<u8> for TaggedValue {
    fn from(v: u8) -> Self {
        TaggedValue::Byte(v)
    }
}

impl From<&str> for TaggedValue {
    fn from(v: &str) -> Self {
        TaggedValue::Text(v.to_string())
    }
}

impl From<String> for TaggedValue {
    fn from(v: String) -> Self {
        TaggedValue::Text(v)
    }
}

impl From<[u8; HASH_LEN]> for TaggedValue {
    fn from(v: [u8; HASH_LEN]) -> Self {
        TaggedValue::Hash(v)
    }
}

impl From<Vec<u8>> for TaggedValue {
    fn from(v: Vec<u8>) -> Self {
        TaggedValue::Blob(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminators_are_stable() {
        for d in 0..=5i8 {
            let kind = ValueKind::from_discriminator(d).unwrap();
            assert_eq!(kind.discriminator(), d);
        }
        assert_eq!(ValueKind::from_discriminator(6), None);
        assert_eq!(ValueKind::from_discriminator(-1), None);
    }

    #[test]
    fn hash_and_blob_expose_bytes() {
        assert_eq!(TaggedValue::Hash([7; HASH_LEN]).as_bytes().unwrap().len(), 32);
        assert_eq!(TaggedValue::Blob(vec![1, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(TaggedValue::Text("x".into()).as_bytes(), None);
    }

    #[test]
    fn text_encoding_is_length_prefixed() {
        let mut out = Vec::new();
        TaggedValue::from("hi").encode(&mut out).unwrap();
        assert_eq!(out[0], 1);
        assert_eq!(&out[1..9], &2u64.to_le_bytes());
        assert_eq!(&out[9..], b"hi");
    }
}
