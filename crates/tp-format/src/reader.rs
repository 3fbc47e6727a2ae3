//! Bounded, position-tracking reader.
//!
//! Every read is checked against a logical end offset before it touches the
//! underlying source, so a corrupt length prefix is reported as a
//! [`FormatError`] instead of triggering a huge allocation.

use crate::error::{FormatError, Result};
use std::io::{ErrorKind, Read};

/// Reader over the region `[position, end)` of a telemetry file.
#[derive(Debug)]
pub struct BodyReader<R> {
    inner: R,
    position: u64,
    end: u64,
}

impl<R: Read> BodyReader<R> {
    /// Wrap `inner`, which must currently sit at absolute offset `start`.
    pub fn new(inner: R, start: u64, end: u64) -> Self {
        Self {
            inner,
            position: start,
            end,
        }
    }

    /// Absolute offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Logical end offset of the readable region.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Bytes left before the logical end.
    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.position)
    }

    /// True once the logical end has been reached.
    pub fn at_end(&self) -> bool {
        self.position >= self.end
    }

    /// Release the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self, buf: &mut [u8], what: &'static str) -> Result<()> {
        let offset = self.position;
        if buf.len() as u64 > self.remaining() {
            return Err(FormatError::Truncated { what, offset });
        }
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => FormatError::Truncated { what, offset },
            _ => FormatError::Io(e),
        })?;
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Read a fixed number of raw bytes.
    pub fn read_array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf, what)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self, what: &'static str) -> Result<u8> {
        Ok(self.read_array::<1>(what)?[0])
    }

    pub fn read_i8(&mut self, what: &'static str) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array(what)?))
    }

    pub fn read_u16(&mut self, what: &'static str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array(what)?))
    }

    pub fn read_i64(&mut self, what: &'static str) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array(what)?))
    }

    pub fn read_u64(&mut self, what: &'static str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array(what)?))
    }

    /// Read an 8-byte length followed by that many bytes.
    pub fn read_len_prefixed(&mut self, what: &'static str) -> Result<Vec<u8>> {
        let offset = self.position;
        let declared = self.read_u64(what)?;
        let remaining = self.remaining();
        if declared > remaining {
            return Err(FormatError::LengthOverrun {
                what,
                offset,
                declared,
                remaining,
            });
        }
        // declared <= remaining, and remaining fits the source, so it fits usize
        let mut buf = vec![0u8; declared as usize];
        self.fill(&mut buf, what)?;
        Ok(buf)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self, what: &'static str) -> Result<String> {
        let offset = self.position;
        let bytes = self.read_len_prefixed(what)?;
        String::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8 { what, offset })
    }
}
