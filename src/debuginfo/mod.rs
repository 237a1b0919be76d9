//! Debug-data containers shipped next to compiled kernels.
//!
//! Two layouts exist. [`KernelBlobs`] carries, per kernel, a padded name
//! followed by its vISA and GenISA debug blobs. [`LineTables`] carries a
//! string table, a directory table, a file table and one line table per
//! kernel that has debug data. Both start with a magic word that tells them
//! apart; [`decode`] dispatches on it.

pub mod blobs;
pub mod headers;
pub mod lines;

#[cfg(test)]
mod tests;

use std::fmt;

use bytemuck::Pod;
use serde::Serialize;

pub use blobs::{KernelBlob, KernelBlobs};
pub use lines::{KernelLines, LineEntry, LineTables, SourceFile};

use headers::{swap_to_le, KERNEL_BLOBS_MAGIC, LINE_TABLES_MAGIC, SIZE_FIELD_OFFSET};

/// OpenCL debugger variables such as `__ocl_dbg_gid0`.
pub fn is_special_debug_variable(name: &str) -> bool {
    name.starts_with("__ocl_dbg")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated {what} at offset {offset}: need {needed} byte(s), {available} left")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("unknown debug-data magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported debug-data version {0}")]
    UnsupportedVersion(u32),
    #[error("header declares {declared} byte(s) but the container holds {actual}")]
    SizeMismatch { declared: u32, actual: usize },
    #[error("{table} table declares {declared} byte(s) but holds {actual}")]
    TableSize {
        table: &'static str,
        declared: u32,
        actual: usize,
    },
    #[error("malformed string at offset {offset}")]
    InvalidString { offset: usize },
    #[error("{what} index {index} out of range (have {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: u32,
        len: usize,
    },
}

/// A decoded container of either layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DebugData {
    Blobs(KernelBlobs),
    Lines(LineTables),
}

impl fmt::Display for DebugData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugData::Blobs(b) => b.fmt(f),
            DebugData::Lines(l) => l.fmt(f),
        }
    }
}

/// Decode a container, picking the layout from its magic word.
pub fn decode(bytes: &[u8]) -> Result<DebugData, DecodeError> {
    let magic = Reader::new(bytes).u32("magic")?;
    match magic {
        KERNEL_BLOBS_MAGIC => KernelBlobs::decode(bytes).map(DebugData::Blobs),
        LINE_TABLES_MAGIC => LineTables::decode(bytes).map(DebugData::Lines),
        other => Err(DecodeError::BadMagic(other)),
    }
}

/// Source position packed into one word: line in bits 0..20, column in
/// bits 20..32. Out-of-range values saturate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LineColumn {
    pub line: u32,
    pub column: u32,
}

impl LineColumn {
    pub const LINE_BITS: u32 = 20;
    pub const MAX_LINE: u32 = (1 << Self::LINE_BITS) - 1;
    pub const MAX_COLUMN: u32 = (1 << (32 - Self::LINE_BITS)) - 1;

    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line: line.min(Self::MAX_LINE),
            column: column.min(Self::MAX_COLUMN),
        }
    }

    pub fn pack(self) -> u32 {
        self.line.min(Self::MAX_LINE) | (self.column.min(Self::MAX_COLUMN) << Self::LINE_BITS)
    }

    pub fn unpack(word: u32) -> Self {
        Self {
            line: word & Self::MAX_LINE,
            column: word >> Self::LINE_BITS,
        }
    }
}

impl fmt::Display for LineColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Bytes `len` rounds up to a multiple of four.
pub(crate) fn dword_align(len: usize) -> usize {
    len.div_ceil(4) * 4
}

// ─── Byte cursors ─────────────────────────────────────────────────

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::Truncated {
                what,
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn header<T: Pod>(&mut self, what: &'static str) -> Result<T, DecodeError> {
        let raw = self.take(std::mem::size_of::<T>(), what)?;
        Ok(swap_to_le(bytemuck::pod_read_unaligned(raw)))
    }

    pub(crate) fn u32(&mut self, what: &'static str) -> Result<u32, DecodeError> {
        self.header::<u32>(what)
    }

    /// A name stored in `size` bytes: NUL-terminated, zero padded.
    pub(crate) fn padded_name(&mut self, size: u32) -> Result<String, DecodeError> {
        let offset = self.pos;
        let raw = self.take(size as usize, "kernel name")?;
        let end = raw
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::InvalidString { offset })?;
        String::from_utf8(raw[..end].to_vec()).map_err(|_| DecodeError::InvalidString { offset })
    }

    /// One NUL-terminated string.
    pub(crate) fn c_string(&mut self) -> Result<String, DecodeError> {
        let offset = self.pos;
        let rest = &self.bytes[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::InvalidString { offset })?;
        self.pos += end + 1;
        String::from_utf8(rest[..end].to_vec()).map_err(|_| DecodeError::InvalidString { offset })
    }
}

#[derive(Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn header<T: Pod>(&mut self, value: T) {
        self.buf
            .extend_from_slice(bytemuck::bytes_of(&swap_to_le(value)));
    }

    pub(crate) fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn c_string(&mut self, s: &str) {
        assert!(!s.contains('\0'), "debug-data string {:?} contains NUL", s);
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// Write `s` NUL-terminated in a field of `dword_align(s.len() + 1)`
    /// bytes counted from the field's own start.
    pub(crate) fn padded_name(&mut self, s: &str) {
        let start = self.buf.len();
        self.c_string(s);
        self.buf.resize(start + dword_align(s.len() + 1), 0);
    }

    /// Zero-fill to the next DWORD boundary of the whole buffer.
    pub(crate) fn pad(&mut self) {
        self.buf.resize(dword_align(self.buf.len()), 0);
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Patch the program header's `size` field and return the bytes.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        let size = u32::try_from(self.buf.len()).unwrap_or(u32::MAX);
        self.buf[SIZE_FIELD_OFFSET..SIZE_FIELD_OFFSET + 4].copy_from_slice(&size.to_le_bytes());
        self.buf
    }
}

/// Check a decoded header's version and size against the container.
pub(crate) fn check_envelope(version: u32, size: u32, actual: usize) -> Result<(), DecodeError> {
    if version != headers::VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    if size as usize != actual {
        return Err(DecodeError::SizeMismatch {
            declared: size,
            actual,
        });
    }
    Ok(())
}
