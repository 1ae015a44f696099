//! Local heap parsing: the name store of old-style (symbol table) groups.

use crate::bytes::{c_string, ensure_len, read_sized};
use crate::error::FormatError;

const HEAP_SIGNATURE: [u8; 4] = *b"HEAP";

/// A parsed local heap header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalHeap {
    pub data_segment_size: u64,
    pub data_segment_address: u64,
}

impl LocalHeap {
    /// Parse the heap header at `offset`.
    pub fn parse(
        data: &[u8],
        offset: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<LocalHeap, FormatError> {
        ensure_len(data, offset, 8)?;
        if data[offset..offset + 4] != HEAP_SIGNATURE {
            return Err(FormatError::InvalidSignature("HEAP"));
        }
        if data[offset + 4] != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "local heap",
                version: data[offset + 4],
            });
        }
        let ls = length_size as usize;
        let data_segment_size = read_sized(data, offset + 8, length_size)?;
        // free list head (length_size) sits between size and address
        let data_segment_address = read_sized(data, offset + 8 + 2 * ls, offset_size)?;
        Ok(LocalHeap {
            data_segment_size,
            data_segment_address,
        })
    }

    /// Read the NUL-terminated string at `offset` within the data segment.
    pub fn read_string(&self, data: &[u8], offset: u64) -> Result<String, FormatError> {
        if offset >= self.data_segment_size {
            return Err(FormatError::UnexpectedEof {
                expected: offset as usize + 1,
                available: self.data_segment_size as usize,
            });
        }
        let start = (self.data_segment_address + offset) as usize;
        let end = (self.data_segment_address + self.data_segment_size) as usize;
        ensure_len(data, start, end - start)?;
        Ok(c_string(&data[start..end]))
    }
}
