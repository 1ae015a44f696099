//! Symbol table message (0x0011) and symbol table nodes (`SNOD`).

use crate::bytes::{ensure_len, read_sized, read_u16};
use crate::error::FormatError;

const SNOD_SIGNATURE: [u8; 4] = *b"SNOD";

/// Points at the B-tree and local heap of an old-style group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableMessage {
    pub btree_address: u64,
    pub local_heap_address: u64,
}

impl SymbolTableMessage {
    pub fn parse(data: &[u8], offset_size: u8) -> Result<SymbolTableMessage, FormatError> {
        Ok(SymbolTableMessage {
            btree_address: read_sized(data, 0, offset_size)?,
            local_heap_address: read_sized(data, offset_size as usize, offset_size)?,
        })
    }
}

/// One entry of a symbol table node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableEntry {
    /// Offset of the link name in the group's local heap.
    pub link_name_offset: u64,
    pub object_header_address: u64,
}

/// A parsed `SNOD` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableNode {
    pub entries: Vec<SymbolTableEntry>,
}

impl SymbolTableNode {
    pub fn parse(data: &[u8], offset: usize, offset_size: u8) -> Result<SymbolTableNode, FormatError> {
        ensure_len(data, offset, 8)?;
        if data[offset..offset + 4] != SNOD_SIGNATURE {
            return Err(FormatError::InvalidSignature("SNOD"));
        }
        let count = read_u16(data, offset + 6)? as usize;
        let os = offset_size as usize;
        // name offset, header address, cache type, reserved, scratch pad
        let entry_size = 2 * os + 24;
        let mut entries = Vec::with_capacity(count);
        let mut pos = offset + 8;
        for _ in 0..count {
            entries.push(SymbolTableEntry {
                link_name_offset: read_sized(data, pos, offset_size)?,
                object_header_address: read_sized(data, pos + os, offset_size)?,
            });
            pos += entry_size;
        }
        Ok(SymbolTableNode { entries })
    }
}
