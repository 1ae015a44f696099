//! Group traversal for both storage styles: old-style symbol tables
//! (B-tree v1 + local heap) and new-style compact link messages.

use crate::btree_v1::collect_symbol_table_nodes;
use crate::bytes::{is_undefined_address, read_sized};
use crate::error::FormatError;
use crate::link_message::{LinkMessage, LinkTarget};
use crate::local_heap::LocalHeap;
use crate::message_type::MessageType;
use crate::object_header::ObjectHeader;
use crate::superblock::Superblock;
use crate::symbol_table::{SymbolTableMessage, SymbolTableNode};

/// A named hard link inside a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    pub object_header_address: u64,
}

/// List the hard-linked members of a group, in storage order.
///
/// Soft and external links are not followed.
pub fn group_entries(
    data: &[u8],
    header: &ObjectHeader,
    offset_size: u8,
    length_size: u8,
) -> Result<Vec<GroupEntry>, FormatError> {
    if let Some(msg) = header.find(MessageType::SymbolTable) {
        let stab = SymbolTableMessage::parse(&msg.data, offset_size)?;
        return symbol_table_entries(data, &stab, offset_size, length_size);
    }
    if let Some(msg) = header.find(MessageType::LinkInfo) {
        if dense_heap_address(&msg.data, offset_size)?.is_some() {
            return Err(FormatError::UnsupportedGroupStorage("dense link storage"));
        }
    }
    let mut entries = Vec::new();
    for msg in header.find_all(MessageType::Link) {
        let link = LinkMessage::parse(&msg.data, offset_size)?;
        if let LinkTarget::Hard {
            object_header_address,
        } = link.target
        {
            entries.push(GroupEntry {
                name: link.name,
                object_header_address,
            });
        }
    }
    Ok(entries)
}

fn symbol_table_entries(
    data: &[u8],
    stab: &SymbolTableMessage,
    offset_size: u8,
    length_size: u8,
) -> Result<Vec<GroupEntry>, FormatError> {
    let heap = LocalHeap::parse(
        data,
        stab.local_heap_address as usize,
        offset_size,
        length_size,
    )?;
    let mut entries = Vec::new();
    for snod in collect_symbol_table_nodes(data, stab.btree_address, offset_size, length_size)? {
        let node = SymbolTableNode::parse(data, snod as usize, offset_size)?;
        for entry in node.entries {
            entries.push(GroupEntry {
                name: heap.read_string(data, entry.link_name_offset)?,
                object_header_address: entry.object_header_address,
            });
        }
    }
    Ok(entries)
}

/// Fractal heap address of a link info message, if links are stored densely.
fn dense_heap_address(data: &[u8], offset_size: u8) -> Result<Option<u64>, FormatError> {
    let flags = data.get(1).copied().unwrap_or(0);
    // version, flags, optional max creation order
    let pos = if flags & 0x01 != 0 { 10 } else { 2 };
    let address = read_sized(data, pos, offset_size)?;
    Ok((!is_undefined_address(address, offset_size)).then_some(address))
}

/// Resolve a slash-separated path to an object header address.
///
/// The empty path and `/` resolve to the root group.
pub fn resolve_path(data: &[u8], superblock: &Superblock, path: &str) -> Result<u64, FormatError> {
    let os = superblock.offset_size;
    let ls = superblock.length_size;
    let mut address = superblock.root_group_address;
    for component in path.split('/').filter(|c| !c.is_empty()) {
        let header = ObjectHeader::parse(data, address as usize, os, ls)?;
        if !header.is_group() {
            return Err(FormatError::PathNotFound(path.to_string()));
        }
        address = group_entries(data, &header, os, ls)?
            .into_iter()
            .find(|e| e.name == component)
            .map(|e| e.object_header_address)
            .ok_or_else(|| FormatError::PathNotFound(path.to_string()))?;
    }
    Ok(address)
}
