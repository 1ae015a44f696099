//! Version 1 B-trees: group nodes (type 0) and raw-data chunk nodes (type 1).

use crate::bytes::{ensure_len, read_sized, read_u16, read_u32};
use crate::error::FormatError;

const TREE_SIGNATURE: [u8; 4] = *b"TREE";

/// Node type 0: children are symbol table nodes.
const NODE_GROUP: u8 = 0;
/// Node type 1: children are raw data chunks.
const NODE_CHUNK: u8 = 1;

/// One stored chunk of a chunked dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Size of the stored (possibly filtered) chunk in bytes.
    pub size: u32,
    /// Filters skipped for this chunk.
    pub filter_mask: u32,
    /// Element offset of the chunk in each dataset dimension.
    pub offsets: Vec<u64>,
    /// File address of the stored chunk.
    pub address: u64,
}

struct NodeHeader {
    node_type: u8,
    level: u8,
    entries: usize,
    body: usize,
}

fn node_header(data: &[u8], address: u64, offset_size: u8) -> Result<NodeHeader, FormatError> {
    let pos = address as usize;
    ensure_len(data, pos, 8)?;
    if data[pos..pos + 4] != TREE_SIGNATURE {
        return Err(FormatError::InvalidSignature("TREE"));
    }
    Ok(NodeHeader {
        node_type: data[pos + 4],
        level: data[pos + 5],
        entries: read_u16(data, pos + 6)? as usize,
        // skip left and right sibling addresses
        body: pos + 8 + 2 * offset_size as usize,
    })
}

/// Collect the addresses of every symbol table node below a group B-tree root.
pub fn collect_symbol_table_nodes(
    data: &[u8],
    root: u64,
    offset_size: u8,
    length_size: u8,
) -> Result<Vec<u64>, FormatError> {
    let key_size = length_size as usize;
    let os = offset_size as usize;
    let mut leaves = Vec::new();
    let mut stack = vec![root];
    while let Some(address) = stack.pop() {
        let node = node_header(data, address, offset_size)?;
        if node.node_type != NODE_GROUP {
            return Err(FormatError::InvalidSignature("TREE (group node)"));
        }
        let mut children = Vec::with_capacity(node.entries);
        let mut pos = node.body + key_size;
        for _ in 0..node.entries {
            children.push(read_sized(data, pos, offset_size)?);
            pos += os + key_size;
        }
        if node.level == 0 {
            leaves.extend(children);
        } else {
            // reversed so that leaves come out in key order
            stack.extend(children.into_iter().rev());
        }
    }
    Ok(leaves)
}

/// Collect every chunk record below a chunk B-tree root.
///
/// `rank` is the dataset rank; keys carry `rank + 1` offsets, the last one
/// being the byte offset within an element (always zero).
pub fn collect_chunks(
    data: &[u8],
    root: u64,
    offset_size: u8,
    rank: usize,
) -> Result<Vec<ChunkRecord>, FormatError> {
    let key_size = 8 + 8 * (rank + 1);
    let os = offset_size as usize;
    let mut chunks = Vec::new();
    let mut stack = vec![root];
    while let Some(address) = stack.pop() {
        let node = node_header(data, address, offset_size)?;
        if node.node_type != NODE_CHUNK {
            return Err(FormatError::InvalidSignature("TREE (chunk node)"));
        }
        let mut pos = node.body;
        let mut children = Vec::with_capacity(node.entries);
        for _ in 0..node.entries {
            let size = read_u32(data, pos)?;
            let filter_mask = read_u32(data, pos + 4)?;
            let mut offsets = Vec::with_capacity(rank);
            for d in 0..rank {
                offsets.push(read_sized(data, pos + 8 + 8 * d, 8)?);
            }
            let child = read_sized(data, pos + key_size, offset_size)?;
            children.push(ChunkRecord {
                size,
                filter_mask,
                offsets,
                address: child,
            });
            pos += key_size + os;
        }
        if node.level == 0 {
            chunks.extend(children);
        } else {
            stack.extend(children.into_iter().rev().map(|c| c.address));
        }
    }
    Ok(chunks)
}
