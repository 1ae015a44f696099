//! Data layout message parsing (message type 0x0008), versions 3 and 4.

use crate::bytes::{ensure_len, is_undefined_address, read_sized, read_u16, read_u32};
use crate::error::FormatError;

/// Where and how the raw data of a dataset is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLayout {
    /// Raw data embedded in the layout message itself.
    Compact { data: Vec<u8> },
    /// One contiguous block; `address` is `None` when never written.
    Contiguous { address: Option<u64>, size: u64 },
    /// Fixed-size chunks indexed by a version 1 B-tree.
    Chunked {
        /// Chunk extent per dataset dimension (element size excluded).
        chunk_dims: Vec<u64>,
        /// B-tree root; `None` when no chunk has been written.
        btree_address: Option<u64>,
        /// Element size recorded in the layout.
        element_size: u32,
    },
}

impl DataLayout {
    /// Parse a layout message body.
    pub fn parse(data: &[u8], offset_size: u8, length_size: u8) -> Result<DataLayout, FormatError> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        if version != 3 && version != 4 {
            return Err(FormatError::UnsupportedVersion {
                structure: "data layout",
                version,
            });
        }
        let class = data[1];
        let os = offset_size as usize;
        match class {
            0 => {
                let size = read_u16(data, 2)? as usize;
                ensure_len(data, 4, size)?;
                Ok(DataLayout::Compact {
                    data: data[4..4 + size].to_vec(),
                })
            }
            1 => {
                let address = read_sized(data, 2, offset_size)?;
                let size = read_sized(data, 2 + os, length_size)?;
                Ok(DataLayout::Contiguous {
                    address: (!is_undefined_address(address, offset_size)).then_some(address),
                    size,
                })
            }
            2 if version == 3 => {
                let dimensionality = data.get(2).copied().ok_or(FormatError::UnexpectedEof {
                    expected: 3,
                    available: data.len(),
                })? as usize;
                if dimensionality < 2 {
                    return Err(FormatError::UnsupportedLayout(class));
                }
                let address = read_sized(data, 3, offset_size)?;
                let mut pos = 3 + os;
                let mut dims = Vec::with_capacity(dimensionality);
                for _ in 0..dimensionality {
                    dims.push(read_u32(data, pos)? as u64);
                    pos += 4;
                }
                let element_size = dims.pop().unwrap_or(0) as u32;
                Ok(DataLayout::Chunked {
                    chunk_dims: dims,
                    btree_address: (!is_undefined_address(address, offset_size))
                        .then_some(address),
                    element_size,
                })
            }
            other => Err(FormatError::UnsupportedLayout(other)),
        }
    }

    /// Serialize a version 3 contiguous or compact layout with 8-byte fields.
    #[cfg(feature = "writer")]
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            DataLayout::Compact { data } => {
                let mut buf = vec![3, 0];
                buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
                buf.extend_from_slice(data);
                buf
            }
            DataLayout::Contiguous { address, size } => {
                let mut buf = vec![3, 1];
                buf.extend_from_slice(&address.unwrap_or(u64::MAX).to_le_bytes());
                buf.extend_from_slice(&size.to_le_bytes());
                buf
            }
            DataLayout::Chunked {
                chunk_dims,
                btree_address,
                element_size,
            } => {
                let mut buf = vec![3, 2, (chunk_dims.len() + 1) as u8];
                buf.extend_from_slice(&btree_address.unwrap_or(u64::MAX).to_le_bytes());
                for d in chunk_dims {
                    buf.extend_from_slice(&(*d as u32).to_le_bytes());
                }
                buf.extend_from_slice(&element_size.to_le_bytes());
                buf
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_v3() {
        let mut d = vec![3, 1];
        d.extend_from_slice(&2048u64.to_le_bytes());
        d.extend_from_slice(&800u64.to_le_bytes());
        assert_eq!(
            DataLayout::parse(&d, 8, 8).unwrap(),
            DataLayout::Contiguous {
                address: Some(2048),
                size: 800
            }
        );
    }

    #[test]
    fn contiguous_unallocated() {
        let mut d = vec![3, 1];
        d.extend_from_slice(&u64::MAX.to_le_bytes());
        d.extend_from_slice(&0u64.to_le_bytes());
        assert_eq!(
            DataLayout::parse(&d, 8, 8).unwrap(),
            DataLayout::Contiguous {
                address: None,
                size: 0
            }
        );
    }

    #[test]
    fn compact_v3() {
        let d = vec![3, 0, 3, 0, 7, 8, 9];
        assert_eq!(
            DataLayout::parse(&d, 8, 8).unwrap(),
            DataLayout::Compact {
                data: vec![7, 8, 9]
            }
        );
    }

    #[test]
    fn chunked_v3_splits_element_size() {
        let mut d = vec![3, 2, 3];
        d.extend_from_slice(&4096u64.to_le_bytes());
        for v in [100u32, 3, 8] {
            d.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(
            DataLayout::parse(&d, 8, 8).unwrap(),
            DataLayout::Chunked {
                chunk_dims: vec![100, 3],
                btree_address: Some(4096),
                element_size: 8
            }
        );
    }

    #[test]
    fn old_versions_rejected() {
        assert!(matches!(
            DataLayout::parse(&[1, 1, 1, 0, 0, 0, 0, 0], 8, 8),
            Err(FormatError::UnsupportedVersion { version: 1, .. })
        ));
    }

    #[test]
    fn v4_chunk_indexes_rejected() {
        assert_eq!(
            DataLayout::parse(&[4, 2, 0, 2], 8, 8),
            Err(FormatError::UnsupportedLayout(2))
        );
    }
}
