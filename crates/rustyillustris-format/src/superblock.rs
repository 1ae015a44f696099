//! HDF5 superblock parsing (versions 0 through 3).

use crate::bytes::{ensure_len, read_sized, read_u16, read_u32};
use crate::error::FormatError;
use crate::signature::HDF5_SIGNATURE;

/// The fields of a superblock needed to navigate the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Superblock version (0..=3).
    pub version: u8,
    /// Width in bytes of file addresses.
    pub offset_size: u8,
    /// Width in bytes of object lengths.
    pub length_size: u8,
    /// Absolute address that all other addresses are relative to.
    pub base_address: u64,
    /// End-of-file address as recorded by the writer.
    pub eof_address: u64,
    /// Object header address of the root group.
    pub root_group_address: u64,
    /// Group B-tree leaf node K (v0/v1 only).
    pub group_leaf_node_k: Option<u16>,
    /// Group B-tree internal node K (v0/v1 only).
    pub group_internal_node_k: Option<u16>,
}

fn validate_sizes(offset_size: u8, length_size: u8) -> Result<(), FormatError> {
    if !matches!(offset_size, 2 | 4 | 8) {
        return Err(FormatError::InvalidOffsetSize(offset_size));
    }
    if !matches!(length_size, 2 | 4 | 8) {
        return Err(FormatError::InvalidLengthSize(length_size));
    }
    Ok(())
}

impl Superblock {
    /// Parse the superblock that starts at `signature_offset`.
    pub fn parse(data: &[u8], signature_offset: usize) -> Result<Superblock, FormatError> {
        ensure_len(data, signature_offset, 9)?;
        let d = &data[signature_offset..];
        if d[..8] != HDF5_SIGNATURE {
            return Err(FormatError::SignatureNotFound);
        }
        match d[8] {
            v @ (0 | 1) => Self::parse_v0_v1(d, v),
            v @ (2 | 3) => Self::parse_v2_v3(d, v),
            v => Err(FormatError::UnsupportedVersion {
                structure: "superblock",
                version: v,
            }),
        }
    }

    fn parse_v0_v1(d: &[u8], version: u8) -> Result<Superblock, FormatError> {
        ensure_len(d, 0, 24)?;
        let offset_size = d[13];
        let length_size = d[14];
        validate_sizes(offset_size, length_size)?;

        let leaf_k = read_u16(d, 16)?;
        let internal_k = read_u16(d, 18)?;
        let _consistency_flags = read_u32(d, 20)?;
        // v1 adds indexed-storage K (u16) and two reserved bytes.
        let mut pos = if version == 1 { 28 } else { 24 };

        let os = offset_size as usize;
        let base_address = read_sized(d, pos, offset_size)?;
        pos += os;
        let _free_space_address = read_sized(d, pos, offset_size)?;
        pos += os;
        let eof_address = read_sized(d, pos, offset_size)?;
        pos += os;
        let _driver_info_address = read_sized(d, pos, offset_size)?;
        pos += os;

        // Root group symbol table entry: link name offset, then header address.
        pos += os;
        let root_group_address = read_sized(d, pos, offset_size)?;

        Ok(Superblock {
            version,
            offset_size,
            length_size,
            base_address,
            eof_address,
            root_group_address,
            group_leaf_node_k: Some(leaf_k),
            group_internal_node_k: Some(internal_k),
        })
    }

    fn parse_v2_v3(d: &[u8], version: u8) -> Result<Superblock, FormatError> {
        ensure_len(d, 0, 12)?;
        let offset_size = d[9];
        let length_size = d[10];
        validate_sizes(offset_size, length_size)?;

        let os = offset_size as usize;
        let mut pos = 12;
        let base_address = read_sized(d, pos, offset_size)?;
        pos += os;
        let _extension_address = read_sized(d, pos, offset_size)?;
        pos += os;
        let eof_address = read_sized(d, pos, offset_size)?;
        pos += os;
        let root_group_address = read_sized(d, pos, offset_size)?;
        pos += os;
        ensure_len(d, pos, 4)?;

        Ok(Superblock {
            version,
            offset_size,
            length_size,
            base_address,
            eof_address,
            root_group_address,
            group_leaf_node_k: None,
            group_internal_node_k: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v0_superblock(root: u64) -> Vec<u8> {
        let mut d = Vec::new();
        d.extend_from_slice(&HDF5_SIGNATURE);
        d.extend_from_slice(&[0, 0, 0, 0, 0, 8, 8, 0]);
        d.extend_from_slice(&4u16.to_le_bytes());
        d.extend_from_slice(&16u16.to_le_bytes());
        d.extend_from_slice(&0u32.to_le_bytes());
        d.extend_from_slice(&0u64.to_le_bytes()); // base
        d.extend_from_slice(&u64::MAX.to_le_bytes()); // free space
        d.extend_from_slice(&4096u64.to_le_bytes()); // eof
        d.extend_from_slice(&u64::MAX.to_le_bytes()); // driver info
        d.extend_from_slice(&0u64.to_le_bytes()); // link name offset
        d.extend_from_slice(&root.to_le_bytes());
        d.extend_from_slice(&[0u8; 24]); // cache type, reserved, scratch
        d
    }

    #[test]
    fn parse_v0() {
        let sb = Superblock::parse(&v0_superblock(96), 0).unwrap();
        assert_eq!(sb.version, 0);
        assert_eq!(sb.offset_size, 8);
        assert_eq!(sb.length_size, 8);
        assert_eq!(sb.eof_address, 4096);
        assert_eq!(sb.root_group_address, 96);
        assert_eq!(sb.group_leaf_node_k, Some(4));
        assert_eq!(sb.group_internal_node_k, Some(16));
    }

    #[test]
    fn parse_v3() {
        let mut d = Vec::new();
        d.extend_from_slice(&HDF5_SIGNATURE);
        d.extend_from_slice(&[3, 8, 8, 0]);
        d.extend_from_slice(&0u64.to_le_bytes());
        d.extend_from_slice(&u64::MAX.to_le_bytes());
        d.extend_from_slice(&512u64.to_le_bytes());
        d.extend_from_slice(&48u64.to_le_bytes());
        d.extend_from_slice(&[0u8; 4]);
        let sb = Superblock::parse(&d, 0).unwrap();
        assert_eq!(sb.version, 3);
        assert_eq!(sb.root_group_address, 48);
        assert_eq!(sb.group_leaf_node_k, None);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut d = v0_superblock(96);
        d[8] = 7;
        assert_eq!(
            Superblock::parse(&d, 0),
            Err(FormatError::UnsupportedVersion {
                structure: "superblock",
                version: 7
            })
        );
    }

    #[test]
    fn rejects_bad_offset_size() {
        let mut d = v0_superblock(96);
        d[13] = 3;
        assert_eq!(Superblock::parse(&d, 0), Err(FormatError::InvalidOffsetSize(3)));
    }
}
