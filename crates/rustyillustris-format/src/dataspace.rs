//! Dataspace message parsing (message type 0x0001).

use crate::bytes::{ensure_len, read_sized};
use crate::error::FormatError;

/// Kind of dataspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataspaceType {
    Scalar,
    Simple,
    Null,
}

/// A decoded dataspace: the extent of a dataset or attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    pub space_type: DataspaceType,
    pub dimensions: Vec<u64>,
    pub max_dimensions: Option<Vec<u64>>,
}

impl Dataspace {
    /// Parse a dataspace message body (v1 or v2).
    pub fn parse(data: &[u8], length_size: u8) -> Result<Dataspace, FormatError> {
        ensure_len(data, 0, 4)?;
        let version = data[0];
        let rank = data[1] as usize;
        let flags = data[2];
        let (space_type, mut pos) = match version {
            1 => {
                let ty = if rank == 0 {
                    DataspaceType::Scalar
                } else {
                    DataspaceType::Simple
                };
                (ty, 8)
            }
            2 => {
                let ty = match data[3] {
                    0 => DataspaceType::Scalar,
                    1 => DataspaceType::Simple,
                    _ => DataspaceType::Null,
                };
                (ty, 4)
            }
            v => {
                return Err(FormatError::UnsupportedVersion {
                    structure: "dataspace",
                    version: v,
                })
            }
        };

        let ls = length_size as usize;
        let mut dimensions = Vec::with_capacity(rank);
        for _ in 0..rank {
            dimensions.push(read_sized(data, pos, length_size)?);
            pos += ls;
        }
        let max_dimensions = if flags & 0x01 != 0 {
            let mut max = Vec::with_capacity(rank);
            for _ in 0..rank {
                max.push(read_sized(data, pos, length_size)?);
                pos += ls;
            }
            Some(max)
        } else {
            None
        };

        Ok(Dataspace {
            space_type,
            dimensions,
            max_dimensions,
        })
    }

    /// Total number of elements. Scalar = 1, Null = 0.
    pub fn num_elements(&self) -> u64 {
        match self.space_type {
            DataspaceType::Null => 0,
            DataspaceType::Scalar => 1,
            DataspaceType::Simple => self.dimensions.iter().product(),
        }
    }

    /// A simple dataspace with the given extent.
    pub fn simple(dimensions: &[u64]) -> Dataspace {
        Dataspace {
            space_type: DataspaceType::Simple,
            dimensions: dimensions.to_vec(),
            max_dimensions: None,
        }
    }

    /// A scalar dataspace.
    pub fn scalar() -> Dataspace {
        Dataspace {
            space_type: DataspaceType::Scalar,
            dimensions: Vec::new(),
            max_dimensions: None,
        }
    }

    /// Serialize as a version 2 dataspace message with 8-byte lengths.
    #[cfg(feature = "writer")]
    pub fn serialize(&self) -> Vec<u8> {
        let type_byte = match self.space_type {
            DataspaceType::Scalar => 0,
            DataspaceType::Simple => 1,
            DataspaceType::Null => 2,
        };
        let mut buf = vec![2, self.dimensions.len() as u8, 0, type_byte];
        for d in &self.dimensions {
            buf.extend_from_slice(&d.to_le_bytes());
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_v1_two_dims_with_max() {
        let mut d = vec![1, 2, 0x01, 0, 0, 0, 0, 0];
        for v in [10u64, 3, u64::MAX, 3] {
            d.extend_from_slice(&v.to_le_bytes());
        }
        let ds = Dataspace::parse(&d, 8).unwrap();
        assert_eq!(ds.space_type, DataspaceType::Simple);
        assert_eq!(ds.dimensions, vec![10, 3]);
        assert_eq!(ds.max_dimensions, Some(vec![u64::MAX, 3]));
        assert_eq!(ds.num_elements(), 30);
    }

    #[test]
    fn parse_v1_scalar() {
        let d = vec![1, 0, 0, 0, 0, 0, 0, 0];
        let ds = Dataspace::parse(&d, 8).unwrap();
        assert_eq!(ds.space_type, DataspaceType::Scalar);
        assert_eq!(ds.num_elements(), 1);
    }

    #[test]
    fn parse_v2_simple_with_4_byte_lengths() {
        let mut d = vec![2, 1, 0, 1];
        d.extend_from_slice(&7u32.to_le_bytes());
        let ds = Dataspace::parse(&d, 4).unwrap();
        assert_eq!(ds.dimensions, vec![7]);
    }

    #[test]
    fn parse_v2_null() {
        let ds = Dataspace::parse(&[2, 0, 0, 2], 8).unwrap();
        assert_eq!(ds.space_type, DataspaceType::Null);
        assert_eq!(ds.num_elements(), 0);
    }

    #[test]
    fn unsupported_version() {
        assert!(matches!(
            Dataspace::parse(&[9, 0, 0, 0], 8),
            Err(FormatError::UnsupportedVersion { .. })
        ));
    }

    #[cfg(feature = "writer")]
    #[test]
    fn serialize_parses_back() {
        let ds = Dataspace::simple(&[4, 3]);
        assert_eq!(Dataspace::parse(&ds.serialize(), 8).unwrap(), ds);
        let sc = Dataspace::scalar();
        assert_eq!(Dataspace::parse(&sc.serialize(), 8).unwrap(), sc);
    }
}
