//! Datatype message parsing (message type 0x0003).
//!
//! Only the atomic classes that simulation outputs store are decoded in
//! full: fixed-point integers, IEEE floats and fixed-length strings. Every
//! other class is kept as [`Datatype::Other`] so that listing and attribute
//! enumeration still work on files that contain them.

use crate::bytes::{ensure_len, read_u32};
use crate::error::FormatError;

/// Byte order of an atomic datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// A decoded HDF5 datatype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datatype {
    /// Class 0: two's complement or unsigned integer.
    FixedPoint {
        size: u32,
        signed: bool,
        byte_order: ByteOrder,
    },
    /// Class 1: IEEE 754 float.
    FloatingPoint { size: u32, byte_order: ByteOrder },
    /// Class 3: fixed-length string.
    String { size: u32 },
    /// Any other class (compound, reference, variable-length, ...).
    Other { class: u8, size: u32 },
}

impl Datatype {
    /// Parse a datatype message body.
    pub fn parse(data: &[u8]) -> Result<Datatype, FormatError> {
        ensure_len(data, 0, 8)?;
        let class = data[0] & 0x0F;
        let bf0 = data[1];
        let size = read_u32(data, 4)?;
        let byte_order = if bf0 & 0x01 != 0 {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };
        Ok(match class {
            0 => Datatype::FixedPoint {
                size,
                signed: bf0 & 0x08 != 0,
                byte_order,
            },
            1 => {
                if bf0 & 0x40 != 0 {
                    return Err(FormatError::UnsupportedDatatype(String::from(
                        "VAX float byte order",
                    )));
                }
                Datatype::FloatingPoint { size, byte_order }
            }
            3 => Datatype::String { size },
            other => Datatype::Other { class: other, size },
        })
    }

    /// Size of one element in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Datatype::FixedPoint { size, .. }
            | Datatype::FloatingPoint { size, .. }
            | Datatype::String { size }
            | Datatype::Other { size, .. } => *size,
        }
    }

    /// True when the stored bytes need swapping on a little-endian host.
    pub fn is_big_endian(&self) -> bool {
        matches!(
            self,
            Datatype::FixedPoint {
                byte_order: ByteOrder::BigEndian,
                ..
            } | Datatype::FloatingPoint {
                byte_order: ByteOrder::BigEndian,
                ..
            }
        )
    }

    /// Serialize to a datatype message body.
    #[cfg(feature = "writer")]
    pub fn serialize(&self) -> Vec<u8> {
        fn header(class: u8, bf0: u8, bf1: u8, size: u32) -> Vec<u8> {
            let mut buf = vec![class | (1 << 4), bf0, bf1, 0];
            buf.extend_from_slice(&size.to_le_bytes());
            buf
        }
        match self {
            Datatype::FixedPoint {
                size,
                signed,
                byte_order,
            } => {
                let mut bf0 = if *signed { 0x08 } else { 0 };
                if *byte_order == ByteOrder::BigEndian {
                    bf0 |= 0x01;
                }
                let mut buf = header(0, bf0, 0, *size);
                buf.extend_from_slice(&0u16.to_le_bytes());
                buf.extend_from_slice(&((*size * 8) as u16).to_le_bytes());
                buf
            }
            Datatype::FloatingPoint { size, byte_order } => {
                let mut bf0 = 0x20u8;
                if *byte_order == ByteOrder::BigEndian {
                    bf0 |= 0x01;
                }
                let bits = *size * 8;
                let (exp_loc, exp_size, mant_size, bias): (u8, u8, u8, u32) = if *size == 4 {
                    (23, 8, 23, 127)
                } else {
                    (52, 11, 52, 1023)
                };
                let mut buf = header(1, bf0, (bits - 1) as u8, *size);
                buf.extend_from_slice(&0u16.to_le_bytes());
                buf.extend_from_slice(&(bits as u16).to_le_bytes());
                buf.extend_from_slice(&[exp_loc, exp_size, 0, mant_size]);
                buf.extend_from_slice(&bias.to_le_bytes());
                buf
            }
            Datatype::String { size } => header(3, 0, 0, *size),
            Datatype::Other { class, size } => header(*class, 0, 0, *size),
        }
    }
}
