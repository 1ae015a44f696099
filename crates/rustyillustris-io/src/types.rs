//! Element types and attribute values exposed by containers.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use rustyillustris_format::attribute::AttributeMessage;
use rustyillustris_format::datatype::{ByteOrder, Datatype};

/// Element type of a dataset, as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// Fixed-length string of the given byte width.
    String(usize),
    /// A class that is listed but not decoded.
    Other { class: u8, size: usize },
}

impl DType {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::U64 | DType::F64 => 8,
            DType::String(n) => *n,
            DType::Other { size, .. } => *size,
        }
    }

    /// True for the numeric types that can be read into typed arrays.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DType::String(_) | DType::Other { .. })
    }

    pub fn from_datatype(dt: &Datatype) -> DType {
        match *dt {
            Datatype::FixedPoint { size, signed, .. } => match (size, signed) {
                (1, true) => DType::I8,
                (2, true) => DType::I16,
                (4, true) => DType::I32,
                (8, true) => DType::I64,
                (1, false) => DType::U8,
                (2, false) => DType::U16,
                (4, false) => DType::U32,
                (8, false) => DType::U64,
                (size, _) => DType::Other {
                    class: 0,
                    size: size as usize,
                },
            },
            Datatype::FloatingPoint { size: 4, .. } => DType::F32,
            Datatype::FloatingPoint { size: 8, .. } => DType::F64,
            Datatype::FloatingPoint { size, .. } => DType::Other {
                class: 1,
                size: size as usize,
            },
            Datatype::String { size } => DType::String(size as usize),
            Datatype::Other { class, size } => DType::Other {
                class,
                size: size as usize,
            },
        }
    }
}

/// Decoded attribute payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrData {
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    Str(String),
}

/// An attribute value with its extent; scalars have an empty shape.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrValue {
    pub shape: Vec<u64>,
    pub data: AttrData,
}

impl AttrValue {
    pub fn int(values: Vec<i64>) -> AttrValue {
        AttrValue {
            shape: vec![values.len() as u64],
            data: AttrData::Int(values),
        }
    }

    pub fn float(values: Vec<f64>) -> AttrValue {
        AttrValue {
            shape: vec![values.len() as u64],
            data: AttrData::Float(values),
        }
    }

    /// Number of elements (1 for strings).
    pub fn len(&self) -> usize {
        match &self.data {
            AttrData::Int(v) => v.len(),
            AttrData::UInt(v) => v.len(),
            AttrData::Float(v) => v.len(),
            AttrData::Str(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer elements; `None` for floats and strings or on overflow.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match &self.data {
            AttrData::Int(v) => Some(v.clone()),
            AttrData::UInt(v) => v.iter().map(|&x| i64::try_from(x).ok()).collect(),
            _ => None,
        }
    }

    /// Unsigned elements; `None` for floats, strings and negative values.
    pub fn to_u64_vec(&self) -> Option<Vec<u64>> {
        match &self.data {
            AttrData::UInt(v) => Some(v.clone()),
            AttrData::Int(v) => v.iter().map(|&x| u64::try_from(x).ok()).collect(),
            _ => None,
        }
    }

    /// Numeric elements widened to f64.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match &self.data {
            AttrData::Int(v) => Some(v.iter().map(|&x| x as f64).collect()),
            AttrData::UInt(v) => Some(v.iter().map(|&x| x as f64).collect()),
            AttrData::Float(v) => Some(v.clone()),
            AttrData::Str(_) => None,
        }
    }

    /// The single integer of a scalar or length-1 attribute.
    pub fn as_i64(&self) -> Option<i64> {
        match self.to_i64_vec()?.as_slice() {
            [x] => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            AttrData::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Decode an attribute message; `None` for classes with no decoding.
    pub fn from_message(msg: &AttributeMessage) -> Option<AttrValue> {
        let raw = &msg.raw_data;
        let data = match msg.datatype {
            Datatype::FixedPoint {
                size,
                signed,
                byte_order,
            } if matches!(size, 1 | 2 | 4 | 8) => {
                let n = size as usize;
                let words = raw.chunks_exact(n);
                if signed {
                    AttrData::Int(
                        words
                            .map(|w| match byte_order {
                                ByteOrder::LittleEndian => LittleEndian::read_int(w, n),
                                ByteOrder::BigEndian => BigEndian::read_int(w, n),
                            })
                            .collect(),
                    )
                } else {
                    AttrData::UInt(
                        words
                            .map(|w| match byte_order {
                                ByteOrder::LittleEndian => LittleEndian::read_uint(w, n),
                                ByteOrder::BigEndian => BigEndian::read_uint(w, n),
                            })
                            .collect(),
                    )
                }
            }
            Datatype::FloatingPoint { size: 4, byte_order } => AttrData::Float(
                raw.chunks_exact(4)
                    .map(|w| match byte_order {
                        ByteOrder::LittleEndian => LittleEndian::read_f32(w) as f64,
                        ByteOrder::BigEndian => BigEndian::read_f32(w) as f64,
                    })
                    .collect(),
            ),
            Datatype::FloatingPoint { size: 8, byte_order } => AttrData::Float(
                raw.chunks_exact(8)
                    .map(|w| match byte_order {
                        ByteOrder::LittleEndian => LittleEndian::read_f64(w),
                        ByteOrder::BigEndian => BigEndian::read_f64(w),
                    })
                    .collect(),
            ),
            Datatype::String { .. } => {
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                AttrData::Str(String::from_utf8_lossy(&raw[..end]).trim_end().to_string())
            }
            _ => return None,
        };
        Some(AttrValue {
            shape: msg.dataspace.dimensions.clone(),
            data,
        })
    }
}
