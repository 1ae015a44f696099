//! Filter pipeline message parsing (message type 0x000B).

use crate::bytes::{ensure_len, pad8, read_u16, read_u32};
use crate::error::FormatError;

/// gzip / zlib deflate.
pub const FILTER_DEFLATE: u16 = 1;
/// Byte shuffle.
pub const FILTER_SHUFFLE: u16 = 2;
/// Fletcher32 checksum.
pub const FILTER_FLETCHER32: u16 = 3;

/// One filter of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub id: u16,
    pub flags: u16,
    pub client_data: Vec<u32>,
}

impl Filter {
    /// Flag bit 0: the filter may be skipped when it fails.
    pub fn is_optional(&self) -> bool {
        self.flags & 0x0001 != 0
    }
}

/// The ordered filters applied to every chunk of a dataset on write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterPipeline {
    pub filters: Vec<Filter>,
}

impl FilterPipeline {
    /// Parse a filter pipeline message body (v1 or v2).
    pub fn parse(data: &[u8]) -> Result<FilterPipeline, FormatError> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        let count = data[1] as usize;
        let mut pos = match version {
            1 => 8,
            2 => 2,
            v => {
                return Err(FormatError::UnsupportedVersion {
                    structure: "filter pipeline",
                    version: v,
                })
            }
        };

        let mut filters = Vec::with_capacity(count);
        for _ in 0..count {
            let id = read_u16(data, pos)?;
            pos += 2;
            let name_len = if version == 1 || id >= 256 {
                let n = read_u16(data, pos)? as usize;
                pos += 2;
                n
            } else {
                0
            };
            let flags = read_u16(data, pos)?;
            let n_values = read_u16(data, pos + 2)? as usize;
            pos += 4;
            if name_len > 0 {
                pos += if version == 1 { pad8(name_len) } else { name_len };
            }
            let mut client_data = Vec::with_capacity(n_values);
            for _ in 0..n_values {
                client_data.push(read_u32(data, pos)?);
                pos += 4;
            }
            if version == 1 && n_values % 2 == 1 {
                pos += 4;
            }
            filters.push(Filter {
                id,
                flags,
                client_data,
            });
        }
        Ok(FilterPipeline { filters })
    }

    /// Serialize as a version 2 pipeline. Only predefined filters (id < 256).
    #[cfg(feature = "writer")]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![2, self.filters.len() as u8];
        for f in &self.filters {
            buf.extend_from_slice(&f.id.to_le_bytes());
            buf.extend_from_slice(&f.flags.to_le_bytes());
            buf.extend_from_slice(&(f.client_data.len() as u16).to_le_bytes());
            for v in &f.client_data {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        buf
    }
}
