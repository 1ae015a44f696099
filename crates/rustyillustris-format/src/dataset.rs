//! Dataset metadata and row-range reads over all supported layouts.
//!
//! A "row" is one index along the first dimension; a row of an `[N, 3]`
//! dataset holds three elements. Reads return the raw element bytes in file
//! byte order.

use std::ops::Range;

use crate::btree_v1::{collect_chunks, ChunkRecord};
use crate::bytes::ensure_len;
use crate::data_layout::DataLayout;
use crate::dataspace::Dataspace;
use crate::datatype::Datatype;
use crate::error::FormatError;
use crate::filter_pipeline::FilterPipeline;
use crate::filters::decode_chunk;
use crate::message_type::MessageType;
use crate::object_header::ObjectHeader;

/// Everything needed to read a dataset, gathered from its object header.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetMeta {
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    pub layout: DataLayout,
    pub filters: FilterPipeline,
}

impl DatasetMeta {
    pub fn from_header(
        header: &ObjectHeader,
        offset_size: u8,
        length_size: u8,
    ) -> Result<DatasetMeta, FormatError> {
        let datatype = header
            .find(MessageType::Datatype)
            .ok_or(FormatError::MissingMessage("datatype"))?;
        let dataspace = header
            .find(MessageType::Dataspace)
            .ok_or(FormatError::MissingMessage("dataspace"))?;
        let layout = header
            .find(MessageType::DataLayout)
            .ok_or(FormatError::MissingMessage("data layout"))?;
        let filters = match header.find(MessageType::FilterPipeline) {
            Some(m) => FilterPipeline::parse(&m.data)?,
            None => FilterPipeline::default(),
        };
        Ok(DatasetMeta {
            datatype: Datatype::parse(&datatype.data)?,
            dataspace: Dataspace::parse(&dataspace.data, length_size)?,
            layout: DataLayout::parse(&layout.data, offset_size, length_size)?,
            filters,
        })
    }

    /// Dataset extent; empty for scalars.
    pub fn shape(&self) -> &[u64] {
        &self.dataspace.dimensions
    }

    /// Number of rows. A scalar counts as one row.
    pub fn rows(&self) -> u64 {
        match self.shape().first() {
            Some(&n) => n,
            None => self.dataspace.num_elements(),
        }
    }

    /// Bytes in one row.
    pub fn row_bytes(&self) -> usize {
        let trailing: u64 = self.shape().iter().skip(1).product();
        trailing as usize * self.datatype.size() as usize
    }
}

/// Read rows `rows` of a dataset into a freshly allocated buffer.
///
/// Storage that was never written reads as zeros.
pub fn read_rows(
    data: &[u8],
    meta: &DatasetMeta,
    rows: Range<u64>,
    offset_size: u8,
) -> Result<Vec<u8>, FormatError> {
    let total = meta.rows();
    if rows.start > rows.end || rows.end > total {
        return Err(FormatError::SelectionOutOfBounds {
            end: rows.end,
            rows: total,
        });
    }
    let row_bytes = meta.row_bytes();
    let start = rows.start as usize * row_bytes;
    let len = (rows.end - rows.start) as usize * row_bytes;

    match &meta.layout {
        DataLayout::Compact { data: inline } => {
            ensure_len(inline, start, len)?;
            Ok(inline[start..start + len].to_vec())
        }
        DataLayout::Contiguous { address: None, .. } => Ok(vec![0; len]),
        DataLayout::Contiguous {
            address: Some(address),
            ..
        } => {
            let at = *address as usize + start;
            ensure_len(data, at, len)?;
            Ok(data[at..at + len].to_vec())
        }
        DataLayout::Chunked {
            btree_address: None,
            ..
        } => Ok(vec![0; len]),
        DataLayout::Chunked {
            chunk_dims,
            btree_address: Some(root),
            ..
        } => {
            let mut out = vec![0; len];
            if len > 0 {
                read_chunked(data, meta, chunk_dims, *root, &rows, offset_size, &mut out)?;
            }
            Ok(out)
        }
    }
}

fn read_chunked(
    data: &[u8],
    meta: &DatasetMeta,
    chunk_dims: &[u64],
    root: u64,
    rows: &Range<u64>,
    offset_size: u8,
    out: &mut [u8],
) -> Result<(), FormatError> {
    let dims = meta.shape();
    if dims.is_empty() || chunk_dims.len() != dims.len() {
        return Err(FormatError::UnsupportedLayout(2));
    }
    let elem = meta.datatype.size() as usize;
    let chunk_bytes = chunk_dims.iter().product::<u64>() as usize * elem;
    let chunks = collect_chunks(data, root, offset_size, dims.len())?;
    for chunk in chunks
        .iter()
        .filter(|c| c.offsets[0] < rows.end && c.offsets[0] + chunk_dims[0] > rows.start)
    {
        let decoded = decode_stored(data, meta, chunk, elem)?;
        if decoded.len() < chunk_bytes {
            return Err(FormatError::FilterError(format!(
                "chunk at {} decoded to {} bytes, expected {}",
                chunk.address,
                decoded.len(),
                chunk_bytes
            )));
        }
        copy_chunk(&decoded, &chunk.offsets, chunk_dims, dims, rows, elem, out);
    }
    Ok(())
}

fn decode_stored(
    data: &[u8],
    meta: &DatasetMeta,
    chunk: &ChunkRecord,
    elem: usize,
) -> Result<Vec<u8>, FormatError> {
    let at = chunk.address as usize;
    let size = chunk.size as usize;
    ensure_len(data, at, size)?;
    let stored = &data[at..at + size];
    if meta.filters.filters.is_empty() {
        return Ok(stored.to_vec());
    }
    decode_chunk(stored, &meta.filters, chunk.filter_mask, elem)
}

/// Scatter the part of one decoded chunk that falls inside the dataset
/// extent and the requested rows into `out`.
///
/// Runs along the last dimension are copied whole; the leading dimensions
/// are walked with an odometer.
fn copy_chunk(
    chunk: &[u8],
    origin: &[u64],
    chunk_dims: &[u64],
    dims: &[u64],
    rows: &Range<u64>,
    elem: usize,
    out: &mut [u8],
) {
    let rank = dims.len();
    let last = rank - 1;
    let mut dst_stride = vec![1u64; rank];
    let mut src_stride = vec![1u64; rank];
    for d in (0..last).rev() {
        dst_stride[d] = dst_stride[d + 1] * dims[d + 1];
        src_stride[d] = src_stride[d + 1] * chunk_dims[d + 1];
    }

    let mut lo = origin[last];
    let mut hi = (origin[last] + chunk_dims[last]).min(dims[last]);
    if rank == 1 {
        lo = lo.max(rows.start);
        hi = hi.min(rows.end);
    }
    if lo >= hi {
        return;
    }
    let run = (hi - lo) as usize * elem;
    let src_last = lo - origin[last];
    let dst_last = if rank == 1 { lo - rows.start } else { lo };

    let mut local = vec![0u64; last];
    loop {
        let mut inside = true;
        let (mut src, mut dst) = (0u64, 0u64);
        for d in 0..last {
            let g = origin[d] + local[d];
            if g >= dims[d] || (d == 0 && !rows.contains(&g)) {
                inside = false;
                break;
            }
            let g = if d == 0 { g - rows.start } else { g };
            dst += g * dst_stride[d];
            src += local[d] * src_stride[d];
        }
        if inside {
            let s = (src + src_last) as usize * elem;
            let t = (dst + dst_last) as usize * elem;
            out[t..t + run].copy_from_slice(&chunk[s..s + run]);
        }

        let mut d = last;
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            local[d] += 1;
            if local[d] < chunk_dims[d] {
                break;
            }
            local[d] = 0;
        }
    }
}
