//! Global index to (chunk, local offset) arithmetic.
//!
//! Every collection is split over numbered chunk files. A per-chunk table
//! of first global indices turns a global index into a chunk and an offset
//! within it, and a list of per-chunk row counts turns a global row range
//! into the sequence of chunk slices to read.

use tracing::trace;

use crate::error::{Error, Result};

/// A contiguous slice of one chunk: `rows` rows starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub chunk: usize,
    pub offset: u64,
    pub rows: u64,
}

/// Locate `index` in a table of chunk starts followed by the global total.
///
/// `offsets` holds one entry per chunk (the first global index stored in
/// it) plus a trailing total. Indices outside `0..total` are `NotFound`.
pub fn locate(index: i64, offsets: &[i64]) -> Result<(usize, u64)> {
    let (total, starts) = offsets
        .split_last()
        .ok_or_else(|| Error::NotFound(format!("index {index} in an empty offset table")))?;
    if index < 0 || index >= *total {
        return Err(Error::NotFound(format!("index {index} outside 0..{total}")));
    }
    locate_start(index, starts)
}

/// The highest chunk whose start is at or below `index`, with the offset
/// of `index` inside it.
///
/// Empty chunks share their start with the next chunk; taking the highest
/// match skips them.
pub fn locate_start(index: i64, starts: &[i64]) -> Result<(usize, u64)> {
    let chunk = starts
        .iter()
        .rposition(|&start| index - start >= 0)
        .ok_or_else(|| Error::NotFound(format!("index {index} precedes every chunk")))?;
    Ok((chunk, (index - starts[chunk]) as u64))
}

/// Cumulative table `[0, c0, c0 + c1, ...]` from per-chunk counts.
pub fn cumulative(counts: &[u64]) -> Vec<i64> {
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    let mut running = 0i64;
    offsets.push(running);
    for &count in counts {
        running += count as i64;
        offsets.push(running);
    }
    offsets
}

/// Split `count` rows starting at `(start_chunk, start_offset)` over chunks
/// holding `local_counts[i]` rows each (indexed from `start_chunk`).
///
/// Chunks contributing nothing are left out. If the chunks run out first
/// the result is `ReadCountMismatch`.
pub fn plan(
    start_chunk: usize,
    start_offset: u64,
    count: u64,
    local_counts: &[u64],
) -> Result<Vec<ChunkDescriptor>> {
    let mut remaining = count;
    let mut offset = start_offset;
    let mut descriptors = Vec::new();
    for (i, &local) in local_counts.iter().enumerate() {
        if remaining == 0 {
            break;
        }
        let rows = remaining.min(local.saturating_sub(offset));
        if rows > 0 {
            let d = ChunkDescriptor {
                chunk: start_chunk + i,
                offset,
                rows,
            };
            trace!(chunk = d.chunk, offset = d.offset, rows = d.rows, "planned chunk slice");
            descriptors.push(d);
            remaining -= rows;
        }
        offset = 0;
    }
    if remaining > 0 {
        return Err(Error::ReadCountMismatch {
            read: count - remaining,
            expected: count,
        });
    }
    Ok(descriptors)
}
