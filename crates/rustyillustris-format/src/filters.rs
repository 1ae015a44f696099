//! Chunk decoding: deflate, shuffle and fletcher32.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::FormatError;
use crate::filter_pipeline::{FilterPipeline, FILTER_DEFLATE, FILTER_FLETCHER32, FILTER_SHUFFLE};

/// Undo a filter pipeline on one stored chunk.
///
/// Filters run in reverse order. Bit `i` of `filter_mask` set means filter
/// `i` was skipped when the chunk was written.
pub fn decode_chunk(
    stored: &[u8],
    pipeline: &FilterPipeline,
    filter_mask: u32,
    element_size: usize,
) -> Result<Vec<u8>, FormatError> {
    let mut data = stored.to_vec();
    for (index, filter) in pipeline.filters.iter().enumerate().rev() {
        if index < 32 && filter_mask & (1 << index) != 0 {
            continue;
        }
        data = match filter.id {
            FILTER_DEFLATE => inflate(&data)?,
            FILTER_SHUFFLE => {
                let size = filter
                    .client_data
                    .first()
                    .map(|&s| s as usize)
                    .unwrap_or(element_size);
                unshuffle(&data, size)?
            }
            FILTER_FLETCHER32 => strip_fletcher32(&data)?,
            other => return Err(FormatError::UnsupportedFilter(other)),
        };
    }
    Ok(data)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::with_capacity(data.len() * 4);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| FormatError::FilterError(format!("deflate: {e}")))?;
    Ok(out)
}

/// On disk all byte-0s come first, then all byte-1s, and so on.
fn unshuffle(data: &[u8], element_size: usize) -> Result<Vec<u8>, FormatError> {
    if element_size <= 1 {
        return Ok(data.to_vec());
    }
    let n = data.len() / element_size;
    let mut out = vec![0u8; data.len()];
    for byte in 0..element_size {
        let plane = &data[byte * n..(byte + 1) * n];
        for (i, &b) in plane.iter().enumerate() {
            out[i * element_size + byte] = b;
        }
    }
    // Trailing bytes that do not fill an element are stored unshuffled.
    let tail = n * element_size;
    out[tail..].copy_from_slice(&data[tail..]);
    Ok(out)
}

pub(crate) fn fletcher32(data: &[u8]) -> u32 {
    let (mut sum1, mut sum2) = (0u64, 0u64);
    // Reduce every 360 big-endian 16-bit words; a trailing odd byte is the high half.
    for block in data.chunks(720) {
        for w in block.chunks(2) {
            let hi = (w[0] as u64) << 8;
            sum1 += hi | w.get(1).copied().unwrap_or(0) as u64;
            sum2 += sum1;
        }
        sum1 %= 65535;
        sum2 %= 65535;
    }
    ((sum2 << 16) | sum1) as u32
}

fn strip_fletcher32(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    if data.len() < 4 {
        return Err(FormatError::FilterError(String::from(
            "fletcher32: data too short for checksum",
        )));
    }
    let (payload, tail) = data.split_at(data.len() - 4);
    let expected = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let computed = fletcher32(payload);
    if expected != computed {
        return Err(FormatError::ChecksumMismatch { expected, computed });
    }
    Ok(payload.to_vec())
}
