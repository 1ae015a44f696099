//! Bounds-checked little-endian field readers shared by the structure parsers.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::FormatError;

pub(crate) fn ensure_len(data: &[u8], pos: usize, needed: usize) -> Result<(), FormatError> {
    match pos.checked_add(needed) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(FormatError::UnexpectedEof {
            expected: pos.saturating_add(needed),
            available: data.len(),
        }),
    }
}

pub(crate) fn read_u16(data: &[u8], pos: usize) -> Result<u16, FormatError> {
    ensure_len(data, pos, 2)?;
    Ok(LittleEndian::read_u16(&data[pos..pos + 2]))
}

pub(crate) fn read_u32(data: &[u8], pos: usize) -> Result<u32, FormatError> {
    ensure_len(data, pos, 4)?;
    Ok(LittleEndian::read_u32(&data[pos..pos + 4]))
}

/// Read an unsigned integer of `size` bytes (1..=8), as used for file
/// offsets, lengths and variable-width counters.
pub(crate) fn read_sized(data: &[u8], pos: usize, size: u8) -> Result<u64, FormatError> {
    let n = size as usize;
    if n == 0 || n > 8 {
        return Err(FormatError::InvalidOffsetSize(size));
    }
    ensure_len(data, pos, n)?;
    Ok(LittleEndian::read_uint(&data[pos..pos + n], n))
}

/// The all-ones "undefined address" for the given offset width.
pub(crate) fn is_undefined_address(addr: u64, offset_size: u8) -> bool {
    match offset_size {
        2 => addr == 0xFFFF,
        4 => addr == 0xFFFF_FFFF,
        _ => addr == u64::MAX,
    }
}

/// Round `n` up to the next multiple of eight.
pub(crate) fn pad8(n: usize) -> usize {
    (n + 7) & !7
}

/// Decode a NUL-terminated (or NUL-padded) byte string.
pub(crate) fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
