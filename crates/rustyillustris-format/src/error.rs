//! Error types for HDF5 format parsing.

use std::fmt;

/// Errors that can occur while decoding HDF5 binary structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The HDF5 magic signature was not found at any valid offset.
    SignatureNotFound,
    /// A structure carries a version this reader does not handle.
    UnsupportedVersion {
        /// Which structure (superblock, layout, ...).
        structure: &'static str,
        /// The version found in the file.
        version: u8,
    },
    /// Unexpected end of data.
    UnexpectedEof {
        /// Number of bytes expected.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
    /// Invalid offset size (must be 2, 4, or 8).
    InvalidOffsetSize(u8),
    /// Invalid length size (must be 2, 4, or 8).
    InvalidLengthSize(u8),
    /// A block signature (`TREE`, `HEAP`, `SNOD`, `OCHK`) did not match.
    InvalidSignature(&'static str),
    /// Invalid object header version.
    InvalidObjectHeaderVersion(u8),
    /// Unknown message type flagged as fail-if-unknown.
    UnsupportedMessage(u16),
    /// An object header lacks a message required to interpret it.
    MissingMessage(&'static str),
    /// A path component could not be resolved.
    PathNotFound(String),
    /// Datatype class or encoding that this reader does not decode.
    UnsupportedDatatype(String),
    /// Storage layout class that this reader does not decode.
    UnsupportedLayout(u8),
    /// Group storage that this reader does not traverse.
    UnsupportedGroupStorage(&'static str),
    /// Filter id with no decoder.
    UnsupportedFilter(u16),
    /// A filter failed to decode a chunk.
    FilterError(String),
    /// Fletcher32 checksum mismatch on a chunk.
    ChecksumMismatch {
        /// The checksum stored in the file.
        expected: u32,
        /// The checksum we computed.
        computed: u32,
    },
    /// A selection extends past the dataset extent.
    SelectionOutOfBounds {
        /// First row past the requested selection.
        end: u64,
        /// Number of rows in the dataset.
        rows: u64,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::SignatureNotFound => {
                write!(f, "HDF5 signature not found at any valid offset")
            }
            FormatError::UnsupportedVersion { structure, version } => {
                write!(f, "unsupported {structure} version: {version}")
            }
            FormatError::UnexpectedEof {
                expected,
                available,
            } => {
                write!(f, "unexpected EOF: need {expected} bytes, have {available}")
            }
            FormatError::InvalidOffsetSize(s) => {
                write!(f, "invalid offset size: {s} (must be 2, 4, or 8)")
            }
            FormatError::InvalidLengthSize(s) => {
                write!(f, "invalid length size: {s} (must be 2, 4, or 8)")
            }
            FormatError::InvalidSignature(sig) => write!(f, "invalid {sig} signature"),
            FormatError::InvalidObjectHeaderVersion(v) => {
                write!(f, "invalid object header version: {v}")
            }
            FormatError::UnsupportedMessage(id) => {
                write!(f, "unsupported message type {id:#06x} marked as fail-if-unknown")
            }
            FormatError::MissingMessage(what) => {
                write!(f, "object header has no {what} message")
            }
            FormatError::PathNotFound(p) => write!(f, "path not found: {p}"),
            FormatError::UnsupportedDatatype(d) => write!(f, "unsupported datatype: {d}"),
            FormatError::UnsupportedLayout(c) => write!(f, "unsupported layout class: {c}"),
            FormatError::UnsupportedGroupStorage(kind) => {
                write!(f, "unsupported group storage: {kind}")
            }
            FormatError::UnsupportedFilter(id) => write!(f, "unsupported filter id: {id}"),
            FormatError::FilterError(msg) => write!(f, "filter error: {msg}"),
            FormatError::ChecksumMismatch { expected, computed } => {
                write!(
                    f,
                    "checksum mismatch: expected {expected:#010x}, computed {computed:#010x}"
                )
            }
            FormatError::SelectionOutOfBounds { end, rows } => {
                write!(f, "selection ends at row {end} but dataset has {rows} rows")
            }
        }
    }
}

impl std::error::Error for FormatError {}
