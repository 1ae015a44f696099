//! Error types for container access.

use std::fmt;

use rustyillustris_format::error::FormatError;

/// Errors raised while opening or reading a container.
#[derive(Debug)]
pub enum Error {
    /// I/O error from the filesystem.
    Io(std::io::Error),
    /// Low-level format parsing error.
    Format(FormatError),
    /// No object at the given path.
    NotFound(String),
    /// The object at the given path is not a dataset.
    NotADataset(String),
    /// The object at the given path is not a group.
    NotAGroup(String),
    /// Column selection past the second dimension.
    ColumnOutOfRange {
        /// Requested column.
        column: u64,
        /// Columns in the dataset.
        columns: u64,
    },
    /// The request cannot be served for this dataset (type, rank, ...).
    Unsupported(String),
    /// Destination buffer does not match the selection size.
    BufferSize {
        /// Bytes the selection produces.
        expected: usize,
        /// Bytes in the destination buffer.
        actual: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Format(e) => write!(f, "HDF5 format error: {e}"),
            Error::NotFound(path) => write!(f, "object not found: {path}"),
            Error::NotADataset(path) => write!(f, "not a dataset: {path}"),
            Error::NotAGroup(path) => write!(f, "not a group: {path}"),
            Error::ColumnOutOfRange { column, columns } => {
                write!(f, "column {column} out of range for {columns} columns")
            }
            Error::Unsupported(what) => write!(f, "unsupported: {what}"),
            Error::BufferSize { expected, actual } => {
                write!(f, "buffer holds {actual} bytes, selection needs {expected}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Format(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        match e {
            FormatError::PathNotFound(path) => Error::NotFound(path),
            other => Error::Format(other),
        }
    }
}

/// Result alias for container operations.
pub type Result<T> = std::result::Result<T, Error>;
