/// Errors raised while locating and assembling simulation data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("read [{read}] rows, but was expecting [{expected}]")]
    ReadCountMismatch { read: u64, expected: u64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("storage error: {0}")]
    Storage(#[from] rustyillustris_io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
