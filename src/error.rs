use std::fmt;

/// Failures surfaced by the cache model. None of them abort the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// the configuration cannot produce a valid bit split
    InvalidConfig(String),
    /// storage for the sets or blocks could not be reserved
    Allocation(String),
    /// a byte transfer would run past the end of the block
    SpanOutOfBlock {
        offset: usize,
        size: usize,
        block_size: usize,
    },
    /// a full-block update was given a buffer of the wrong length
    BufferSize { expected: usize, actual: usize },
    /// a snapshot was restored into a cache with a different shape
    GeometryMismatch,
}

impl CacheError {
    pub fn invalid_config(msg: &str) -> Self {
        CacheError::InvalidConfig(msg.to_string())
    }

    pub fn allocation(msg: &str) -> Self {
        CacheError::Allocation(msg.to_string())
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CacheError::InvalidConfig(msg) => write!(f, "InvalidConfig: {}", msg),
            CacheError::Allocation(msg) => write!(f, "AllocationError: {}", msg),
            CacheError::SpanOutOfBlock {
                offset,
                size,
                block_size,
            } => write!(
                f,
                "SpanOutOfBlock: {} bytes at offset {} do not fit in a {} byte block",
                size, offset, block_size
            ),
            CacheError::BufferSize { expected, actual } => write!(
                f,
                "BufferSize: expected a {} byte buffer, got {} bytes",
                expected, actual
            ),
            CacheError::GeometryMismatch => {
                write!(f, "GeometryMismatch: snapshot shape does not match the cache")
            }
        }
    }
}

impl std::error::Error for CacheError {}

pub type CacheResult<T> = Result<T, CacheError>;
