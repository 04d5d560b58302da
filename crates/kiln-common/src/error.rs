//! Error types for kiln-common.

use thiserror::Error;

/// Common error type for Kiln operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A read ran past the end of the buffer.
    #[error("unexpected end of buffer at offset {offset}: needed {needed} bytes but only {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A count or length prefix was negative.
    #[error("negative length {value} at offset {offset}")]
    NegativeLength { offset: usize, value: i64 },

    /// Invalid GUID format.
    #[error("invalid GUID format: {0}")]
    InvalidGuid(String),

    /// Engine version string could not be parsed.
    #[error("invalid engine version string: {0:?}")]
    InvalidVersion(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error.
    #[error("UTF-8 error at offset {offset}: {source}")]
    Utf8 {
        offset: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    /// Missing null terminator in string.
    #[error("string at offset {offset} missing null terminator")]
    MissingNullTerminator { offset: usize },
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
