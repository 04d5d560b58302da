//! Error types for the bundle crate.

use thiserror::Error;

/// Errors that can occur when decoding a bundle container.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] kiln_common::Error),

    /// The leading signature string is not a known container shape.
    #[error("unrecognised bundle signature {0:?}")]
    InvalidSignature(String),

    /// Container format version outside the supported range.
    #[error("unsupported bundle format version {version} for {signature}")]
    UnsupportedVersion { signature: &'static str, version: u32 },

    /// Header or table fields inconsistent with the buffer.
    #[error("corrupted bundle header at offset {offset} ({field}): {detail}")]
    CorruptedHeader {
        offset: usize,
        field: &'static str,
        detail: String,
    },

    /// Two directory entries share a path.
    #[error("duplicate node path {path:?} at offset {offset}")]
    DuplicateIdentifier { offset: usize, path: String },

    /// Block codec the configured decompressor cannot handle.
    #[error("unsupported block compression: {0}")]
    UnsupportedCompression(crate::CompressionType),

    /// A block failed to decompress.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// No node with the requested path.
    #[error("node not found: {0}")]
    NodeNotFound(String),
}

impl Error {
    pub(crate) fn corrupted(offset: usize, field: &'static str, detail: impl Into<String>) -> Self {
        Self::CorruptedHeader {
            offset,
            field,
            detail: detail.into(),
        }
    }
}

/// Result type for bundle operations.
pub type Result<T> = std::result::Result<T, Error>;
