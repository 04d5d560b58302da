//! Error types for mesh extraction.

use thiserror::Error;

/// Errors raised while assembling mesh geometry.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] kiln_common::Error),

    /// The object could not be decoded generically.
    #[error("{0}")]
    Serialized(#[from] kiln_serialized::Error),

    /// A mesh field is missing or has the wrong generic shape.
    #[error("mesh field {field:?}: expected {expected}")]
    UnexpectedValue { field: String, expected: &'static str },

    /// No sibling node matches a streamed resource path.
    #[error("streamed resource {path:?} not found (tried {candidates:?})")]
    ResourceNotFound {
        path: String,
        candidates: Vec<String>,
    },

    /// A streamed range does not fit the node that holds it.
    #[error("streamed range {offset}+{size} exceeds resource {node:?} of {available} bytes")]
    InvalidStreamRange {
        node: String,
        offset: u64,
        size: u64,
        available: usize,
    },

    /// A packed vector declares more bits than its payload holds.
    #[error("packed vector {field:?} needs {needed} bytes, payload has {available}")]
    TruncatedPackedVector {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// A vertex channel uses a format code unknown for the engine version.
    #[error("unknown vertex format {format} on channel {channel}")]
    UnknownVertexFormat { channel: usize, format: u8 },

    /// A vertex channel reaches past the end of its stream data.
    #[error("vertex channel {channel} reads past {available} bytes of vertex data")]
    VertexDataOverrun { channel: usize, available: usize },
}

impl Error {
    /// Whether the caller can continue with empty geometry.
    ///
    /// Only a missing streamed resource qualifies; every other error means
    /// offsets can no longer be trusted.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::ResourceNotFound { .. })
    }

    pub(crate) fn unexpected(field: impl Into<String>, expected: &'static str) -> Self {
        Error::UnexpectedValue {
            field: field.into(),
            expected,
        }
    }
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, Error>;
