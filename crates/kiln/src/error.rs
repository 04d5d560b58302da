//! Error type for the environment pipeline.

use thiserror::Error;

/// Errors raised while loading assets or extracting their contents.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Bundle(#[from] kiln_bundle::Error),

    #[error("{0}")]
    Serialized(#[from] kiln_serialized::Error),

    #[error("{0}")]
    Mesh(#[from] kiln_mesh::Error),
}

impl Error {
    /// Whether the condition leaves usable, if incomplete, results.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Mesh(e) if e.is_recoverable())
    }
}

/// Result type for environment operations.
pub type Result<T> = std::result::Result<T, Error>;
