//! Error types for the serialized-file crate.

use thiserror::Error;

/// Errors raised while decoding a serialized file or one of its objects.
///
/// Structural variants carry the byte offset and the field at which the
/// inconsistency was detected.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] kiln_common::Error),

    /// Format version outside the supported range.
    #[error("unsupported serialized file version {version}")]
    UnsupportedVersion { version: u32 },

    /// Header fields inconsistent with the buffer length.
    #[error("corrupted header at offset {offset} ({field}): {detail}")]
    CorruptedHeader {
        offset: usize,
        field: &'static str,
        detail: String,
    },

    /// Declared metadata does not fit the available bytes.
    #[error("truncated metadata at offset {offset} ({field}): needed {needed} bytes, {available} available")]
    TruncatedMetadata {
        offset: usize,
        field: &'static str,
        needed: u64,
        available: u64,
    },

    /// An object's byte range falls outside the data region.
    #[error("invalid object info at offset {offset} (path id {path_id}): {detail}")]
    InvalidObjectInfo {
        offset: usize,
        path_id: i64,
        detail: String,
    },

    /// Two objects share a path id.
    #[error("duplicate path id {path_id} at offset {offset}")]
    DuplicateIdentifier { offset: usize, path_id: i64 },

    /// The endianness flag byte is neither 0 nor 1.
    #[error("endianness flag {value} at offset {offset} is not 0 or 1")]
    EndiannessMismatch { offset: usize, value: u8 },

    /// A type tree violates its structural invariants.
    #[error("malformed type tree at offset {offset} (node {node}): {detail}")]
    MalformedTypeTree {
        offset: usize,
        node: usize,
        detail: String,
    },

    /// An object references a type the catalog cannot resolve.
    #[error("type {type_id} not found in catalog (object table offset {offset})")]
    TypeNotFound { offset: usize, type_id: i32 },

    /// The object's type carries no field tree.
    #[error("no type tree for object {path_id} (class {class_id})")]
    TypeTreeMissing { path_id: i64, class_id: i32 },

    /// No object with the requested path id.
    #[error("object {0} not found")]
    ObjectNotFound(i64),

    /// A value does not have the shape its type tree node describes.
    #[error("value for {field:?} does not match node kind {expected}")]
    ValueMismatch { field: String, expected: &'static str },
}

/// Result type for serialized-file operations.
pub type Result<T> = std::result::Result<T, Error>;
