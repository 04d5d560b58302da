//! Common utilities for Kiln.
//!
//! This crate provides foundational types used across all Kiln crates:
//!
//! - [`BinaryReader`] - Zero-copy, endian-aware reading from byte slices
//! - [`BinaryWriter`] - The writing counterpart, used to build fixtures and files
//! - [`Endian`] - Byte order selection, decided at runtime by the formats
//! - [`Guid`] - 16-byte identifiers used by external file references
//! - [`UnityVersion`] - Engine version strings such as `2019.4.31f1`

mod error;
mod guid;
mod reader;
mod version;
mod writer;

pub use error::{Error, Result};
pub use guid::Guid;
pub use reader::{BinaryReader, Endian};
pub use version::UnityVersion;
pub use writer::BinaryWriter;

/// zerocopy traits implemented by [`Guid`].
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Round `value` up to the next multiple of `alignment` (non-zero).
#[inline]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    let rem = value % alignment;
    if rem == 0 {
        value
    } else {
        value + (alignment - rem)
    }
}
