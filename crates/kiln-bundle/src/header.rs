//! Container header shapes.

use std::fmt;

use crate::CompressionType;

/// Leading signature string selecting the header shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Signature {
    /// Modern block-based container.
    UnityFS,
    /// Raw/web shape with an LZMA payload.
    UnityWeb,
    /// Raw/web shape with a stored payload.
    UnityRaw,
}

impl Signature {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "UnityFS" => Some(Self::UnityFS),
            "UnityWeb" => Some(Self::UnityWeb),
            "UnityRaw" => Some(Self::UnityRaw),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnityFS => "UnityFS",
            Self::UnityWeb => "UnityWeb",
            Self::UnityRaw => "UnityRaw",
        }
    }

    /// Whether this signature uses the raw/web header shape.
    #[inline]
    pub const fn is_raw_shape(self) -> bool {
        matches!(self, Self::UnityWeb | Self::UnityRaw)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The 32-bit flag word of a `UnityFS` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ArchiveFlags(pub u32);

impl ArchiveFlags {
    pub const COMPRESSION_MASK: u32 = 0x3F;
    pub const BLOCKS_AND_DIRECTORY_COMBINED: u32 = 0x40;
    pub const BLOCK_INFO_AT_END: u32 = 0x80;
    /// Only honoured for format version 7 and later.
    pub const BLOCK_INFO_NEEDS_PADDING: u32 = 0x200;

    /// Codec of the block-info region.
    #[inline]
    pub const fn compression(self) -> CompressionType {
        CompressionType::from_flags(self.0)
    }

    #[inline]
    pub const fn blocks_and_directory_combined(self) -> bool {
        self.0 & Self::BLOCKS_AND_DIRECTORY_COMBINED != 0
    }

    #[inline]
    pub const fn block_info_at_end(self) -> bool {
        self.0 & Self::BLOCK_INFO_AT_END != 0
    }

    #[inline]
    pub const fn block_info_needs_padding(self) -> bool {
        self.0 & Self::BLOCK_INFO_NEEDS_PADDING != 0
    }
}

/// Fields specific to the raw/web header shape.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RawHeaderInfo {
    /// Present for format version 4 and later.
    pub hash: Option<[u8; 16]>,
    pub crc: Option<u32>,
    pub minimum_streamed_bytes: u32,
    pub header_size: u32,
    pub levels_before_streaming: u32,
    /// `(compressed, uncompressed)` size pairs; the last one describes the payload.
    pub levels: Vec<(u32, u32)>,
    pub complete_file_size: Option<u32>,
    pub file_info_header_size: Option<u32>,
}

/// Decoded container header.
///
/// For the raw/web shape the block-info sizes mirror the last level pair
/// and `flags` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BundleHeader {
    pub signature: Signature,
    pub version: u32,
    pub player_version: String,
    pub engine_version: String,
    pub size: u64,
    pub compressed_block_info_size: u32,
    pub uncompressed_block_info_size: u32,
    pub flags: ArchiveFlags,
    pub raw: Option<RawHeaderInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_parse() {
        assert_eq!(Signature::parse("UnityFS"), Some(Signature::UnityFS));
        assert_eq!(Signature::parse("UnityArchive"), None);
        assert!(Signature::UnityWeb.is_raw_shape());
        assert!(!Signature::UnityFS.is_raw_shape());
    }

    #[test]
    fn test_archive_flags() {
        let flags = ArchiveFlags(0x2C3);
        assert_eq!(flags.compression(), CompressionType::Lz4Hc);
        assert!(flags.blocks_and_directory_combined());
        assert!(flags.block_info_at_end());
        assert!(flags.block_info_needs_padding());
        assert!(!ArchiveFlags(0x3).block_info_at_end());
    }
}
