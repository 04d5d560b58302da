//! Storage block table entries.

use std::fmt;

/// Codec selected by the low six bits of a block or header flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CompressionType {
    None,
    Lzma,
    Lz4,
    Lz4Hc,
    Lzham,
    /// A codec id this decoder does not know.
    Unknown(u8),
}

impl CompressionType {
    /// Mask applied to flag words before decoding the codec id.
    pub const MASK: u32 = 0x3F;

    /// Decode a codec id from a flag word.
    #[inline]
    pub const fn from_flags(flags: u32) -> Self {
        match (flags & Self::MASK) as u8 {
            0 => Self::None,
            1 => Self::Lzma,
            2 => Self::Lz4,
            3 => Self::Lz4Hc,
            4 => Self::Lzham,
            other => Self::Unknown(other),
        }
    }

    /// The on-disk codec id.
    #[inline]
    pub const fn id(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Lzma => 1,
            Self::Lz4 => 2,
            Self::Lz4Hc => 3,
            Self::Lzham => 4,
            Self::Unknown(id) => id,
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Lzma => f.write_str("LZMA"),
            Self::Lz4 => f.write_str("LZ4"),
            Self::Lz4Hc => f.write_str("LZ4HC"),
            Self::Lzham => f.write_str("LZHAM"),
            Self::Unknown(id) => write!(f, "unknown codec {}", id),
        }
    }
}

/// One entry of the block-info table.
///
/// Blocks are stored back to back after the header; decompressing them in
/// order yields the contiguous data region that node offsets address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StorageBlock {
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub flags: u16,
}

impl StorageBlock {
    /// Block is part of a streamed region.
    pub const STREAMED: u16 = 0x40;

    #[inline]
    pub const fn compression(&self) -> CompressionType {
        CompressionType::from_flags(self.flags as u32)
    }

    #[inline]
    pub const fn is_streamed(&self) -> bool {
        self.flags & Self::STREAMED != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_from_flags_masks_high_bits() {
        assert_eq!(CompressionType::from_flags(0x43), CompressionType::Lz4Hc);
        assert_eq!(CompressionType::from_flags(0x240), CompressionType::None);
        assert_eq!(CompressionType::from_flags(9), CompressionType::Unknown(9));
        assert_eq!(CompressionType::Lzma.id(), 1);
    }

    #[test]
    fn test_block_flags() {
        let block = StorageBlock {
            uncompressed_size: 10,
            compressed_size: 8,
            flags: 0x42,
        };
        assert_eq!(block.compression(), CompressionType::Lz4);
        assert!(block.is_streamed());
    }
}
