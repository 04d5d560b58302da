//! Block decompression.
//!
//! Decompression sits behind [`BlockDecompressor`] so callers can supply
//! codecs this crate does not link, such as LZMA for `UnityWeb` payloads.

use crate::{CompressionType, Error, Result};

/// Decompresses one block-info region or storage block.
pub trait BlockDecompressor: Send + Sync {
    /// Decompress `input` encoded with `codec` into exactly `uncompressed_size` bytes.
    fn decompress(
        &self,
        codec: CompressionType,
        input: &[u8],
        uncompressed_size: usize,
    ) -> Result<Vec<u8>>;
}

/// Handles uncompressed, LZ4 and LZ4HC blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Decompressor;

impl BlockDecompressor for Lz4Decompressor {
    fn decompress(
        &self,
        codec: CompressionType,
        input: &[u8],
        uncompressed_size: usize,
    ) -> Result<Vec<u8>> {
        match codec {
            CompressionType::None => {
                if input.len() != uncompressed_size {
                    return Err(Error::Decompression(format!(
                        "stored block is {} bytes, expected {}",
                        input.len(),
                        uncompressed_size
                    )));
                }
                Ok(input.to_vec())
            }
            CompressionType::Lz4 | CompressionType::Lz4Hc => {
                decompress_lz4(input, uncompressed_size)
            }
            other => Err(Error::UnsupportedCompression(other)),
        }
    }
}

/// Upper bound on how far one LZ4 input byte can expand.
pub(crate) const MAX_LZ4_RATIO: usize = 255;

/// Decompress a raw LZ4 block of known output size.
///
/// Sizes no LZ4 stream of `input.len()` bytes can produce are rejected
/// before the output buffer is allocated.
pub fn decompress_lz4(input: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    if uncompressed_size > input.len().saturating_mul(MAX_LZ4_RATIO) {
        return Err(Error::Decompression(format!(
            "LZ4 block of {} bytes cannot expand to {} bytes",
            input.len(),
            uncompressed_size
        )));
    }

    let mut output = vec![0u8; uncompressed_size];
    let written = lz4_flex::decompress_into(input, &mut output)
        .map_err(|e| Error::Decompression(e.to_string()))?;

    if written != uncompressed_size {
        return Err(Error::Decompression(format!(
            "LZ4 block produced {} bytes, expected {}",
            written, uncompressed_size
        )));
    }
    Ok(output)
}
