//! Bundle container decoder.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use kiln_common::{align_up, BinaryReader, Endian};
use memmap2::Mmap;
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::header::{ArchiveFlags, BundleHeader, RawHeaderInfo, Signature};
use crate::decompress::MAX_LZ4_RATIO;
use crate::{
    BlockDecompressor, BundleMetadata, BundleNode, CompressionType, Error, Lz4Decompressor,
    Result, StorageBlock,
};

/// Container format versions this decoder accepts.
pub const SUPPORTED_VERSIONS: std::ops::RangeInclusive<u32> = 1..=8;

/// Runtime options for decoding a bundle.
#[derive(Clone)]
pub struct BundleOptions {
    decompressor: Arc<dyn BlockDecompressor>,
}

impl BundleOptions {
    /// Use a custom decompressor for block-info and storage blocks.
    pub fn with_decompressor(decompressor: impl BlockDecompressor + 'static) -> Self {
        Self {
            decompressor: Arc::new(decompressor),
        }
    }

    #[inline]
    pub fn decompressor(&self) -> &dyn BlockDecompressor {
        self.decompressor.as_ref()
    }
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self::with_decompressor(Lz4Decompressor)
    }
}

impl fmt::Debug for BundleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleOptions").finish_non_exhaustive()
    }
}

/// A decoded bundle: header, tables and the decompressed data region.
#[derive(Debug, Clone)]
pub struct Bundle {
    header: BundleHeader,
    block_hash: Option<[u8; 16]>,
    blocks: Vec<StorageBlock>,
    nodes: Vec<BundleNode>,
    data_offset: usize,
    data: Vec<u8>,
}

/// Check whether a buffer starts with a known bundle signature.
pub fn is_bundle(data: &[u8]) -> bool {
    [b"UnityFS\0".as_slice(), b"UnityWeb\0", b"UnityRaw\0"]
        .iter()
        .any(|sig| data.starts_with(sig))
}

impl Bundle {
    /// Decode a bundle with default options.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with(data, &BundleOptions::default())
    }

    /// Memory-map a file and decode it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &BundleOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: &BundleOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::parse_with(&mmap, options)
    }

    /// Decode a bundle.
    pub fn parse_with(data: &[u8], options: &BundleOptions) -> Result<Self> {
        let mut reader = BinaryReader::with_endian(data, Endian::Big);

        let signature_text = reader.read_cstring().map_err(|_| {
            Error::InvalidSignature(
                String::from_utf8_lossy(&data[..data.len().min(16)]).into_owned(),
            )
        })?;
        let signature = Signature::parse(signature_text)
            .ok_or_else(|| Error::InvalidSignature(signature_text.to_string()))?;

        let version = reader.read_u32()?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(Error::UnsupportedVersion {
                signature: signature.as_str(),
                version,
            });
        }

        let player_version = reader.read_cstring()?.to_string();
        let engine_version = reader.read_cstring()?.to_string();

        let bundle = if signature.is_raw_shape() {
            Self::parse_raw(
                &mut reader,
                signature,
                version,
                player_version,
                engine_version,
                options,
            )?
        } else {
            Self::parse_fs(&mut reader, version, player_version, engine_version, options)?
        };

        debug!(
            signature = %signature,
            version,
            blocks = bundle.blocks.len(),
            nodes = bundle.nodes.len(),
            data_len = bundle.data.len(),
            "decoded bundle"
        );
        Ok(bundle)
    }

    fn parse_fs(
        reader: &mut BinaryReader<'_>,
        version: u32,
        player_version: String,
        engine_version: String,
        options: &BundleOptions,
    ) -> Result<Self> {
        let data = reader.data();

        let size = read_size_i64(reader, "size")?;
        let compressed_info = read_size_i32(reader, "compressed_block_info_size")?;
        let uncompressed_info = read_size_i32(reader, "uncompressed_block_info_size")?;
        let flags = ArchiveFlags(reader.read_u32()?);

        let mut header_end = reader.position();
        if version >= 7 {
            header_end = align_up(header_end, 16);
        }

        let info_start = if flags.block_info_at_end() {
            data.len().checked_sub(compressed_info).ok_or_else(|| {
                Error::corrupted(
                    header_end,
                    "compressed_block_info_size",
                    format!(
                        "block info of {} bytes does not fit a {} byte file",
                        compressed_info,
                        data.len()
                    ),
                )
            })?
        } else {
            header_end
        };

        let info_bytes = slice_checked(data, info_start, compressed_info)
            .ok_or_else(|| {
                Error::corrupted(
                    info_start,
                    "compressed_block_info_size",
                    "block info extends past end of file",
                )
            })?;

        trace!(
            codec = %flags.compression(),
            compressed_info,
            uncompressed_info,
            at_end = flags.block_info_at_end(),
            "reading block info"
        );
        let info = options
            .decompressor()
            .decompress(flags.compression(), info_bytes, uncompressed_info)?;

        let mut data_offset = if flags.block_info_at_end() {
            header_end
        } else {
            header_end + compressed_info
        };
        if version >= 7 && flags.block_info_needs_padding() {
            data_offset = align_up(data_offset, 16);
        }

        let mut info_reader = BinaryReader::with_endian(&info, Endian::Big);
        let block_hash: [u8; 16] = info_reader.read_array()?;

        let block_count = read_size_i32(&mut info_reader, "block_count")?;
        let mut blocks = Vec::with_capacity(block_count.min(info_reader.remaining() / 10));
        for _ in 0..block_count {
            blocks.push(StorageBlock {
                uncompressed_size: info_reader.read_u32()?,
                compressed_size: info_reader.read_u32()?,
                flags: info_reader.read_u16()?,
            });
        }

        let node_count = read_size_i32(&mut info_reader, "node_count")?;
        let mut nodes = Vec::with_capacity(node_count.min(info_reader.remaining() / 20));
        for _ in 0..node_count {
            let offset = read_size_i64(&mut info_reader, "node_offset")? as u64;
            let size = read_size_i64(&mut info_reader, "node_size")? as u64;
            let flags = info_reader.read_u32()?;
            let path = info_reader.read_cstring()?.to_string();
            nodes.push(BundleNode {
                offset,
                size,
                flags,
                path,
            });
        }

        let payload = decompress_blocks(data, data_offset, &blocks, options)?;

        let header = BundleHeader {
            signature: Signature::UnityFS,
            version,
            player_version,
            engine_version,
            size: size as u64,
            compressed_block_info_size: compressed_info as u32,
            uncompressed_block_info_size: uncompressed_info as u32,
            flags,
            raw: None,
        };

        Self::finish(header, Some(block_hash), blocks, nodes, data_offset, payload)
    }

    fn parse_raw(
        reader: &mut BinaryReader<'_>,
        signature: Signature,
        version: u32,
        player_version: String,
        engine_version: String,
        options: &BundleOptions,
    ) -> Result<Self> {
        let data = reader.data();

        let mut raw = RawHeaderInfo::default();
        if version >= 4 {
            raw.hash = Some(reader.read_array()?);
            raw.crc = Some(reader.read_u32()?);
        }
        raw.minimum_streamed_bytes = reader.read_u32()?;
        raw.header_size = reader.read_u32()?;
        raw.levels_before_streaming = reader.read_u32()?;

        let level_count = read_size_i32(reader, "level_count")?;
        for _ in 0..level_count {
            let compressed = reader.read_u32()?;
            let uncompressed = reader.read_u32()?;
            raw.levels.push((compressed, uncompressed));
        }
        if version >= 2 {
            raw.complete_file_size = Some(reader.read_u32()?);
        }
        if version >= 3 {
            raw.file_info_header_size = Some(reader.read_u32()?);
        }

        let &(compressed, uncompressed) = raw.levels.last().ok_or_else(|| {
            Error::corrupted(reader.position(), "level_count", "no level descriptors")
        })?;

        let header_size = raw.header_size as usize;
        let codec = match signature {
            Signature::UnityWeb => CompressionType::Lzma,
            _ => CompressionType::None,
        };

        // Stored payloads are read at their uncompressed length.
        let stored_len = match codec {
            CompressionType::None => uncompressed,
            _ => compressed,
        } as usize;
        let stored = slice_checked(data, header_size, stored_len).ok_or_else(|| {
            Error::corrupted(
                header_size,
                "header_size",
                format!("payload of {} bytes extends past end of file", stored_len),
            )
        })?;

        let payload = options
            .decompressor()
            .decompress(codec, stored, uncompressed as usize)?;

        let mut dir = BinaryReader::with_endian(&payload, Endian::Big);
        let node_count = read_size_i32(&mut dir, "node_count")?;
        let mut nodes = Vec::with_capacity(node_count.min(dir.remaining() / 9));
        for _ in 0..node_count {
            let path = dir.read_cstring()?.to_string();
            let offset = dir.read_u32()? as u64;
            let size = dir.read_u32()? as u64;
            nodes.push(BundleNode {
                offset,
                size,
                flags: 0,
                path,
            });
        }

        let blocks = vec![StorageBlock {
            uncompressed_size: uncompressed,
            compressed_size: compressed,
            flags: codec.id() as u16,
        }];

        let header = BundleHeader {
            signature,
            version,
            player_version,
            engine_version,
            size: raw
                .complete_file_size
                .map(u64::from)
                .unwrap_or(data.len() as u64),
            compressed_block_info_size: compressed,
            uncompressed_block_info_size: uncompressed,
            flags: ArchiveFlags::default(),
            raw: Some(raw),
        };

        Self::finish(header, None, blocks, nodes, header_size, payload)
    }

    /// Validate the directory against the decompressed data region.
    fn finish(
        header: BundleHeader,
        block_hash: Option<[u8; 16]>,
        blocks: Vec<StorageBlock>,
        nodes: Vec<BundleNode>,
        data_offset: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::corrupted(data_offset, "node_count", "directory is empty"));
        }

        let mut seen = FxHashSet::default();
        for node in &nodes {
            if !seen.insert(node.path.as_str()) {
                return Err(Error::DuplicateIdentifier {
                    offset: data_offset,
                    path: node.path.clone(),
                });
            }
            match node.range() {
                Some(range) if range.end <= data.len() => {}
                _ => {
                    return Err(Error::corrupted(
                        data_offset,
                        "node_size",
                        format!(
                            "node {:?} ({} bytes at {}) exceeds {} bytes of block data",
                            node.path,
                            node.size,
                            node.offset,
                            data.len()
                        ),
                    ))
                }
            }
        }

        Ok(Self {
            header,
            block_hash,
            blocks,
            nodes,
            data_offset,
            data,
        })
    }

    #[inline]
    pub fn header(&self) -> &BundleHeader {
        &self.header
    }

    /// Hash preceding the block table (modern containers only).
    #[inline]
    pub fn block_hash(&self) -> Option<&[u8; 16]> {
        self.block_hash.as_ref()
    }

    #[inline]
    pub fn blocks(&self) -> &[StorageBlock] {
        &self.blocks
    }

    #[inline]
    pub fn nodes(&self) -> &[BundleNode] {
        &self.nodes
    }

    /// File offset where block data begins.
    #[inline]
    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    /// The concatenated decompressed blocks.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Find a node by exact path.
    pub fn node(&self, path: &str) -> Option<&BundleNode> {
        self.nodes.iter().find(|n| n.path == path)
    }

    /// Bytes of a node.
    pub fn node_data(&self, node: &BundleNode) -> Result<&[u8]> {
        node.range()
            .and_then(|range| self.data.get(range))
            .ok_or_else(|| Error::NodeNotFound(node.path.clone()))
    }

    /// Bytes of the node at `path`.
    pub fn read(&self, path: &str) -> Result<&[u8]> {
        let node = self
            .node(path)
            .ok_or_else(|| Error::NodeNotFound(path.to_string()))?;
        self.node_data(node)
    }

    /// Iterate nodes flagged as serialized files.
    pub fn serialized_files(&self) -> impl Iterator<Item = &BundleNode> {
        self.nodes.iter().filter(|n| n.is_serialized_file())
    }

    /// Summary of the container for reports.
    pub fn metadata(&self) -> BundleMetadata {
        BundleMetadata::from_bundle(self)
    }
}

fn slice_checked(data: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    data.get(offset..offset.checked_add(len)?)
}

fn read_size_i32(reader: &mut BinaryReader<'_>, field: &'static str) -> Result<usize> {
    let offset = reader.position();
    let value = reader.read_i32()?;
    usize::try_from(value)
        .map_err(|_| Error::corrupted(offset, field, format!("negative size {}", value)))
}

fn read_size_i64(reader: &mut BinaryReader<'_>, field: &'static str) -> Result<usize> {
    let offset = reader.position();
    let value = reader.read_i64()?;
    usize::try_from(value)
        .map_err(|_| Error::corrupted(offset, field, format!("size {} out of range", value)))
}

fn decompress_blocks(
    data: &[u8],
    data_offset: usize,
    blocks: &[StorageBlock],
    options: &BundleOptions,
) -> Result<Vec<u8>> {
    let total = blocks
        .iter()
        .try_fold(0usize, |sum, block| sum.checked_add(block.uncompressed_size as usize))
        .ok_or_else(|| {
            Error::corrupted(data_offset, "uncompressed_size", "block sizes overflow")
        })?;
    // Sizes are unverified until each block decodes.
    let mut out = Vec::with_capacity(total.min(data.len().saturating_mul(MAX_LZ4_RATIO)));

    let mut cursor = data_offset;
    for (index, block) in blocks.iter().enumerate() {
        let input = slice_checked(data, cursor, block.compressed_size as usize).ok_or_else(|| {
            Error::corrupted(
                cursor,
                "compressed_size",
                format!("block {} extends past end of file", index),
            )
        })?;

        let decoded = options.decompressor().decompress(
            block.compression(),
            input,
            block.uncompressed_size as usize,
        )?;
        out.extend_from_slice(&decoded);
        cursor += input.len();
    }

    trace!(blocks = blocks.len(), bytes = out.len(), "decompressed blocks");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BundleBuilder;

    fn sample() -> BundleBuilder {
        let mut builder = BundleBuilder::new();
        builder
            .add_node("CAB-0001", BundleNode::SERIALIZED_FILE, b"serialized bytes".to_vec())
            .add_node("CAB-0001.resS", 0, vec![7u8; 300]);
        builder
    }

    #[test]
    fn test_parse_uncompressed_fs() {
        let bytes = sample().build();
        assert!(is_bundle(&bytes));

        let bundle = Bundle::parse(&bytes).unwrap();
        assert_eq!(bundle.header().signature, Signature::UnityFS);
        assert_eq!(bundle.header().size, bytes.len() as u64);
        assert_eq!(bundle.nodes().len(), 2);
        assert_eq!(bundle.read("CAB-0001").unwrap(), b"serialized bytes");
        assert_eq!(bundle.read("CAB-0001.resS").unwrap(), &[7u8; 300][..]);
        assert_eq!(bundle.serialized_files().count(), 1);
    }

    #[test]
    fn test_parse_lz4_blocks_info_at_end() {
        let mut builder = sample();
        builder
            .compression(CompressionType::Lz4Hc)
            .block_info_compression(CompressionType::Lz4)
            .block_size(64)
            .block_info_at_end(true);
        let bytes = builder.build();

        let bundle = Bundle::parse(&bytes).unwrap();
        assert!(bundle.header().flags.block_info_at_end());
        assert_eq!(bundle.header().flags.compression(), CompressionType::Lz4);
        assert!(bundle.blocks().len() > 1);
        assert!(bundle
            .blocks()
            .iter()
            .all(|b| b.compression() == CompressionType::Lz4Hc));
        assert_eq!(bundle.read("CAB-0001.resS").unwrap(), &[7u8; 300][..]);
    }

    #[test]
    fn test_padding_and_version_six() {
        for (version, padding) in [(6, false), (7, true), (8, false)] {
            let mut builder = sample();
            builder.version(version).padding(padding);
            let bytes = builder.build();

            let bundle = Bundle::parse(&bytes).unwrap();
            if version >= 7 && padding {
                assert_eq!(bundle.data_offset() % 16, 0);
            }
            assert_eq!(bundle.read("CAB-0001").unwrap(), b"serialized bytes");
        }
    }

    #[test]
    fn test_block_hash_preserved() {
        let mut builder = sample();
        builder.block_hash([0xAB; 16]);
        let bundle = Bundle::parse(&builder.build()).unwrap();
        assert_eq!(bundle.block_hash(), Some(&[0xAB; 16]));
    }

    #[test]
    fn test_rejects_unknown_signature() {
        let result = Bundle::parse(b"UnityArchive\0\0\0\0\x06");
        assert!(matches!(result, Err(Error::InvalidSignature(s)) if s == "UnityArchive"));
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let mut builder = sample();
        builder.version(42);
        assert!(matches!(
            Bundle::parse(&builder.build()),
            Err(Error::UnsupportedVersion { version: 42, .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_paths() {
        let mut builder = BundleBuilder::new();
        builder
            .add_node("CAB-dup", 4, vec![1, 2, 3])
            .add_node("CAB-dup", 4, vec![4, 5, 6]);
        assert!(matches!(
            Bundle::parse(&builder.build()),
            Err(Error::DuplicateIdentifier { path, .. }) if path == "CAB-dup"
        ));
    }

    #[test]
    fn test_rejects_empty_directory() {
        let bytes = BundleBuilder::new().build();
        assert!(matches!(
            Bundle::parse(&bytes),
            Err(Error::CorruptedHeader { field: "node_count", .. })
        ));
    }

    #[test]
    fn test_rejects_negative_block_info_size() {
        let mut bytes = sample().build();
        let mut reader = BinaryReader::with_endian(&bytes, Endian::Big);
        reader.read_cstring().unwrap();
        reader.read_u32().unwrap();
        reader.read_cstring().unwrap();
        reader.read_cstring().unwrap();
        reader.read_i64().unwrap();
        let pos = reader.position();
        bytes[pos..pos + 4].copy_from_slice(&(-5i32).to_be_bytes());

        assert!(matches!(
            Bundle::parse(&bytes),
            Err(Error::CorruptedHeader {
                field: "compressed_block_info_size",
                ..
            })
        ));
    }

    /// Stored-info v6 container whose block table is `blocks` entries of `size` bytes.
    fn oversized_block_table(blocks: usize, size: u32) -> Vec<u8> {
        let mut info = kiln_common::BinaryWriter::new(Endian::Big);
        info.write_bytes(&[0; 16]).write_i32(blocks as i32);
        for _ in 0..blocks {
            info.write_u32(size).write_u32(0).write_u16(0);
        }
        info.write_i32(1)
            .write_i64(0)
            .write_i64(0)
            .write_u32(BundleNode::SERIALIZED_FILE)
            .write_cstring("CAB-0001");
        let info = info.into_inner();

        let mut out = kiln_common::BinaryWriter::new(Endian::Big);
        out.write_cstring("UnityFS")
            .write_u32(6)
            .write_cstring("5.x.x")
            .write_cstring("2019.4.31f1")
            .write_i64(0)
            .write_i32(info.len() as i32)
            .write_i32(info.len() as i32)
            .write_u32(0)
            .write_bytes(&info);
        out.into_inner()
    }

    #[test]
    fn test_huge_block_sizes_are_errors() {
        let bytes = oversized_block_table(40_000, u32::MAX);
        assert!(matches!(
            Bundle::parse(&bytes),
            Err(Error::Decompression(_))
        ));
    }

    #[test]
    fn test_lz4_block_size_beyond_input_is_error() {
        let mut builder = sample();
        builder.compression(CompressionType::Lz4);
        let mut bytes = builder.build();

        // The first block entry follows the 16-byte hash and the block count.
        let mut reader = BinaryReader::with_endian(&bytes, Endian::Big);
        reader.read_cstring().unwrap();
        reader.read_u32().unwrap();
        reader.read_cstring().unwrap();
        reader.read_cstring().unwrap();
        reader.read_i64().unwrap();
        reader.read_i32().unwrap();
        reader.read_i32().unwrap();
        reader.read_u32().unwrap();
        let entry = align_up(reader.position(), 16) + 16 + 4;
        bytes[entry..entry + 4].copy_from_slice(&u32::MAX.to_be_bytes());

        assert!(matches!(
            Bundle::parse(&bytes),
            Err(Error::Decompression(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_blocks() {
        let mut bytes = sample().build();
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            Bundle::parse(&bytes),
            Err(Error::CorruptedHeader { .. })
        ));
    }

    #[test]
    fn test_parse_raw_shape() {
        let mut builder = sample();
        builder.raw(3);
        let bytes = builder.build();

        let bundle = Bundle::parse(&bytes).unwrap();
        assert_eq!(bundle.header().signature, Signature::UnityRaw);
        let raw = bundle.header().raw.as_ref().unwrap();
        assert_eq!(raw.levels.len(), 1);
        assert!(raw.file_info_header_size.is_some());
        assert_eq!(bundle.read("CAB-0001").unwrap(), b"serialized bytes");
        assert_eq!(bundle.data_offset(), raw.header_size as usize);
    }

    struct StoredLzma;

    impl BlockDecompressor for StoredLzma {
        fn decompress(&self, codec: CompressionType, input: &[u8], size: usize) -> Result<Vec<u8>> {
            match codec {
                CompressionType::Lzma => Ok(input[..size].to_vec()),
                other => Lz4Decompressor.decompress(other, input, size),
            }
        }
    }

    #[test]
    fn test_web_shape_uses_injected_decompressor() {
        let mut builder = sample();
        builder.raw(5);
        let mut bytes = builder.build();
        bytes[..8].copy_from_slice(b"UnityWeb");

        assert!(matches!(
            Bundle::parse(&bytes),
            Err(Error::UnsupportedCompression(CompressionType::Lzma))
        ));

        let bundle =
            Bundle::parse_with(&bytes, &BundleOptions::with_decompressor(StoredLzma)).unwrap();
        assert_eq!(bundle.header().signature, Signature::UnityWeb);
        assert!(bundle.header().raw.as_ref().unwrap().hash.is_some());
        assert_eq!(bundle.read("CAB-0001.resS").unwrap().len(), 300);
    }

    #[test]
    fn test_node_not_found() {
        let bundle = Bundle::parse(&sample().build()).unwrap();
        assert!(matches!(bundle.read("missing"), Err(Error::NodeNotFound(_))));
    }
}
