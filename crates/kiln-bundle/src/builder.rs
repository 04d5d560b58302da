//! Writer for bundle containers.
//!
//! Produces byte-exact `UnityFS` and `UnityRaw` containers from a list of
//! named nodes, for fixtures and for repacking extracted files.

use kiln_common::{BinaryWriter, Endian};

use crate::header::ArchiveFlags;
use crate::CompressionType;

#[derive(Debug, Clone)]
struct PendingNode {
    path: String,
    flags: u32,
    data: Vec<u8>,
}

/// Builder for bundle containers.
///
/// # Example
///
/// ```
/// use kiln_bundle::{Bundle, BundleBuilder, CompressionType};
///
/// let mut builder = BundleBuilder::new();
/// builder
///     .compression(CompressionType::Lz4Hc)
///     .add_node("CAB-0001", 4, b"payload".to_vec());
///
/// let bundle = Bundle::parse(&builder.build()).unwrap();
/// assert_eq!(bundle.read("CAB-0001").unwrap(), b"payload");
/// ```
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    raw_version: Option<u32>,
    version: u32,
    player_version: String,
    engine_version: String,
    compression: CompressionType,
    info_compression: CompressionType,
    block_size: usize,
    block_info_at_end: bool,
    padding: bool,
    block_hash: [u8; 16],
    nodes: Vec<PendingNode>,
}

impl Default for BundleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleBuilder {
    /// A `UnityFS` version 7 builder with stored blocks.
    pub fn new() -> Self {
        Self {
            raw_version: None,
            version: 7,
            player_version: "5.x.x".to_string(),
            engine_version: "2019.4.31f1".to_string(),
            compression: CompressionType::None,
            info_compression: CompressionType::None,
            block_size: 0x20000,
            block_info_at_end: false,
            padding: false,
            block_hash: [0; 16],
            nodes: Vec::new(),
        }
    }

    /// Emit the `UnityRaw` header shape at the given format version instead.
    pub fn raw(&mut self, version: u32) -> &mut Self {
        self.raw_version = Some(version);
        self
    }

    pub fn version(&mut self, version: u32) -> &mut Self {
        self.version = version;
        self
    }

    pub fn player_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.player_version = version.into();
        self
    }

    pub fn engine_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.engine_version = version.into();
        self
    }

    /// Codec for storage blocks. Only LZ4 and LZ4HC compress; anything else is stored.
    pub fn compression(&mut self, codec: CompressionType) -> &mut Self {
        self.compression = codec;
        self
    }

    /// Codec for the block-info region.
    pub fn block_info_compression(&mut self, codec: CompressionType) -> &mut Self {
        self.info_compression = codec;
        self
    }

    /// Maximum uncompressed bytes per storage block.
    pub fn block_size(&mut self, size: usize) -> &mut Self {
        self.block_size = size.max(1);
        self
    }

    pub fn block_info_at_end(&mut self, at_end: bool) -> &mut Self {
        self.block_info_at_end = at_end;
        self
    }

    /// Pad block data to 16 bytes (honoured for version 7 and later).
    pub fn padding(&mut self, padding: bool) -> &mut Self {
        self.padding = padding;
        self
    }

    pub fn block_hash(&mut self, hash: [u8; 16]) -> &mut Self {
        self.block_hash = hash;
        self
    }

    pub fn add_node(&mut self, path: impl Into<String>, flags: u32, data: Vec<u8>) -> &mut Self {
        self.nodes.push(PendingNode {
            path: path.into(),
            flags,
            data,
        });
        self
    }

    /// Serialise the container.
    pub fn build(&self) -> Vec<u8> {
        match self.raw_version {
            Some(version) => self.build_raw(version),
            None => self.build_fs(),
        }
    }

    fn build_fs(&self) -> Vec<u8> {
        let mut data = Vec::new();
        let mut entries = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            entries.push((data.len() as i64, node));
            data.extend_from_slice(&node.data);
        }

        let block_codec = effective(self.compression);
        let mut blocks = Vec::new();
        let mut block_data = Vec::new();
        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![&data[..]]
        } else {
            data.chunks(self.block_size).collect()
        };
        for chunk in chunks {
            let encoded = encode(block_codec, chunk);
            blocks.push((chunk.len() as u32, encoded.len() as u32));
            block_data.extend_from_slice(&encoded);
        }

        let mut info = BinaryWriter::new(Endian::Big);
        info.write_bytes(&self.block_hash);
        info.write_i32(blocks.len() as i32);
        for (uncompressed, compressed) in &blocks {
            info.write_u32(*uncompressed)
                .write_u32(*compressed)
                .write_u16(block_codec.id() as u16);
        }
        info.write_i32(entries.len() as i32);
        for (offset, node) in &entries {
            info.write_i64(*offset)
                .write_i64(node.data.len() as i64)
                .write_u32(node.flags)
                .write_cstring(&node.path);
        }
        let info = info.into_inner();
        let info_codec = effective(self.info_compression);
        let encoded_info = encode(info_codec, &info);

        let mut flags = info_codec.id() as u32 | ArchiveFlags::BLOCKS_AND_DIRECTORY_COMBINED;
        if self.block_info_at_end {
            flags |= ArchiveFlags::BLOCK_INFO_AT_END;
        }
        if self.padding {
            flags |= ArchiveFlags::BLOCK_INFO_NEEDS_PADDING;
        }

        let mut out = BinaryWriter::new(Endian::Big);
        out.write_cstring("UnityFS")
            .write_u32(self.version)
            .write_cstring(&self.player_version)
            .write_cstring(&self.engine_version);
        let size_at = out.position();
        out.write_i64(0)
            .write_i32(encoded_info.len() as i32)
            .write_i32(info.len() as i32)
            .write_u32(flags);

        if self.version >= 7 {
            out.align(16);
        }
        if !self.block_info_at_end {
            out.write_bytes(&encoded_info);
        }
        if self.version >= 7 && self.padding {
            out.align(16);
        }
        out.write_bytes(&block_data);
        if self.block_info_at_end {
            out.write_bytes(&encoded_info);
        }

        let total = out.position() as i64;
        out.patch_i64(size_at, total);
        out.into_inner()
    }

    fn build_raw(&self, version: u32) -> Vec<u8> {
        let dir_len: usize = 4 + self
            .nodes
            .iter()
            .map(|n| n.path.len() + 1 + 8)
            .sum::<usize>();

        let mut payload = BinaryWriter::new(Endian::Big);
        payload.write_i32(self.nodes.len() as i32);
        let mut offset = dir_len;
        for node in &self.nodes {
            payload
                .write_cstring(&node.path)
                .write_u32(offset as u32)
                .write_u32(node.data.len() as u32);
            offset += node.data.len();
        }
        for node in &self.nodes {
            payload.write_bytes(&node.data);
        }
        let payload = payload.into_inner();
        let payload_len = payload.len() as u32;

        let mut out = BinaryWriter::new(Endian::Big);
        out.write_cstring("UnityRaw")
            .write_u32(version)
            .write_cstring(&self.player_version)
            .write_cstring(&self.engine_version);
        if version >= 4 {
            out.write_bytes(&self.block_hash).write_u32(0);
        }
        let streamed_at = out.position();
        out.write_u32(0);
        let header_size_at = out.position();
        out.write_u32(0)
            .write_u32(1)
            .write_i32(1)
            .write_u32(payload_len)
            .write_u32(payload_len);
        let complete_at = out.position();
        if version >= 2 {
            out.write_u32(0);
        }
        if version >= 3 {
            out.write_u32(dir_len as u32);
        }
        out.align(4);

        let header_size = out.position() as u32;
        out.write_bytes(&payload);
        let total = out.position() as u32;

        out.patch_u32(streamed_at, total);
        out.patch_u32(header_size_at, header_size);
        if version >= 2 {
            out.patch_u32(complete_at, total);
        }
        out.into_inner()
    }
}

fn effective(codec: CompressionType) -> CompressionType {
    match codec {
        CompressionType::Lz4 | CompressionType::Lz4Hc => codec,
        _ => CompressionType::None,
    }
}

fn encode(codec: CompressionType, data: &[u8]) -> Vec<u8> {
    match codec {
        CompressionType::Lz4 | CompressionType::Lz4Hc => lz4_flex::compress(data),
        _ => data.to_vec(),
    }
}
