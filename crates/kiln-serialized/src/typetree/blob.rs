//! Tabular type tree encoding (format version 10 and 12+).
//!
//! Layout: `i32 node_count`, `i32 string_buffer_size`, then `node_count`
//! fixed records, then the string buffer. Records are 24 bytes, or 32 with a
//! trailing type hash from version 19.

use kiln_common::{BinaryReader, BinaryWriter};
use rustc_hash::FxHashMap;
use tracing::trace;

use super::common_strings::{self, COMMON_STRING_FLAG};
use super::{TypeTree, TypeTreeNode};
use crate::{Error, Result};

/// Size of one node record for a format version.
#[inline]
pub const fn record_size(version: u32) -> usize {
    if version >= 19 {
        32
    } else {
        24
    }
}

/// Read a tabular tree.
pub fn read(reader: &mut BinaryReader<'_>, version: u32) -> Result<TypeTree> {
    let start = reader.position();
    let node_count = reader.read_count()?;
    let string_size = reader.read_count()?;

    let needed = (node_count as u64) * record_size(version) as u64 + string_size as u64;
    if needed > reader.remaining() as u64 {
        return Err(Error::TruncatedMetadata {
            offset: start,
            field: "type_tree",
            needed,
            available: reader.remaining() as u64,
        });
    }

    let strings_at = reader.position() + node_count * record_size(version);
    let strings = reader.sub_reader(strings_at, string_size)?;

    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let node_version = reader.read_u16()?;
        let level = reader.read_u8()?;
        let type_flags = reader.read_u8()?;
        let type_offset = reader.read_u32()?;
        let name_offset = reader.read_u32()?;
        let byte_size = reader.read_i32()?;
        let index = reader.read_i32()?;
        let meta_flags = reader.read_u32()?;
        let ref_type_hash = if version >= 19 { reader.read_u64()? } else { 0 };

        let mut node = TypeTreeNode::new(
            resolve(&strings, type_offset)?,
            resolve(&strings, name_offset)?,
        );
        node.version = node_version as u32;
        node.level = level;
        node.type_flags = type_flags as u32;
        node.byte_size = byte_size;
        node.index = index;
        node.meta_flags = meta_flags;
        node.ref_type_hash = ref_type_hash;
        nodes.push(node);
    }
    reader.seek(strings_at + string_size);

    trace!(nodes = node_count, strings = string_size, "read tabular type tree");
    TypeTree::from_levels(nodes, start)
}

fn resolve(strings: &BinaryReader<'_>, offset: u32) -> Result<String> {
    if offset & COMMON_STRING_FLAG != 0 {
        let common = offset & !COMMON_STRING_FLAG;
        return Ok(match common_strings::lookup(common) {
            Some(s) => s.to_string(),
            None => {
                trace!(offset = common, "unknown common string");
                common.to_string()
            }
        });
    }

    let mut local = BinaryReader::new_at(strings.data(), offset as usize, strings.endian());
    Ok(local.read_cstring()?.to_string())
}

#[derive(Default)]
struct StringPool {
    bytes: Vec<u8>,
    offsets: FxHashMap<String, u32>,
}

impl StringPool {
    fn offset(&mut self, s: &str) -> u32 {
        if let Some(common) = common_strings::offset_of(s) {
            return common | COMMON_STRING_FLAG;
        }
        if let Some(&at) = self.offsets.get(s) {
            return at;
        }
        let at = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(s.to_string(), at);
        at
    }
}

/// Write a tree in the tabular encoding.
pub fn write(tree: &TypeTree, writer: &mut BinaryWriter, version: u32) {
    let mut pool = StringPool::default();
    let offsets: Vec<(u32, u32)> = tree
        .nodes()
        .iter()
        .map(|node| (pool.offset(&node.type_name), pool.offset(&node.name)))
        .collect();

    writer.write_i32(tree.len() as i32);
    writer.write_i32(pool.bytes.len() as i32);
    for (node, (type_offset, name_offset)) in tree.nodes().iter().zip(offsets) {
        writer
            .write_u16(node.version as u16)
            .write_u8(node.level)
            .write_u8(node.type_flags as u8)
            .write_u32(type_offset)
            .write_u32(name_offset)
            .write_i32(node.byte_size)
            .write_i32(node.index)
            .write_u32(node.meta_flags);
        if version >= 19 {
            writer.write_u64(node.ref_type_hash);
        }
    }
    writer.write_bytes(&pool.bytes);
}
