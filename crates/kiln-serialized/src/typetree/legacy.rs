//! Legacy per-node type tree encoding (format versions below 10, and 11).
//!
//! Each node is written inline with its own strings and an explicit child
//! count, so the shape needs no reconstruction.

use kiln_common::{BinaryReader, BinaryWriter};

use super::{NodeId, TypeTree, TypeTreeNode, TYPE_FLAG_ARRAY};
use crate::{Error, Result};

/// Deepest nesting accepted before the tree is treated as corrupt.
pub const MAX_DEPTH: usize = 64;

/// Read a legacy tree.
pub fn read(reader: &mut BinaryReader<'_>) -> Result<TypeTree> {
    let start = reader.position();
    let mut nodes = Vec::new();
    read_node(reader, &mut nodes, 0, start)?;
    TypeTree::from_nodes(nodes, start)
}

fn read_node(
    reader: &mut BinaryReader<'_>,
    nodes: &mut Vec<TypeTreeNode>,
    depth: usize,
    start: usize,
) -> Result<NodeId> {
    if depth > MAX_DEPTH {
        return Err(Error::MalformedTypeTree {
            offset: start,
            node: nodes.len(),
            detail: format!("nesting deeper than {} levels", MAX_DEPTH),
        });
    }

    let sub_version = reader.read_u32()?;
    let type_name = reader.read_cstring()?;
    let name = reader.read_cstring()?;

    let mut node = TypeTreeNode::new(type_name, name);
    node.version = sub_version;
    node.level = depth as u8;
    node.byte_size = reader.read_i32()?;
    if sub_version == 2 {
        node.variable_count = reader.read_i32()?;
    }
    if sub_version != 3 {
        node.index = reader.read_i32()?;
    }
    node.type_flags = if sub_version >= 2 {
        reader.read_u32()?
    } else if type_name == "Array" {
        TYPE_FLAG_ARRAY
    } else {
        0
    };
    if sub_version != 3 {
        node.meta_flags = reader.read_u32()?;
    }

    let child_count = reader.read_count()?;
    let id = NodeId(nodes.len() as u32);
    nodes.push(node);

    let mut children = Vec::with_capacity(child_count.min(reader.remaining() / 16));
    for _ in 0..child_count {
        children.push(read_node(reader, nodes, depth + 1, start)?);
    }
    nodes[id.index()].children = children;
    Ok(id)
}

/// Write a tree in the legacy encoding.
pub fn write(tree: &TypeTree, writer: &mut BinaryWriter) {
    write_node(tree, NodeId::ROOT, writer);
}

fn write_node(tree: &TypeTree, id: NodeId, writer: &mut BinaryWriter) {
    let node = tree.node(id);
    writer
        .write_u32(node.version)
        .write_cstring(&node.type_name)
        .write_cstring(&node.name)
        .write_i32(node.byte_size);
    if node.version == 2 {
        writer.write_i32(node.variable_count);
    }
    if node.version != 3 {
        writer.write_i32(node.index);
    }
    if node.version >= 2 {
        writer.write_u32(node.type_flags);
    }
    if node.version != 3 {
        writer.write_u32(node.meta_flags);
    }
    writer.write_i32(node.children.len() as i32);
    for &child in &node.children {
        write_node(tree, child, writer);
    }
}
