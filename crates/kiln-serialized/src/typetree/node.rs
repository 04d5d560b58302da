//! Type tree arena and node kinds.

use crate::{Error, Result};

/// Meta flag requesting 4-byte alignment after the field is read.
pub const ALIGN_BYTES: u32 = 0x4000;

/// Type flag marking an array wrapper node.
pub const TYPE_FLAG_ARRAY: u32 = 0x1;

/// Index of a node inside its [`TypeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-width scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Map an engine type name to a scalar kind.
    pub fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "SInt8" => Self::I8,
            "UInt8" | "char" | "unsigned char" => Self::U8,
            "SInt16" | "short" => Self::I16,
            "UInt16" | "unsigned short" => Self::U16,
            "SInt32" | "int" => Self::I32,
            "UInt32" | "unsigned int" | "Type*" => Self::U32,
            "SInt64" | "long long" => Self::I64,
            "UInt64" | "unsigned long long" | "FileSize" => Self::U64,
            "float" => Self::F32,
            "double" => Self::F64,
            _ => return None,
        })
    }

    /// Width in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }
}

/// How a node's bytes are interpreted, decided once when the tree is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Primitive(PrimitiveKind),
    /// Length-prefixed text, always realigned.
    String,
    /// Length-prefixed raw bytes, always realigned.
    TypelessData,
    /// Array wrapper: a count read through `size`, then `element` repeated.
    Array { size: NodeId, element: NodeId },
    /// Container whose first child is the array wrapper.
    Vector { array: NodeId },
    /// Ordered fields, one per child.
    Struct,
    /// Leaf of unknown type with a fixed byte size.
    Opaque(u32),
}

/// A single field descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTreeNode {
    pub type_name: String,
    pub name: String,
    /// Declared size in bytes, `-1` when variable.
    pub byte_size: i32,
    pub index: i32,
    pub level: u8,
    pub version: u32,
    pub type_flags: u32,
    pub meta_flags: u32,
    /// Present for tabular trees of format version 19 and later.
    pub ref_type_hash: u64,
    /// Only written by legacy nodes with sub-version 2.
    pub variable_count: i32,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

impl TypeTreeNode {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            byte_size: -1,
            index: 0,
            level: 0,
            version: 1,
            type_flags: 0,
            meta_flags: 0,
            ref_type_hash: 0,
            variable_count: 0,
            children: Vec::new(),
            kind: NodeKind::Struct,
        }
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.type_flags & TYPE_FLAG_ARRAY != 0
    }

    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.meta_flags & ALIGN_BYTES != 0
    }
}

/// A field tree stored as an arena; node 0 is the root.
///
/// Trees are never empty once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTree {
    nodes: Vec<TypeTreeNode>,
}

impl TypeTree {
    /// Build a tree from nodes whose `children` are already linked, then
    /// validate it and assign node kinds.
    ///
    /// `offset` is the stream position reported in errors.
    pub fn from_nodes(nodes: Vec<TypeTreeNode>, offset: usize) -> Result<Self> {
        let mut tree = Self { nodes };
        tree.finalize(offset)?;
        Ok(tree)
    }

    /// A tree holding only a field-less root.
    pub fn empty_root(type_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![TypeTreeNode::new(type_name, "Base")],
        }
    }

    /// Link a flat, level-ordered node list into a tree.
    ///
    /// Parentage is implied by `level`: each node's parent is the closest
    /// preceding node with a smaller level.
    pub fn from_levels(mut nodes: Vec<TypeTreeNode>, offset: usize) -> Result<Self> {
        let mut stack: Vec<usize> = Vec::new();

        for i in 0..nodes.len() {
            let level = nodes[i].level;
            while let Some(&top) = stack.last() {
                if nodes[top].level >= level {
                    stack.pop();
                } else {
                    break;
                }
            }

            match stack.last() {
                Some(&parent) => nodes[parent].children.push(NodeId(i as u32)),
                None if i > 0 => {
                    return Err(Error::MalformedTypeTree {
                        offset,
                        node: i,
                        detail: format!("second root {:?} at level {}", nodes[i].name, level),
                    })
                }
                None => {}
            }
            stack.push(i);
        }

        Self::from_nodes(nodes, offset)
    }

    fn finalize(&mut self, offset: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::MalformedTypeTree {
                offset,
                node: 0,
                detail: "tree has no nodes".to_string(),
            });
        }

        for i in 0..self.nodes.len() {
            let kind = self.classify(i, offset)?;
            self.nodes[i].kind = kind;
        }
        Ok(())
    }

    fn classify(&self, i: usize, offset: usize) -> Result<NodeKind> {
        let node = &self.nodes[i];

        for child in &node.children {
            if child.index() <= i || child.index() >= self.nodes.len() {
                return Err(Error::MalformedTypeTree {
                    offset,
                    node: i,
                    detail: format!("child index {} out of order", child.0),
                });
            }
        }

        if node.type_name == "TypelessData" {
            return Ok(NodeKind::TypelessData);
        }

        if node.is_array() {
            if node.children.len() != 2 {
                return Err(Error::MalformedTypeTree {
                    offset,
                    node: i,
                    detail: format!(
                        "array node {:?} has {} children, expected 2",
                        node.name,
                        node.children.len()
                    ),
                });
            }
            return Ok(NodeKind::Array {
                size: node.children[0],
                element: node.children[1],
            });
        }

        if node.type_name == "string" {
            return Ok(NodeKind::String);
        }

        if node.children.is_empty() {
            if let Some(primitive) = PrimitiveKind::from_type_name(&node.type_name) {
                return Ok(NodeKind::Primitive(primitive));
            }
            return Ok(match u32::try_from(node.byte_size) {
                Ok(size) if size > 0 => NodeKind::Opaque(size),
                _ => NodeKind::Struct,
            });
        }

        let first = node.children[0];
        if self.nodes[first.index()].is_array() {
            return Ok(NodeKind::Vector { array: first });
        }

        Ok(NodeKind::Struct)
    }

    #[inline]
    pub fn root(&self) -> &TypeTreeNode {
        &self.nodes[0]
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &TypeTreeNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&TypeTreeNode> {
        self.nodes.get(id.index())
    }

    #[inline]
    pub fn nodes(&self) -> &[TypeTreeNode] {
        &self.nodes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Find a direct child by field name.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).name == name)
    }

    /// Depth-first `(id, node)` iteration in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TypeTreeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Render the tree as indented `type name` lines.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(NodeId::ROOT, 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        out.push_str(&"  ".repeat(depth));
        out.push_str(&node.type_name);
        out.push(' ');
        out.push_str(&node.name);
        if node.is_aligned() {
            out.push_str(" (aligned)");
        }
        out.push('\n');
        for &child in &node.children {
            self.dump_node(child, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(type_name: &str, name: &str, level: u8) -> TypeTreeNode {
        let mut n = TypeTreeNode::new(type_name, name);
        n.level = level;
        n
    }

    fn array(level: u8) -> TypeTreeNode {
        let mut n = node("Array", "Array", level);
        n.type_flags = TYPE_FLAG_ARRAY;
        n
    }

    #[test]
    fn test_levels_build_shape() {
        let tree = TypeTree::from_levels(
            vec![
                node("Mesh", "Base", 0),
                node("string", "m_Name", 1),
                array(2),
                node("int", "size", 3),
                node("char", "data", 3),
                node("vector", "m_Indices", 1),
                array(2),
                node("int", "size", 3),
                node("UInt16", "data", 3),
                node("int", "m_Count", 1),
            ],
            0,
        )
        .unwrap();

        assert_eq!(tree.root().children.len(), 3);
        assert_eq!(tree.node(NodeId(1)).kind, NodeKind::String);
        assert_eq!(
            tree.node(NodeId(5)).kind,
            NodeKind::Vector { array: NodeId(6) }
        );
        assert_eq!(
            tree.node(NodeId(6)).kind,
            NodeKind::Array {
                size: NodeId(7),
                element: NodeId(8)
            }
        );
        assert_eq!(
            tree.node(NodeId(9)).kind,
            NodeKind::Primitive(PrimitiveKind::I32)
        );
        assert_eq!(tree.child(NodeId::ROOT, "m_Count"), Some(NodeId(9)));
    }

    #[test]
    fn test_array_with_three_children_is_rejected() {
        let result = TypeTree::from_levels(
            vec![
                node("Base", "Base", 0),
                array(1),
                node("int", "size", 2),
                node("float", "data", 2),
                node("float", "extra", 2),
            ],
            40,
        );
        assert!(matches!(
            result,
            Err(Error::MalformedTypeTree { offset: 40, node: 1, .. })
        ));
    }

    #[test]
    fn test_second_root_is_rejected() {
        let result = TypeTree::from_levels(vec![node("A", "a", 0), node("B", "b", 0)], 0);
        assert!(matches!(result, Err(Error::MalformedTypeTree { node: 1, .. })));
    }

    #[test]
    fn test_level_jump_back_several() {
        let tree = TypeTree::from_levels(
            vec![
                node("Base", "Base", 0),
                node("Outer", "a", 1),
                node("Inner", "b", 2),
                node("int", "c", 3),
                node("int", "d", 1),
            ],
            0,
        )
        .unwrap();
        assert_eq!(tree.root().children, vec![NodeId(1), NodeId(4)]);
    }

    #[test]
    fn test_leaf_kinds() {
        let mut opaque = node("GUID", "m_Guid", 1);
        opaque.byte_size = 16;
        let tree = TypeTree::from_levels(
            vec![node("Base", "Base", 0), opaque, node("Empty", "e", 1)],
            0,
        )
        .unwrap();
        assert_eq!(tree.node(NodeId(1)).kind, NodeKind::Opaque(16));
        assert_eq!(tree.node(NodeId(2)).kind, NodeKind::Struct);
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert!(TypeTree::from_nodes(Vec::new(), 0).is_err());
    }
}
