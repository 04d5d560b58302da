//! Builder for type trees.
//!
//! [`FieldNode`] describes a field hierarchy the way the engine declares it;
//! [`FieldNode::build`] flattens it into a validated [`TypeTree`].
//!
//! # Example
//!
//! ```
//! use kiln_serialized::typetree::FieldNode;
//!
//! let tree = FieldNode::new("TextAsset", "Base")
//!     .child(FieldNode::string("m_Name"))
//!     .child(FieldNode::string("m_Script"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(tree.root().children.len(), 2);
//! ```

use super::{NodeId, PrimitiveKind, TypeTree, TypeTreeNode, ALIGN_BYTES, TYPE_FLAG_ARRAY};
use crate::Result;

/// A field being built, before flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNode {
    pub type_name: String,
    pub name: String,
    pub byte_size: i32,
    pub version: u32,
    pub type_flags: u32,
    pub meta_flags: u32,
    pub variable_count: i32,
    pub children: Vec<FieldNode>,
}

impl FieldNode {
    /// A variable-size field with no children yet.
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            byte_size: -1,
            version: 1,
            type_flags: 0,
            meta_flags: 0,
            variable_count: 0,
            children: Vec::new(),
        }
    }

    /// A scalar field; the byte size follows from the type name.
    pub fn primitive(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        let mut node = Self::new(type_name, name);
        node.byte_size = PrimitiveKind::from_type_name(&node.type_name)
            .map(|p| p.size() as i32)
            .unwrap_or(-1);
        node
    }

    /// The engine's `Array` wrapper around an element template.
    pub fn array(element: FieldNode) -> Self {
        let mut element = element;
        element.name = "data".to_string();
        let mut node = Self::new("Array", "Array");
        node.type_flags = TYPE_FLAG_ARRAY;
        node.children = vec![Self::primitive("int", "size"), element];
        node
    }

    /// A `vector` container of `element`.
    pub fn vector(name: impl Into<String>, element: FieldNode) -> Self {
        let mut node = Self::new("vector", name);
        node.children.push(Self::array(element));
        node.aligned()
    }

    /// A `string` field: an aligned array of `char`.
    pub fn string(name: impl Into<String>) -> Self {
        let mut node = Self::new("string", name);
        node.children.push(Self::array(Self::primitive("char", "data")).aligned());
        node
    }

    /// A `TypelessData` blob of bytes.
    pub fn typeless_data(name: impl Into<String>) -> Self {
        let mut node = Self::new("TypelessData", name);
        node.type_flags = TYPE_FLAG_ARRAY;
        node.children = vec![
            Self::primitive("int", "size"),
            Self::primitive("UInt8", "data"),
        ];
        node
    }

    /// Request 4-byte alignment after this field.
    pub fn aligned(mut self) -> Self {
        self.meta_flags |= ALIGN_BYTES;
        self
    }

    pub fn byte_size(mut self, size: i32) -> Self {
        self.byte_size = size;
        self
    }

    /// Add a child field.
    pub fn child(mut self, child: FieldNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add multiple children.
    pub fn children(mut self, children: impl IntoIterator<Item = FieldNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Flatten into a validated tree.
    pub fn build(&self) -> Result<TypeTree> {
        let mut nodes = Vec::new();
        self.flatten(0, &mut nodes);
        TypeTree::from_nodes(nodes, 0)
    }

    fn flatten(&self, level: u8, nodes: &mut Vec<TypeTreeNode>) -> NodeId {
        let id = NodeId(nodes.len() as u32);
        let mut node = TypeTreeNode::new(self.type_name.clone(), self.name.clone());
        node.byte_size = self.byte_size;
        node.index = id.0 as i32;
        node.level = level;
        node.version = self.version;
        node.type_flags = self.type_flags;
        node.meta_flags = self.meta_flags;
        node.variable_count = self.variable_count;
        nodes.push(node);

        let children: Vec<NodeId> = self
            .children
            .iter()
            .map(|child| child.flatten(level + 1, nodes))
            .collect();
        nodes[id.index()].children = children;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typetree::NodeKind;

    #[test]
    fn test_helpers_produce_expected_kinds() {
        let tree = FieldNode::new("Base", "Base")
            .child(FieldNode::string("s"))
            .child(FieldNode::typeless_data("blob"))
            .child(FieldNode::vector("v", FieldNode::primitive("UInt16", "x")))
            .child(FieldNode::primitive("double", "d"))
            .build()
            .unwrap();

        let kinds: Vec<NodeKind> = tree
            .root()
            .children
            .iter()
            .map(|&c| tree.node(c).kind)
            .collect();
        assert_eq!(kinds[0], NodeKind::String);
        assert_eq!(kinds[1], NodeKind::TypelessData);
        assert!(matches!(kinds[2], NodeKind::Vector { .. }));
        assert_eq!(kinds[3], NodeKind::Primitive(PrimitiveKind::F64));
        assert_eq!(tree.node(NodeId(tree.len() as u32 - 1)).byte_size, 8);
    }

    #[test]
    fn test_array_element_renamed_data() {
        let array = FieldNode::array(FieldNode::primitive("float", "whatever"));
        assert_eq!(array.children[1].name, "data");
        assert_eq!(array.children[0].name, "size");
    }

    #[test]
    fn test_levels_and_indices() {
        let tree = FieldNode::vector("v", FieldNode::primitive("int", "x"))
            .build()
            .unwrap();
        let levels: Vec<u8> = tree.nodes().iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![0, 1, 2, 2]);
        assert_eq!(tree.node(NodeId(3)).index, 3);
    }
}
