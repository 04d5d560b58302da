//! Type trees: per-type field descriptions used to decode objects.
//!
//! Two encodings exist, selected by the file's format version:
//!
//! - tabular ([`blob`]) for version 10 and 12 onwards
//! - legacy ([`legacy`]) for everything older, and version 11
//!
//! Both produce the same [`TypeTree`] arena. Every array node is checked to
//! have exactly two children (size, element template) before a tree is
//! returned.

pub mod blob;
mod builder;
pub mod common_strings;
pub mod legacy;
mod node;

pub use builder::FieldNode;
pub use node::{
    NodeId, NodeKind, PrimitiveKind, TypeTree, TypeTreeNode, ALIGN_BYTES, TYPE_FLAG_ARRAY,
};

use kiln_common::{BinaryReader, BinaryWriter};

use crate::Result;

/// Whether a format version stores trees in the tabular encoding.
#[inline]
pub const fn uses_blob_encoding(version: u32) -> bool {
    version >= 12 || version == 10
}

/// Read a tree in the encoding selected by `version`.
pub fn read_type_tree(reader: &mut BinaryReader<'_>, version: u32) -> Result<TypeTree> {
    if uses_blob_encoding(version) {
        blob::read(reader, version)
    } else {
        legacy::read(reader)
    }
}

/// Write a tree in the encoding selected by `version`.
pub fn write_type_tree(tree: &TypeTree, writer: &mut BinaryWriter, version: u32) {
    if uses_blob_encoding(version) {
        blob::write(tree, writer, version);
    } else {
        legacy::write(tree, writer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_selection() {
        assert!(!uses_blob_encoding(9));
        assert!(uses_blob_encoding(10));
        assert!(!uses_blob_encoding(11));
        assert!(uses_blob_encoding(12));
        assert!(uses_blob_encoding(22));
    }
}
