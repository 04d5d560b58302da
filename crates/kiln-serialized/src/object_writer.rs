//! Encoding [`Value`]s back into object bytes.
//!
//! The inverse of [`crate::object_reader`]: the same tree walk, the same
//! alignment rules. Used to build serialized files for tests and tools.

use kiln_common::{BinaryWriter, Endian};

use crate::typetree::{NodeId, NodeKind, PrimitiveKind, TypeTree};
use crate::value::Value;
use crate::{Error, Result};

/// Encode `value` as an instance of the tree's root type.
pub fn write_value(tree: &TypeTree, value: &Value<'_>, endian: Endian) -> Result<Vec<u8>> {
    let mut writer = BinaryWriter::new(endian);
    write_node(tree, NodeId::ROOT, value, &mut writer)?;
    Ok(writer.into_inner())
}

fn mismatch(tree: &TypeTree, id: NodeId, expected: &'static str) -> Error {
    Error::ValueMismatch {
        field: tree.node(id).name.clone(),
        expected,
    }
}

fn write_node(tree: &TypeTree, id: NodeId, value: &Value<'_>, w: &mut BinaryWriter) -> Result<()> {
    let node = tree.node(id);

    match node.kind {
        NodeKind::Primitive(kind) => write_primitive(tree, id, kind, value, w)?,
        NodeKind::String => {
            let s = value.as_str().ok_or_else(|| mismatch(tree, id, "string"))?;
            w.write_aligned_string(s);
        }
        NodeKind::TypelessData => {
            let bytes = value.as_bytes().ok_or_else(|| mismatch(tree, id, "bytes"))?;
            w.write_aligned_bytes(bytes);
        }
        NodeKind::Array { element, .. } => {
            let template = tree.node(element);
            if template.kind == NodeKind::Primitive(PrimitiveKind::U8) {
                let bytes = value.as_bytes().ok_or_else(|| mismatch(tree, id, "bytes"))?;
                w.write_aligned_bytes(bytes);
            } else {
                let items = value.as_array().ok_or_else(|| mismatch(tree, id, "array"))?;
                w.write_i32(items.len() as i32);
                for item in items {
                    write_node(tree, element, item, w)?;
                }
            }
        }
        NodeKind::Vector { array } => write_node(tree, array, value, w)?,
        NodeKind::Struct => {
            let fields = value.as_struct().ok_or_else(|| mismatch(tree, id, "struct"))?;
            for &child in &node.children {
                let field = fields
                    .get(&tree.node(child).name)
                    .ok_or_else(|| mismatch(tree, child, "present field"))?;
                write_node(tree, child, field, w)?;
            }
        }
        NodeKind::Opaque(size) => {
            let bytes = value
                .as_bytes()
                .filter(|b| b.len() == size as usize)
                .ok_or_else(|| mismatch(tree, id, "fixed-size bytes"))?;
            w.write_bytes(bytes);
        }
    }

    if node.is_aligned() {
        w.align(4);
    }
    Ok(())
}

fn write_primitive(
    tree: &TypeTree,
    id: NodeId,
    kind: PrimitiveKind,
    value: &Value<'_>,
    w: &mut BinaryWriter,
) -> Result<()> {
    let int = || value.as_i64().ok_or_else(|| mismatch(tree, id, "integer"));
    match kind {
        PrimitiveKind::Bool => {
            w.write_bool(value.as_bool().ok_or_else(|| mismatch(tree, id, "bool"))?);
        }
        PrimitiveKind::I8 => {
            w.write_i8(int()? as i8);
        }
        PrimitiveKind::U8 => {
            w.write_u8(int()? as u8);
        }
        PrimitiveKind::I16 => {
            w.write_i16(int()? as i16);
        }
        PrimitiveKind::U16 => {
            w.write_u16(int()? as u16);
        }
        PrimitiveKind::I32 => {
            w.write_i32(int()? as i32);
        }
        PrimitiveKind::U32 => {
            w.write_u32(int()? as u32);
        }
        PrimitiveKind::I64 => {
            w.write_i64(int()?);
        }
        PrimitiveKind::U64 => {
            let v = value.as_u64().ok_or_else(|| mismatch(tree, id, "unsigned integer"))?;
            w.write_u64(v);
        }
        PrimitiveKind::F32 => {
            w.write_f32(value.as_f32().ok_or_else(|| mismatch(tree, id, "float"))?);
        }
        PrimitiveKind::F64 => {
            w.write_f64(value.as_f64().ok_or_else(|| mismatch(tree, id, "double"))?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_reader::read_value;
    use crate::typetree::FieldNode;
    use crate::value::Fields;
    use std::borrow::Cow;

    fn mesh_like() -> TypeTree {
        FieldNode::new("Mesh", "Base")
            .child(FieldNode::string("m_Name"))
            .child(FieldNode::vector("m_IndexBuffer", FieldNode::primitive("UInt8", "data")))
            .child(FieldNode::vector("m_Weights", FieldNode::primitive("float", "data")))
            .child(FieldNode::primitive("UInt64", "m_Size"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let tree = mesh_like();
        let mut fields = Fields::new();
        fields.insert("m_Name".into(), Value::String(Cow::Borrowed("Cube")));
        fields.insert("m_IndexBuffer".into(), Value::Bytes(Cow::Borrowed(&[0, 1, 2])));
        fields.insert(
            "m_Weights".into(),
            Value::Array(vec![Value::Float(0.25), Value::Float(0.75)]),
        );
        fields.insert("m_Size".into(), Value::UInt64(u64::MAX));
        let value = Value::Struct(fields);

        for endian in [Endian::Little, Endian::Big] {
            let bytes = write_value(&tree, &value, endian).unwrap();
            assert_eq!(bytes.len() % 4, 0);
            assert_eq!(read_value(&tree, &bytes, endian).unwrap(), value);
        }
    }

    #[test]
    fn test_missing_field() {
        let tree = mesh_like();
        let value = Value::Struct(Fields::new());
        assert!(matches!(
            write_value(&tree, &value, Endian::Little),
            Err(Error::ValueMismatch { expected: "present field", .. })
        ));
    }

    #[test]
    fn test_wrong_shape() {
        let tree = FieldNode::new("T", "Base")
            .child(FieldNode::string("s"))
            .build()
            .unwrap();
        let mut fields = Fields::new();
        fields.insert("s".into(), Value::Int32(1));
        assert!(matches!(
            write_value(&tree, &Value::Struct(fields), Endian::Little),
            Err(Error::ValueMismatch { expected: "string", .. })
        ));
    }
}
