//! Type-tree-driven decoding of object bytes into [`Value`]s.
//!
//! The reader walks the tree arena depth-first. Node kinds were decided when
//! the tree was built, so dispatch here is a single match per field.
//!
//! Alignment rules:
//!
//! - strings and typeless data always realign to 4 bytes after their payload
//! - byte arrays (`UInt8` element templates) realign as well
//! - any node carrying the align meta flag realigns after it is read

use std::borrow::Cow;

use kiln_common::{BinaryReader, Endian};
use tracing::trace;

use crate::typetree::{NodeId, NodeKind, PrimitiveKind, TypeTree};
use crate::value::{Fields, Value};
use crate::Result;

/// Decode `data` as an instance of the tree's root type.
pub fn read_value<'a>(tree: &TypeTree, data: &'a [u8], endian: Endian) -> Result<Value<'a>> {
    let mut reader = ObjectReader::new(tree, data, endian);
    let value = reader.read(NodeId::ROOT)?;

    if reader.position() != data.len() {
        trace!(
            root = %tree.root().type_name,
            consumed = reader.position(),
            size = data.len(),
            "object size differs from bytes consumed"
        );
    }
    Ok(value)
}

/// Cursor-holding reader for one object.
pub struct ObjectReader<'t, 'a> {
    tree: &'t TypeTree,
    reader: BinaryReader<'a>,
}

impl<'t, 'a> ObjectReader<'t, 'a> {
    pub fn new(tree: &'t TypeTree, data: &'a [u8], endian: Endian) -> Self {
        Self {
            tree,
            reader: BinaryReader::with_endian(data, endian),
        }
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// Decode the field described by `id` at the current position.
    pub fn read(&mut self, id: NodeId) -> Result<Value<'a>> {
        let node = self.tree.node(id);

        let value = match node.kind {
            NodeKind::Primitive(kind) => self.read_primitive(kind)?,
            NodeKind::String => {
                let bytes = self.reader.read_aligned_bytes()?;
                Value::String(String::from_utf8_lossy(bytes))
            }
            NodeKind::TypelessData => {
                Value::Bytes(Cow::Borrowed(self.reader.read_aligned_bytes()?))
            }
            NodeKind::Array { element, .. } => self.read_array(element)?,
            NodeKind::Vector { array } => self.read(array)?,
            NodeKind::Struct => {
                let mut fields = Fields::with_capacity(node.children.len());
                for &child in &node.children {
                    let value = self.read(child)?;
                    fields.insert(self.tree.node(child).name.clone(), value);
                }
                Value::Struct(fields)
            }
            NodeKind::Opaque(size) => {
                Value::Bytes(Cow::Borrowed(self.reader.read_bytes(size as usize)?))
            }
        };

        if node.is_aligned() {
            self.reader.align(4);
        }
        Ok(value)
    }

    fn read_array(&mut self, element: NodeId) -> Result<Value<'a>> {
        let count_offset = self.reader.position();
        let count = self.reader.read_count()?;
        let template = self.tree.node(element);

        if template.kind == NodeKind::Primitive(PrimitiveKind::U8) {
            let bytes = self.reader.read_bytes(count)?;
            self.reader.align(4);
            return Ok(Value::Bytes(Cow::Borrowed(bytes)));
        }

        // Variable-size and empty elements are charged one byte each.
        let element_size = template.byte_size.max(1) as u64;
        let needed = count as u64 * element_size;
        if needed > self.reader.remaining() as u64 {
            return Err(kiln_common::Error::UnexpectedEof {
                offset: count_offset,
                needed: usize::try_from(needed).unwrap_or(usize::MAX),
                available: self.reader.remaining(),
            }
            .into());
        }

        let mut items = Vec::with_capacity(count.min(self.reader.remaining()));
        for _ in 0..count {
            items.push(self.read(element)?);
        }
        Ok(Value::Array(items))
    }

    fn read_primitive(&mut self, kind: PrimitiveKind) -> Result<Value<'a>> {
        let r = &mut self.reader;
        Ok(match kind {
            PrimitiveKind::Bool => Value::Bool(r.read_bool()?),
            PrimitiveKind::I8 => Value::Int8(r.read_i8()?),
            PrimitiveKind::U8 => Value::UInt8(r.read_u8()?),
            PrimitiveKind::I16 => Value::Int16(r.read_i16()?),
            PrimitiveKind::U16 => Value::UInt16(r.read_u16()?),
            PrimitiveKind::I32 => Value::Int32(r.read_i32()?),
            PrimitiveKind::U32 => Value::UInt32(r.read_u32()?),
            PrimitiveKind::I64 => Value::Int64(r.read_i64()?),
            PrimitiveKind::U64 => Value::UInt64(r.read_u64()?),
            PrimitiveKind::F32 => Value::Float(r.read_f32()?),
            PrimitiveKind::F64 => Value::Double(r.read_f64()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typetree::FieldNode;
    use crate::Error;
    use kiln_common::BinaryWriter;

    #[test]
    fn test_struct_fields_in_order() {
        let tree = FieldNode::new("Thing", "Base")
            .child(FieldNode::primitive("int", "a"))
            .child(FieldNode::primitive("float", "b"))
            .child(FieldNode::primitive("bool", "c"))
            .build()
            .unwrap();

        let mut w = BinaryWriter::new(Endian::Big);
        w.write_i32(-7).write_f32(1.5).write_bool(true);
        let bytes = w.into_inner();

        let value = read_value(&tree, &bytes, Endian::Big).unwrap();
        let fields: Vec<&str> = value.as_struct().unwrap().keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
        assert_eq!(value.get("a").and_then(Value::as_i32), Some(-7));
        assert_eq!(value.get("b").and_then(Value::as_f32), Some(1.5));
        assert_eq!(value.get("c").and_then(Value::as_bool), Some(true));
    }

    #[test]
    fn test_string_alignment_sentinel() {
        let tree = FieldNode::new("Named", "Base")
            .child(FieldNode::string("m_Name"))
            .child(FieldNode::primitive("unsigned int", "sentinel"))
            .build()
            .unwrap();

        let mut w = BinaryWriter::new(Endian::Little);
        w.write_i32(1).write_bytes(b"A").write_bytes(&[0xFF, 0xFF, 0xFF]);
        w.write_u32(0xC0FFEE);
        let bytes = w.into_inner();

        let value = read_value(&tree, &bytes, Endian::Little).unwrap();
        assert_eq!(value.get("m_Name").and_then(Value::as_str), Some("A"));
        assert_eq!(value.get("sentinel").and_then(Value::as_u32), Some(0xC0FFEE));
    }

    #[test]
    fn test_byte_array_alignment_sentinel() {
        let tree = FieldNode::new("Blob", "Base")
            .child(FieldNode::vector("m_Data", FieldNode::primitive("UInt8", "data")))
            .child(FieldNode::primitive("unsigned int", "sentinel"))
            .build()
            .unwrap();

        let mut w = BinaryWriter::new(Endian::Little);
        w.write_i32(3).write_bytes(&[1, 2, 3]).write_u8(0xAA);
        w.write_u32(0xBEEF);
        let bytes = w.into_inner();

        let value = read_value(&tree, &bytes, Endian::Little).unwrap();
        assert_eq!(value.get("m_Data").and_then(Value::as_bytes), Some(&[1u8, 2, 3][..]));
        assert_eq!(value.get("sentinel").and_then(Value::as_u32), Some(0xBEEF));

        // Reading unaligned picks up the padding byte instead.
        let unaligned = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
        assert_ne!(unaligned, 0xBEEF);
    }

    #[test]
    fn test_array_of_structs() {
        let element = FieldNode::new("Vector3f", "data")
            .child(FieldNode::primitive("float", "x"))
            .child(FieldNode::primitive("float", "y"))
            .child(FieldNode::primitive("float", "z"))
            .byte_size(12);
        let tree = FieldNode::new("Path", "Base")
            .child(FieldNode::vector("m_Points", element))
            .build()
            .unwrap();

        let mut w = BinaryWriter::new(Endian::Little);
        w.write_i32(2);
        for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
            w.write_f32(v);
        }
        let bytes = w.into_inner();

        let value = read_value(&tree, &bytes, Endian::Little).unwrap();
        let points = value.get("m_Points").and_then(Value::as_array).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].get("z").and_then(Value::as_f32), Some(6.0));
    }

    #[test]
    fn test_array_count_guard() {
        let tree = FieldNode::new("Ints", "Base")
            .child(FieldNode::vector("v", FieldNode::primitive("int", "data")))
            .build()
            .unwrap();

        let mut w = BinaryWriter::new(Endian::Little);
        w.write_i32(1_000_000).write_i32(1);
        let bytes = w.into_inner();

        assert!(matches!(
            read_value(&tree, &bytes, Endian::Little),
            Err(Error::Common(kiln_common::Error::UnexpectedEof { offset: 0, .. }))
        ));
    }

    #[test]
    fn test_array_count_guard_without_element_size() {
        let empty = FieldNode::new("Marker", "data").byte_size(0);
        let named = FieldNode::new("Named", "data").child(FieldNode::string("m_Name"));
        let tree = FieldNode::new("Lists", "Base")
            .child(FieldNode::vector("m_Markers", empty))
            .child(FieldNode::vector("m_Named", named))
            .build()
            .unwrap();

        let mut w = BinaryWriter::new(Endian::Little);
        w.write_i32(i32::MAX).write_i32(0);
        let bytes = w.into_inner();
        assert!(matches!(
            read_value(&tree, &bytes, Endian::Little),
            Err(Error::Common(kiln_common::Error::UnexpectedEof { offset: 0, .. }))
        ));

        let mut w = BinaryWriter::new(Endian::Little);
        w.write_i32(0).write_i32(i32::MAX).write_i32(0);
        let bytes = w.into_inner();
        assert!(matches!(
            read_value(&tree, &bytes, Endian::Little),
            Err(Error::Common(kiln_common::Error::UnexpectedEof { offset: 4, .. }))
        ));
    }

    #[test]
    fn test_typeless_data_and_opaque() {
        let tree = FieldNode::new("Raw", "Base")
            .child(FieldNode::typeless_data("image data"))
            .child(FieldNode::new("GUID", "guid").byte_size(4))
            .build()
            .unwrap();

        let mut w = BinaryWriter::new(Endian::Little);
        w.write_aligned_bytes(&[9, 8]).write_bytes(&[1, 2, 3, 4]);
        let bytes = w.into_inner();

        let value = read_value(&tree, &bytes, Endian::Little).unwrap();
        assert_eq!(value.get("image data").and_then(Value::as_bytes), Some(&[9u8, 8][..]));
        assert_eq!(value.get("guid").and_then(Value::as_bytes), Some(&[1u8, 2, 3, 4][..]));
    }
}
