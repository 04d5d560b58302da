//! Type catalog entries.

use kiln_common::{BinaryReader, BinaryWriter};

use crate::class_id;
use crate::typetree::{read_type_tree, write_type_tree, TypeTree};
use crate::Result;

/// Managed class identity carried by referenced types (format version 21+).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RefTypeName {
    pub class_name: String,
    pub namespace: String,
    pub assembly: String,
}

/// One entry of the type catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedType {
    pub class_id: i32,
    /// Stripped flag, version 16+.
    pub is_stripped: bool,
    /// Index into the script type table, version 17+; `-1` when unset.
    pub script_type_index: i16,
    /// Script hash, present only for script-backed types from version 13.
    pub script_id: Option<[u8; 16]>,
    /// Type hash, version 13+.
    pub old_type_hash: Option<[u8; 16]>,
    pub type_tree: Option<TypeTree>,
    /// Dependency indices of ordinary types, version 21+.
    pub type_dependencies: Vec<i32>,
    /// Class identity of referenced types, version 21+.
    pub ref_type: Option<RefTypeName>,
}

impl SerializedType {
    pub fn new(class_id: i32, type_tree: Option<TypeTree>) -> Self {
        Self {
            class_id,
            is_stripped: false,
            script_type_index: -1,
            script_id: None,
            old_type_hash: None,
            type_tree,
            type_dependencies: Vec::new(),
            ref_type: None,
        }
    }

    /// Whether the script hash is serialized for this entry.
    pub fn has_script_id(&self, version: u32, is_ref_type: bool) -> bool {
        has_script_id(version, self.class_id, self.script_type_index, is_ref_type)
    }

    pub(crate) fn read(
        reader: &mut BinaryReader<'_>,
        version: u32,
        enable_type_tree: bool,
        is_ref_type: bool,
    ) -> Result<Self> {
        let mut ty = Self::new(reader.read_i32()?, None);

        if version >= 16 {
            ty.is_stripped = reader.read_bool()?;
        }
        if version >= 17 {
            ty.script_type_index = reader.read_i16()?;
        }
        if version >= 13 {
            if has_script_id(version, ty.class_id, ty.script_type_index, is_ref_type) {
                ty.script_id = Some(reader.read_array()?);
            }
            ty.old_type_hash = Some(reader.read_array()?);
        }

        if enable_type_tree {
            ty.type_tree = Some(read_type_tree(reader, version)?);
            if version >= 21 {
                if is_ref_type {
                    ty.ref_type = Some(RefTypeName {
                        class_name: reader.read_cstring()?.to_string(),
                        namespace: reader.read_cstring()?.to_string(),
                        assembly: reader.read_cstring()?.to_string(),
                    });
                } else {
                    ty.type_dependencies = reader.read_i32_array()?;
                }
            }
        }

        Ok(ty)
    }

    pub(crate) fn write(
        &self,
        writer: &mut BinaryWriter,
        version: u32,
        enable_type_tree: bool,
        is_ref_type: bool,
    ) {
        writer.write_i32(self.class_id);
        if version >= 16 {
            writer.write_bool(self.is_stripped);
        }
        if version >= 17 {
            writer.write_i16(self.script_type_index);
        }
        if version >= 13 {
            if self.has_script_id(version, is_ref_type) {
                writer.write_bytes(&self.script_id.unwrap_or_default());
            }
            writer.write_bytes(&self.old_type_hash.unwrap_or_default());
        }

        if enable_type_tree {
            match &self.type_tree {
                Some(tree) => write_type_tree(tree, writer, version),
                None => {
                    let name = class_id::display_name(self.class_id);
                    write_type_tree(&TypeTree::empty_root(name), writer, version);
                }
            }
            if version >= 21 {
                if is_ref_type {
                    let name = self.ref_type.clone().unwrap_or_default();
                    writer
                        .write_cstring(&name.class_name)
                        .write_cstring(&name.namespace)
                        .write_cstring(&name.assembly);
                } else {
                    writer.write_i32(self.type_dependencies.len() as i32);
                    for &dep in &self.type_dependencies {
                        writer.write_i32(dep);
                    }
                }
            }
        }
    }
}

fn has_script_id(version: u32, class_id: i32, script_type_index: i16, is_ref_type: bool) -> bool {
    (is_ref_type && script_type_index >= 0)
        || (version < 16 && class_id < 0)
        || (version >= 16 && class_id == class_id::MONO_BEHAVIOUR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typetree::FieldNode;
    use kiln_common::Endian;

    fn roundtrip(ty: &SerializedType, version: u32, is_ref: bool) -> SerializedType {
        let mut writer = BinaryWriter::new(Endian::Little);
        ty.write(&mut writer, version, true, is_ref);
        writer.write_u32(0x5EA1);
        let bytes = writer.into_inner();

        let mut reader = BinaryReader::new(&bytes);
        let parsed = SerializedType::read(&mut reader, version, true, is_ref).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0x5EA1);
        parsed
    }

    #[test]
    fn test_mono_behaviour_carries_script_id() {
        let tree = FieldNode::new("MonoBehaviour", "Base").build().unwrap();
        let mut ty = SerializedType::new(class_id::MONO_BEHAVIOUR, Some(tree));
        ty.script_type_index = 0;
        ty.script_id = Some([7; 16]);
        ty.old_type_hash = Some([9; 16]);

        let parsed = roundtrip(&ty, 17, false);
        assert_eq!(parsed.script_id, Some([7; 16]));
        assert_eq!(parsed.old_type_hash, Some([9; 16]));
        assert_eq!(parsed.script_type_index, 0);
    }

    #[test]
    fn test_plain_type_has_no_script_id() {
        let tree = FieldNode::new("Mesh", "Base").build().unwrap();
        let ty = SerializedType::new(class_id::MESH, Some(tree));
        assert!(!ty.has_script_id(22, false));
        assert_eq!(roundtrip(&ty, 22, false).script_id, None);
    }

    #[test]
    fn test_negative_class_before_16_has_script_id() {
        let ty = SerializedType::new(-3, None);
        assert!(ty.has_script_id(15, false));
        assert!(!ty.has_script_id(16, false));
    }

    #[test]
    fn test_ref_type_names_and_dependencies() {
        let tree = FieldNode::new("Data", "Base").build().unwrap();
        let mut ty = SerializedType::new(class_id::MONO_BEHAVIOUR, Some(tree.clone()));
        ty.ref_type = Some(RefTypeName {
            class_name: "Data".into(),
            namespace: "Game".into(),
            assembly: "Assembly-CSharp".into(),
        });
        let parsed = roundtrip(&ty, 22, true);
        assert_eq!(parsed.ref_type, ty.ref_type);

        let mut plain = SerializedType::new(1, Some(tree));
        plain.type_dependencies = vec![3, 4];
        assert_eq!(roundtrip(&plain, 21, false).type_dependencies, vec![3, 4]);
    }
}
