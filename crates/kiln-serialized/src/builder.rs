//! Writer for serialized files.
//!
//! Emits the exact layout [`SerializedFile`](crate::SerializedFile) reads for
//! any supported format version and either byte order. Objects are placed
//! 8-byte aligned after a 16-byte aligned data offset.

use kiln_common::{align_up, BinaryWriter, Endian};

use crate::header::HEADER_SIZE_V22;
use crate::object::{FileIdentifier, ScriptType};
use crate::object_writer::write_value;
use crate::types::SerializedType;
use crate::value::Value;
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct PendingObject {
    path_id: i64,
    type_id: i32,
    data: Vec<u8>,
    declared_size: Option<u32>,
}

/// Builder for serialized files.
///
/// # Example
///
/// ```
/// use kiln_serialized::typetree::FieldNode;
/// use kiln_serialized::{SerializedFile, SerializedFileBuilder, SerializedType};
///
/// let tree = FieldNode::new("TextAsset", "Base")
///     .child(FieldNode::string("m_Name"))
///     .build()
///     .unwrap();
///
/// let mut builder = SerializedFileBuilder::new(22);
/// let type_id = builder.add_type(SerializedType::new(49, Some(tree)));
/// builder.add_object(1, type_id, vec![1, 0, 0, 0, b'a', 0, 0, 0]);
///
/// let bytes = builder.build();
/// let file = SerializedFile::parse(&bytes).unwrap();
/// assert_eq!(file.read_object(1).unwrap().get("m_Name").unwrap().as_str(), Some("a"));
/// ```
#[derive(Debug, Clone)]
pub struct SerializedFileBuilder {
    version: u32,
    header_endian: Endian,
    endian: Endian,
    unity_version: String,
    target_platform: i32,
    enable_type_tree: bool,
    big_id: bool,
    types: Vec<SerializedType>,
    objects: Vec<PendingObject>,
    script_types: Vec<ScriptType>,
    externals: Vec<FileIdentifier>,
    ref_types: Vec<SerializedType>,
    user_info: String,
}

impl SerializedFileBuilder {
    /// A builder with a big-endian header and little-endian data.
    pub fn new(version: u32) -> Self {
        Self {
            version,
            header_endian: Endian::Big,
            endian: Endian::Little,
            unity_version: "2019.4.31f1".to_string(),
            target_platform: 19,
            enable_type_tree: true,
            big_id: false,
            types: Vec::new(),
            objects: Vec::new(),
            script_types: Vec::new(),
            externals: Vec::new(),
            ref_types: Vec::new(),
            user_info: String::new(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Byte order of metadata and object data.
    pub fn endian(&mut self, endian: Endian) -> &mut Self {
        self.endian = endian;
        self
    }

    /// Byte order of the header fields.
    pub fn header_endian(&mut self, endian: Endian) -> &mut Self {
        self.header_endian = endian;
        self
    }

    pub fn unity_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.unity_version = version.into();
        self
    }

    pub fn target_platform(&mut self, platform: i32) -> &mut Self {
        self.target_platform = platform;
        self
    }

    /// Whether field trees are embedded (honoured from version 13).
    pub fn enable_type_tree(&mut self, enabled: bool) -> &mut Self {
        self.enable_type_tree = enabled;
        self
    }

    /// Use 64-bit path ids (honoured for versions 7 to 13).
    pub fn big_id(&mut self, enabled: bool) -> &mut Self {
        self.big_id = enabled;
        self
    }

    pub fn user_info(&mut self, info: impl Into<String>) -> &mut Self {
        self.user_info = info.into();
        self
    }

    /// Add a catalog entry and return the type reference objects should use.
    ///
    /// From version 16 that is the catalog index; before, the class tag.
    pub fn add_type(&mut self, ty: SerializedType) -> i32 {
        let type_id = if self.version >= 16 {
            self.types.len() as i32
        } else {
            ty.class_id
        };
        self.types.push(ty);
        type_id
    }

    /// Add an object with pre-encoded bytes.
    pub fn add_object(&mut self, path_id: i64, type_id: i32, data: Vec<u8>) -> &mut Self {
        self.objects.push(PendingObject {
            path_id,
            type_id,
            data,
            declared_size: None,
        });
        self
    }

    /// Add an object encoded from a value through its type's tree.
    pub fn add_object_value(
        &mut self,
        path_id: i64,
        type_id: i32,
        value: &Value<'_>,
    ) -> Result<&mut Self> {
        let tree = self
            .tree_for(type_id)
            .ok_or(Error::TypeTreeMissing {
                path_id,
                class_id: type_id,
            })?;
        let data = write_value(tree, value, self.endian)?;
        Ok(self.add_object(path_id, type_id, data))
    }

    /// Override the size recorded in the object table for `path_id`.
    pub fn declared_size(&mut self, path_id: i64, size: u32) -> &mut Self {
        for object in self.objects.iter_mut().filter(|o| o.path_id == path_id) {
            object.declared_size = Some(size);
        }
        self
    }

    pub fn add_script_type(&mut self, file_index: i32, path_id: i64) -> &mut Self {
        self.script_types.push(ScriptType {
            file_index,
            path_id,
        });
        self
    }

    pub fn add_external(&mut self, external: FileIdentifier) -> &mut Self {
        self.externals.push(external);
        self
    }

    /// Add a referenced type (written from version 20).
    pub fn add_ref_type(&mut self, ty: SerializedType) -> &mut Self {
        self.ref_types.push(ty);
        self
    }

    fn tree_for(&self, type_id: i32) -> Option<&crate::typetree::TypeTree> {
        let ty = if self.version >= 16 {
            usize::try_from(type_id).ok().and_then(|i| self.types.get(i))
        } else {
            self.types.iter().find(|ty| ty.class_id == type_id)
        };
        ty.and_then(|ty| ty.type_tree.as_ref())
    }

    fn trees_enabled(&self) -> bool {
        self.version < 13 || self.enable_type_tree
    }

    /// Serialise the file.
    pub fn build(&self) -> Vec<u8> {
        let version = self.version;

        // Object placement relative to the data offset.
        let mut starts = Vec::with_capacity(self.objects.len());
        let mut data_len = 0usize;
        for object in &self.objects {
            let start = align_up(data_len, 8);
            starts.push(start as u64);
            data_len = start + object.data.len();
        }

        let mut w = BinaryWriter::new(self.header_endian);
        w.write_u32(0).write_u32(0).write_u32(version).write_u32(0);

        if version < 9 {
            let data_offset = align_up(w.position(), 16);
            w.pad_to(data_offset);
            self.write_data(&mut w, data_offset, &starts);

            let metadata_start = w.position();
            w.set_endian(self.endian);
            w.write_u8(self.endian.flag());
            self.write_metadata(&mut w, &starts);
            let file_size = w.position();

            w.set_endian(self.header_endian);
            w.patch_u32(0, (file_size - metadata_start) as u32);
            w.patch_u32(4, file_size as u32);
            w.patch_u32(12, data_offset as u32);
            return w.into_inner();
        }

        w.write_u8(self.endian.flag()).write_bytes(&[0, 0, 0]);
        if version >= 22 {
            w.write_u32(0).write_i64(0).write_i64(0).write_i64(0);
        }
        let metadata_start = w.position();

        w.set_endian(self.endian);
        self.write_metadata(&mut w, &starts);
        let metadata_size = w.position() - metadata_start;

        let data_offset = align_up(w.position(), 16);
        w.pad_to(data_offset);
        self.write_data(&mut w, data_offset, &starts);
        let file_size = w.position();

        w.set_endian(self.header_endian);
        if version >= 22 {
            debug_assert_eq!(metadata_start, HEADER_SIZE_V22);
            w.patch_u32(20, metadata_size as u32);
            w.patch_i64(24, file_size as i64);
            w.patch_i64(32, data_offset as i64);
        } else {
            w.patch_u32(0, metadata_size as u32);
            w.patch_u32(4, file_size as u32);
            w.patch_u32(12, data_offset as u32);
        }
        w.into_inner()
    }

    fn write_data(&self, w: &mut BinaryWriter, data_offset: usize, starts: &[u64]) {
        for (object, &start) in self.objects.iter().zip(starts) {
            w.pad_to(data_offset + start as usize);
            w.write_bytes(&object.data);
        }
    }

    fn write_metadata(&self, w: &mut BinaryWriter, starts: &[u64]) {
        let version = self.version;
        let trees = self.trees_enabled();

        if version >= 7 {
            w.write_cstring(&self.unity_version);
        }
        if version >= 8 {
            w.write_i32(self.target_platform);
        }
        if version >= 13 {
            w.write_bool(self.enable_type_tree);
        }

        w.write_i32(self.types.len() as i32);
        for ty in &self.types {
            ty.write(w, version, trees, false);
        }

        let big_id = self.big_id && (7..14).contains(&version);
        if (7..14).contains(&version) {
            w.write_i32(big_id as i32);
        }

        w.write_i32(self.objects.len() as i32);
        for (object, &start) in self.objects.iter().zip(starts) {
            if big_id {
                w.write_i64(object.path_id);
            } else if version < 14 {
                w.write_i32(object.path_id as i32);
            } else {
                w.align(4);
                w.write_i64(object.path_id);
            }

            if version >= 22 {
                w.write_i64(start as i64);
            } else {
                w.write_u32(start as u32);
            }
            w.write_u32(object.declared_size.unwrap_or(object.data.len() as u32));
            w.write_i32(object.type_id);

            if version < 16 {
                w.write_u16(object.type_id as u16);
            }
            if version < 11 {
                w.write_u16(0);
            }
            if (11..17).contains(&version) {
                w.write_i16(-1);
            }
            if version == 15 || version == 16 {
                w.write_u8(0);
            }
        }

        if version >= 11 {
            w.write_i32(self.script_types.len() as i32);
            for script in &self.script_types {
                w.write_i32(script.file_index);
                if version < 14 {
                    w.write_i32(script.path_id as i32);
                } else {
                    w.align(4);
                    w.write_i64(script.path_id);
                }
            }
        }

        if version >= 14 {
            w.align(4);
        }
        w.write_i32(self.externals.len() as i32);
        for external in &self.externals {
            if version >= 6 {
                w.write_cstring(&external.temp_empty);
            }
            if version >= 5 {
                w.write_bytes(external.guid.as_bytes());
                w.write_i32(external.kind);
            }
            w.write_cstring(&external.path);
        }

        if version >= 20 {
            w.write_i32(self.ref_types.len() as i32);
            for ty in &self.ref_types {
                ty.write(w, version, trees, true);
            }
        }

        if version >= 5 {
            w.write_cstring(&self.user_info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_id;
    use crate::typetree::FieldNode;
    use crate::value::Fields;
    use crate::{ClassFallback, ParseOptions, SerializedFile};
    use kiln_common::Guid;
    use std::borrow::Cow;

    fn text_asset_tree() -> crate::typetree::TypeTree {
        FieldNode::new("TextAsset", "Base")
            .child(FieldNode::string("m_Name"))
            .child(FieldNode::primitive("int", "m_Flags"))
            .build()
            .unwrap()
    }

    fn text_asset(name: &str, flags: i32) -> Value<'_> {
        let mut fields = Fields::new();
        fields.insert("m_Name".into(), Value::String(Cow::Borrowed(name)));
        fields.insert("m_Flags".into(), Value::Int32(flags));
        Value::Struct(fields)
    }

    fn sample(version: u32) -> SerializedFileBuilder {
        let mut builder = SerializedFileBuilder::new(version);
        let type_id = builder.add_type(SerializedType::new(
            class_id::TEXT_ASSET,
            Some(text_asset_tree()),
        ));
        builder
            .add_object_value(1, type_id, &text_asset("first", 7))
            .unwrap()
            .add_object_value(-2, type_id, &text_asset("second object", -1))
            .unwrap()
            .add_script_type(0, 11)
            .add_external(FileIdentifier {
                temp_empty: String::new(),
                guid: Guid::from_bytes([3; 16]),
                kind: 3,
                path: "archive:/CAB-x/CAB-x.resS".into(),
            })
            .user_info("made by tests");
        builder
    }

    #[test]
    fn test_roundtrip_all_versions() {
        for version in 5..=30 {
            let bytes = sample(version).build();
            let file = SerializedFile::parse(&bytes)
                .unwrap_or_else(|e| panic!("version {}: {}", version, e));

            assert_eq!(file.version(), version);
            assert_eq!(file.objects().len(), 2, "version {}", version);
            assert_eq!(file.types().len(), 1);

            for object in file.objects() {
                assert_eq!(object.class_id, class_id::TEXT_ASSET, "version {}", version);
                assert_eq!(object.type_index, Some(0));
                assert_eq!(object.byte_start % 8, 0);
            }

            let first = file.object(1).unwrap();
            assert_eq!(first.byte_start, file.header().data_offset);
            assert_eq!(first.byte_size, 16);
            let second = file.object(-2).unwrap();
            assert_eq!(second.byte_start, file.header().data_offset + 16);
            assert_eq!(second.byte_size, 24);

            assert_eq!(file.read_object(1).unwrap(), text_asset("first", 7));
            assert_eq!(file.read_object(-2).unwrap(), text_asset("second object", -1));

            assert_eq!(file.externals().len(), 1);
            assert_eq!(file.externals()[0].path, "archive:/CAB-x/CAB-x.resS");
            assert_eq!(file.externals()[0].guid, Guid::from_bytes([3; 16]));
            assert_eq!(file.user_info(), "made by tests");

            if version >= 7 {
                assert_eq!(file.unity_version(), "2019.4.31f1");
            }
            if version >= 11 {
                assert_eq!(
                    file.script_types(),
                    [ScriptType {
                        file_index: 0,
                        path_id: 11
                    }]
                );
            }
        }
    }

    #[test]
    fn test_big_endian_everything_v22() {
        let mut builder = sample(22);
        builder.endian(Endian::Big).header_endian(Endian::Big);
        let bytes = builder.build();

        assert_eq!(&bytes[8..12], &22u32.to_be_bytes());
        assert_eq!(bytes[16], 1);

        let file = SerializedFile::parse(&bytes).unwrap();
        assert_eq!(file.header().header_endian, Endian::Big);
        assert_eq!(file.endian(), Endian::Big);
        assert_eq!(file.header().file_size, bytes.len() as u64);
        assert_eq!(file.read_object(-2).unwrap(), text_asset("second object", -1));
    }

    #[test]
    fn test_little_endian_header() {
        let mut builder = sample(17);
        builder.header_endian(Endian::Little);
        let bytes = builder.build();
        let file = SerializedFile::parse(&bytes).unwrap();
        assert_eq!(file.header().header_endian, Endian::Little);
        assert_eq!(file.objects().len(), 2);
    }

    #[test]
    fn test_big_ids() {
        let mut builder = SerializedFileBuilder::new(9);
        let type_id = builder.add_type(SerializedType::new(
            class_id::TEXT_ASSET,
            Some(text_asset_tree()),
        ));
        builder
            .big_id(true)
            .add_object_value(1 << 40, type_id, &text_asset("big", 0))
            .unwrap();
        let bytes = builder.build();

        let file = SerializedFile::parse(&bytes).unwrap();
        assert!(file.big_id_enabled());
        assert!(file.object(1 << 40).is_some());
    }

    #[test]
    fn test_object_beyond_data_region() {
        let mut builder = sample(17);
        builder.declared_size(-2, 4096);
        let bytes = builder.build();
        assert!(matches!(
            SerializedFile::parse(&bytes),
            Err(Error::InvalidObjectInfo { path_id: -2, .. })
        ));
    }

    #[test]
    fn test_duplicate_path_id() {
        let mut builder = sample(21);
        builder.add_object(1, 0, vec![0; 12]);
        let bytes = builder.build();
        assert!(matches!(
            SerializedFile::parse(&bytes),
            Err(Error::DuplicateIdentifier { path_id: 1, .. })
        ));
    }

    #[test]
    fn test_class_fallback() {
        let mut builder = SerializedFileBuilder::new(17);
        builder.add_object(5, class_id::MESH, vec![0; 4]);
        let bytes = builder.build();

        let file = SerializedFile::parse(&bytes).unwrap();
        assert_eq!(file.object(5).unwrap().class_id, class_id::MESH);
        assert_eq!(file.object(5).unwrap().type_index, None);

        let strict = ParseOptions::default().with_class_fallback(ClassFallback::Strict);
        assert!(matches!(
            SerializedFile::parse_with(&bytes, strict),
            Err(Error::TypeNotFound { type_id: 43, .. })
        ));
    }

    #[test]
    fn test_unresolved_type_with_catalog() {
        let mut builder = sample(17);
        builder.add_object(9, 4, vec![0; 4]);
        let bytes = builder.build();
        assert!(matches!(
            SerializedFile::parse(&bytes),
            Err(Error::TypeNotFound { type_id: 4, .. })
        ));
    }

    #[test]
    fn test_bad_endian_flag() {
        let mut bytes = sample(19).build();
        bytes[16] = 2;
        assert!(matches!(
            SerializedFile::parse(&bytes),
            Err(Error::EndiannessMismatch { offset: 16, value: 2 })
        ));
    }

    #[test]
    fn test_metadata_size_beyond_buffer() {
        let mut bytes = sample(19).build();
        let huge = (bytes.len() as u32 * 2).to_be_bytes();
        bytes[0..4].copy_from_slice(&huge);
        assert!(matches!(
            SerializedFile::parse(&bytes),
            Err(Error::TruncatedMetadata { .. })
        ));
    }

    #[test]
    fn test_disabled_type_tree() {
        let mut builder = sample(19);
        builder.enable_type_tree(false);
        let bytes = builder.build();
        let file = SerializedFile::parse(&bytes).unwrap();
        assert!(!file.enable_type_tree());
        assert!(matches!(
            file.read_object(1),
            Err(Error::TypeTreeMissing { path_id: 1, .. })
        ));
    }

    #[test]
    fn test_ref_types() {
        let mut builder = sample(22);
        let mut ty = SerializedType::new(class_id::MONO_BEHAVIOUR, Some(text_asset_tree()));
        ty.script_type_index = 0;
        ty.ref_type = Some(crate::types::RefTypeName {
            class_name: "Payload".into(),
            namespace: "Game".into(),
            assembly: "Assembly-CSharp.dll".into(),
        });
        builder.add_ref_type(ty.clone());
        let bytes = builder.build();

        let file = SerializedFile::parse(&bytes).unwrap();
        assert_eq!(file.ref_types().len(), 1);
        assert_eq!(file.ref_types()[0].ref_type, ty.ref_type);
        assert_eq!(file.user_info(), "made by tests");
    }
}
