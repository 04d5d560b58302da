//! Serialized file parsing.
//!
//! A serialized file is laid out as:
//!
//! ```text
//! header          probe block, widened fields from version 22
//! metadata        engine version, platform, type catalog, object table,
//!                 script types, externals, referenced types, user info
//! data            object payloads, addressed relative to `data_offset`
//! ```
//!
//! Every table is fully validated before [`SerializedFile::parse`] returns:
//! object ranges lie inside the data region and path ids are unique.

use std::collections::hash_map::Entry;

use kiln_common::{BinaryReader, Endian, Guid, UnityVersion};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::header::SerializedFileHeader;
use crate::object::{FileIdentifier, ObjectInfo, ScriptType};
use crate::object_reader::read_value;
use crate::typetree::TypeTree;
use crate::types::SerializedType;
use crate::value::Value;
use crate::{Error, Result};

/// How an object's type reference is turned into a class tag when the
/// catalog cannot resolve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassFallback {
    /// Use the raw reference as the class tag when the catalog is empty;
    /// fail when a catalog exists.
    #[default]
    RawIndexWhenNoCatalog,
    /// Fail whenever resolution fails.
    Strict,
}

/// Options for [`SerializedFile::parse_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub class_fallback: ClassFallback,
}

impl ParseOptions {
    pub fn with_class_fallback(mut self, fallback: ClassFallback) -> Self {
        self.class_fallback = fallback;
        self
    }
}

/// Whether `data` starts with a plausible serialized file header.
pub fn is_serialized_file(data: &[u8]) -> bool {
    SerializedFileHeader::parse(data).is_ok()
}

/// A parsed serialized file borrowing its source bytes.
#[derive(Debug, Clone)]
pub struct SerializedFile<'a> {
    data: &'a [u8],
    header: SerializedFileHeader,
    unity_version: String,
    target_platform: i32,
    enable_type_tree: bool,
    big_id_enabled: bool,
    types: Vec<SerializedType>,
    objects: Vec<ObjectInfo>,
    index: FxHashMap<i64, usize>,
    script_types: Vec<ScriptType>,
    externals: Vec<FileIdentifier>,
    ref_types: Vec<SerializedType>,
    user_info: String,
}

impl<'a> SerializedFile<'a> {
    /// Parse with default options.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        Self::parse_with(data, ParseOptions::default())
    }

    pub fn parse_with(data: &'a [u8], options: ParseOptions) -> Result<Self> {
        let header = SerializedFileHeader::parse(data)?;
        let version = header.version;

        let metadata = data
            .get(..header.metadata_end())
            .ok_or(Error::TruncatedMetadata {
                offset: header.metadata_offset,
                field: "metadata_size",
                needed: header.metadata_size as u64,
                available: data.len().saturating_sub(header.metadata_offset) as u64,
            })?;
        let mut reader = BinaryReader::new_at(metadata, header.metadata_offset, header.endian);

        let unity_version = if version >= 7 {
            reader.read_cstring()?.to_string()
        } else {
            String::new()
        };
        let target_platform = if version >= 8 { reader.read_i32()? } else { 0 };
        let enable_type_tree = if version >= 13 {
            reader.read_bool()?
        } else {
            true
        };

        let type_count = reader.read_count()?;
        let mut types = Vec::with_capacity(type_count.min(reader.remaining()));
        for _ in 0..type_count {
            types.push(SerializedType::read(
                &mut reader,
                version,
                enable_type_tree,
                false,
            )?);
        }

        let big_id_enabled = if (7..14).contains(&version) {
            reader.read_i32()? != 0
        } else {
            false
        };

        let mut file = Self {
            data,
            header,
            unity_version,
            target_platform,
            enable_type_tree,
            big_id_enabled,
            types,
            objects: Vec::new(),
            index: FxHashMap::default(),
            script_types: Vec::new(),
            externals: Vec::new(),
            ref_types: Vec::new(),
            user_info: String::new(),
        };

        file.read_objects(&mut reader, options)?;

        if version >= 11 {
            let count = reader.read_count()?;
            file.script_types.reserve(count.min(reader.remaining()));
            for _ in 0..count {
                let file_index = reader.read_i32()?;
                let path_id = if version < 14 {
                    reader.read_i32()? as i64
                } else {
                    reader.align(4);
                    reader.read_i64()?
                };
                file.script_types.push(ScriptType { file_index, path_id });
            }
        }

        if version >= 14 {
            reader.align(4);
        }
        let count = reader.read_count()?;
        file.externals.reserve(count.min(reader.remaining()));
        for _ in 0..count {
            let mut external = FileIdentifier::default();
            if version >= 6 {
                external.temp_empty = reader.read_cstring()?.to_string();
            }
            if version >= 5 {
                external.guid = reader.read_struct::<Guid>()?;
                external.kind = reader.read_i32()?;
            }
            external.path = reader.read_cstring()?.to_string();
            file.externals.push(external);
        }

        if version >= 20 {
            let count = reader.read_count()?;
            file.ref_types.reserve(count.min(reader.remaining()));
            for _ in 0..count {
                file.ref_types.push(SerializedType::read(
                    &mut reader,
                    version,
                    enable_type_tree,
                    true,
                )?);
            }
        }

        if version >= 5 {
            file.user_info = reader.read_cstring()?.to_string();
        }

        debug!(
            version,
            unity_version = %file.unity_version,
            endian = ?file.header.endian,
            types = file.types.len(),
            objects = file.objects.len(),
            externals = file.externals.len(),
            "parsed serialized file"
        );

        Ok(file)
    }

    fn read_objects(&mut self, reader: &mut BinaryReader<'_>, options: ParseOptions) -> Result<()> {
        let version = self.header.version;
        let count = reader.read_count()?;
        self.objects.reserve(count.min(reader.remaining() / 12));

        for _ in 0..count {
            let entry_offset = reader.position();

            let path_id = if self.big_id_enabled {
                reader.read_i64()?
            } else if version < 14 {
                reader.read_i32()? as i64
            } else {
                reader.align(4);
                reader.read_i64()?
            };

            let relative_start = if version >= 22 {
                let at = reader.position();
                let value = reader.read_i64()?;
                u64::try_from(value).map_err(|_| Error::InvalidObjectInfo {
                    offset: at,
                    path_id,
                    detail: format!("negative byte start {}", value),
                })?
            } else {
                reader.read_u32()? as u64
            };
            let byte_size = reader.read_u32()?;
            let type_id = reader.read_i32()?;

            let inline_class_id = if version < 16 {
                Some(reader.read_u16()?)
            } else {
                None
            };
            let is_destroyed = if version < 11 {
                Some(reader.read_u16()?)
            } else {
                None
            };
            let script_type_index = if (11..17).contains(&version) {
                Some(reader.read_i16()?)
            } else {
                None
            };
            let stripped = if version == 15 || version == 16 {
                Some(reader.read_u8()?)
            } else {
                None
            };

            let byte_start = self.check_range(entry_offset, path_id, relative_start, byte_size)?;
            let (class_id, type_index) = self.resolve_class(entry_offset, type_id, options)?;

            match self.index.entry(path_id) {
                Entry::Occupied(_) => {
                    return Err(Error::DuplicateIdentifier {
                        offset: entry_offset,
                        path_id,
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert(self.objects.len());
                }
            }

            self.objects.push(ObjectInfo {
                path_id,
                byte_start,
                byte_size,
                type_id,
                class_id,
                type_index,
                inline_class_id,
                is_destroyed,
                script_type_index,
                stripped,
            });
        }
        Ok(())
    }

    /// Turn a relative start into an absolute one inside the data region.
    fn check_range(&self, offset: usize, path_id: i64, start: u64, size: u32) -> Result<u64> {
        let data_offset = self.header.data_offset;
        let file_size = self.header.file_size;

        let absolute = data_offset.checked_add(start);
        let end = absolute.and_then(|s| s.checked_add(size as u64));
        match (absolute, end) {
            (Some(absolute), Some(end)) if end <= file_size => Ok(absolute),
            _ => Err(Error::InvalidObjectInfo {
                offset,
                path_id,
                detail: format!(
                    "bytes {}+{} exceed data region {}..{}",
                    start, size, data_offset, file_size
                ),
            }),
        }
    }

    fn resolve_class(
        &self,
        offset: usize,
        type_id: i32,
        options: ParseOptions,
    ) -> Result<(i32, Option<usize>)> {
        let resolved = if self.header.version >= 16 {
            usize::try_from(type_id)
                .ok()
                .and_then(|i| self.types.get(i).map(|ty| (ty.class_id, Some(i))))
        } else {
            self.types
                .iter()
                .position(|ty| ty.class_id == type_id)
                .map(|i| (type_id, Some(i)))
        };

        match resolved {
            Some(found) => Ok(found),
            None if self.types.is_empty()
                && options.class_fallback == ClassFallback::RawIndexWhenNoCatalog =>
            {
                Ok((type_id, None))
            }
            None => Err(Error::TypeNotFound { offset, type_id }),
        }
    }

    #[inline]
    pub fn header(&self) -> &SerializedFileHeader {
        &self.header
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.header.version
    }

    /// Byte order of metadata and object data.
    #[inline]
    pub fn endian(&self) -> Endian {
        self.header.endian
    }

    /// Engine version string, empty before format version 7.
    pub fn unity_version(&self) -> &str {
        &self.unity_version
    }

    /// Engine version parsed into components, when well-formed.
    pub fn parsed_unity_version(&self) -> Option<UnityVersion> {
        self.unity_version.parse().ok()
    }

    pub fn target_platform(&self) -> i32 {
        self.target_platform
    }

    pub fn enable_type_tree(&self) -> bool {
        self.enable_type_tree
    }

    pub fn big_id_enabled(&self) -> bool {
        self.big_id_enabled
    }

    pub fn types(&self) -> &[SerializedType] {
        &self.types
    }

    pub fn objects(&self) -> &[ObjectInfo] {
        &self.objects
    }

    pub fn script_types(&self) -> &[ScriptType] {
        &self.script_types
    }

    pub fn externals(&self) -> &[FileIdentifier] {
        &self.externals
    }

    pub fn ref_types(&self) -> &[SerializedType] {
        &self.ref_types
    }

    pub fn user_info(&self) -> &str {
        &self.user_info
    }

    /// The whole source buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Find an object by path id.
    pub fn object(&self, path_id: i64) -> Option<&ObjectInfo> {
        self.index.get(&path_id).map(|&i| &self.objects[i])
    }

    /// Objects whose resolved class tag is `class_id`.
    pub fn objects_of_class(&self, class_id: i32) -> impl Iterator<Item = &ObjectInfo> + '_ {
        self.objects.iter().filter(move |o| o.class_id == class_id)
    }

    /// Raw bytes of an object.
    pub fn object_data(&self, object: &ObjectInfo) -> Result<&'a [u8]> {
        self.data
            .get(object.byte_range())
            .ok_or_else(|| Error::InvalidObjectInfo {
                offset: object.byte_start as usize,
                path_id: object.path_id,
                detail: "range outside buffer".to_string(),
            })
    }

    /// Catalog entry of an object, if it resolved to one.
    pub fn type_of(&self, object: &ObjectInfo) -> Option<&SerializedType> {
        object.type_index.and_then(|i| self.types.get(i))
    }

    /// Field tree describing an object.
    pub fn type_tree_of(&self, object: &ObjectInfo) -> Result<&TypeTree> {
        self.type_of(object)
            .and_then(|ty| ty.type_tree.as_ref())
            .ok_or(Error::TypeTreeMissing {
                path_id: object.path_id,
                class_id: object.class_id,
            })
    }

    /// Decode an object through its type tree.
    pub fn read(&self, object: &ObjectInfo) -> Result<Value<'a>> {
        let tree = self.type_tree_of(object)?;
        read_value(tree, self.object_data(object)?, self.header.endian)
    }

    /// Decode the object with `path_id`.
    pub fn read_object(&self, path_id: i64) -> Result<Value<'a>> {
        let object = self.object(path_id).ok_or(Error::ObjectNotFound(path_id))?;
        self.read(object)
    }
}
