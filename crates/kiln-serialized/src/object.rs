//! Object table entries and the cross-file tables that follow them.

use std::ops::Range;

use kiln_common::Guid;

/// One row of the object table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ObjectInfo {
    pub path_id: i64,
    /// Absolute offset of the object's bytes within the serialized file.
    pub byte_start: u64,
    pub byte_size: u32,
    /// Raw type reference as stored in the table.
    pub type_id: i32,
    /// Resolved class tag.
    pub class_id: i32,
    /// Catalog entry the type reference resolved to, if any.
    pub type_index: Option<usize>,
    /// Class id stored inline before version 16.
    pub inline_class_id: Option<u16>,
    /// Destroyed flag stored before version 11.
    pub is_destroyed: Option<u16>,
    /// Script type index stored by versions 11 to 16.
    pub script_type_index: Option<i16>,
    /// Stripped flag stored by versions 15 and 16.
    pub stripped: Option<u8>,
}

impl ObjectInfo {
    /// Byte range of the object within the serialized file.
    #[inline]
    pub fn byte_range(&self) -> Range<usize> {
        let start = self.byte_start as usize;
        start..start + self.byte_size as usize
    }
}

/// A script type reference (version 11+).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ScriptType {
    pub file_index: i32,
    pub path_id: i64,
}

/// A reference to another serialized file.
///
/// The decoder records these; following them is the caller's business.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct FileIdentifier {
    /// Unused leading string, version 6+.
    pub temp_empty: String,
    pub guid: Guid,
    pub kind: i32,
    pub path: String,
}

impl FileIdentifier {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Last path component, lowercased the way archives name their nodes.
    pub fn file_name(&self) -> String {
        self.path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.path)
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let ext = FileIdentifier::new("archive:/CAB-abc/CAB-ABC.resS");
        assert_eq!(ext.file_name(), "cab-abc.ress");
        assert_eq!(
            FileIdentifier::new("library/unity default resources").file_name(),
            "unity default resources"
        );
    }

    #[test]
    fn test_byte_range() {
        let info = ObjectInfo {
            path_id: 1,
            byte_start: 4096,
            byte_size: 12,
            type_id: 0,
            class_id: 43,
            type_index: Some(0),
            inline_class_id: None,
            is_destroyed: None,
            script_type_index: None,
            stripped: None,
        };
        assert_eq!(info.byte_range(), 4096..4108);
    }
}
