//! Directory entries.

/// A named sub-file inside a bundle.
///
/// `offset` and `size` address the concatenated decompressed block data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BundleNode {
    pub offset: u64,
    pub size: u64,
    pub flags: u32,
    pub path: String,
}

impl BundleNode {
    /// Directory flag marking a node that holds a serialized file.
    pub const SERIALIZED_FILE: u32 = 0x4;

    /// Whether the directory flags this node as a serialized file.
    #[inline]
    pub fn is_serialized_file(&self) -> bool {
        self.flags & Self::SERIALIZED_FILE != 0
    }

    /// Whether the node looks like an out-of-line resource (`.resS`, `.resource`).
    pub fn is_resource(&self) -> bool {
        let lower = self.path.to_ascii_lowercase();
        lower.ends_with(".ress") || lower.ends_with(".resource")
    }

    /// The last path component.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Byte range of this node inside the data region.
    pub(crate) fn range(&self) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(self.offset).ok()?;
        let end = start.checked_add(usize::try_from(self.size).ok()?)?;
        Some(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(path: &str, flags: u32) -> BundleNode {
        BundleNode {
            offset: 0,
            size: 0,
            flags,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_classification() {
        let cab = node("CAB-2f1c0a", 4);
        assert!(cab.is_serialized_file());
        assert!(!cab.is_resource());

        let res = node("archive:/CAB-2f1c0a/CAB-2f1c0a.resS", 0);
        assert!(res.is_resource());
        assert_eq!(res.file_name(), "CAB-2f1c0a.resS");
        assert!(node("sharedassets0.resource", 0).is_resource());
    }

    #[test]
    fn test_range_overflow() {
        let mut n = node("x", 0);
        n.offset = u64::MAX;
        n.size = 2;
        assert!(n.range().is_none());
    }
}
