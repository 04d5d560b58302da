//! Streamed resource lookup.
//!
//! Large vertex buffers live outside the serialized file, in a sibling
//! bundle node such as `CAB-0123.resS`. A mesh refers to them by an
//! `archive:/...` path that rarely matches the node name exactly, so the
//! lookup tries a few name variants against node name suffixes.

use tracing::trace;

use crate::mesh::StreamingInfo;
use crate::{Error, Result};

/// Named byte buffers that streamed paths resolve against.
#[derive(Debug, Clone, Default)]
pub struct ResourceResolver<'a> {
    nodes: Vec<(&'a str, &'a [u8])>,
}

impl<'a> ResourceResolver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(node path, node bytes)` pairs.
    pub fn from_nodes(nodes: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn add(&mut self, path: &'a str, data: &'a [u8]) -> &mut Self {
        self.nodes.push((path, data));
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Names tried for `path`, in order: the basename, then the stem with
    /// `.resource`, `.assets.resS` and `.resS` appended.
    pub fn candidates(path: &str) -> Vec<String> {
        let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let stem = basename
            .split_once('.')
            .map_or(basename, |(stem, _)| stem);

        let mut names = vec![basename.to_string()];
        for suffix in [".resource", ".assets.resS", ".resS"] {
            let name = format!("{stem}{suffix}");
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// The whole node matching `path`.
    pub fn find(&self, path: &str) -> Result<(&'a str, &'a [u8])> {
        let candidates = Self::candidates(path);
        for candidate in &candidates {
            let wanted = candidate.to_ascii_lowercase();
            if let Some(&node) = self
                .nodes
                .iter()
                .find(|(name, _)| name.to_ascii_lowercase().ends_with(&wanted))
            {
                trace!(path, node = node.0, "resolved streamed resource");
                return Ok(node);
            }
        }
        Err(Error::ResourceNotFound {
            path: path.to_string(),
            candidates,
        })
    }

    /// The byte range a streaming reference points at.
    pub fn resolve(&self, info: &StreamingInfo) -> Result<&'a [u8]> {
        let (name, data) = self.find(&info.path)?;
        let range_error = || Error::InvalidStreamRange {
            node: name.to_string(),
            offset: info.offset,
            size: info.size as u64,
            available: data.len(),
        };

        let start = usize::try_from(info.offset).map_err(|_| range_error())?;
        let end = start
            .checked_add(info.size as usize)
            .ok_or_else(range_error)?;
        data.get(start..end).ok_or_else(range_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(path: &str, offset: u64, size: u32) -> StreamingInfo {
        StreamingInfo {
            offset,
            size,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_candidate_order() {
        assert_eq!(
            ResourceResolver::candidates("archive:/CAB-abc/CAB-abc.resS"),
            vec!["CAB-abc.resS", "CAB-abc.resource", "CAB-abc.assets.resS"]
        );
        assert_eq!(
            ResourceResolver::candidates("sharedassets0.assets.resS"),
            vec![
                "sharedassets0.assets.resS",
                "sharedassets0.resource",
                "sharedassets0.resS"
            ]
        );
    }

    #[test]
    fn test_basename_wins_over_variants() {
        let resolver = ResourceResolver::from_nodes([
            ("CAB-abc.resource", &b"resource"[..]),
            ("CAB-abc.resS", &b"streamed"[..]),
        ]);
        let bytes = resolver
            .resolve(&info("archive:/CAB-abc/CAB-abc.resS", 2, 4))
            .unwrap();
        assert_eq!(bytes, b"ream");
    }

    #[test]
    fn test_variant_suffix_match() {
        let mut resolver = ResourceResolver::new();
        resolver.add("archive:/CAB-abc/CAB-abc.resource", b"0123456789");
        let bytes = resolver.resolve(&info("CAB-abc", 8, 2)).unwrap();
        assert_eq!(bytes, b"89");
    }

    #[test]
    fn test_not_found_is_recoverable() {
        let resolver = ResourceResolver::from_nodes([("other.resS", &b""[..])]);
        let err = resolver
            .resolve(&info("archive:/CAB-abc/CAB-abc.resS", 0, 1))
            .unwrap_err();
        assert!(err.is_recoverable());
        match err {
            Error::ResourceNotFound { candidates, .. } => assert_eq!(candidates.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_range_outside_node() {
        let resolver = ResourceResolver::from_nodes([("CAB-abc.resS", &b"abc"[..])]);
        let err = resolver.resolve(&info("CAB-abc.resS", 2, 4)).unwrap_err();
        assert!(!err.is_recoverable());
        assert!(matches!(err, Error::InvalidStreamRange { available: 3, .. }));
    }
}
