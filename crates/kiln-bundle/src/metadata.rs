//! Serialisable container summary used by inspection reports.

use crate::{Bundle, BundleNode, StorageBlock};

/// Flattened view of a bundle's header and tables.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BundleMetadata {
    pub signature: &'static str,
    pub format_version: u32,
    pub player_version: String,
    pub engine_version: String,
    pub size: u64,
    pub compressed_block_info_size: u32,
    pub uncompressed_block_info_size: u32,
    pub flags: u32,
    pub block_info_at_end: bool,
    /// Where block data begins in the file.
    pub data_offset: usize,
    /// Hex digest of the block-info hash, when present.
    pub block_hash: Option<String>,
    pub blocks: Vec<StorageBlock>,
    pub nodes: Vec<BundleNode>,
}

impl BundleMetadata {
    pub fn from_bundle(bundle: &Bundle) -> Self {
        let header = bundle.header();
        Self {
            signature: header.signature.as_str(),
            format_version: header.version,
            player_version: header.player_version.clone(),
            engine_version: header.engine_version.clone(),
            size: header.size,
            compressed_block_info_size: header.compressed_block_info_size,
            uncompressed_block_info_size: header.uncompressed_block_info_size,
            flags: header.flags.0,
            block_info_at_end: header.flags.block_info_at_end(),
            data_offset: bundle.data_offset(),
            block_hash: bundle
                .block_hash()
                .map(|hash| hash.iter().map(|b| format!("{:02x}", b)).collect()),
            blocks: bundle.blocks().to_vec(),
            nodes: bundle.nodes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BundleBuilder;

    #[test]
    fn test_metadata_reports_data_offset() {
        let mut builder = BundleBuilder::new();
        builder
            .engine_version("2019.4.31f1")
            .block_hash([1; 16])
            .add_node("CAB-a", 4, vec![0; 8]);
        let bundle = Bundle::parse(&builder.build()).unwrap();
        let meta = bundle.metadata();

        assert_eq!(meta.signature, "UnityFS");
        assert_eq!(meta.engine_version, "2019.4.31f1");
        assert_eq!(meta.data_offset, bundle.data_offset());
        assert!(!meta.block_info_at_end);
        assert_eq!(meta.block_hash.as_deref(), Some("01".repeat(16).as_str()));
        assert_eq!(meta.nodes[0].path, "CAB-a");
    }
}
