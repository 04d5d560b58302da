//! Loading assets and walking them down to meshes.
//!
//! An [`Environment`] holds every loaded input: bundles, standalone
//! serialized files and loose resource blobs. Serialized files are parsed
//! on demand, and streamed vertex data is looked up among the nodes of the
//! same bundle (or among loose resources for standalone files).

use std::fs;
use std::path::Path;

use kiln_bundle::{is_bundle, Bundle, BundleNode, BundleOptions};
use kiln_mesh::{ExtractedMesh, MeshDiagnostics, MeshExtractor, ResourceResolver};
use kiln_serialized::{class_id, is_serialized_file, ObjectInfo, ParseOptions, SerializedFile};
use tracing::{debug, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::Result;

/// What a loaded input turned out to be.
#[derive(Debug, Clone)]
pub enum AssetKind {
    Bundle(Bundle),
    SerializedFile(Vec<u8>),
    /// Anything else; available to streamed lookups of standalone files.
    Resource(Vec<u8>),
}

/// One loaded input.
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub kind: AssetKind,
}

impl Asset {
    pub fn is_bundle(&self) -> bool {
        matches!(self.kind, AssetKind::Bundle(_))
    }

    pub fn as_bundle(&self) -> Option<&Bundle> {
        match &self.kind {
            AssetKind::Bundle(bundle) => Some(bundle),
            _ => None,
        }
    }
}

/// A serialized file found in the environment, with the buffers its
/// streamed data may live in.
#[derive(Debug, Clone)]
pub struct FileSource<'a> {
    /// Name of the asset the file came from.
    pub asset: &'a str,
    /// Node path inside a bundle, or the asset name for standalone files.
    pub path: &'a str,
    pub data: &'a [u8],
    siblings: Vec<(&'a str, &'a [u8])>,
}

impl<'a> FileSource<'a> {
    pub fn parse(&self, options: ParseOptions) -> Result<SerializedFile<'a>> {
        Ok(SerializedFile::parse_with(self.data, options)?)
    }

    /// Resolver over the sibling buffers.
    pub fn resolver(&self) -> ResourceResolver<'a> {
        ResourceResolver::from_nodes(self.siblings.iter().copied())
    }
}

/// Extraction result of one mesh object.
#[derive(Debug)]
pub struct MeshRecord {
    pub asset: String,
    pub file: String,
    pub path_id: i64,
    pub mesh: Result<ExtractedMesh>,
}

/// Diagnostics of one mesh object.
#[derive(Debug)]
pub struct DiagnosticsRecord {
    pub asset: String,
    pub file: String,
    pub path_id: i64,
    pub diagnostics: Result<MeshDiagnostics>,
}

/// A set of loaded assets.
#[derive(Debug, Default)]
pub struct Environment {
    assets: Vec<Asset>,
    bundle_options: BundleOptions,
    parse_options: ParseOptions,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for decoding bundles loaded after this call.
    pub fn with_bundle_options(mut self, options: BundleOptions) -> Self {
        self.bundle_options = options;
        self
    }

    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    /// Load one input and classify it.
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<&Asset> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_bytes(name, data)
    }

    /// Load an in-memory input under `name`.
    pub fn load_bytes(&mut self, name: impl Into<String>, data: Vec<u8>) -> Result<&Asset> {
        let name = name.into();
        let kind = if is_bundle(&data) {
            let bundle = Bundle::parse_with(&data, &self.bundle_options)?;
            debug!(name = %name, nodes = bundle.nodes().len(), "loaded bundle");
            AssetKind::Bundle(bundle)
        } else if is_serialized_file(&data) {
            debug!(name = %name, "loaded serialized file");
            AssetKind::SerializedFile(data)
        } else {
            trace!(name = %name, len = data.len(), "loaded resource");
            AssetKind::Resource(data)
        };

        self.assets.push(Asset { name, kind });
        let index = self.assets.len() - 1;
        Ok(&self.assets[index])
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Every serialized file in load order, bundle nodes included.
    ///
    /// Bundle nodes count when flagged as serialized files, or when an
    /// unflagged non-resource node carries a plausible header (older
    /// containers do not flag their nodes).
    pub fn files(&self) -> Result<Vec<FileSource<'_>>> {
        let loose: Vec<(&str, &[u8])> = self
            .assets
            .iter()
            .filter_map(|asset| match &asset.kind {
                AssetKind::Resource(data) => Some((asset.name.as_str(), data.as_slice())),
                _ => None,
            })
            .collect();

        let mut files = Vec::new();
        for asset in &self.assets {
            match &asset.kind {
                AssetKind::Bundle(bundle) => {
                    let nodes = bundle
                        .nodes()
                        .iter()
                        .map(|node| Ok((node, bundle.node_data(node)?)))
                        .collect::<Result<Vec<(&BundleNode, &[u8])>>>()?;
                    let siblings: Vec<(&str, &[u8])> = nodes
                        .iter()
                        .map(|(node, data)| (node.path.as_str(), *data))
                        .collect();

                    for &(node, data) in &nodes {
                        let serialized = node.is_serialized_file()
                            || (!node.is_resource() && is_serialized_file(data));
                        if serialized {
                            files.push(FileSource {
                                asset: &asset.name,
                                path: &node.path,
                                data,
                                siblings: siblings.clone(),
                            });
                        }
                    }
                }
                AssetKind::SerializedFile(data) => files.push(FileSource {
                    asset: &asset.name,
                    path: &asset.name,
                    data,
                    siblings: loose.clone(),
                }),
                AssetKind::Resource(_) => {}
            }
        }
        Ok(files)
    }

    /// Extract every mesh object of every serialized file.
    ///
    /// A file that fails to parse aborts the whole call; a mesh object
    /// that fails to decode is reported in its record.
    pub fn extract_meshes(&self) -> Result<Vec<MeshRecord>> {
        let mut records = Vec::new();
        for source in self.files()? {
            let file = source.parse(self.parse_options)?;
            let extractor = MeshExtractor::new(source.resolver());
            let objects: Vec<&ObjectInfo> = file.objects_of_class(class_id::MESH).collect();

            let extract = |object: &&ObjectInfo| MeshRecord {
                asset: source.asset.to_string(),
                file: source.path.to_string(),
                path_id: object.path_id,
                mesh: extractor.extract(&file, object).map_err(Into::into),
            };

            #[cfg(feature = "parallel")]
            let meshes: Vec<MeshRecord> = objects.par_iter().map(extract).collect();
            #[cfg(not(feature = "parallel"))]
            let meshes: Vec<MeshRecord> = objects.iter().map(extract).collect();

            debug!(file = source.path, meshes = meshes.len(), "extracted meshes");
            records.extend(meshes);
        }
        Ok(records)
    }

    /// Summarize every mesh object without decoding geometry.
    pub fn mesh_diagnostics(&self) -> Result<Vec<DiagnosticsRecord>> {
        let mut records = Vec::new();
        for source in self.files()? {
            let file = source.parse(self.parse_options)?;
            for object in file.objects_of_class(class_id::MESH) {
                let diagnostics = file
                    .read(object)
                    .map(|value| MeshDiagnostics::from_value(object.path_id, &value))
                    .map_err(Into::into);
                records.push(DiagnosticsRecord {
                    asset: source.asset.to_string(),
                    file: source.path.to_string(),
                    path_id: object.path_id,
                    diagnostics,
                });
            }
        }
        Ok(records)
    }
}
