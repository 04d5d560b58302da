//! Mesh geometry extraction for Kiln.
//!
//! Mesh objects are decoded generically by `kiln-serialized`; this crate
//! reads the resulting value tree and assembles geometry:
//!
//! - [`MeshExtractor`] - submeshes, index buffers and vertex channels
//! - [`PackedBitVector`] / [`CompressedMesh`] - bit-packed attribute streams
//! - [`ResourceResolver`] - vertex data streamed from sibling bundle nodes
//! - [`MeshDiagnostics`] - cheap per-mesh summaries
//!
//! # Example
//!
//! ```no_run
//! use kiln_mesh::{MeshExtractor, ResourceResolver};
//! use kiln_serialized::{class_id, SerializedFile};
//!
//! let data = std::fs::read("CAB-0123456789abcdef")?;
//! let resource = std::fs::read("CAB-0123456789abcdef.resS")?;
//! let file = SerializedFile::parse(&data)?;
//!
//! let resolver = ResourceResolver::from_nodes([("CAB-0123456789abcdef.resS", &resource[..])]);
//! let extractor = MeshExtractor::new(resolver);
//! for object in file.objects_of_class(class_id::MESH) {
//!     let mesh = extractor.extract(&file, object)?;
//!     println!("{}: {} vertices", mesh.name, mesh.geometry.vertex_count);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod compressed;
mod diagnostics;
mod error;
mod fields;
mod geometry;
mod mesh;
mod packed;
mod resolver;
pub mod vertex;

pub use compressed::{decode_skin, reconstruct_z, CompressedMesh};
pub use diagnostics::MeshDiagnostics;
pub use error::{Error, Result};
pub use geometry::{Geometry, UvChannel};
pub use mesh::{
    Aabb, ExtractedMesh, IndexFormat, Mesh, MeshExtractor, StreamingInfo, SubMesh, Topology,
};
pub use packed::PackedBitVector;
pub use resolver::ResourceResolver;
pub use vertex::{ChannelInfo, StreamInfo, VertexAttribute, VertexData, VertexFormat};
