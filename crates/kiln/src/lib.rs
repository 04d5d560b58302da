//! Kiln - engine asset bundle decoding and mesh extraction.
//!
//! This crate ties the Kiln crates together and adds an [`Environment`]
//! that takes raw input files down to mesh geometry.
//!
//! # Crates
//!
//! - [`kiln_common`] - Binary reading/writing, GUIDs, engine versions
//! - [`kiln_bundle`] - Bundle containers (`UnityFS`, `UnityWeb`, `UnityRaw`)
//! - [`kiln_serialized`] - Serialized files, type trees, generic objects
//! - [`kiln_mesh`] - Mesh geometry, packed vectors, streamed resources
//!
//! # Example
//!
//! ```no_run
//! use kiln::prelude::*;
//!
//! let mut env = Environment::new();
//! env.load_path("characters.bundle")?;
//!
//! for record in env.extract_meshes()? {
//!     match record.mesh {
//!         Ok(mesh) => println!("{}: {} triangles", mesh.name, mesh.geometry.triangle_count()),
//!         Err(e) => eprintln!("{} in {}: {e}", record.path_id, record.file),
//!     }
//! }
//! # Ok::<(), kiln::Error>(())
//! ```
//!
//! # Features
//!
//! - `json-export` (default): JSON export of objects and serializable reports
//! - `parallel`: extract meshes of a file on the rayon thread pool

// Re-export all sub-crates
pub use kiln_bundle as bundle;
pub use kiln_common as common;
pub use kiln_mesh as mesh;
pub use kiln_serialized as serialized;

mod environment;
mod error;

pub use environment::{Asset, AssetKind, DiagnosticsRecord, Environment, FileSource, MeshRecord};
pub use error::{Error, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{Environment, MeshRecord};
    pub use kiln_bundle::{Bundle, BundleBuilder, BundleNode, BundleOptions};
    pub use kiln_common::{BinaryReader, Endian, Guid, UnityVersion};
    pub use kiln_mesh::{ExtractedMesh, Geometry, MeshDiagnostics, MeshExtractor, ResourceResolver};
    pub use kiln_serialized::{
        class_id, ParseOptions, SerializedFile, SerializedFileBuilder, TypeTree, Value,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
