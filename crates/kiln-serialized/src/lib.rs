//! Serialized file reader.
//!
//! Serialized files are the object containers found inside bundles: a
//! header, a type catalog (optionally with per-type field trees), an object
//! table and references to other files. Objects are decoded generically by
//! walking their type tree, producing [`Value`]s.
//!
//! # Example
//!
//! ```no_run
//! use kiln_serialized::{class_id, SerializedFile};
//!
//! let data = std::fs::read("CAB-0123456789abcdef")?;
//! let file = SerializedFile::parse(&data)?;
//!
//! for object in file.objects_of_class(class_id::MESH) {
//!     let value = file.read(object)?;
//!     println!("{}: {:?}", object.path_id, value.get("m_Name"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Features
//!
//! - `json-export` (default): JSON conversion of values and object dumps

mod builder;
pub mod class_id;
mod error;
#[cfg(feature = "json-export")]
pub mod export;
mod file;
mod header;
mod object;
pub mod object_reader;
pub mod object_writer;
mod types;
pub mod typetree;
mod value;

pub use builder::SerializedFileBuilder;
pub use error::{Error, Result};
pub use file::{is_serialized_file, ClassFallback, ParseOptions, SerializedFile};
pub use header::{
    probe_endianness, SerializedFileHeader, HEADER_SIZE, HEADER_SIZE_V22, SUPPORTED_VERSIONS,
};
pub use object::{FileIdentifier, ObjectInfo, ScriptType};
pub use object_reader::read_value;
pub use object_writer::write_value;
pub use types::{RefTypeName, SerializedType};
pub use typetree::{TypeTree, TypeTreeNode};
pub use value::{Fields, Value};
