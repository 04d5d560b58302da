//! Asset bundle container reader.
//!
//! A bundle packs one or more named nodes (serialized files, resource
//! blobs) into a single archive. Two header shapes exist:
//!
//! - `UnityFS`: a block-info table (optionally LZ4 compressed, optionally at
//!   end of file) describing storage blocks and a node directory
//! - `UnityWeb` / `UnityRaw`: a level table followed by a single payload
//!   holding the directory and the node data
//!
//! All header integers are big-endian. Node offsets address the
//! concatenation of the decompressed storage blocks.
//!
//! # Example
//!
//! ```no_run
//! use kiln_bundle::Bundle;
//!
//! let bundle = Bundle::open("characters.bundle")?;
//! for node in bundle.nodes() {
//!     println!("{}: {} bytes", node.path, node.size);
//! }
//! # Ok::<(), kiln_bundle::Error>(())
//! ```

mod block;
mod builder;
mod bundle;
mod decompress;
mod error;
mod header;
mod metadata;
mod node;

pub use block::{CompressionType, StorageBlock};
pub use builder::BundleBuilder;
pub use bundle::{is_bundle, Bundle, BundleOptions, SUPPORTED_VERSIONS};
pub use decompress::{decompress_lz4, BlockDecompressor, Lz4Decompressor};
pub use error::{Error, Result};
pub use header::{ArchiveFlags, BundleHeader, RawHeaderInfo, Signature};
pub use metadata::BundleMetadata;
pub use node::BundleNode;
