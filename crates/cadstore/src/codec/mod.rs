//! Binary archive encoding/decoding.
//!
//! Layers, bottom up: fixed-width primitives, the chunk protocol, and
//! the component record codecs.

pub mod chunk;
pub mod component;
pub mod primitives;
pub mod tcode;
pub mod version;

pub use chunk::{ArchiveReader, ArchiveWriter, ChunkHandle, ChunkHeader, ITEM_END};
pub use component::{
    RecordSchema, ReferenceIndexer, ReferenceResolver, downgraded_kind, read_component,
    write_component,
};
pub use primitives::{Reader, Writer};
pub use version::{ArchiveVersion, ChunkVersion};
