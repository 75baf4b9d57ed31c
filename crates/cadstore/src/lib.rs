//! cadstore: versioned chunk archive and component catalog for CAD models.
//!
//! This crate provides the persistence and identity core of a geometry
//! model: a binary container that old and new readers can both consume,
//! a manifest that keeps component ids, names and indices unique, and a
//! registry that owns the live components and merges catalogs without
//! silent collisions.
//!
//! # Overview
//!
//! - **Chunks**: every record is length-prefixed and versioned, so a
//!   reader skips fields it does not know and survives a corrupt table
//! - **Identity**: ids, names (hashed within their scope) and indices
//!   are assigned by the [`Manifest`]; collisions are rejected or
//!   resolved, and every resolution is recorded in a [`ManifestMap`]
//! - **Handles**: components are shared through [`ComponentRef`]; weak
//!   handles and iterators survive removal of what they point at
//!
//! # Quick Start
//!
//! ```rust
//! use cadstore::{Component, ComponentType, Layer, ReadOptions, Registry, WriteOptions};
//! use cadstore::ArchiveVersion;
//!
//! let mut model = Registry::new();
//! let base = model.add(Component::new(Layer::default()).with_name("Base"), true).unwrap();
//! let twin = model.add(Component::new(Layer::default()).with_name("Base"), true).unwrap();
//! assert_eq!(twin.component().unwrap().name(), "Base (1)");
//!
//! // Write for readers that only know version 4 archives
//! let bytes = model.to_bytes(&WriteOptions::target(ArchiveVersion::V4)).unwrap();
//!
//! let (loaded, report) = Registry::from_bytes(&bytes, &ReadOptions::default()).unwrap();
//! assert!(report.is_success());
//! assert_eq!(loaded.count(ComponentType::Layer), 2);
//! assert!(loaded.component_from_id(ComponentType::Layer, &base.id().unwrap()).is_some());
//! ```
//!
//! # Modules
//!
//! - [`codec`]: Primitive codec, chunk protocol and component records
//! - [`model`]: Ids, components, payloads and document tables
//! - [`manifest`]: Identity catalog, remap table and system components
//! - [`registry`]: Live components, iteration, archive I/O and merging
//! - [`error`]: Error types
//! - [`limits`]: Decode limits
//!
//! # Robustness
//!
//! The reader is designed to handle damaged input:
//! - Every allocation is bounded by a limit in [`limits`]
//! - A table or record that fails to parse is skipped at its chunk
//!   boundary and counted in the [`ReadReport`]
//! - Cross-references that cannot be resolved become nil and are counted

pub mod codec;
pub mod error;
pub mod limits;
pub mod manifest;
pub mod model;
pub mod registry;

// Re-export commonly used types at crate root
pub use codec::{ArchiveReader, ArchiveVersion, ArchiveWriter, ChunkVersion};
pub use error::{ConflictKind, ErrorCode, ManifestError, ReadError, RegistryError, WriteError};
pub use manifest::{
    ComponentIdentity, IdentityRequest, ItemFilter, Manifest, ManifestItem, ManifestMap,
    ManifestMapItem,
};
pub use model::{
    Color, Component, ComponentPayload, ComponentStatus, ComponentType, DimStyleField,
    DimensionStyle, FieldSet, Group, HistoryRecord, Id, InstanceDefinition,
    InstanceDefinitionKind, Layer, LinePattern, Material, ModelGeometry, ModelProperties,
    ModelSettings, NIL_ID, NameHash, UNSET_INDEX, UnitSystem, UserStrings,
};
pub use model::id::{derived_id, format_id, is_nil, new_id, parse_id};
pub use registry::{
    ComponentIterator, ComponentRef, ImportReport, ReadIssue, ReadOptions, ReadReport, Registry,
    Severity, WeakComponentRef, WriteOptions,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
