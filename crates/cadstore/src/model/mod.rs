//! Data model types.
//!
//! - Identifiers and name hashes
//! - Component types, status flags and the component value
//! - Type-specific payloads
//! - Document-level tables

pub mod component;
pub mod document;
pub mod fields;
pub mod id;
pub mod payload;

pub use component::{Component, ComponentStatus, ComponentType, UNSET_INDEX};
pub use document::{ModelProperties, ModelSettings, UnitSystem, UserStrings};
pub use fields::{DenseField, FieldSet};
pub use id::{derived_id, format_id, is_nil, new_id, parse_id, Id, NameHash, NIL_ID};
pub use payload::{
    Color, ComponentPayload, DimStyleField, DimensionStyle, Group, HistoryRecord,
    InstanceDefinition, InstanceDefinitionKind, Layer, LinePattern, Material, ModelGeometry,
};
