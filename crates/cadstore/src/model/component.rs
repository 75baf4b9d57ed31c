//! Component identity: type tags, status flags and the component value.

use std::fmt;

use crate::codec::version::ArchiveVersion;
use crate::model::id::{Id, NIL_ID};
use crate::model::payload::ComponentPayload;

/// Index of a component that has none (unindexed types, unset hints).
pub const UNSET_INDEX: i32 = i32::MIN;

/// Closed set of component types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ComponentType {
    Unset = 0,
    LinePattern = 1,
    Layer = 2,
    Material = 3,
    Group = 4,
    DimensionStyle = 5,
    InstanceDefinition = 6,
    ModelGeometry = 7,
    HistoryRecord = 8,
}

impl ComponentType {
    /// Catalogued types in table (load) order.
    ///
    /// Types referenced by index in old archives come before the types
    /// that reference them.
    pub const ALL: [ComponentType; 8] = [
        ComponentType::LinePattern,
        ComponentType::Layer,
        ComponentType::Material,
        ComponentType::Group,
        ComponentType::DimensionStyle,
        ComponentType::InstanceDefinition,
        ComponentType::ModelGeometry,
        ComponentType::HistoryRecord,
    ];

    /// Number of slots needed for a table indexed by type tag.
    pub const COUNT: usize = 9;

    /// Creates a ComponentType from its wire representation.
    pub fn from_u8(v: u8) -> Option<ComponentType> {
        match v {
            0 => Some(ComponentType::Unset),
            1 => Some(ComponentType::LinePattern),
            2 => Some(ComponentType::Layer),
            3 => Some(ComponentType::Material),
            4 => Some(ComponentType::Group),
            5 => Some(ComponentType::DimensionStyle),
            6 => Some(ComponentType::InstanceDefinition),
            7 => Some(ComponentType::ModelGeometry),
            8 => Some(ComponentType::HistoryRecord),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ComponentType::Unset => "Unset",
            ComponentType::LinePattern => "Line Pattern",
            ComponentType::Layer => "Layer",
            ComponentType::Material => "Material",
            ComponentType::Group => "Group",
            ComponentType::DimensionStyle => "Dimension Style",
            ComponentType::InstanceDefinition => "Block",
            ComponentType::ModelGeometry => "Geometry",
            ComponentType::HistoryRecord => "History Record",
        }
    }

    /// Types whose components get a non-negative model index.
    pub fn is_indexed(self) -> bool {
        !matches!(
            self,
            ComponentType::Unset | ComponentType::ModelGeometry | ComponentType::HistoryRecord
        )
    }

    /// Types whose names must be non-empty and unique in their scope.
    pub fn requires_unique_name(self) -> bool {
        self.is_indexed()
    }

    /// Types whose name scope is the parent id rather than the whole type.
    pub fn name_scoped_by_parent(self) -> bool {
        self == ComponentType::Layer
    }

    /// Type the parent id points at, for hierarchical types.
    pub fn parent_type(self) -> Option<ComponentType> {
        match self {
            ComponentType::Layer | ComponentType::DimensionStyle => Some(self),
            _ => None,
        }
    }

    /// Oldest archive generation that can store this type.
    pub fn min_archive_version(self) -> ArchiveVersion {
        match self {
            ComponentType::HistoryRecord => ArchiveVersion::V6,
            _ => ArchiveVersion::V4,
        }
    }

    /// Id that scopes names of this type under `parent_id`.
    pub fn name_scope(self, parent_id: &Id) -> Id {
        if self.name_scoped_by_parent() {
            *parent_id
        } else {
            NIL_ID
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags::bitflags! {
    /// Independent status flags. No flag set means active.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ComponentStatus: u8 {
        /// Soft-deleted: kept in the model, name released, not written.
        const DELETED = 1 << 0;
        const HIDDEN = 1 << 1;
        const LOCKED = 1 << 2;
    }
}

impl ComponentStatus {
    pub fn is_active(self) -> bool {
        !self.contains(ComponentStatus::DELETED)
    }

    pub fn is_deleted(self) -> bool {
        self.contains(ComponentStatus::DELETED)
    }
}

/// A model component: identity plus type-specific payload.
///
/// Identity fields are assigned by the manifest when the component is
/// admitted to a registry; after that the id never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    id: Id,
    name: String,
    index: i32,
    parent_id: Id,
    status: ComponentStatus,
    content_version: u64,
    payload: ComponentPayload,
}

impl Component {
    /// Creates an unnamed component with nil id and unset index.
    pub fn new(payload: impl Into<ComponentPayload>) -> Self {
        Self {
            id: NIL_ID,
            name: String::new(),
            index: UNSET_INDEX,
            parent_id: NIL_ID,
            status: ComponentStatus::empty(),
            content_version: 0,
            payload: payload.into(),
        }
    }

    /// Sets the requested id.
    pub fn with_id(mut self, id: Id) -> Self {
        self.id = id;
        self
    }

    /// Sets the requested name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the requested index hint.
    pub fn with_index(mut self, index: i32) -> Self {
        self.index = index;
        self
    }

    /// Sets the parent (layer parent or style inheritance parent).
    pub fn with_parent(mut self, parent_id: Id) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn with_status(mut self, status: ComponentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn component_type(&self) -> ComponentType {
        self.payload.component_type()
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn parent_id(&self) -> &Id {
        &self.parent_id
    }

    pub fn status(&self) -> ComponentStatus {
        self.status
    }

    /// Counter bumped by every mutation made through the registry.
    pub fn content_version(&self) -> u64 {
        self.content_version
    }

    pub fn payload(&self) -> &ComponentPayload {
        &self.payload
    }

    /// True when identity and payload match, ignoring index and
    /// runtime counters.
    pub fn same_content(&self, other: &Component) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.parent_id == other.parent_id
            && self.status == other.status
            && self.payload == other.payload
    }

    // --- registry-only mutation --------------------------------------------

    pub(crate) fn assign_identity(&mut self, id: Id, index: i32, name: String) {
        self.id = id;
        self.index = index;
        self.name = name;
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
        self.touch();
    }

    pub(crate) fn set_parent_id(&mut self, parent_id: Id) {
        self.parent_id = parent_id;
    }

    pub(crate) fn set_status(&mut self, status: ComponentStatus) {
        self.status = status;
        self.touch();
    }

    pub(crate) fn payload_mut(&mut self) -> &mut ComponentPayload {
        &mut self.payload
    }

    pub(crate) fn touch(&mut self) {
        self.content_version += 1;
    }
}
