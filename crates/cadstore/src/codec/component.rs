//! Component records: the identity envelope plus the payload owned by
//! the component type.
//!
//! ```text
//! COMPONENT_RECORD 1.x
//!   id: Id, index: i32, name: text         1.0
//!   COMPONENT_PAYLOAD 1.x                  1.0
//!   parent_id: Id                          1.1  (V5+)
//!   status: u8                             1.2  (V7+)
//! ```
//!
//! Fields are only ever appended, so a reader that knows fewer minor
//! versions stops early and the chunk boundary skips the rest. Each
//! record maps the minor version to a schema enum and matches on it.
//!
//! Archives before V5 store cross-references as model indices. Writers
//! get those from a [`ReferenceIndexer`]; readers turn them back into
//! ids with a [`ReferenceResolver`].

use crate::codec::chunk::{ArchiveReader, ArchiveWriter};
use crate::codec::tcode::{TCODE_COMPONENT_PAYLOAD, TCODE_COMPONENT_RECORD};
use crate::codec::version::{ArchiveVersion, ChunkVersion};
use crate::error::{ReadError, WriteError};
use crate::model::{
    Color, Component, ComponentPayload, ComponentStatus, ComponentType, DimStyleField,
    DimensionStyle, FieldSet, Group, HistoryRecord, Id, InstanceDefinition,
    InstanceDefinitionKind, Layer, LinePattern, Material, ModelGeometry, NIL_ID,
};

const RECORD_MAJOR: i32 = 1;
const PAYLOAD_MAJOR: i32 = 1;

// Layer tagged items (payload 1.2)
const LAYER_ITEM_PRINT_COLOR: u8 = 1;
const LAYER_ITEM_LOCKED_IN_LAYOUTS: u8 = 2;

// ModelGeometry tagged items (payload 1.2)
const GEOMETRY_ITEM_COLOR: u8 = 1;
const GEOMETRY_ITEM_PLOT_WEIGHT: u8 = 2;
const GEOMETRY_ITEM_DISPLAY_ORDER: u8 = 3;

/// Gives the index stored for a cross-reference in index-based archives.
///
/// Must return [`UNSET_INDEX`](crate::model::UNSET_INDEX) for the nil id
/// and for ids it does not know.
pub trait ReferenceIndexer {
    fn index_of(&self, component_type: ComponentType, id: &Id) -> i32;
}

/// Turns an index read from an index-based archive back into an id.
///
/// Must return [`NIL_ID`] for [`UNSET_INDEX`](crate::model::UNSET_INDEX);
/// implementations count other indices they cannot resolve.
pub trait ReferenceResolver {
    fn resolve_index(&mut self, component_type: ComponentType, index: i32) -> Id;
}

// =============================================================================
// SCHEMAS
// =============================================================================

/// Generations of the record envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecordSchema {
    /// 1.0: id, index, name, payload.
    Identity,
    /// 1.1: adds the parent id.
    WithParent,
    /// 1.2: adds the status flags.
    WithStatus,
}

impl RecordSchema {
    pub fn for_target(target: ArchiveVersion) -> Self {
        match target {
            ArchiveVersion::V4 => RecordSchema::Identity,
            ArchiveVersion::V5 | ArchiveVersion::V6 => RecordSchema::WithParent,
            ArchiveVersion::V7 | ArchiveVersion::V8 => RecordSchema::WithStatus,
        }
    }

    /// Minor versions newer than the newest known read as the newest.
    pub fn from_minor(minor: i32) -> Self {
        match minor {
            i32::MIN..=0 => RecordSchema::Identity,
            1 => RecordSchema::WithParent,
            _ => RecordSchema::WithStatus,
        }
    }

    pub fn minor(self) -> i32 {
        match self {
            RecordSchema::Identity => 0,
            RecordSchema::WithParent => 1,
            RecordSchema::WithStatus => 2,
        }
    }
}

/// Generations of payloads that hold cross-references (Layer, ModelGeometry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ReferenceSchema {
    /// 1.0: references by index only.
    Indexed,
    /// 1.1: references by id as well.
    Identified,
    /// 1.2: tagged optional items.
    Tagged,
}

impl ReferenceSchema {
    fn for_target(target: ArchiveVersion) -> Self {
        match target {
            ArchiveVersion::V4 => ReferenceSchema::Indexed,
            ArchiveVersion::V5 | ArchiveVersion::V6 => ReferenceSchema::Identified,
            ArchiveVersion::V7 | ArchiveVersion::V8 => ReferenceSchema::Tagged,
        }
    }

    fn from_minor(minor: i32) -> Self {
        match minor {
            i32::MIN..=0 => ReferenceSchema::Indexed,
            1 => ReferenceSchema::Identified,
            _ => ReferenceSchema::Tagged,
        }
    }

    fn minor(self) -> i32 {
        match self {
            ReferenceSchema::Indexed => 0,
            ReferenceSchema::Identified => 1,
            ReferenceSchema::Tagged => 2,
        }
    }
}

/// Generations of payloads extended once at V6 (Material, DimensionStyle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ExtensionSchema {
    Base,
    Extended,
}

impl ExtensionSchema {
    fn for_target(target: ArchiveVersion) -> Self {
        if target >= ArchiveVersion::V6 {
            ExtensionSchema::Extended
        } else {
            ExtensionSchema::Base
        }
    }

    fn from_minor(minor: i32) -> Self {
        if minor >= 1 {
            ExtensionSchema::Extended
        } else {
            ExtensionSchema::Base
        }
    }

    fn minor(self) -> i32 {
        match self {
            ExtensionSchema::Base => 0,
            ExtensionSchema::Extended => 1,
        }
    }
}

// =============================================================================
// WRITING
// =============================================================================

/// Kind written for an instance definition at `target`.
///
/// A linked definition without a path has nothing to link to and is
/// written as static. Below V6 a linked definition with a path is
/// written as linked-and-embedded, the nearest kind older readers know.
pub fn downgraded_kind(definition: &InstanceDefinition, target: ArchiveVersion) -> InstanceDefinitionKind {
    match definition.kind {
        InstanceDefinitionKind::Linked if definition.source_path.is_empty() => {
            InstanceDefinitionKind::Static
        }
        InstanceDefinitionKind::Linked if target < ArchiveVersion::V6 => {
            InstanceDefinitionKind::LinkedAndEmbedded
        }
        kind => kind,
    }
}

/// Writes one component record at the writer's target version.
pub fn write_component<I>(w: &mut ArchiveWriter, component: &Component, indexer: &I) -> Result<(), WriteError>
where
    I: ReferenceIndexer + ?Sized,
{
    let ty = component.component_type();
    let target = w.version();
    if target < ty.min_archive_version() {
        return Err(WriteError::UnsupportedComponentType {
            component_type: ty,
            version: target.as_i32(),
        });
    }

    let schema = RecordSchema::for_target(target);
    w.write_chunk(
        TCODE_COMPONENT_RECORD,
        ChunkVersion::new(RECORD_MAJOR, schema.minor()),
        |w| {
            w.write_id(component.id());
            w.write_i32(component.index());
            w.write_string("component name", component.name())?;
            write_payload(w, component.payload(), indexer)?;
            if schema >= RecordSchema::WithParent {
                w.write_id(component.parent_id());
            }
            if schema >= RecordSchema::WithStatus {
                let status = component.status() - ComponentStatus::DELETED;
                w.write_u8(status.bits());
            }
            Ok(())
        },
    )
}

fn write_payload<I>(w: &mut ArchiveWriter, payload: &ComponentPayload, indexer: &I) -> Result<(), WriteError>
where
    I: ReferenceIndexer + ?Sized,
{
    let target = w.version();
    match payload {
        ComponentPayload::LinePattern(pattern) => {
            w.write_chunk(TCODE_COMPONENT_PAYLOAD, ChunkVersion::new(PAYLOAD_MAJOR, 0), |w| {
                w.write_f64_vec("line pattern segments", &pattern.segments)
            })
        }
        ComponentPayload::Layer(layer) => {
            let schema = ReferenceSchema::for_target(target);
            let version = ChunkVersion::new(PAYLOAD_MAJOR, schema.minor());
            w.write_chunk(TCODE_COMPONENT_PAYLOAD, version, |w| {
                w.write_u32(layer.color.0);
                w.write_f64(layer.plot_weight);
                w.write_i32(indexer.index_of(ComponentType::LinePattern, &layer.line_pattern_id));
                if schema >= ReferenceSchema::Identified {
                    w.write_id(&layer.line_pattern_id);
                }
                if schema >= ReferenceSchema::Tagged {
                    if let Some(color) = layer.print_color {
                        w.write_item_id(LAYER_ITEM_PRINT_COLOR)?;
                        w.write_u32(color.0);
                    }
                    if layer.locked_in_layouts {
                        w.write_item_id(LAYER_ITEM_LOCKED_IN_LAYOUTS)?;
                        w.write_bool(true);
                    }
                    w.write_items_end();
                }
                Ok(())
            })
        }
        ComponentPayload::Material(material) => {
            let schema = ExtensionSchema::for_target(target);
            let version = ChunkVersion::new(PAYLOAD_MAJOR, schema.minor());
            w.write_chunk(TCODE_COMPONENT_PAYLOAD, version, |w| {
                w.write_u32(material.diffuse.0);
                w.write_f64(material.shine);
                w.write_f64(material.transparency);
                if schema >= ExtensionSchema::Extended {
                    w.write_f64(material.reflectivity);
                }
                Ok(())
            })
        }
        ComponentPayload::Group(Group) => {
            w.write_chunk(TCODE_COMPONENT_PAYLOAD, ChunkVersion::new(PAYLOAD_MAJOR, 0), |_| Ok(()))
        }
        ComponentPayload::DimensionStyle(style) => {
            let schema = ExtensionSchema::for_target(target);
            let version = ChunkVersion::new(PAYLOAD_MAJOR, schema.minor());
            w.write_chunk(TCODE_COMPONENT_PAYLOAD, version, |w| {
                w.write_f64(style.text_height);
                w.write_f64(style.text_gap);
                w.write_f64(style.arrow_size);
                w.write_f64(style.extension_offset);
                w.write_f64(style.dimension_scale);
                w.write_i32(style.length_precision);
                if schema >= ExtensionSchema::Extended {
                    w.write_u64(style.overrides.bits());
                }
                Ok(())
            })
        }
        ComponentPayload::InstanceDefinition(definition) => {
            let kind = downgraded_kind(definition, target);
            if kind != definition.kind {
                tracing::debug!(from = ?definition.kind, to = ?kind, %target, "instance definition kind downgraded");
            }
            w.write_chunk(TCODE_COMPONENT_PAYLOAD, ChunkVersion::new(PAYLOAD_MAJOR, 0), |w| {
                w.write_u8(kind as u8);
                w.write_string("instance definition path", &definition.source_path)?;
                w.write_id_vec("instance definition members", &definition.members)
            })
        }
        ComponentPayload::ModelGeometry(geometry) => {
            let schema = ReferenceSchema::for_target(target);
            let version = ChunkVersion::new(PAYLOAD_MAJOR, schema.minor());
            w.write_chunk(TCODE_COMPONENT_PAYLOAD, version, |w| {
                w.write_i32(indexer.index_of(ComponentType::Layer, &geometry.layer_id));
                w.write_u32(geometry.geometry_kind);
                w.write_bytes("geometry", &geometry.geometry)?;
                if schema >= ReferenceSchema::Identified {
                    w.write_id(&geometry.layer_id);
                }
                if schema >= ReferenceSchema::Tagged {
                    if let Some(color) = geometry.color {
                        w.write_item_id(GEOMETRY_ITEM_COLOR)?;
                        w.write_u32(color.0);
                    }
                    if let Some(weight) = geometry.plot_weight {
                        w.write_item_id(GEOMETRY_ITEM_PLOT_WEIGHT)?;
                        w.write_f64(weight);
                    }
                    if geometry.display_order != 0 {
                        w.write_item_id(GEOMETRY_ITEM_DISPLAY_ORDER)?;
                        w.write_i32(geometry.display_order);
                    }
                    w.write_items_end();
                }
                Ok(())
            })
        }
        ComponentPayload::HistoryRecord(record) => {
            w.write_chunk(TCODE_COMPONENT_PAYLOAD, ChunkVersion::new(PAYLOAD_MAJOR, 0), |w| {
                w.write_id(&record.command_id);
                w.write_id_vec("history antecedents", &record.antecedents)?;
                w.write_id_vec("history descendants", &record.descendants)
            })
        }
    }
}

// =============================================================================
// READING
// =============================================================================

/// Reads one component record of `component_type`.
///
/// The record chunk is always closed, so a failure inside one record
/// leaves the reader at the start of the next.
pub fn read_component<R>(
    r: &mut ArchiveReader<'_>,
    component_type: ComponentType,
    resolver: &mut R,
) -> Result<Component, ReadError>
where
    R: ReferenceResolver + ?Sized,
{
    r.read_expected_chunk(TCODE_COMPONENT_RECORD, |r, header| {
        let schema = RecordSchema::from_minor(header.check_major(RECORD_MAJOR)?);
        let id = r.read_id("component id")?;
        let index = r.read_i32("component index")?;
        let name = r.read_string("component name")?;
        let payload = read_payload(r, component_type, resolver)?;

        let (parent_id, status) = match schema {
            RecordSchema::Identity => (NIL_ID, ComponentStatus::empty()),
            RecordSchema::WithParent => (r.read_id("parent id")?, ComponentStatus::empty()),
            RecordSchema::WithStatus => {
                let parent_id = r.read_id("parent id")?;
                let bits = r.read_u8("component status")?;
                (parent_id, ComponentStatus::from_bits_truncate(bits) - ComponentStatus::DELETED)
            }
        };

        Ok(Component::new(payload)
            .with_id(id)
            .with_index(index)
            .with_name(name)
            .with_parent(parent_id)
            .with_status(status))
    })
}

fn read_payload<R>(
    r: &mut ArchiveReader<'_>,
    component_type: ComponentType,
    resolver: &mut R,
) -> Result<ComponentPayload, ReadError>
where
    R: ReferenceResolver + ?Sized,
{
    r.read_expected_chunk(TCODE_COMPONENT_PAYLOAD, |r, header| {
        let minor = header.check_major(PAYLOAD_MAJOR)?;
        let payload = match component_type {
            ComponentType::Unset => {
                return Err(ReadError::InvalidTag {
                    field: "component type",
                    value: component_type as u32,
                });
            }
            ComponentType::LinePattern => LinePattern {
                segments: r.read_f64_vec("line pattern segments")?,
            }
            .into(),
            ComponentType::Layer => read_layer(r, ReferenceSchema::from_minor(minor), resolver)?.into(),
            ComponentType::Material => read_material(r, ExtensionSchema::from_minor(minor))?.into(),
            ComponentType::Group => Group.into(),
            ComponentType::DimensionStyle => {
                read_dimension_style(r, ExtensionSchema::from_minor(minor))?.into()
            }
            ComponentType::InstanceDefinition => read_instance_definition(r)?.into(),
            ComponentType::ModelGeometry => {
                read_geometry(r, ReferenceSchema::from_minor(minor), resolver)?.into()
            }
            ComponentType::HistoryRecord => HistoryRecord {
                command_id: r.read_id("history command id")?,
                antecedents: r.read_id_vec("history antecedents")?,
                descendants: r.read_id_vec("history descendants")?,
            }
            .into(),
        };
        Ok(payload)
    })
}

fn read_layer<R>(r: &mut ArchiveReader<'_>, schema: ReferenceSchema, resolver: &mut R) -> Result<Layer, ReadError>
where
    R: ReferenceResolver + ?Sized,
{
    let mut layer = Layer {
        color: Color(r.read_u32("layer color")?),
        plot_weight: r.read_f64("layer plot weight")?,
        ..Default::default()
    };
    let pattern_index = r.read_i32("layer line pattern index")?;

    match schema {
        ReferenceSchema::Indexed => {
            layer.line_pattern_id = resolver.resolve_index(ComponentType::LinePattern, pattern_index);
        }
        ReferenceSchema::Identified => {
            layer.line_pattern_id = r.read_id("layer line pattern id")?;
        }
        ReferenceSchema::Tagged => {
            layer.line_pattern_id = r.read_id("layer line pattern id")?;
            while let Some(item) = r.read_item_id()? {
                match item {
                    LAYER_ITEM_PRINT_COLOR => {
                        layer.print_color = Some(Color(r.read_u32("layer print color")?));
                    }
                    LAYER_ITEM_LOCKED_IN_LAYOUTS => {
                        layer.locked_in_layouts = r.read_bool("layer locked in layouts")?;
                    }
                    _ => {
                        tracing::debug!(item, "unknown layer item; skipping remainder");
                        break;
                    }
                }
            }
        }
    }
    Ok(layer)
}

fn read_material(r: &mut ArchiveReader<'_>, schema: ExtensionSchema) -> Result<Material, ReadError> {
    let diffuse = Color(r.read_u32("material diffuse")?);
    let shine = r.read_f64("material shine")?;
    let transparency = r.read_f64("material transparency")?;
    let reflectivity = match schema {
        ExtensionSchema::Base => 0.0,
        ExtensionSchema::Extended => r.read_f64("material reflectivity")?,
    };
    Ok(Material {
        diffuse,
        shine,
        transparency,
        reflectivity,
    })
}

fn read_dimension_style(r: &mut ArchiveReader<'_>, schema: ExtensionSchema) -> Result<DimensionStyle, ReadError> {
    let mut style = DimensionStyle {
        text_height: r.read_f64("text height")?,
        text_gap: r.read_f64("text gap")?,
        arrow_size: r.read_f64("arrow size")?,
        extension_offset: r.read_f64("extension offset")?,
        dimension_scale: r.read_f64("dimension scale")?,
        length_precision: r.read_i32("length precision")?,
        overrides: FieldSet::empty(),
    };
    // Styles from before overrides existed carry all of their own values.
    style.overrides = match schema {
        ExtensionSchema::Base => FieldSet::<DimStyleField>::all(),
        ExtensionSchema::Extended => FieldSet::from_bits(r.read_u64("style overrides")?),
    };
    Ok(style)
}

fn read_instance_definition(r: &mut ArchiveReader<'_>) -> Result<InstanceDefinition, ReadError> {
    let tag = r.read_u8("instance definition kind")?;
    let kind = InstanceDefinitionKind::from_u8(tag).ok_or(ReadError::InvalidTag {
        field: "instance definition kind",
        value: tag as u32,
    })?;
    Ok(InstanceDefinition {
        kind,
        source_path: r.read_string("instance definition path")?,
        members: r.read_id_vec("instance definition members")?,
    })
}

fn read_geometry<R>(r: &mut ArchiveReader<'_>, schema: ReferenceSchema, resolver: &mut R) -> Result<ModelGeometry, ReadError>
where
    R: ReferenceResolver + ?Sized,
{
    let layer_index = r.read_i32("geometry layer index")?;
    let mut geometry = ModelGeometry {
        geometry_kind: r.read_u32("geometry kind")?,
        geometry: r.read_bytes("geometry")?,
        ..Default::default()
    };

    match schema {
        ReferenceSchema::Indexed => {
            geometry.layer_id = resolver.resolve_index(ComponentType::Layer, layer_index);
        }
        ReferenceSchema::Identified => {
            geometry.layer_id = r.read_id("geometry layer id")?;
        }
        ReferenceSchema::Tagged => {
            geometry.layer_id = r.read_id("geometry layer id")?;
            while let Some(item) = r.read_item_id()? {
                match item {
                    GEOMETRY_ITEM_COLOR => geometry.color = Some(Color(r.read_u32("geometry color")?)),
                    GEOMETRY_ITEM_PLOT_WEIGHT => {
                        geometry.plot_weight = Some(r.read_f64("geometry plot weight")?);
                    }
                    GEOMETRY_ITEM_DISPLAY_ORDER => {
                        geometry.display_order = r.read_i32("geometry display order")?;
                    }
                    _ => {
                        tracing::debug!(item, "unknown geometry item; skipping remainder");
                        break;
                    }
                }
            }
        }
    }
    Ok(geometry)
}
