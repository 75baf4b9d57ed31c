//! Type-specific component payloads.
//!
//! The registry treats these as opaque except for their cross-reference
//! fields, which it rewrites through a manifest map after loads and
//! merges (see [`ComponentPayload::references_mut`]).

use crate::model::component::ComponentType;
use crate::model::fields::{DenseField, FieldSet};
use crate::model::id::Id;

/// Packed ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const WHITE: Color = Color(0xFFFF_FFFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Color {
        Color(0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }
}

/// Dash pattern: positive lengths draw, negative lengths skip.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinePattern {
    pub segments: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub color: Color,
    pub plot_weight: f64,
    /// Line pattern used by objects on the layer; nil means continuous.
    pub line_pattern_id: Id,
    pub print_color: Option<Color>,
    pub locked_in_layouts: bool,
}

impl Default for Layer {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            plot_weight: 0.0,
            line_pattern_id: [0u8; 16],
            print_color: None,
            locked_in_layouts: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub diffuse: Color,
    pub shine: f64,
    pub transparency: f64,
    pub reflectivity: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: Color::rgb(128, 128, 128),
            shine: 0.0,
            transparency: 0.0,
            reflectivity: 0.0,
        }
    }
}

/// Named group; membership is stored on geometry, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Group;

/// Dimension style fields that a child style may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DimStyleField {
    TextHeight = 0,
    TextGap = 1,
    ArrowSize = 2,
    ExtensionOffset = 3,
    DimensionScale = 4,
    LengthPrecision = 5,
}

impl DenseField for DimStyleField {
    const COUNT: u32 = 6;

    fn ordinal(self) -> u32 {
        self as u32
    }

    fn from_ordinal(ordinal: u32) -> Option<Self> {
        match ordinal {
            0 => Some(DimStyleField::TextHeight),
            1 => Some(DimStyleField::TextGap),
            2 => Some(DimStyleField::ArrowSize),
            3 => Some(DimStyleField::ExtensionOffset),
            4 => Some(DimStyleField::DimensionScale),
            5 => Some(DimStyleField::LengthPrecision),
            _ => None,
        }
    }
}

/// Dimension style. The inheritance parent is the component's parent id;
/// fields not in `overrides` come from the parent.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionStyle {
    pub text_height: f64,
    pub text_gap: f64,
    pub arrow_size: f64,
    pub extension_offset: f64,
    pub dimension_scale: f64,
    pub length_precision: i32,
    pub overrides: FieldSet<DimStyleField>,
}

impl Default for DimensionStyle {
    fn default() -> Self {
        Self {
            text_height: 1.0,
            text_gap: 0.25,
            arrow_size: 1.0,
            extension_offset: 0.5,
            dimension_scale: 1.0,
            length_precision: 2,
            overrides: FieldSet::empty(),
        }
    }
}

impl DimensionStyle {
    /// Copies every field not overridden here from `parent`.
    pub fn inherit_from(&mut self, parent: &DimensionStyle) {
        for ordinal in 0..DimStyleField::COUNT {
            let Some(field) = DimStyleField::from_ordinal(ordinal) else { continue };
            if self.overrides.contains(field) {
                continue;
            }
            match field {
                DimStyleField::TextHeight => self.text_height = parent.text_height,
                DimStyleField::TextGap => self.text_gap = parent.text_gap,
                DimStyleField::ArrowSize => self.arrow_size = parent.arrow_size,
                DimStyleField::ExtensionOffset => self.extension_offset = parent.extension_offset,
                DimStyleField::DimensionScale => self.dimension_scale = parent.dimension_scale,
                DimStyleField::LengthPrecision => self.length_precision = parent.length_precision,
            }
        }
    }
}

/// How an instance definition gets its geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum InstanceDefinitionKind {
    /// Geometry lives in this model.
    #[default]
    Static = 0,
    /// Geometry copied from a file and kept in this model.
    LinkedAndEmbedded = 1,
    /// Geometry reloaded from a file on open; needs V6.
    Linked = 2,
}

impl InstanceDefinitionKind {
    pub fn from_u8(v: u8) -> Option<InstanceDefinitionKind> {
        match v {
            0 => Some(InstanceDefinitionKind::Static),
            1 => Some(InstanceDefinitionKind::LinkedAndEmbedded),
            2 => Some(InstanceDefinitionKind::Linked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstanceDefinition {
    pub kind: InstanceDefinitionKind,
    pub source_path: String,
    /// Geometry components making up the definition.
    pub members: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelGeometry {
    pub layer_id: Id,
    /// Geometry representation code, owned by the geometry library.
    pub geometry_kind: u32,
    /// Serialized geometry, opaque here.
    pub geometry: Vec<u8>,
    pub color: Option<Color>,
    pub plot_weight: Option<f64>,
    pub display_order: i32,
}

/// Inputs and outputs of a recorded modeling command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryRecord {
    pub command_id: Id,
    pub antecedents: Vec<Id>,
    pub descendants: Vec<Id>,
}

/// Payload of a component; the variant determines the component type.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentPayload {
    LinePattern(LinePattern),
    Layer(Layer),
    Material(Material),
    Group(Group),
    DimensionStyle(DimensionStyle),
    InstanceDefinition(InstanceDefinition),
    ModelGeometry(ModelGeometry),
    HistoryRecord(HistoryRecord),
}

impl ComponentPayload {
    pub fn component_type(&self) -> ComponentType {
        match self {
            ComponentPayload::LinePattern(_) => ComponentType::LinePattern,
            ComponentPayload::Layer(_) => ComponentType::Layer,
            ComponentPayload::Material(_) => ComponentType::Material,
            ComponentPayload::Group(_) => ComponentType::Group,
            ComponentPayload::DimensionStyle(_) => ComponentType::DimensionStyle,
            ComponentPayload::InstanceDefinition(_) => ComponentType::InstanceDefinition,
            ComponentPayload::ModelGeometry(_) => ComponentType::ModelGeometry,
            ComponentPayload::HistoryRecord(_) => ComponentType::HistoryRecord,
        }
    }

    /// Default payload for a type; `None` for [`ComponentType::Unset`].
    pub fn default_for(component_type: ComponentType) -> Option<ComponentPayload> {
        Some(match component_type {
            ComponentType::Unset => return None,
            ComponentType::LinePattern => LinePattern::default().into(),
            ComponentType::Layer => Layer::default().into(),
            ComponentType::Material => Material::default().into(),
            ComponentType::Group => Group.into(),
            ComponentType::DimensionStyle => DimensionStyle::default().into(),
            ComponentType::InstanceDefinition => InstanceDefinition::default().into(),
            ComponentType::ModelGeometry => ModelGeometry::default().into(),
            ComponentType::HistoryRecord => HistoryRecord::default().into(),
        })
    }

    /// Cross-reference fields with the type each one points at.
    pub fn references_mut(&mut self) -> Vec<(ComponentType, &mut Id)> {
        match self {
            ComponentPayload::Layer(layer) => {
                vec![(ComponentType::LinePattern, &mut layer.line_pattern_id)]
            }
            ComponentPayload::InstanceDefinition(idef) => idef
                .members
                .iter_mut()
                .map(|id| (ComponentType::ModelGeometry, id))
                .collect(),
            ComponentPayload::ModelGeometry(geometry) => {
                vec![(ComponentType::Layer, &mut geometry.layer_id)]
            }
            ComponentPayload::HistoryRecord(record) => record
                .antecedents
                .iter_mut()
                .chain(record.descendants.iter_mut())
                .map(|id| (ComponentType::ModelGeometry, id))
                .collect(),
            ComponentPayload::LinePattern(_)
            | ComponentPayload::Material(_)
            | ComponentPayload::Group(_)
            | ComponentPayload::DimensionStyle(_) => Vec::new(),
        }
    }
}

impl From<LinePattern> for ComponentPayload {
    fn from(v: LinePattern) -> Self {
        ComponentPayload::LinePattern(v)
    }
}

impl From<Layer> for ComponentPayload {
    fn from(v: Layer) -> Self {
        ComponentPayload::Layer(v)
    }
}

impl From<Material> for ComponentPayload {
    fn from(v: Material) -> Self {
        ComponentPayload::Material(v)
    }
}

impl From<Group> for ComponentPayload {
    fn from(v: Group) -> Self {
        ComponentPayload::Group(v)
    }
}

impl From<DimensionStyle> for ComponentPayload {
    fn from(v: DimensionStyle) -> Self {
        ComponentPayload::DimensionStyle(v)
    }
}

impl From<InstanceDefinition> for ComponentPayload {
    fn from(v: InstanceDefinition) -> Self {
        ComponentPayload::InstanceDefinition(v)
    }
}

impl From<ModelGeometry> for ComponentPayload {
    fn from(v: ModelGeometry) -> Self {
        ComponentPayload::ModelGeometry(v)
    }
}

impl From<HistoryRecord> for ComponentPayload {
    fn from(v: HistoryRecord) -> Self {
        ComponentPayload::HistoryRecord(v)
    }
}
