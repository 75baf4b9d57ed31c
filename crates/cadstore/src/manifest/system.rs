//! Built-in system components.
//!
//! System components exist in every model, have negative indices and
//! ids derived from their type and name, are never written to archives
//! and cannot be modified or removed. Their names are reserved.

use lazy_static::lazy_static;

use crate::manifest::ManifestItem;
use crate::model::{
    Component, ComponentPayload, ComponentType, DimensionStyle, Id, Layer, LinePattern, Material,
    derived_id,
};

lazy_static! {
    static ref SYSTEM_COMPONENTS: Vec<Component> = build();
    static ref SYSTEM_ITEMS: Vec<ManifestItem> = SYSTEM_COMPONENTS
        .iter()
        .map(ManifestItem::from_system_component)
        .collect();
}

/// Id of the system component of `component_type` named `name`.
pub fn system_id(component_type: ComponentType, name: &str) -> Id {
    derived_id(format!("cadstore:system:{}:{}", component_type as u8, name).as_bytes())
}

pub fn continuous_line_pattern_id() -> Id {
    system_id(ComponentType::LinePattern, "Continuous")
}

pub fn default_layer_id() -> Id {
    system_id(ComponentType::Layer, "Default")
}

pub fn default_material_id() -> Id {
    system_id(ComponentType::Material, "Default")
}

pub fn default_dimension_style_id() -> Id {
    system_id(ComponentType::DimensionStyle, "Default")
}

/// Every system component, grouped by type.
pub fn system_components() -> &'static [Component] {
    &SYSTEM_COMPONENTS
}

/// System components of one type, in index order (-1, -2, ...).
pub fn system_components_of(component_type: ComponentType) -> impl Iterator<Item = &'static Component> {
    SYSTEM_COMPONENTS
        .iter()
        .filter(move |c| c.component_type() == component_type)
}

pub(crate) fn system_items_of(component_type: ComponentType) -> impl Iterator<Item = &'static ManifestItem> {
    SYSTEM_ITEMS
        .iter()
        .filter(move |item| item.component_type() == component_type)
}

fn build() -> Vec<Component> {
    let mm_small = DimensionStyle {
        text_height: 2.5,
        text_gap: 0.8,
        arrow_size: 2.5,
        extension_offset: 1.0,
        length_precision: 1,
        ..Default::default()
    };
    let inch_decimal = DimensionStyle {
        text_height: 0.125,
        text_gap: 0.0625,
        arrow_size: 0.125,
        extension_offset: 0.0625,
        length_precision: 3,
        ..Default::default()
    };

    let entries: Vec<(i32, &str, ComponentPayload)> = vec![
        (-1, "Continuous", LinePattern::default().into()),
        (-2, "By Layer", LinePattern::default().into()),
        (-3, "By Parent", LinePattern::default().into()),
        (-1, "Default", Layer::default().into()),
        (-1, "Default", Material::default().into()),
        (-1, "Default", DimensionStyle::default().into()),
        (-2, "Default Millimeter Small", mm_small.into()),
        (-3, "Default Inch Decimal", inch_decimal.into()),
    ];

    entries
        .into_iter()
        .map(|(index, name, payload)| {
            let ty = payload.component_type();
            Component::new(payload)
                .with_id(system_id(ty, name))
                .with_name(name)
                .with_index(index)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_ids_are_stable_and_distinct() {
        assert_eq!(default_layer_id(), system_id(ComponentType::Layer, "Default"));
        assert_ne!(default_layer_id(), default_material_id());

        let mut ids: Vec<Id> = system_components().iter().map(|c| *c.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), system_components().len());
    }

    #[test]
    fn test_system_indices_are_negative_and_dense() {
        for ty in ComponentType::ALL {
            let indices: Vec<i32> = system_components_of(ty).map(|c| c.index()).collect();
            let expected: Vec<i32> = (1..=indices.len() as i32).map(|i| -i).collect();
            assert_eq!(indices, expected, "{ty}");
        }
        assert_eq!(system_components_of(ComponentType::LinePattern).count(), 3);
        assert_eq!(system_components_of(ComponentType::ModelGeometry).count(), 0);
    }

    #[test]
    fn test_items_mirror_components() {
        let items: Vec<_> = system_items_of(ComponentType::DimensionStyle).collect();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| item.is_system()));
        assert_eq!(items[0].id(), &default_dimension_style_id());
    }
}
