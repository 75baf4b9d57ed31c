//! Merging the components of one registry into another.

use crate::error::RegistryError;
use crate::manifest::ManifestMap;
use crate::model::{Component, ComponentType};
use crate::registry::{ComponentRef, Registry, parents_first, remap_parent};

/// Outcome of [`Registry::import`].
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Identity changes made while admitting the imported components.
    pub map: ManifestMap,
    /// Handles to the imported copies, in import order.
    pub imported: Vec<ComponentRef>,
    /// Cross-references that pointed outside both registries and were
    /// set to nil.
    pub unresolved_references: usize,
}

impl Registry {
    /// Imports copies of `other`'s active user components.
    ///
    /// Colliding ids and names are always resolved. Parents are admitted
    /// before their children, and a child's name is checked under its
    /// parent's new identity. Once everything is in, each imported
    /// component's parent and payload references are rewritten through
    /// the resulting map, so references between imported components
    /// follow any renaming. The pairs are also kept in this registry's
    /// own manifest map.
    pub fn import(&mut self, other: &Registry) -> Result<ImportReport, RegistryError> {
        let mut map = ManifestMap::new();
        let mut imported = Vec::new();
        for ty in ComponentType::ALL {
            let mut components: Vec<Component> = Vec::new();
            for reference in other.components(ty) {
                if let Some(component) = reference.component().map(|c| c.clone()) {
                    components.push(component);
                }
            }
            for mut component in parents_first(components) {
                remap_parent(&mut component, &map);
                imported.push(self.admit(component, true, Some(&mut map))?);
            }
        }

        let mut unresolved_references = 0;
        for reference in &imported {
            unresolved_references += self.remap_references(reference, &map)?;
        }
        for item in map.iter() {
            if let Err(e) = self.manifest_map.add_pair(*item.source(), *item.destination()) {
                tracing::debug!(error = %e, "manifest map pair not kept");
            }
        }

        tracing::debug!(
            imported = imported.len(),
            remapped = map.len(),
            unresolved = unresolved_references,
            "registry imported"
        );
        Ok(ImportReport {
            map,
            imported,
            unresolved_references,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, ComponentPayload, HistoryRecord, Id, Layer, ModelGeometry, NIL_ID};

    fn layer(name: &str, id: u8) -> Component {
        Component::new(Layer::default()).with_name(name).with_id([id; 16])
    }

    fn geometry(layer_id: Id, id: u8) -> Component {
        Component::new(ModelGeometry {
            layer_id,
            ..ModelGeometry::default()
        })
        .with_id([id; 16])
    }

    #[test]
    fn test_import_follows_renamed_references() {
        let mut document = Registry::new();
        document.add(layer("Base", 1), false).unwrap();
        document.add(geometry([1; 16], 2), false).unwrap();

        let mut reference_file = Registry::new();
        reference_file.add(layer("Base", 1), false).unwrap();
        reference_file.add(layer("Detail", 3).with_parent([1; 16]), false).unwrap();
        reference_file.add(geometry([3; 16], 2), false).unwrap();
        reference_file
            .add(
                Component::new(HistoryRecord {
                    command_id: [0xC0; 16],
                    antecedents: vec![[2; 16]],
                    descendants: vec![[0xEE; 16]],
                })
                .with_id([4; 16]),
                false,
            )
            .unwrap();

        let report = document.import(&reference_file).unwrap();
        assert_eq!(report.imported.len(), 4);
        assert_eq!(report.unresolved_references, 1);
        assert_eq!(document.count(ComponentType::Layer), 3);

        let base = report.map.map_item_from_source_id(&[1; 16]).unwrap();
        assert!(base.id_changed());
        let new_base = base.destination().id;
        let renamed = document.component_from_id(ComponentType::Layer, &new_base).unwrap();
        assert_eq!(renamed.component().unwrap().name(), "Base (1)");

        let detail = document.component_from_id(ComponentType::Layer, &[3; 16]).unwrap();
        assert_eq!(detail.component().unwrap().parent_id(), &new_base);
        assert_eq!(
            document.component_from_name(ComponentType::Layer, &new_base, "Detail"),
            Some(detail)
        );

        let geometry_pair = report.map.map_item_from_source_id(&[2; 16]).unwrap();
        let new_geometry = geometry_pair.destination().id;
        let copy = document.component_from_id(ComponentType::ModelGeometry, &new_geometry).unwrap();
        match copy.component().unwrap().payload() {
            ComponentPayload::ModelGeometry(g) => assert_eq!(g.layer_id, [3; 16]),
            other => panic!("unexpected payload {other:?}"),
        }

        let history = document.component_from_id(ComponentType::HistoryRecord, &[4; 16]).unwrap();
        match history.component().unwrap().payload() {
            ComponentPayload::HistoryRecord(h) => {
                assert_eq!(h.antecedents, vec![new_geometry]);
                assert_eq!(h.descendants, vec![NIL_ID]);
            }
            other => panic!("unexpected payload {other:?}"),
        }

        assert!(document.manifest_map().map_item_from_source_id(&[1; 16]).is_some());
    }

    #[test]
    fn test_import_checks_child_names_under_new_parent() {
        let mut document = Registry::new();
        document.add(layer("Base", 1), false).unwrap();
        document.add(layer("Detail", 2).with_parent([1; 16]), false).unwrap();

        // the child comes first, so it must wait for its parent
        let mut other = Registry::new();
        other.add(layer("Detail", 3).with_parent([1; 16]), false).unwrap();
        other.add(layer("Base", 1), false).unwrap();

        let report = document.import(&other).unwrap();
        assert_eq!(report.unresolved_references, 0);
        let new_base = report.map.map_item_from_source_id(&[1; 16]).unwrap().destination().id;
        assert_ne!(new_base, [1; 16]);

        let child = document.component_from_id(ComponentType::Layer, &[3; 16]).unwrap();
        assert_eq!(child.component().unwrap().name(), "Detail");
        assert_eq!(child.component().unwrap().parent_id(), &new_base);
        assert!(report.map.map_item_from_source_id(&[3; 16]).is_none());
        assert_eq!(
            document.component_from_name(ComponentType::Layer, &new_base, "Detail"),
            Some(child)
        );
        assert_eq!(
            document.component_from_name(ComponentType::Layer, &[1; 16], "Detail").unwrap().id(),
            Some([2; 16])
        );
    }

    #[test]
    fn test_import_skips_deleted_and_system_components() {
        let mut document = Registry::new();
        let mut other = Registry::new();
        other.add(layer("Kept", 1), false).unwrap();
        other.add(layer("Dropped", 2), false).unwrap();
        other.delete(ComponentType::Layer, &[2; 16]).unwrap();

        let report = document.import(&other).unwrap();
        assert_eq!(report.imported.len(), 1);
        assert!(report.map.is_empty());
        assert_eq!(document.count(ComponentType::Layer), 1);
        assert!(document.component_from_id(ComponentType::Layer, &[2; 16]).is_none());
    }

    #[test]
    fn test_import_twice_duplicates_with_fresh_identities() {
        let mut document = Registry::new();
        let mut other = Registry::new();
        other.add(layer("A", 1), false).unwrap();

        document.import(&other).unwrap();
        let before = document.content_version();
        let second = document.import(&other).unwrap();
        assert!(document.content_version() > before);
        assert_eq!(second.map.len(), 1);
        assert_eq!(document.count(ComponentType::Layer), 2);
        assert!(document.component_from_name(ComponentType::Layer, &NIL_ID, "A (1)").is_some());
    }
}
