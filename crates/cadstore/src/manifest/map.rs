//! Identity remap table produced while admitting components with
//! conflict resolution.
//!
//! Each pair records how one component's persisted (source) identity
//! became its runtime (destination) identity. Stored cross-references
//! are passed through the map before they are trusted.

use rustc_hash::FxHashMap;

use crate::error::ManifestError;
use crate::manifest::Manifest;
use crate::model::{ComponentType, Id, NameHash, UNSET_INDEX, is_nil};

/// The identity quadruple of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentIdentity {
    pub component_type: ComponentType,
    pub id: Id,
    pub index: i32,
    pub name_hash: NameHash,
}

impl ComponentIdentity {
    pub fn new(component_type: ComponentType, id: Id, index: i32, name_hash: NameHash) -> Self {
        Self {
            component_type,
            id,
            index,
            name_hash,
        }
    }
}

/// One `source -> destination` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestMapItem {
    source: ComponentIdentity,
    destination: ComponentIdentity,
}

impl ManifestMapItem {
    pub fn source(&self) -> &ComponentIdentity {
        &self.source
    }

    pub fn destination(&self) -> &ComponentIdentity {
        &self.destination
    }

    pub fn component_type(&self) -> ComponentType {
        self.source.component_type
    }

    pub fn id_changed(&self) -> bool {
        self.source.id != self.destination.id
    }

    pub fn name_changed(&self) -> bool {
        self.source.name_hash != self.destination.name_hash
    }

    pub fn index_changed(&self) -> bool {
        self.source.index != self.destination.index
    }
}

/// Ordered set of identity pairs with lookups in both directions.
#[derive(Debug, Clone, Default)]
pub struct ManifestMap {
    items: Vec<ManifestMapItem>,
    by_source_id: FxHashMap<Id, usize>,
    by_destination_id: FxHashMap<Id, usize>,
    by_source_index: FxHashMap<(ComponentType, i32), usize>,
    by_destination_index: FxHashMap<(ComponentType, i32), usize>,
}

impl ManifestMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ManifestMapItem> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Appends a pair.
    ///
    /// Both identities must have the same type, the source must carry an
    /// id or an index, and neither id may already be mapped.
    pub fn add_pair(
        &mut self,
        source: ComponentIdentity,
        destination: ComponentIdentity,
    ) -> Result<&ManifestMapItem, ManifestError> {
        if source.component_type != destination.component_type {
            return Err(ManifestError::InvalidMapPair {
                reason: "component types differ",
            });
        }
        if source.component_type == ComponentType::Unset {
            return Err(ManifestError::InvalidMapPair {
                reason: "component type is unset",
            });
        }
        if is_nil(&source.id) && source.index == UNSET_INDEX {
            return Err(ManifestError::InvalidMapPair {
                reason: "source identity has neither id nor index",
            });
        }
        if !is_nil(&source.id) && self.by_source_id.contains_key(&source.id) {
            return Err(ManifestError::InvalidMapPair {
                reason: "source id already mapped",
            });
        }
        if !is_nil(&destination.id) && self.by_destination_id.contains_key(&destination.id) {
            return Err(ManifestError::InvalidMapPair {
                reason: "destination id already mapped",
            });
        }

        let pos = self.items.len();
        let ty = source.component_type;
        if !is_nil(&source.id) {
            self.by_source_id.insert(source.id, pos);
        }
        if !is_nil(&destination.id) {
            self.by_destination_id.insert(destination.id, pos);
        }
        if source.index != UNSET_INDEX {
            self.by_source_index.entry((ty, source.index)).or_insert(pos);
        }
        if destination.index != UNSET_INDEX {
            self.by_destination_index
                .entry((ty, destination.index))
                .or_insert(pos);
        }
        self.items.push(ManifestMapItem {
            source,
            destination,
        });
        Ok(&self.items[pos])
    }

    pub fn map_item_from_source_id(&self, id: &Id) -> Option<&ManifestMapItem> {
        self.by_source_id.get(id).map(|&pos| &self.items[pos])
    }

    pub fn map_item_from_destination_id(&self, id: &Id) -> Option<&ManifestMapItem> {
        self.by_destination_id.get(id).map(|&pos| &self.items[pos])
    }

    pub fn map_item_from_source_index(
        &self,
        component_type: ComponentType,
        index: i32,
    ) -> Option<&ManifestMapItem> {
        self.by_source_index
            .get(&(component_type, index))
            .map(|&pos| &self.items[pos])
    }

    pub fn map_item_from_destination_index(
        &self,
        component_type: ComponentType,
        index: i32,
    ) -> Option<&ManifestMapItem> {
        self.by_destination_index
            .get(&(component_type, index))
            .map(|&pos| &self.items[pos])
    }

    /// Translates a persisted index into a live index of `destination`.
    ///
    /// System indices pass through. An index with no pair maps to itself
    /// when `destination` has a component there. Returns `None` when the
    /// result does not name a live component.
    pub fn get_and_validate_destination_index(
        &self,
        component_type: ComponentType,
        source_index: i32,
        destination: &Manifest,
    ) -> Option<i32> {
        if source_index == UNSET_INDEX {
            return None;
        }
        if destination.is_system_index(component_type, source_index) {
            return Some(source_index);
        }
        let index = match self.map_item_from_source_index(component_type, source_index) {
            Some(item) => item.destination.index,
            None => source_index,
        };
        destination
            .item_from_index(component_type, index)
            .map(|item| item.index())
    }

    /// Translates a persisted id into a live id of `destination`.
    ///
    /// The nil id and system ids pass through. An id with no pair maps to
    /// itself when `destination` has a component with that id.
    pub fn get_and_validate_destination_id(
        &self,
        component_type: ComponentType,
        source_id: &Id,
        destination: &Manifest,
    ) -> Option<Id> {
        if is_nil(source_id) || destination.is_system(component_type, source_id) {
            return Some(*source_id);
        }
        let id = match self.map_item_from_source_id(source_id) {
            Some(item) if item.component_type() == component_type => item.destination.id,
            _ => *source_id,
        };
        destination
            .item_from_id(component_type, &id)
            .map(|item| *item.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::IdentityRequest;
    use crate::model::NIL_ID;

    fn identity(id: u8, index: i32, name: &str) -> ComponentIdentity {
        ComponentIdentity::new(
            ComponentType::Layer,
            [id; 16],
            index,
            NameHash::new(&NIL_ID, name),
        )
    }

    #[test]
    fn test_bidirectional_lookup() {
        let mut map = ManifestMap::new();
        let s = identity(1, 0, "Base");
        let d = identity(2, 3, "Base (1)");
        map.add_pair(s, d).unwrap();

        assert_eq!(map.map_item_from_source_id(&s.id).unwrap().destination(), &d);
        assert_eq!(map.map_item_from_destination_id(&d.id).unwrap().source(), &s);
        assert_eq!(
            map.map_item_from_source_index(ComponentType::Layer, 0).unwrap().destination().index,
            3
        );
        assert_eq!(
            map.map_item_from_destination_index(ComponentType::Layer, 3).unwrap().source().index,
            0
        );
        let item = map.map_item_from_source_id(&s.id).unwrap();
        assert!(item.id_changed() && item.name_changed() && item.index_changed());
    }

    #[test]
    fn test_rejects_invalid_pairs() {
        let mut map = ManifestMap::new();
        let mut other_type = identity(2, 0, "x");
        other_type.component_type = ComponentType::Material;
        assert!(map.add_pair(identity(1, 0, "x"), other_type).is_err());

        let unset = ComponentIdentity::new(ComponentType::Layer, NIL_ID, UNSET_INDEX, NameHash::EMPTY);
        assert!(map.add_pair(unset, identity(3, 0, "x")).is_err());

        map.add_pair(identity(1, 0, "a"), identity(2, 1, "b")).unwrap();
        assert!(matches!(
            map.add_pair(identity(1, 5, "a"), identity(4, 6, "c")),
            Err(ManifestError::InvalidMapPair { .. })
        ));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_unmapped_lookups_are_not_found() {
        let map = ManifestMap::new();
        assert!(map.map_item_from_source_id(&[7u8; 16]).is_none());
        assert!(map.map_item_from_destination_index(ComponentType::Layer, 0).is_none());
    }

    #[test]
    fn test_get_and_validate_destination_index() {
        let mut manifest = Manifest::new();
        let mut map = ManifestMap::new();
        let a = manifest
            .add(
                &IdentityRequest::new(ComponentType::Layer, [1u8; 16], "A").with_index(0),
                true,
                Some(&mut map),
            )
            .unwrap()
            .index();
        // Second file-index-0 layer collides on index and is moved.
        let b = manifest
            .add(
                &IdentityRequest::new(ComponentType::Layer, [2u8; 16], "B").with_index(0),
                true,
                None,
            )
            .unwrap()
            .index();
        assert_eq!(a, 0);
        assert_eq!(b, 1);

        let mut import_map = ManifestMap::new();
        import_map
            .add_pair(
                ComponentIdentity::new(ComponentType::Layer, [2u8; 16], 0, NameHash::EMPTY),
                ComponentIdentity::new(ComponentType::Layer, [2u8; 16], 1, NameHash::EMPTY),
            )
            .unwrap();

        let ty = ComponentType::Layer;
        assert_eq!(import_map.get_and_validate_destination_index(ty, 0, &manifest), Some(1));
        // Default layer (system) passes through.
        assert_eq!(import_map.get_and_validate_destination_index(ty, -1, &manifest), Some(-1));
        // Unmapped index falls back to identity only if it exists.
        assert_eq!(map.get_and_validate_destination_index(ty, 1, &manifest), Some(1));
        assert_eq!(map.get_and_validate_destination_index(ty, 9, &manifest), None);
        assert_eq!(map.get_and_validate_destination_index(ty, UNSET_INDEX, &manifest), None);
    }

    #[test]
    fn test_get_and_validate_destination_id() {
        let mut manifest = Manifest::new();
        let mut map = ManifestMap::new();
        manifest
            .add(&IdentityRequest::new(ComponentType::Layer, [1u8; 16], "A"), true, Some(&mut map))
            .unwrap();
        let moved = *manifest
            .add(&IdentityRequest::new(ComponentType::Layer, [1u8; 16], "B"), true, Some(&mut map))
            .unwrap()
            .id();
        assert_ne!(moved, [1u8; 16]);

        let ty = ComponentType::Layer;
        // The pair recorded for the second admission wins over identity.
        assert_eq!(map.get_and_validate_destination_id(ty, &[1u8; 16], &manifest), Some(moved));
        assert_eq!(map.get_and_validate_destination_id(ty, &NIL_ID, &manifest), Some(NIL_ID));
        assert_eq!(map.get_and_validate_destination_id(ty, &[8u8; 16], &manifest), None);
        assert_eq!(
            map.get_and_validate_destination_id(ComponentType::Material, &moved, &manifest),
            None
        );
    }
}
