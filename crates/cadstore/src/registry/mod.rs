//! Live component registry of a model.
//!
//! The registry owns every component through [`ComponentRef`] handles,
//! keeps the [`Manifest`] in step with them, and carries the
//! document-level tables (properties, settings, user strings). All
//! identity changes go through here so the manifest and the components
//! never disagree.
//!
//! Every mutation bumps the registry's content version, which is what
//! lets a [`ComponentIterator`] detect that it has to re-seek.

pub mod archive;
pub mod iter;
pub(crate) mod list;
pub mod merge;
pub mod reference;

pub use archive::{ReadIssue, ReadOptions, ReadReport, Severity, WriteOptions};
pub use iter::ComponentIterator;
pub use merge::ImportReport;
pub use reference::{ComponentRef, WeakComponentRef};

use crate::error::{ManifestError, RegistryError};
use crate::limits::MAX_PARENT_DEPTH;
use crate::manifest::system::system_components;
use crate::manifest::{IdentityRequest, ItemFilter, Manifest, ManifestItem, ManifestMap};
use crate::model::{
    Component, ComponentPayload, ComponentStatus, ComponentType, DimensionStyle, Id, ModelProperties,
    ModelSettings, NIL_ID, UserStrings, is_nil,
};
use list::ComponentList;
use rustc_hash::FxHashSet;

/// Components, their identities and the document tables of one model.
#[derive(Debug)]
pub struct Registry {
    lists: Vec<ComponentList>,
    system: Vec<Vec<ComponentRef>>,
    manifest: Manifest,
    manifest_map: ManifestMap,
    content_version: u64,
    properties: ModelProperties,
    settings: ModelSettings,
    user_strings: UserStrings,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let mut system: Vec<Vec<ComponentRef>> = vec![Vec::new(); ComponentType::COUNT];
        for component in system_components() {
            system[component.component_type() as usize].push(ComponentRef::new(component.clone()));
        }
        Self {
            lists: (0..ComponentType::COUNT).map(|_| ComponentList::default()).collect(),
            system,
            manifest: Manifest::new(),
            manifest_map: ManifestMap::new(),
            content_version: 0,
            properties: ModelProperties::default(),
            settings: ModelSettings::default(),
            user_strings: UserStrings::new(),
        }
    }

    pub(crate) fn list(&self, ty: ComponentType) -> &ComponentList {
        &self.lists[ty as usize]
    }

    pub(crate) fn system_refs(&self, ty: ComponentType) -> &[ComponentRef] {
        &self.system[ty as usize]
    }

    fn bump(&mut self) {
        self.content_version += 1;
    }

    /// Counter bumped by every mutation of the registry.
    pub fn content_version(&self) -> u64 {
        self.content_version
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Identity changes made while admitting components.
    pub fn manifest_map(&self) -> &ManifestMap {
        &self.manifest_map
    }

    /// Number of active user components of `ty`.
    pub fn count(&self, ty: ComponentType) -> usize {
        self.manifest.active_count(ty)
    }

    /// Number of user components of `ty`, deleted ones included.
    pub fn len(&self, ty: ComponentType) -> usize {
        self.list(ty).len()
    }

    // =========================================================================
    // ADMISSION AND REMOVAL
    // =========================================================================

    /// Adds a component and returns the registry's handle to it.
    ///
    /// The component's id, name and index are requests: with
    /// `resolve_conflicts` on, colliding values are replaced and the
    /// change is recorded in [`Registry::manifest_map`].
    pub fn add(&mut self, component: Component, resolve_conflicts: bool) -> Result<ComponentRef, RegistryError> {
        Ok(self.admit(component, resolve_conflicts, None)?)
    }

    /// Admits a component, recording identity changes in `map` (or in the
    /// registry's own map when `None`).
    pub(crate) fn admit(
        &mut self,
        mut component: Component,
        resolve_conflicts: bool,
        map: Option<&mut ManifestMap>,
    ) -> Result<ComponentRef, ManifestError> {
        let ty = component.component_type();
        let request = IdentityRequest::from_component(&component);
        let map = match map {
            Some(map) => map,
            None => &mut self.manifest_map,
        };
        let item = self.manifest.add(&request, resolve_conflicts, Some(map))?;
        let (id, index, name) = (*item.id(), item.index(), item.name().to_string());

        let status = component.status() - ComponentStatus::DELETED;
        if !status.is_empty() {
            self.manifest.set_status(ty, &id, status)?;
        }
        component.assign_identity(id, index, name);
        let component = component.with_status(status);

        let reference = ComponentRef::new(component);
        self.manifest.set_serial(ty, &id, reference.serial())?;
        self.lists[ty as usize].push_back(id, reference.clone());
        self.bump();
        tracing::trace!(component_type = %ty, serial = reference.serial(), "component admitted");
        Ok(reference)
    }

    /// Removes a component for good; its id may be reused afterwards.
    ///
    /// Outstanding handles keep the component alive but detached.
    pub fn remove(&mut self, ty: ComponentType, id: &Id) -> Result<ComponentRef, RegistryError> {
        if self.manifest.is_system(ty, id) {
            return Err(ManifestError::SystemComponent { component_type: ty, id: *id }.into());
        }
        self.manifest.remove(ty, id)?;
        let reference = self.lists[ty as usize]
            .remove(id)
            .ok_or(ManifestError::NotFound { component_type: ty, id: *id })?;
        self.bump();
        Ok(reference)
    }

    // =========================================================================
    // IDENTITY CHANGES
    // =========================================================================

    /// Marks a component deleted. It stays addressable by id and index but
    /// releases its name.
    pub fn delete(&mut self, ty: ComponentType, id: &Id) -> Result<(), RegistryError> {
        self.update_identity(ty, id, |manifest| manifest.set_deleted(ty, id, true, false).map(|_| ()))
    }

    /// Clears the deleted mark, renaming the component if its name was
    /// taken meanwhile and `resolve_conflicts` is set.
    pub fn undelete(&mut self, ty: ComponentType, id: &Id, resolve_conflicts: bool) -> Result<(), RegistryError> {
        self.update_identity(ty, id, |manifest| {
            manifest.set_deleted(ty, id, false, resolve_conflicts).map(|_| ())
        })
    }

    pub fn rename(
        &mut self,
        ty: ComponentType,
        id: &Id,
        name: &str,
        resolve_conflicts: bool,
    ) -> Result<(), RegistryError> {
        self.update_identity(ty, id, |manifest| {
            manifest.rename(ty, id, name, resolve_conflicts).map(|_| ())
        })
    }

    pub fn set_parent(
        &mut self,
        ty: ComponentType,
        id: &Id,
        parent_id: Id,
        resolve_conflicts: bool,
    ) -> Result<(), RegistryError> {
        self.update_identity(ty, id, |manifest| {
            manifest.set_parent(ty, id, parent_id, resolve_conflicts).map(|_| ())
        })
    }

    /// Sets the hidden and locked flags; use [`Registry::delete`] for the
    /// deleted flag.
    pub fn set_status(&mut self, ty: ComponentType, id: &Id, status: ComponentStatus) -> Result<(), RegistryError> {
        self.update_identity(ty, id, |manifest| manifest.set_status(ty, id, status).map(|_| ()))
    }

    /// Applies `change` to the manifest, then copies the resulting
    /// identity onto the component.
    fn update_identity<F>(&mut self, ty: ComponentType, id: &Id, change: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Manifest) -> Result<(), ManifestError>,
    {
        if self.manifest.is_system(ty, id) {
            return Err(ManifestError::SystemComponent { component_type: ty, id: *id }.into());
        }
        let reference = self
            .list(ty)
            .get(id)
            .cloned()
            .ok_or(ManifestError::NotFound { component_type: ty, id: *id })?;
        let mut component = reference.borrow_mut()?;

        change(&mut self.manifest)?;
        let item = self
            .manifest
            .item_from_id(ty, id)
            .ok_or(ManifestError::NotFound { component_type: ty, id: *id })?;
        sync_identity(&mut component, item);
        drop(component);
        self.bump();
        Ok(())
    }

    /// Edits a component's payload.
    ///
    /// `reference` must be this registry's handle to a user component.
    /// The edit is applied to a copy and rejected if it changes the
    /// payload's type.
    pub fn modify<F>(&mut self, reference: &ComponentRef, edit: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut ComponentPayload),
    {
        let mut component = reference.borrow_mut()?;
        let ty = component.component_type();
        let id = *component.id();
        if self.manifest.is_system(ty, &id) {
            return Err(ManifestError::SystemComponent { component_type: ty, id }.into());
        }
        match self.list(ty).get(&id) {
            Some(owned) if owned.ptr_eq(reference) => {}
            _ => return Err(RegistryError::ForeignReference),
        }

        let mut payload = component.payload().clone();
        edit(&mut payload);
        let found = payload.component_type();
        if found != ty {
            return Err(RegistryError::PayloadTypeMismatch { expected: ty, found });
        }
        *component.payload_mut() = payload;
        component.touch();
        drop(component);
        self.bump();
        Ok(())
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    fn system_ref(&self, ty: ComponentType, id: &Id) -> Option<&ComponentRef> {
        self.system_refs(ty)
            .iter()
            .find(|r| r.component().is_some_and(|c| c.id() == id))
    }

    /// Looks up a component by id, system components included.
    pub fn component_from_id(&self, ty: ComponentType, id: &Id) -> Option<ComponentRef> {
        self.system_ref(ty, id)
            .or_else(|| self.list(ty).get(id))
            .cloned()
    }

    /// Looks up an active component by name within the scope of `parent_id`.
    pub fn component_from_name(&self, ty: ComponentType, parent_id: &Id, name: &str) -> Option<ComponentRef> {
        let item = self.manifest.item_from_name(ty, parent_id, name)?;
        self.component_from_id(ty, item.id())
    }

    pub fn component_from_index(&self, ty: ComponentType, index: i32) -> Option<ComponentRef> {
        let item = self.manifest.item_from_index(ty, index)?;
        self.component_from_id(ty, item.id())
    }

    pub fn component_from_serial(&self, serial: u64) -> Option<ComponentRef> {
        self.lists
            .iter()
            .find_map(|list| list.get_by_serial(serial))
            .or_else(|| self.system.iter().flatten().find(|r| r.serial() == serial))
            .cloned()
    }

    /// Manifest entry for a component.
    pub fn item(&self, ty: ComponentType, id: &Id) -> Option<&ManifestItem> {
        self.manifest.item_from_id(ty, id)
    }

    // =========================================================================
    // ORDERED TRAVERSAL
    // =========================================================================

    pub fn first(&self, ty: ComponentType, filter: ItemFilter) -> Option<ComponentRef> {
        ComponentIterator::new(self, ty, filter).first(self)
    }

    pub fn last(&self, ty: ComponentType, filter: ItemFilter) -> Option<ComponentRef> {
        ComponentIterator::new(self, ty, filter).last(self)
    }

    /// Component after `current` in iteration order.
    pub fn next(&self, current: &ComponentRef, filter: ItemFilter) -> Option<ComponentRef> {
        ComponentIterator::at(self, current, filter)?.next(self)
    }

    pub fn prev(&self, current: &ComponentRef, filter: ItemFilter) -> Option<ComponentRef> {
        ComponentIterator::at(self, current, filter)?.prev(self)
    }

    /// Cursor that tolerates mutation of the registry between steps.
    pub fn iterator(&self, ty: ComponentType, filter: ItemFilter) -> ComponentIterator {
        ComponentIterator::new(self, ty, filter)
    }

    /// Snapshot iteration; the registry cannot change while it runs.
    pub fn iter(&self, ty: ComponentType, filter: ItemFilter) -> impl Iterator<Item = ComponentRef> + '_ {
        let mut it = ComponentIterator::new(self, ty, filter);
        std::iter::from_fn(move || it.next(self))
    }

    /// Active user components of `ty`.
    pub fn components(&self, ty: ComponentType) -> impl Iterator<Item = ComponentRef> + '_ {
        self.iter(ty, ItemFilter::ACTIVE)
    }

    // =========================================================================
    // DOCUMENT TABLES
    // =========================================================================

    pub fn properties(&self) -> &ModelProperties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut ModelProperties {
        self.bump();
        &mut self.properties
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ModelSettings {
        self.bump();
        &mut self.settings
    }

    pub fn user_strings(&self) -> &UserStrings {
        &self.user_strings
    }

    pub fn user_strings_mut(&mut self) -> &mut UserStrings {
        self.bump();
        &mut self.user_strings
    }

    // =========================================================================
    // DERIVED VALUES
    // =========================================================================

    /// Dimension style `id` with every field it does not override
    /// inherited along its parent chain.
    ///
    /// A missing parent ends the chain; so does a cycle or a chain deeper
    /// than [`MAX_PARENT_DEPTH`].
    pub fn effective_dimension_style(&self, id: &Id) -> Option<DimensionStyle> {
        let mut chain: Vec<DimensionStyle> = Vec::new();
        let mut visited: Vec<Id> = Vec::new();
        let mut current = *id;
        while chain.len() < MAX_PARENT_DEPTH && !visited.contains(&current) {
            let Some(reference) = self.component_from_id(ComponentType::DimensionStyle, &current) else {
                break;
            };
            let Some(component) = reference.component() else { break };
            let ComponentPayload::DimensionStyle(style) = component.payload() else { break };
            chain.push(style.clone());
            visited.push(current);
            let parent = *component.parent_id();
            if is_nil(&parent) {
                break;
            }
            current = parent;
        }

        let mut chain = chain.into_iter().rev();
        let mut effective = chain.next()?;
        for mut style in chain {
            style.inherit_from(&effective);
            effective = style;
        }
        Some(effective)
    }

    // =========================================================================
    // REFERENCE REMAPPING
    // =========================================================================

    /// Rewrites the parent and payload references of `reference` through
    /// `map`. References that do not land on a live component become nil.
    ///
    /// Returns the number of references that could not be resolved.
    pub(crate) fn remap_references(&mut self, reference: &ComponentRef, map: &ManifestMap) -> Result<usize, RegistryError> {
        let mut component = reference.borrow_mut()?;
        let ty = component.component_type();
        let id = *component.id();
        let mut unresolved = 0;

        if let Some(parent_type) = ty.parent_type() {
            let parent = *component.parent_id();
            if !is_nil(&parent) {
                let target = map
                    .get_and_validate_destination_id(parent_type, &parent, &self.manifest)
                    .unwrap_or_else(|| {
                        unresolved += 1;
                        NIL_ID
                    });
                if target != parent {
                    let item = self.manifest.set_parent(ty, &id, target, true)?;
                    sync_identity(&mut component, item);
                }
            }
        }

        let mut changed = false;
        for (target_type, target) in component.payload_mut().references_mut() {
            if is_nil(target) {
                continue;
            }
            let mapped = map
                .get_and_validate_destination_id(target_type, target, &self.manifest)
                .unwrap_or_else(|| {
                    unresolved += 1;
                    NIL_ID
                });
            if mapped != *target {
                *target = mapped;
                changed = true;
            }
        }
        if changed {
            component.touch();
        }
        Ok(unresolved)
    }
}

/// Copies the identity held by the manifest onto the component.
fn sync_identity(component: &mut Component, item: &ManifestItem) {
    if component.name() != item.name() {
        component.set_name(item.name().to_string());
    }
    if component.parent_id() != item.parent_id() {
        component.set_parent_id(*item.parent_id());
        component.touch();
    }
    if component.status() != item.status() {
        component.set_status(item.status());
    }
}

/// Orders one table's components so that a parent in the batch is
/// admitted before its children. Components caught in a parent cycle keep
/// their relative order at the end.
pub(crate) fn parents_first(components: Vec<Component>) -> Vec<Component> {
    let mut ordered = Vec::with_capacity(components.len());
    let mut pending = components;
    while !pending.is_empty() {
        let waiting: FxHashSet<Id> = pending.iter().map(|c| *c.id()).collect();
        let (ready, blocked): (Vec<_>, Vec<_>) = pending.into_iter().partition(|c| {
            let parent = c.parent_id();
            is_nil(parent) || parent == c.id() || !waiting.contains(parent)
        });
        if ready.is_empty() {
            ordered.extend(blocked);
            break;
        }
        ordered.extend(ready);
        pending = blocked;
    }
    ordered
}

/// Points a component at the identity its parent was admitted under, so
/// its name is checked in the scope it ends up in.
pub(crate) fn remap_parent(component: &mut Component, map: &ManifestMap) {
    let Some(parent_type) = component.component_type().parent_type() else {
        return;
    };
    let parent = *component.parent_id();
    if is_nil(&parent) {
        return;
    }
    if let Some(item) = map.map_item_from_source_id(&parent) {
        if item.component_type() == parent_type && item.destination().id != parent {
            component.set_parent_id(item.destination().id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConflictKind;
    use crate::manifest::ComponentIdentity;
    use crate::manifest::system::{default_dimension_style_id, default_layer_id};
    use crate::model::{DimStyleField, Group, Layer, Material, ModelGeometry, NameHash, UNSET_INDEX};

    fn layer(name: &str) -> Component {
        Component::new(Layer::default()).with_name(name)
    }

    #[test]
    fn test_add_assigns_identity() {
        let mut registry = Registry::new();
        let err = registry.add(layer("Walls"), false).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Manifest(ManifestError::IdentityConflict { kind: ConflictKind::NilId, .. })
        ));

        let r = registry.add(layer("Walls"), true).unwrap();
        let component = r.component().unwrap();
        assert!(!is_nil(component.id()));
        assert_eq!(component.index(), 0);
        assert_eq!(component.name(), "Walls");
        assert_eq!(registry.count(ComponentType::Layer), 1);
        assert_eq!(
            registry.manifest().item_from_id(ComponentType::Layer, component.id()).unwrap().serial(),
            r.serial()
        );
        // nothing was renamed
        assert_eq!(registry.manifest_map().len(), 0);
    }

    #[test]
    fn test_duplicate_name_resolved_and_mapped() {
        let mut registry = Registry::new();
        registry.add(layer("Walls").with_id([1; 16]), false).unwrap();
        let err = registry.add(layer("Walls").with_id([2; 16]), false).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::IdentityConflict);

        let r = registry.add(layer("Walls").with_id([2; 16]), true).unwrap();
        assert_eq!(r.component().unwrap().name(), "Walls (1)");
        let item = registry.manifest_map().map_item_from_source_id(&[2; 16]).unwrap();
        assert!(item.name_changed());
        assert!(!item.id_changed());
    }

    #[test]
    fn test_add_strips_deleted_status() {
        let mut registry = Registry::new();
        let status = ComponentStatus::HIDDEN | ComponentStatus::DELETED;
        let r = registry.add(layer("A").with_id([1; 16]).with_status(status), false).unwrap();
        assert_eq!(r.component().unwrap().status(), ComponentStatus::HIDDEN);
        assert_eq!(
            registry.item(ComponentType::Layer, &[1; 16]).unwrap().status(),
            ComponentStatus::HIDDEN
        );
        assert_eq!(registry.count(ComponentType::Layer), 1);
    }

    #[test]
    fn test_remove_detaches_component() {
        let mut registry = Registry::new();
        let r = registry.add(layer("A").with_id([1; 16]), false).unwrap();
        let before = registry.content_version();
        let removed = registry.remove(ComponentType::Layer, &[1; 16]).unwrap();
        assert_eq!(removed, r);
        assert!(registry.content_version() > before);
        assert!(registry.component_from_id(ComponentType::Layer, &[1; 16]).is_none());
        assert_eq!(r.component().unwrap().name(), "A");
        assert!(registry.remove(ComponentType::Layer, &[1; 16]).is_err());

        let err = registry.remove(ComponentType::Layer, &default_layer_id()).unwrap_err();
        assert!(matches!(err, RegistryError::Manifest(ManifestError::SystemComponent { .. })));
    }

    #[test]
    fn test_delete_and_undelete_sync_component() {
        let mut registry = Registry::new();
        let a = registry.add(layer("A").with_id([1; 16]), false).unwrap();
        registry.delete(ComponentType::Layer, &[1; 16]).unwrap();
        assert!(a.component().unwrap().status().is_deleted());
        assert!(registry.component_from_name(ComponentType::Layer, &NIL_ID, "A").is_none());
        assert!(registry.component_from_id(ComponentType::Layer, &[1; 16]).is_some());

        registry.add(layer("A").with_id([2; 16]), false).unwrap();
        assert!(registry.undelete(ComponentType::Layer, &[1; 16], false).is_err());
        assert!(a.component().unwrap().status().is_deleted());

        registry.undelete(ComponentType::Layer, &[1; 16], true).unwrap();
        let component = a.component().unwrap();
        assert!(component.status().is_active());
        assert_eq!(component.name(), "A (1)");
    }

    #[test]
    fn test_rename_and_set_parent() {
        let mut registry = Registry::new();
        let parent = registry.add(layer("Parent").with_id([1; 16]), false).unwrap();
        let child = registry.add(layer("Child").with_id([2; 16]), false).unwrap();
        registry.add(layer("Child").with_id([3; 16]).with_parent([1; 16]), false).unwrap();

        registry.rename(ComponentType::Layer, &[1; 16], "Top", false).unwrap();
        assert_eq!(parent.component().unwrap().name(), "Top");

        registry.set_parent(ComponentType::Layer, &[2; 16], [1; 16], true).unwrap();
        let component = child.component().unwrap();
        assert_eq!(component.parent_id(), &[1; 16]);
        assert_eq!(component.name(), "Child (1)");
    }

    #[test]
    fn test_set_status_keeps_deleted_flag_out() {
        let mut registry = Registry::new();
        let r = registry.add(layer("A").with_id([1; 16]), false).unwrap();
        let version = r.component().unwrap().content_version();
        registry
            .set_status(ComponentType::Layer, &[1; 16], ComponentStatus::LOCKED | ComponentStatus::DELETED)
            .unwrap();
        let component = r.component().unwrap();
        assert_eq!(component.status(), ComponentStatus::LOCKED);
        assert!(component.content_version() > version);
    }

    #[test]
    fn test_modify_payload() {
        let mut registry = Registry::new();
        let r = registry
            .add(Component::new(Material::default()).with_name("Steel").with_id([1; 16]), false)
            .unwrap();
        registry
            .modify(&r, |payload| {
                if let ComponentPayload::Material(m) = payload {
                    m.shine = 0.5;
                }
            })
            .unwrap();
        match r.component().unwrap().payload() {
            ComponentPayload::Material(m) => assert_eq!(m.shine, 0.5),
            other => panic!("unexpected payload {other:?}"),
        }

        let err = registry.modify(&r, |payload| *payload = Group.into()).unwrap_err();
        assert!(matches!(err, RegistryError::PayloadTypeMismatch { .. }));

        let stranger = ComponentRef::new(Component::new(Material::default()).with_id([1; 16]));
        assert_eq!(registry.modify(&stranger, |_| {}), Err(RegistryError::ForeignReference));

        let system = registry.component_from_id(ComponentType::Layer, &default_layer_id()).unwrap();
        assert!(registry.modify(&system, |_| {}).is_err());
    }

    #[test]
    fn test_lookups_include_system_components() {
        let mut registry = Registry::new();
        let r = registry.add(layer("A").with_id([1; 16]), false).unwrap();
        let default = registry.component_from_id(ComponentType::Layer, &default_layer_id()).unwrap();
        assert_eq!(default.component().unwrap().index(), -1);
        assert_eq!(registry.component_from_index(ComponentType::Layer, -1), Some(default.clone()));
        assert_eq!(registry.component_from_index(ComponentType::Layer, 0), Some(r.clone()));
        assert_eq!(registry.component_from_index(ComponentType::Layer, UNSET_INDEX), None);
        assert_eq!(registry.component_from_serial(r.serial()), Some(r.clone()));
        assert_eq!(registry.component_from_serial(default.serial()), Some(default));
        assert_eq!(registry.component_from_name(ComponentType::Layer, &NIL_ID, "A"), Some(r));
    }

    #[test]
    fn test_first_next_prev() {
        let mut registry = Registry::new();
        let a = registry.add(layer("A").with_id([1; 16]), false).unwrap();
        let b = registry.add(layer("B").with_id([2; 16]), false).unwrap();
        assert_eq!(registry.first(ComponentType::Layer, ItemFilter::ACTIVE), Some(a.clone()));
        assert_eq!(registry.last(ComponentType::Layer, ItemFilter::ACTIVE), Some(b.clone()));
        assert_eq!(registry.next(&a, ItemFilter::ACTIVE), Some(b.clone()));
        assert_eq!(registry.prev(&b, ItemFilter::ACTIVE), Some(a.clone()));
        assert_eq!(registry.next(&b, ItemFilter::ACTIVE), None);
        assert_eq!(registry.components(ComponentType::Layer).count(), 2);
        assert_eq!(registry.iter(ComponentType::Layer, ItemFilter::ALL).count(), 3);
        assert_eq!(registry.components(ComponentType::Group).count(), 0);
    }

    #[test]
    fn test_effective_dimension_style_walks_parents() {
        let mut registry = Registry::new();
        let mut base = DimensionStyle::default();
        base.text_height = 5.0;
        base.arrow_size = 3.0;
        registry
            .add(Component::new(base).with_name("Base").with_id([1; 16]), false)
            .unwrap();

        let mut child = DimensionStyle::default();
        child.text_height = 2.0;
        child.overrides.insert(DimStyleField::TextHeight);
        registry
            .add(
                Component::new(child).with_name("Child").with_id([2; 16]).with_parent([1; 16]),
                false,
            )
            .unwrap();

        let effective = registry.effective_dimension_style(&[2; 16]).unwrap();
        assert_eq!(effective.text_height, 2.0);
        assert_eq!(effective.arrow_size, 3.0);
        assert!(registry.effective_dimension_style(&default_dimension_style_id()).is_some());
        assert!(registry.effective_dimension_style(&[9; 16]).is_none());
    }

    #[test]
    fn test_effective_dimension_style_survives_cycles() {
        let mut registry = Registry::new();
        registry
            .add(
                Component::new(DimensionStyle::default()).with_name("A").with_id([1; 16]).with_parent([2; 16]),
                false,
            )
            .unwrap();
        registry
            .add(
                Component::new(DimensionStyle::default()).with_name("B").with_id([2; 16]).with_parent([1; 16]),
                false,
            )
            .unwrap();
        assert!(registry.effective_dimension_style(&[1; 16]).is_some());
    }

    #[test]
    fn test_remap_references_nils_unknown_targets() {
        let mut registry = Registry::new();
        registry.add(layer("L").with_id([1; 16]), false).unwrap();
        let geometry = ModelGeometry {
            layer_id: [7; 16],
            ..ModelGeometry::default()
        };
        let r = registry.add(Component::new(geometry).with_id([2; 16]), false).unwrap();

        let mut map = ManifestMap::new();
        let source = ComponentIdentity::new(ComponentType::Layer, [7; 16], 0, NameHash::EMPTY);
        let destination = ComponentIdentity::new(ComponentType::Layer, [1; 16], 0, NameHash::EMPTY);
        map.add_pair(source, destination).unwrap();

        assert_eq!(registry.remap_references(&r, &map).unwrap(), 0);
        match r.component().unwrap().payload() {
            ComponentPayload::ModelGeometry(g) => assert_eq!(g.layer_id, [1; 16]),
            other => panic!("unexpected payload {other:?}"),
        }

        registry.remove(ComponentType::Layer, &[1; 16]).unwrap();
        assert_eq!(registry.remap_references(&r, &map).unwrap(), 1);
        match r.component().unwrap().payload() {
            ComponentPayload::ModelGeometry(g) => assert_eq!(g.layer_id, NIL_ID),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_document_tables_bump_content_version() {
        let mut registry = Registry::new();
        let before = registry.content_version();
        registry.user_strings_mut().set("k", "v");
        registry.settings_mut().absolute_tolerance = 0.01;
        registry.properties_mut().revision_count = 3;
        assert_eq!(registry.content_version(), before + 3);
        assert_eq!(registry.user_strings().get("k"), Some("v"));
    }
}
