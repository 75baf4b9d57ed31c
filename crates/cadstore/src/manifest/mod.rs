//! Identity catalog of a model.
//!
//! The manifest owns the identity of every component: id, index, name
//! (as a [`NameHash`] within its scope), parent, status and runtime
//! serial number. It enforces the uniqueness rules of each type and,
//! when asked to, resolves collisions by assigning fresh identities and
//! recording the change in a [`ManifestMap`].
//!
//! Per type:
//! - ids of live components are unique,
//! - names of active components of unique-name types are unique in
//!   their scope (the whole type, or the parent layer for layers),
//! - indices are assigned once and never reused after removal.
//!
//! System components (see [`system`]) are visible through every lookup
//! but are not stored in the per-type tables.

pub mod map;
pub mod system;

pub use map::{ComponentIdentity, ManifestMap, ManifestMapItem};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{ConflictKind, ManifestError};
use crate::limits::{MAX_NAME_SUFFIX_ATTEMPTS, MIN_COMPACTED_ITEMS};
use crate::model::{
    Component, ComponentStatus, ComponentType, Id, NIL_ID, NameHash, UNSET_INDEX, is_nil, new_id,
};
use system::system_items_of;

// =============================================================================
// ITEMS AND REQUESTS
// =============================================================================

/// Catalog entry for one component.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestItem {
    component_type: ComponentType,
    id: Id,
    index: i32,
    name: String,
    parent_id: Id,
    name_hash: NameHash,
    status: ComponentStatus,
    serial: u64,
    original: Option<ComponentIdentity>,
    system: bool,
}

impl ManifestItem {
    pub(crate) fn from_system_component(component: &Component) -> Self {
        let ty = component.component_type();
        Self {
            component_type: ty,
            id: *component.id(),
            index: component.index(),
            name: component.name().to_string(),
            parent_id: NIL_ID,
            name_hash: NameHash::new(&NIL_ID, component.name()),
            status: ComponentStatus::empty(),
            serial: 0,
            original: None,
            system: true,
        }
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Model index; [`UNSET_INDEX`] for unindexed types.
    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> &Id {
        &self.parent_id
    }

    pub fn name_hash(&self) -> &NameHash {
        &self.name_hash
    }

    pub fn status(&self) -> ComponentStatus {
        self.status
    }

    /// Runtime serial number of the registry reference; 0 if none.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Requested identity, when admission changed any part of it.
    pub fn original(&self) -> Option<&ComponentIdentity> {
        self.original.as_ref()
    }

    pub fn is_system(&self) -> bool {
        self.system
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn identity(&self) -> ComponentIdentity {
        ComponentIdentity::new(self.component_type, self.id, self.index, self.name_hash)
    }
}

/// Identity a caller asks the manifest to admit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentityRequest<'a> {
    pub component_type: ComponentType,
    pub id: Id,
    pub parent_id: Id,
    pub name: &'a str,
    /// Preferred index; [`UNSET_INDEX`] for none.
    pub index: i32,
}

impl<'a> IdentityRequest<'a> {
    pub fn new(component_type: ComponentType, id: Id, name: &'a str) -> Self {
        Self {
            component_type,
            id,
            parent_id: NIL_ID,
            name,
            index: UNSET_INDEX,
        }
    }

    pub fn with_parent(mut self, parent_id: Id) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn with_index(mut self, index: i32) -> Self {
        self.index = index;
        self
    }

    /// Requests the identity a component currently carries.
    pub fn from_component(component: &'a Component) -> Self {
        Self {
            component_type: component.component_type(),
            id: *component.id(),
            parent_id: *component.parent_id(),
            name: component.name(),
            index: component.index(),
        }
    }
}

/// Which items iteration visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemFilter {
    pub include_system: bool,
    pub include_deleted: bool,
}

impl ItemFilter {
    /// Active, non-system items.
    pub const ACTIVE: ItemFilter = ItemFilter {
        include_system: false,
        include_deleted: false,
    };

    pub const ALL: ItemFilter = ItemFilter {
        include_system: true,
        include_deleted: true,
    };

    pub fn accepts(&self, item: &ManifestItem) -> bool {
        (self.include_system || !item.is_system()) && (self.include_deleted || item.is_active())
    }
}

impl Default for ItemFilter {
    fn default() -> Self {
        ItemFilter::ACTIVE
    }
}

// =============================================================================
// PER-TYPE TABLE
// =============================================================================

/// Items of one type in insertion order.
///
/// Hard-removed items stay in `items` but drop out of `by_id`; an item is
/// live iff `by_id` maps its id back to its own position. Removed items
/// are compacted away once they outnumber the live ones. Indices of
/// removed items move to `retired` so they are never handed out again.
#[derive(Debug, Clone, Default)]
struct TypeTable {
    items: Vec<ManifestItem>,
    by_id: FxHashMap<Id, usize>,
    by_name: FxHashMap<NameHash, usize>,
    by_index: FxHashMap<i32, usize>,
    retired: FxHashSet<i32>,
    next_index: i32,
    active: usize,
}

impl TypeTable {
    fn live(&self, pos: usize) -> Option<&ManifestItem> {
        let item = self.items.get(pos)?;
        (self.by_id.get(&item.id) == Some(&pos)).then_some(item)
    }

    fn position(&self, id: &Id) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    fn index_taken(&self, index: i32) -> bool {
        self.by_index.contains_key(&index) || self.retired.contains(&index)
    }

    /// Honors a free non-negative hint, else takes the next counter value.
    /// `None` once every non-negative index is taken.
    fn assign_index(&mut self, hint: i32) -> Option<i32> {
        if hint >= 0 && !self.index_taken(hint) {
            if hint >= self.next_index {
                self.next_index = hint.saturating_add(1);
            }
            return Some(hint);
        }
        let mut index = self.next_index;
        while self.index_taken(index) {
            match index.checked_add(1) {
                Some(next) => index = next,
                // counter exhausted by a large hint
                None => return (0..=i32::MAX).find(|&i| !self.index_taken(i)),
            }
        }
        self.next_index = index.saturating_add(1);
        Some(index)
    }

    fn insert(&mut self, item: ManifestItem) -> usize {
        let pos = self.items.len();
        self.by_id.insert(item.id, pos);
        if registers_name(&item) {
            self.by_name.insert(item.name_hash, pos);
        }
        if item.index != UNSET_INDEX {
            self.by_index.insert(item.index, pos);
        }
        if item.is_active() {
            self.active += 1;
        }
        self.items.push(item);
        pos
    }

    fn remove(&mut self, pos: usize) {
        self.unregister_name(pos);
        let item = &self.items[pos];
        let (id, index, active) = (item.id, item.index, item.is_active());
        self.by_id.remove(&id);
        if index != UNSET_INDEX && self.by_index.get(&index) == Some(&pos) {
            self.by_index.remove(&index);
            self.retired.insert(index);
        }
        if active {
            self.active -= 1;
        }
        self.compact();
    }

    /// Drops removed items once they outnumber the live ones.
    fn compact(&mut self) {
        let removed = self.items.len() - self.by_id.len();
        if removed < MIN_COMPACTED_ITEMS || removed <= self.by_id.len() {
            return;
        }
        let items = std::mem::take(&mut self.items);
        let live: Vec<ManifestItem> = items
            .into_iter()
            .enumerate()
            .filter(|(pos, item)| self.by_id.get(&item.id) == Some(pos))
            .map(|(_, item)| item)
            .collect();
        self.by_id.clear();
        self.by_name.clear();
        self.by_index.clear();
        self.active = 0;
        for item in live {
            self.insert(item);
        }
    }

    fn unregister_name(&mut self, pos: usize) {
        let hash = self.items[pos].name_hash;
        if self.by_name.get(&hash) == Some(&pos) {
            self.by_name.remove(&hash);
        }
    }
}

fn registers_name(item: &ManifestItem) -> bool {
    item.component_type.requires_unique_name() && !item.name.is_empty() && item.is_active()
}

// =============================================================================
// MANIFEST
// =============================================================================

/// Identity catalog for every component type.
#[derive(Debug, Clone)]
pub struct Manifest {
    tables: Vec<TypeTable>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            tables: (0..ComponentType::COUNT).map(|_| TypeTable::default()).collect(),
        }
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, ty: ComponentType) -> &TypeTable {
        &self.tables[ty as usize]
    }

    fn table_mut(&mut self, ty: ComponentType) -> &mut TypeTable {
        &mut self.tables[ty as usize]
    }

    // --- admission ----------------------------------------------------------

    /// Admits a component identity.
    ///
    /// With `resolve_conflicts` off, a nil or duplicate id, a duplicate
    /// name, or a missing required name is an
    /// [`ManifestError::IdentityConflict`]. With it on, the manifest picks
    /// a fresh id and an unused name instead, and records the change in
    /// `map` when one is given. An index hint is honored when it is free.
    pub fn add(
        &mut self,
        request: &IdentityRequest<'_>,
        resolve_conflicts: bool,
        map: Option<&mut ManifestMap>,
    ) -> Result<&ManifestItem, ManifestError> {
        let ty = request.component_type;
        if ty == ComponentType::Unset {
            return Err(ManifestError::InvalidType { component_type: ty });
        }
        let conflict = |kind| ManifestError::IdentityConflict {
            component_type: ty,
            kind,
        };

        let id = if is_nil(&request.id) {
            if !resolve_conflicts {
                return Err(conflict(ConflictKind::NilId));
            }
            self.unused_id(ty)
        } else if self.id_in_use(ty, &request.id) {
            if !resolve_conflicts {
                return Err(conflict(ConflictKind::DuplicateId));
            }
            self.unused_id(ty)
        } else {
            request.id
        };

        let name = if !ty.requires_unique_name() {
            request.name.to_string()
        } else if request.name.is_empty() {
            if !resolve_conflicts {
                return Err(conflict(ConflictKind::EmptyName));
            }
            self.unused_name(ty, &request.parent_id, ty.name())
        } else if self.name_in_use(ty, &request.parent_id, request.name) {
            if !resolve_conflicts {
                return Err(conflict(ConflictKind::DuplicateName));
            }
            self.unused_name(ty, &request.parent_id, request.name)
        } else {
            request.name.to_string()
        };

        let index = if ty.is_indexed() {
            self.table_mut(ty)
                .assign_index(request.index)
                .ok_or_else(|| conflict(ConflictKind::IndexExhausted))?
        } else {
            UNSET_INDEX
        };

        let scope = ty.name_scope(&request.parent_id);
        // A nil-id request is known by the id it was given.
        let source_id = if is_nil(&request.id) { id } else { request.id };
        let source = ComponentIdentity::new(
            ty,
            source_id,
            request.index,
            NameHash::new(&scope, request.name),
        );
        let destination = ComponentIdentity::new(ty, id, index, NameHash::new(&scope, &name));
        let remapped = (!is_nil(&request.id) && id != request.id)
            || (!request.name.is_empty() && name != request.name)
            || (ty.is_indexed() && request.index != UNSET_INDEX && index != request.index);

        if remapped {
            tracing::debug!(
                component_type = %ty,
                requested = %request.name,
                assigned = %name,
                "identity remapped on admission"
            );
            if let Some(map) = map {
                if let Err(e) = map.add_pair(source, destination) {
                    tracing::debug!(error = %e, "manifest map pair not recorded");
                }
            }
        }

        let item = ManifestItem {
            component_type: ty,
            id,
            index,
            name,
            parent_id: request.parent_id,
            name_hash: destination.name_hash,
            status: ComponentStatus::empty(),
            serial: 0,
            original: remapped.then_some(source),
            system: false,
        };
        let table = self.table_mut(ty);
        let pos = table.insert(item);
        Ok(&table.items[pos])
    }

    /// Returns an id not used by any component of `ty`.
    pub fn unused_id(&self, ty: ComponentType) -> Id {
        loop {
            let id = new_id();
            if !self.id_in_use(ty, &id) {
                return id;
            }
        }
    }

    /// Returns `base` if it is free in the scope of `parent_id`, else the
    /// first free `"base (k)"` for k in `1..=100`, else `base` with a
    /// random hexadecimal suffix.
    pub fn unused_name(&self, ty: ComponentType, parent_id: &Id, base: &str) -> String {
        if !base.is_empty() && !self.name_in_use(ty, parent_id, base) {
            return base.to_string();
        }
        for k in 1..=MAX_NAME_SUFFIX_ATTEMPTS {
            let candidate = format!("{base} ({k})");
            if !self.name_in_use(ty, parent_id, &candidate) {
                return candidate;
            }
        }
        loop {
            let r = new_id();
            let candidate = format!("{base} ({:02x}{:02x}{:02x}{:02x})", r[0], r[1], r[2], r[3]);
            if !self.name_in_use(ty, parent_id, &candidate) {
                return candidate;
            }
        }
    }

    /// True if a live or system component of `ty` has `id`.
    pub fn id_in_use(&self, ty: ComponentType, id: &Id) -> bool {
        self.is_system(ty, id) || self.table(ty).by_id.contains_key(id)
    }

    /// True if an active or system component of `ty` holds `name` in the
    /// scope of `parent_id`.
    pub fn name_in_use(&self, ty: ComponentType, parent_id: &Id, name: &str) -> bool {
        let hash = NameHash::new(&ty.name_scope(parent_id), name);
        self.item_from_name_hash(ty, &hash).is_some()
    }

    // --- mutation -----------------------------------------------------------

    fn user_position(&self, ty: ComponentType, id: &Id) -> Result<usize, ManifestError> {
        if self.is_system(ty, id) {
            return Err(ManifestError::SystemComponent {
                component_type: ty,
                id: *id,
            });
        }
        self.table(ty).position(id).ok_or(ManifestError::NotFound {
            component_type: ty,
            id: *id,
        })
    }

    /// Removes an item. Its id becomes free; its index stays retired.
    pub fn remove(&mut self, ty: ComponentType, id: &Id) -> Result<ManifestItem, ManifestError> {
        let pos = self.user_position(ty, id)?;
        let table = self.table_mut(ty);
        let removed = table.items[pos].clone();
        table.remove(pos);
        Ok(removed)
    }

    /// Sets or clears the deleted flag.
    ///
    /// Deleting releases the name. Undeleting reclaims it; if another
    /// active component took it meanwhile, the item is renamed when
    /// `resolve_conflicts` is set and the call fails otherwise.
    pub fn set_deleted(
        &mut self,
        ty: ComponentType,
        id: &Id,
        deleted: bool,
        resolve_conflicts: bool,
    ) -> Result<&ManifestItem, ManifestError> {
        let pos = self.user_position(ty, id)?;
        let item = &self.table(ty).items[pos];

        if deleted && item.is_active() {
            let table = self.table_mut(ty);
            table.unregister_name(pos);
            table.items[pos].status.insert(ComponentStatus::DELETED);
            table.active -= 1;
        } else if !deleted && !item.is_active() {
            let parent_id = item.parent_id;
            let name = item.name.clone();
            let renamed = if ty.requires_unique_name()
                && !name.is_empty()
                && self.name_in_use(ty, &parent_id, &name)
            {
                if !resolve_conflicts {
                    return Err(ManifestError::IdentityConflict {
                        component_type: ty,
                        kind: ConflictKind::DuplicateName,
                    });
                }
                Some(self.unused_name(ty, &parent_id, &name))
            } else {
                None
            };

            let table = self.table_mut(ty);
            let item = &mut table.items[pos];
            if let Some(name) = renamed {
                item.name_hash = NameHash::new(&ty.name_scope(&parent_id), &name);
                item.name = name;
            }
            item.status.remove(ComponentStatus::DELETED);
            if registers_name(item) {
                let hash = item.name_hash;
                table.by_name.insert(hash, pos);
            }
            table.active += 1;
        }
        Ok(&self.table(ty).items[pos])
    }

    /// Renames an item within its current scope.
    pub fn rename(
        &mut self,
        ty: ComponentType,
        id: &Id,
        name: &str,
        resolve_conflicts: bool,
    ) -> Result<&ManifestItem, ManifestError> {
        let pos = self.user_position(ty, id)?;
        let parent_id = self.table(ty).items[pos].parent_id;
        self.reidentify(ty, pos, parent_id, name, resolve_conflicts)
    }

    /// Moves an item under a new parent, keeping its name if it is free
    /// in the new scope.
    pub fn set_parent(
        &mut self,
        ty: ComponentType,
        id: &Id,
        parent_id: Id,
        resolve_conflicts: bool,
    ) -> Result<&ManifestItem, ManifestError> {
        let pos = self.user_position(ty, id)?;
        let name = self.table(ty).items[pos].name.clone();
        self.reidentify(ty, pos, parent_id, &name, resolve_conflicts)
    }

    fn reidentify(
        &mut self,
        ty: ComponentType,
        pos: usize,
        parent_id: Id,
        name: &str,
        resolve_conflicts: bool,
    ) -> Result<&ManifestItem, ManifestError> {
        let conflict = |kind| ManifestError::IdentityConflict {
            component_type: ty,
            kind,
        };
        let current = &self.table(ty).items[pos];
        let new_hash = NameHash::new(&ty.name_scope(&parent_id), name);
        let unchanged = new_hash == current.name_hash;
        let active = current.is_active();

        let name = if !ty.requires_unique_name() {
            name.to_string()
        } else if name.is_empty() {
            if !resolve_conflicts {
                return Err(conflict(ConflictKind::EmptyName));
            }
            self.unused_name(ty, &parent_id, ty.name())
        } else if active && !unchanged && self.name_in_use(ty, &parent_id, name) {
            if !resolve_conflicts {
                return Err(conflict(ConflictKind::DuplicateName));
            }
            self.unused_name(ty, &parent_id, name)
        } else {
            name.to_string()
        };

        let table = self.table_mut(ty);
        table.unregister_name(pos);
        let item = &mut table.items[pos];
        item.name_hash = NameHash::new(&ty.name_scope(&parent_id), &name);
        item.name = name;
        item.parent_id = parent_id;
        if registers_name(item) {
            let hash = item.name_hash;
            table.by_name.insert(hash, pos);
        }
        Ok(&table.items[pos])
    }

    /// Replaces the hidden and locked flags; the deleted flag is left as is.
    pub fn set_status(
        &mut self,
        ty: ComponentType,
        id: &Id,
        status: ComponentStatus,
    ) -> Result<&ManifestItem, ManifestError> {
        let pos = self.user_position(ty, id)?;
        let item = &mut self.table_mut(ty).items[pos];
        let deleted = item.status & ComponentStatus::DELETED;
        item.status = (status - ComponentStatus::DELETED) | deleted;
        Ok(&*item)
    }

    pub(crate) fn set_serial(
        &mut self,
        ty: ComponentType,
        id: &Id,
        serial: u64,
    ) -> Result<(), ManifestError> {
        let pos = self.user_position(ty, id)?;
        self.table_mut(ty).items[pos].serial = serial;
        Ok(())
    }

    // --- lookup -------------------------------------------------------------

    pub fn item_from_id(&self, ty: ComponentType, id: &Id) -> Option<&ManifestItem> {
        if let Some(item) = system_items_of(ty).find(|item| item.id == *id) {
            return Some(item);
        }
        let table = self.table(ty);
        table.position(id).map(|pos| &table.items[pos])
    }

    /// Looks up an active item by name within the scope of `parent_id`.
    pub fn item_from_name(&self, ty: ComponentType, parent_id: &Id, name: &str) -> Option<&ManifestItem> {
        self.item_from_name_hash(ty, &NameHash::new(&ty.name_scope(parent_id), name))
    }

    pub fn item_from_name_hash(&self, ty: ComponentType, hash: &NameHash) -> Option<&ManifestItem> {
        if hash.is_empty() {
            return None;
        }
        if let Some(item) = system_items_of(ty).find(|item| item.name_hash == *hash) {
            return Some(item);
        }
        let table = self.table(ty);
        table.by_name.get(hash).and_then(|&pos| table.live(pos))
    }

    pub fn item_from_index(&self, ty: ComponentType, index: i32) -> Option<&ManifestItem> {
        if index == UNSET_INDEX {
            return None;
        }
        if index < 0 {
            return system_items_of(ty).find(|item| item.index == index);
        }
        let table = self.table(ty);
        table.by_index.get(&index).and_then(|&pos| table.live(pos))
    }

    /// Index of the component with `id`, or [`UNSET_INDEX`].
    pub fn index_of(&self, ty: ComponentType, id: &Id) -> i32 {
        self.item_from_id(ty, id)
            .map_or(UNSET_INDEX, |item| item.index)
    }

    pub fn is_system(&self, ty: ComponentType, id: &Id) -> bool {
        system_items_of(ty).any(|item| item.id == *id)
    }

    pub fn is_system_index(&self, ty: ComponentType, index: i32) -> bool {
        index < 0 && system_items_of(ty).any(|item| item.index == index)
    }

    /// Number of live (not hard-removed) non-system items.
    pub fn item_count(&self, ty: ComponentType) -> usize {
        self.table(ty).by_id.len()
    }

    /// Number of active non-system items.
    pub fn active_count(&self, ty: ComponentType) -> usize {
        self.table(ty).active
    }

    // --- iteration ----------------------------------------------------------
    //
    // Ordinals cover system items first, then the table in insertion order.

    fn ordinal_count(&self, ty: ComponentType) -> usize {
        system_items_of(ty).count() + self.table(ty).items.len()
    }

    fn item_at(&self, ty: ComponentType, ordinal: usize) -> Option<&ManifestItem> {
        let system = system_items_of(ty).count();
        if ordinal < system {
            return system_items_of(ty).nth(ordinal);
        }
        self.table(ty).live(ordinal - system)
    }

    fn ordinal_of(&self, ty: ComponentType, id: &Id) -> Option<usize> {
        if let Some(ordinal) = system_items_of(ty).position(|item| item.id == *id) {
            return Some(ordinal);
        }
        let system = system_items_of(ty).count();
        self.table(ty).position(id).map(|pos| system + pos)
    }

    pub fn first(&self, ty: ComponentType, filter: ItemFilter) -> Option<&ManifestItem> {
        self.iter(ty, filter).next()
    }

    pub fn last(&self, ty: ComponentType, filter: ItemFilter) -> Option<&ManifestItem> {
        (0..self.ordinal_count(ty))
            .rev()
            .filter_map(|o| self.item_at(ty, o))
            .find(|item| filter.accepts(item))
    }

    /// Item after `id` in iteration order. `None` if `id` is unknown.
    pub fn next(&self, ty: ComponentType, id: &Id, filter: ItemFilter) -> Option<&ManifestItem> {
        let start = self.ordinal_of(ty, id)? + 1;
        (start..self.ordinal_count(ty))
            .filter_map(|o| self.item_at(ty, o))
            .find(|item| filter.accepts(item))
    }

    /// Item before `id` in iteration order. `None` if `id` is unknown.
    pub fn prev(&self, ty: ComponentType, id: &Id, filter: ItemFilter) -> Option<&ManifestItem> {
        let end = self.ordinal_of(ty, id)?;
        (0..end)
            .rev()
            .filter_map(|o| self.item_at(ty, o))
            .find(|item| filter.accepts(item))
    }

    pub fn iter(&self, ty: ComponentType, filter: ItemFilter) -> impl Iterator<Item = &ManifestItem> + '_ {
        (0..self.ordinal_count(ty))
            .filter_map(move |o| self.item_at(ty, o))
            .filter(move |item| filter.accepts(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::system::default_layer_id;

    const LAYER: ComponentType = ComponentType::Layer;

    fn request(id: u8, name: &str) -> IdentityRequest<'_> {
        IdentityRequest::new(LAYER, [id; 16], name)
    }

    #[test]
    fn test_conflicts_without_resolution() {
        let mut m = Manifest::new();
        m.add(&request(1, "A"), false, None).unwrap();

        let kind = |r: Result<&ManifestItem, ManifestError>| match r {
            Err(ManifestError::IdentityConflict { kind, .. }) => kind,
            other => panic!("expected conflict, got {other:?}"),
        };
        assert_eq!(kind(m.add(&request(1, "B"), false, None)), ConflictKind::DuplicateId);
        assert_eq!(kind(m.add(&request(2, "A"), false, None)), ConflictKind::DuplicateName);
        assert_eq!(kind(m.add(&request(0, "C"), false, None)), ConflictKind::NilId);
        assert_eq!(kind(m.add(&request(3, ""), false, None)), ConflictKind::EmptyName);
        assert_eq!(m.item_count(LAYER), 1);
    }

    #[test]
    fn test_resolution_assigns_fresh_identity_and_records_map() {
        let mut m = Manifest::new();
        let mut map = ManifestMap::new();
        m.add(&request(1, "A"), true, Some(&mut map)).unwrap();
        assert!(map.is_empty());

        let item = m.add(&request(1, "A"), true, Some(&mut map)).unwrap();
        assert_ne!(item.id(), &[1u8; 16]);
        assert_eq!(item.name(), "A (1)");
        assert!(item.original().is_some());
        let new_id = *item.id();

        assert_eq!(map.len(), 1);
        assert_eq!(map.map_item_from_destination_id(&new_id).unwrap().source().id, [1u8; 16]);

        let third = m.add(&request(9, "A"), true, None).unwrap();
        assert_eq!(third.name(), "A (2)");
        assert_eq!(third.id(), &[9u8; 16]);
    }

    #[test]
    fn test_empty_name_is_generated_from_type() {
        let mut m = Manifest::new();
        let a = m.add(&request(1, ""), true, None).unwrap().name().to_string();
        let b = m.add(&request(2, ""), true, None).unwrap().name().to_string();
        assert_eq!(a, "Layer");
        assert_eq!(b, "Layer (1)");
    }

    #[test]
    fn test_unnamed_types_accept_empty_and_duplicate_names() {
        let mut m = Manifest::new();
        let geo = ComponentType::ModelGeometry;
        m.add(&IdentityRequest::new(geo, [1u8; 16], ""), false, None).unwrap();
        m.add(&IdentityRequest::new(geo, [2u8; 16], ""), false, None).unwrap();
        let item = m.add(&IdentityRequest::new(geo, [3u8; 16], "x"), false, None).unwrap();
        assert_eq!(item.index(), UNSET_INDEX);
        m.add(&IdentityRequest::new(geo, [4u8; 16], "x"), false, None).unwrap();
        assert_eq!(m.item_count(geo), 4);
    }

    #[test]
    fn test_system_names_and_ids_are_reserved() {
        let mut m = Manifest::new();
        assert!(m.add(&request(1, "Default"), false, None).is_err());
        let item = m.add(&request(1, "Default"), true, None).unwrap();
        assert_eq!(item.name(), "Default (1)");

        let req = IdentityRequest::new(LAYER, default_layer_id(), "Other");
        assert!(m.add(&req, false, None).is_err());

        assert!(matches!(
            m.remove(LAYER, &default_layer_id()),
            Err(ManifestError::SystemComponent { .. })
        ));
        assert_eq!(m.item_from_index(LAYER, -1).unwrap().id(), &default_layer_id());
    }

    #[test]
    fn test_index_hints_and_retirement() {
        let mut m = Manifest::new();
        let a = m.add(&request(1, "A").with_index(5), true, None).unwrap().index();
        let b = m.add(&request(2, "B"), true, None).unwrap().index();
        let c = m.add(&request(3, "C").with_index(5), true, None).unwrap().index();
        let d = m.add(&request(4, "D").with_index(2), true, None).unwrap().index();
        assert_eq!((a, b, c, d), (5, 6, 7, 2));

        m.remove(LAYER, &[2u8; 16]).unwrap();
        assert!(m.item_from_index(LAYER, 6).is_none());
        let e = m.add(&request(5, "E").with_index(6), true, None).unwrap().index();
        assert_ne!(e, 6);
    }

    #[test]
    fn test_index_counter_exhausted_by_largest_hint() {
        let mut m = Manifest::new();
        let a = m.add(&request(1, "A").with_index(i32::MAX), true, None).unwrap().index();
        assert_eq!(a, i32::MAX);

        let b = m.add(&request(2, "B"), true, None).unwrap().index();
        let c = m.add(&request(3, "C"), true, None).unwrap().index();
        assert_eq!((b, c), (0, 1));
        assert_eq!(m.item_from_index(LAYER, 0).unwrap().id(), &[2u8; 16]);

        // retired indices are skipped by the fallback too
        m.remove(LAYER, &[2u8; 16]).unwrap();
        let d = m.add(&request(4, "D"), true, None).unwrap().index();
        assert_eq!(d, 2);
    }

    #[test]
    fn test_removed_items_are_compacted() {
        let mut m = Manifest::new();
        let keep = [0xFFu8; 16];
        m.add(&request(0xFF, "Keep"), false, None).unwrap();
        let kept_index = m.index_of(LAYER, &keep);

        for round in 0..4u8 {
            for i in 1..=100u8 {
                let name = format!("R{round} {i}");
                m.add(&request(i, &name), false, None).unwrap();
                m.remove(LAYER, &[i; 16]).unwrap();
            }
        }
        assert!(m.table(LAYER).items.len() <= 2 * MIN_COMPACTED_ITEMS);
        assert_eq!(m.item_count(LAYER), 1);
        assert_eq!(m.active_count(LAYER), 1);

        let item = m.item_from_name(LAYER, &NIL_ID, "Keep").unwrap();
        assert_eq!(item.id(), &keep);
        assert_eq!(m.item_from_index(LAYER, kept_index).unwrap().id(), &keep);
        assert_eq!(m.iter(LAYER, ItemFilter::ACTIVE).count(), 1);

        // indices of compacted items stay retired
        let fresh = m.add(&request(1, "Fresh").with_index(1), true, None).unwrap().index();
        assert!(fresh > 400);
    }

    #[test]
    fn test_remove_frees_id_and_name() {
        let mut m = Manifest::new();
        m.add(&request(1, "A"), false, None).unwrap();
        let removed = m.remove(LAYER, &[1u8; 16]).unwrap();
        assert_eq!(removed.name(), "A");
        assert!(m.item_from_id(LAYER, &[1u8; 16]).is_none());
        assert!(m.remove(LAYER, &[1u8; 16]).is_err());
        m.add(&request(1, "A"), false, None).unwrap();
        assert_eq!(m.item_count(LAYER), 1);
    }

    #[test]
    fn test_soft_delete_releases_name() {
        let mut m = Manifest::new();
        m.add(&request(1, "A"), false, None).unwrap();
        m.set_deleted(LAYER, &[1u8; 16], true, false).unwrap();
        assert!(m.item_from_name(LAYER, &NIL_ID, "A").is_none());
        assert!(m.item_from_id(LAYER, &[1u8; 16]).is_some());
        assert_eq!(m.active_count(LAYER), 0);

        m.add(&request(2, "A"), false, None).unwrap();
        assert!(m.set_deleted(LAYER, &[1u8; 16], false, false).is_err());
        let item = m.set_deleted(LAYER, &[1u8; 16], false, true).unwrap();
        assert_eq!(item.name(), "A (1)");
        assert!(item.is_active());
        assert_eq!(m.active_count(LAYER), 2);
    }

    #[test]
    fn test_rename_and_reparent() {
        let mut m = Manifest::new();
        let parent = [7u8; 16];
        m.add(&request(1, "A"), false, None).unwrap();
        m.add(&request(2, "B").with_parent(parent), false, None).unwrap();
        // Same name under a different parent is a different scope.
        m.add(&request(3, "A").with_parent(parent), false, None).unwrap();

        assert!(m.rename(LAYER, &[1u8; 16], "A", false).is_ok());
        assert!(m.rename(LAYER, &[2u8; 16], "A", false).is_err());
        let moved = m.set_parent(LAYER, &[3u8; 16], NIL_ID, true).unwrap();
        assert_eq!(moved.name(), "A (1)");
        assert_eq!(m.item_from_name(LAYER, &NIL_ID, "A (1)").unwrap().id(), &[3u8; 16]);
        assert!(m.item_from_name(LAYER, &parent, "A").is_none());
    }

    #[test]
    fn test_set_status_keeps_deleted_flag() {
        let mut m = Manifest::new();
        m.add(&request(1, "A"), false, None).unwrap();
        m.set_deleted(LAYER, &[1u8; 16], true, false).unwrap();
        let item = m.set_status(LAYER, &[1u8; 16], ComponentStatus::LOCKED).unwrap();
        assert!(item.status().is_deleted());
        assert!(item.status().contains(ComponentStatus::LOCKED));
    }

    #[test]
    fn test_iteration_order_and_filters() {
        let mut m = Manifest::new();
        for i in 1..=3u8 {
            m.add(&request(i, &format!("L{i}")), false, None).unwrap();
        }
        m.set_deleted(LAYER, &[2u8; 16], true, false).unwrap();

        let active: Vec<&str> = m.iter(LAYER, ItemFilter::ACTIVE).map(|i| i.name()).collect();
        assert_eq!(active, vec!["L1", "L3"]);
        let all: Vec<&str> = m.iter(LAYER, ItemFilter::ALL).map(|i| i.name()).collect();
        assert_eq!(all, vec!["Default", "L1", "L2", "L3"]);

        let first = m.first(LAYER, ItemFilter::ACTIVE).unwrap();
        assert_eq!(first.name(), "L1");
        let next = m.next(LAYER, first.id(), ItemFilter::ACTIVE).unwrap();
        assert_eq!(next.name(), "L3");
        assert!(m.next(LAYER, next.id(), ItemFilter::ACTIVE).is_none());
        let prev = m.prev(LAYER, next.id(), ItemFilter::ALL).unwrap();
        assert_eq!(prev.name(), "L2");
        assert_eq!(m.last(LAYER, ItemFilter::ACTIVE).unwrap().name(), "L3");
    }

    #[test]
    fn test_unset_type_is_rejected() {
        let mut m = Manifest::new();
        let req = IdentityRequest::new(ComponentType::Unset, [1u8; 16], "x");
        assert!(matches!(m.add(&req, true, None), Err(ManifestError::InvalidType { .. })));
    }
}
