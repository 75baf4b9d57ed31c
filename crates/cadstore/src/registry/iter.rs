//! Iteration that survives mutation of the registry.
//!
//! An iterator keeps only a weak handle to the current component and the
//! content version it last saw. While the version is unchanged it follows
//! list links; once the registry has changed it re-seeks by serial
//! number, so removing the current component (or any other) does not
//! derail it.

use crate::manifest::ItemFilter;
use crate::model::ComponentType;
use crate::registry::Registry;
use crate::registry::reference::{ComponentRef, WeakComponentRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Before the first component.
    Start,
    /// On the system component at this position.
    System(usize),
    /// On the user component with this serial (which may since be gone).
    User(u64),
    /// Past the last component.
    End,
}

/// Bidirectional cursor over the components of one type.
///
/// System components come first (when the filter includes them), then
/// user components in insertion order.
#[derive(Debug, Clone)]
pub struct ComponentIterator {
    component_type: ComponentType,
    filter: ItemFilter,
    cursor: Cursor,
    current: WeakComponentRef,
    content_version: u64,
}

impl ComponentIterator {
    /// Creates an iterator positioned before the first component.
    pub fn new(registry: &Registry, component_type: ComponentType, filter: ItemFilter) -> Self {
        Self {
            component_type,
            filter,
            cursor: Cursor::Start,
            current: WeakComponentRef::default(),
            content_version: registry.content_version(),
        }
    }

    /// Creates an iterator positioned on `current`.
    ///
    /// `None` if `current` is empty or not a component of `registry`.
    pub fn at(registry: &Registry, current: &ComponentRef, filter: ItemFilter) -> Option<Self> {
        let component_type = current.component_type()?;
        let system = registry.system_refs(component_type);
        let cursor = match system.iter().position(|r| r.ptr_eq(current)) {
            Some(pos) => Cursor::System(pos),
            None => {
                let list = registry.list(component_type);
                let found = list.get_by_serial(current.serial())?;
                if !found.ptr_eq(current) {
                    return None;
                }
                Cursor::User(current.serial())
            }
        };
        Some(Self {
            component_type,
            filter,
            cursor,
            current: current.downgrade(),
            content_version: registry.content_version(),
        })
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// The component last returned, if it is still alive.
    pub fn current(&self) -> Option<ComponentRef> {
        self.current.upgrade()
    }

    pub fn first(&mut self, registry: &Registry) -> Option<ComponentRef> {
        self.cursor = Cursor::Start;
        self.next(registry)
    }

    pub fn last(&mut self, registry: &Registry) -> Option<ComponentRef> {
        self.cursor = Cursor::End;
        self.prev(registry)
    }

    pub fn next(&mut self, registry: &Registry) -> Option<ComponentRef> {
        loop {
            let step = self.step_forward(registry);
            self.content_version = registry.content_version();
            match step {
                Some((cursor, component)) => {
                    self.cursor = cursor;
                    if self.accepts(&component) {
                        self.current = component.downgrade();
                        return Some(component);
                    }
                }
                None => {
                    self.cursor = Cursor::End;
                    self.current = WeakComponentRef::default();
                    return None;
                }
            }
        }
    }

    pub fn prev(&mut self, registry: &Registry) -> Option<ComponentRef> {
        loop {
            let step = self.step_back(registry);
            self.content_version = registry.content_version();
            match step {
                Some((cursor, component)) => {
                    self.cursor = cursor;
                    if self.accepts(&component) {
                        self.current = component.downgrade();
                        return Some(component);
                    }
                }
                None => {
                    self.cursor = Cursor::Start;
                    self.current = WeakComponentRef::default();
                    return None;
                }
            }
        }
    }

    fn accepts(&self, component: &ComponentRef) -> bool {
        component
            .component()
            .is_some_and(|c| self.filter.include_deleted || c.status().is_active())
    }

    fn unchanged(&self, registry: &Registry) -> bool {
        self.content_version == registry.content_version()
    }

    fn step_forward(&self, registry: &Registry) -> Option<(Cursor, ComponentRef)> {
        let ty = self.component_type;
        let system = registry.system_refs(ty);
        let list = registry.list(ty);
        let first_user = || list.first().map(|r| (Cursor::User(r.serial()), r.clone()));
        let system_at = |pos: usize| {
            if !self.filter.include_system {
                return None;
            }
            system.get(pos).map(|r| (Cursor::System(pos), r.clone()))
        };

        match self.cursor {
            Cursor::Start => system_at(0).or_else(first_user),
            Cursor::System(pos) => system_at(pos + 1).or_else(first_user),
            Cursor::User(serial) => {
                let next = if self.unchanged(registry) && list.contains_serial(serial) {
                    list.next_linked(serial)
                } else {
                    list.first_after(serial)
                };
                next.map(|r| (Cursor::User(r.serial()), r.clone()))
            }
            Cursor::End => None,
        }
    }

    fn step_back(&self, registry: &Registry) -> Option<(Cursor, ComponentRef)> {
        let ty = self.component_type;
        let system = registry.system_refs(ty);
        let list = registry.list(ty);
        let system_at = |pos: Option<usize>| {
            if !self.filter.include_system {
                return None;
            }
            let pos = pos?;
            system.get(pos).map(|r| (Cursor::System(pos), r.clone()))
        };
        let last_system = || system_at(system.len().checked_sub(1));

        match self.cursor {
            Cursor::End => list
                .last()
                .map(|r| (Cursor::User(r.serial()), r.clone()))
                .or_else(last_system),
            Cursor::User(serial) => {
                let prev = if self.unchanged(registry) && list.contains_serial(serial) {
                    list.prev_linked(serial)
                } else {
                    list.last_before(serial)
                };
                prev.map(|r| (Cursor::User(r.serial()), r.clone()))
                    .or_else(last_system)
            }
            Cursor::System(pos) => system_at(pos.checked_sub(1)),
            Cursor::Start => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, Layer};

    fn registry_with_layers(names: &[&str]) -> (Registry, Vec<ComponentRef>) {
        let mut registry = Registry::new();
        let refs = names
            .iter()
            .map(|name| {
                registry
                    .add(Component::new(Layer::default()).with_name(*name), false)
                    .unwrap()
            })
            .collect();
        (registry, refs)
    }

    fn names(refs: &[ComponentRef]) -> Vec<String> {
        refs.iter()
            .map(|r| r.component().unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_forward_and_backward() {
        let (registry, _) = registry_with_layers(&["A", "B", "C"]);
        let mut it = ComponentIterator::new(&registry, ComponentType::Layer, ItemFilter::ACTIVE);
        let mut forward = Vec::new();
        while let Some(r) = it.next(&registry) {
            forward.push(r);
        }
        assert_eq!(names(&forward), vec!["A", "B", "C"]);
        assert!(it.current().is_none());

        let mut backward = Vec::new();
        while let Some(r) = it.prev(&registry) {
            backward.push(r);
        }
        assert_eq!(names(&backward), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_system_components_come_first() {
        let (registry, _) = registry_with_layers(&["A"]);
        let mut it = ComponentIterator::new(&registry, ComponentType::Layer, ItemFilter::ALL);
        let first = it.first(&registry).unwrap();
        assert_eq!(first.component().unwrap().name(), "Default");
        let second = it.next(&registry).unwrap();
        assert_eq!(second.component().unwrap().name(), "A");
        assert_eq!(it.prev(&registry).unwrap(), first);
        assert!(it.prev(&registry).is_none());
    }

    #[test]
    fn test_removing_current_does_not_derail() {
        let (mut registry, refs) = registry_with_layers(&["A", "B", "C", "D"]);
        let mut it = ComponentIterator::new(&registry, ComponentType::Layer, ItemFilter::ACTIVE);
        assert_eq!(it.next(&registry).unwrap(), refs[0]);
        let b = it.next(&registry).unwrap();

        let id = b.id().unwrap();
        registry.remove(ComponentType::Layer, &id).unwrap();
        drop(b);
        assert_eq!(it.current().unwrap(), refs[1]);

        assert_eq!(it.next(&registry).unwrap(), refs[2]);
        assert_eq!(it.next(&registry).unwrap(), refs[3]);
        assert!(it.next(&registry).is_none());
    }

    #[test]
    fn test_deleted_components_are_filtered() {
        let (mut registry, refs) = registry_with_layers(&["A", "B", "C"]);
        let id = refs[1].id().unwrap();
        registry.delete(ComponentType::Layer, &id).unwrap();

        let mut it = ComponentIterator::new(&registry, ComponentType::Layer, ItemFilter::ACTIVE);
        let visited: Vec<_> = std::iter::from_fn(|| it.next(&registry)).collect();
        assert_eq!(names(&visited), vec!["A", "C"]);

        let filter = ItemFilter {
            include_system: false,
            include_deleted: true,
        };
        let mut it = ComponentIterator::new(&registry, ComponentType::Layer, filter);
        let visited: Vec<_> = std::iter::from_fn(|| it.next(&registry)).collect();
        assert_eq!(visited.len(), 3);
    }

    #[test]
    fn test_at_positions_on_component() {
        let (registry, refs) = registry_with_layers(&["A", "B"]);
        let mut it = ComponentIterator::at(&registry, &refs[0], ItemFilter::ACTIVE).unwrap();
        assert_eq!(it.current().unwrap(), refs[0]);
        assert_eq!(it.next(&registry).unwrap(), refs[1]);
        assert!(ComponentIterator::at(&registry, &ComponentRef::empty(), ItemFilter::ACTIVE).is_none());
    }
}
