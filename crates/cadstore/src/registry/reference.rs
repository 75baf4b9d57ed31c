//! Shared and weak handles to live components.
//!
//! A [`ComponentRef`] shares ownership of one component between the
//! registry and any number of callers. Every component admitted to a
//! registry gets a runtime serial number from a process-wide counter;
//! serials are never reused and never written to archives.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RegistryError;
use crate::model::{Component, ComponentType, Id};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Returns the next runtime serial number. Zero is never returned.
pub(crate) fn next_serial() -> u64 {
    NEXT_SERIAL.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
pub(crate) struct ComponentCell {
    serial: u64,
    component: RefCell<Component>,
}

/// Strong handle to a component. The default value is the empty handle.
///
/// Two handles are equal iff they have the same serial number, that is,
/// they point at the same live object.
#[derive(Debug, Clone, Default)]
pub struct ComponentRef(Option<Rc<ComponentCell>>);

impl ComponentRef {
    pub(crate) fn new(component: Component) -> Self {
        Self(Some(Rc::new(ComponentCell {
            serial: next_serial(),
            component: RefCell::new(component),
        })))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Runtime serial number; 0 for the empty handle.
    pub fn serial(&self) -> u64 {
        self.0.as_ref().map_or(0, |cell| cell.serial)
    }

    /// Number of strong handles, the registry's own hold included.
    pub fn strong_count(&self) -> usize {
        self.0.as_ref().map_or(0, Rc::strong_count)
    }

    pub fn weak_count(&self) -> usize {
        self.0.as_ref().map_or(0, Rc::weak_count)
    }

    /// Borrows the component.
    ///
    /// `None` for the empty handle, or while the registry is mutating the
    /// component.
    pub fn component(&self) -> Option<Ref<'_, Component>> {
        self.0.as_ref()?.component.try_borrow().ok()
    }

    /// Snapshot of the component's id.
    pub fn id(&self) -> Option<Id> {
        self.component().map(|c| *c.id())
    }

    pub fn component_type(&self) -> Option<ComponentType> {
        self.component().map(|c| c.component_type())
    }

    /// Weak handle that observes the component without owning it.
    pub fn downgrade(&self) -> WeakComponentRef {
        match &self.0 {
            Some(cell) => WeakComponentRef {
                serial: cell.serial,
                cell: Rc::downgrade(cell),
            },
            None => WeakComponentRef::default(),
        }
    }

    pub(crate) fn borrow_mut(&self) -> Result<RefMut<'_, Component>, RegistryError> {
        let cell = self.0.as_ref().ok_or(RegistryError::ForeignReference)?;
        cell.component
            .try_borrow_mut()
            .map_err(|_| RegistryError::ComponentBusy { serial: cell.serial })
    }

    pub(crate) fn ptr_eq(&self, other: &ComponentRef) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &Self) -> bool {
        self.serial() == other.serial()
    }
}

impl Eq for ComponentRef {}

/// Weak handle to a component.
#[derive(Debug, Clone, Default)]
pub struct WeakComponentRef {
    serial: u64,
    cell: Weak<ComponentCell>,
}

impl WeakComponentRef {
    /// Serial number of the observed component; kept after it is gone.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Returns a strong handle while the component is alive.
    pub fn upgrade(&self) -> Option<ComponentRef> {
        self.cell.upgrade().map(|cell| ComponentRef(Some(cell)))
    }

    /// True once every strong handle has been dropped.
    pub fn is_gone(&self) -> bool {
        self.cell.strong_count() == 0
    }
}
