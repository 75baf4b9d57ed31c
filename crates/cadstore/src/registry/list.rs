//! Per-type component list: a slot arena threaded as a doubly linked list.
//!
//! Components are appended at the tail, so link order, insertion order
//! and serial order coincide. `by_serial` answers "first component after
//! serial s" even when s itself has been removed, which is what
//! iterators fall back on after the list changed under them.

use std::collections::BTreeMap;
use std::ops::Bound;

use rustc_hash::FxHashMap;

use crate::model::Id;
use crate::registry::reference::ComponentRef;

#[derive(Debug)]
struct Slot {
    component: ComponentRef,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Default)]
pub(crate) struct ComponentList {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    by_serial: BTreeMap<u64, usize>,
    by_id: FxHashMap<Id, usize>,
}

impl ComponentList {
    pub fn len(&self) -> usize {
        self.by_serial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_serial.is_empty()
    }

    fn slot(&self, pos: usize) -> Option<&Slot> {
        self.slots.get(pos)?.as_ref()
    }

    fn slot_mut(&mut self, pos: usize) -> Option<&mut Slot> {
        self.slots.get_mut(pos)?.as_mut()
    }

    /// Appends `component`, filed under `id`.
    pub fn push_back(&mut self, id: Id, component: ComponentRef) {
        let serial = component.serial();
        let slot = Slot {
            component,
            prev: self.tail,
            next: None,
        };
        let pos = match self.free.pop() {
            Some(pos) => {
                self.slots[pos] = Some(slot);
                pos
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        match self.tail.and_then(|t| self.slot_mut(t)) {
            Some(tail) => tail.next = Some(pos),
            None => self.head = Some(pos),
        }
        self.tail = Some(pos);
        self.by_serial.insert(serial, pos);
        self.by_id.insert(id, pos);
    }

    /// Unlinks the component filed under `id` and returns it.
    pub fn remove(&mut self, id: &Id) -> Option<ComponentRef> {
        let pos = self.by_id.remove(id)?;
        let slot = self.slots.get_mut(pos)?.take()?;
        match slot.prev.and_then(|p| self.slot_mut(p)) {
            Some(prev) => prev.next = slot.next,
            None => self.head = slot.next,
        }
        match slot.next.and_then(|n| self.slot_mut(n)) {
            Some(next) => next.prev = slot.prev,
            None => self.tail = slot.prev,
        }
        self.by_serial.remove(&slot.component.serial());
        self.free.push(pos);
        Some(slot.component)
    }

    pub fn get(&self, id: &Id) -> Option<&ComponentRef> {
        let pos = *self.by_id.get(id)?;
        self.slot(pos).map(|slot| &slot.component)
    }

    pub fn get_by_serial(&self, serial: u64) -> Option<&ComponentRef> {
        let pos = *self.by_serial.get(&serial)?;
        self.slot(pos).map(|slot| &slot.component)
    }

    pub fn contains_serial(&self, serial: u64) -> bool {
        self.by_serial.contains_key(&serial)
    }

    pub fn first(&self) -> Option<&ComponentRef> {
        self.slot(self.head?).map(|slot| &slot.component)
    }

    pub fn last(&self) -> Option<&ComponentRef> {
        self.slot(self.tail?).map(|slot| &slot.component)
    }

    /// Successor by link.
    pub fn next_linked(&self, serial: u64) -> Option<&ComponentRef> {
        let pos = *self.by_serial.get(&serial)?;
        let next = self.slot(pos)?.next?;
        self.slot(next).map(|slot| &slot.component)
    }

    /// Predecessor by link.
    pub fn prev_linked(&self, serial: u64) -> Option<&ComponentRef> {
        let pos = *self.by_serial.get(&serial)?;
        let prev = self.slot(pos)?.prev?;
        self.slot(prev).map(|slot| &slot.component)
    }

    /// First component with a serial greater than `serial`.
    pub fn first_after(&self, serial: u64) -> Option<&ComponentRef> {
        self.by_serial
            .range((Bound::Excluded(serial), Bound::Unbounded))
            .next()
            .and_then(|(_, &pos)| self.slot(pos))
            .map(|slot| &slot.component)
    }

    /// Last component with a serial less than `serial`.
    pub fn last_before(&self, serial: u64) -> Option<&ComponentRef> {
        self.by_serial
            .range(..serial)
            .next_back()
            .and_then(|(_, &pos)| self.slot(pos))
            .map(|slot| &slot.component)
    }

    /// Components in list order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentRef> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let slot = self.slot(cursor?)?;
            cursor = slot.next;
            Some(&slot.component)
        })
    }
}
