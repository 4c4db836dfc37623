//! Weakly-held consumer registries.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A set of weakly-held consumers, swept for liveness on every access.
///
/// Consumers may be dropped without being removed, so "is anyone listening"
/// is always recomputed by filtering live entries rather than trusting a
/// cached count.
pub(crate) struct WeakRegistry<T: ?Sized> {
    entries: RefCell<Vec<Weak<T>>>,
}

impl<T: ?Sized> Default for WeakRegistry<T> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> WeakRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a consumer unless it is already registered.
    pub fn add(&self, item: &Rc<T>) {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|entry| entry.strong_count() > 0);
        let weak = Rc::downgrade(item);
        if !entries.iter().any(|entry| Weak::ptr_eq(entry, &weak)) {
            entries.push(weak);
        }
    }

    /// Removes a consumer.
    pub fn remove(&self, item: &Rc<T>) {
        let weak = Rc::downgrade(item);
        self.entries
            .borrow_mut()
            .retain(|entry| entry.strong_count() > 0 && !Weak::ptr_eq(entry, &weak));
    }

    /// Returns strong handles to the consumers that are still alive,
    /// dropping dead entries along the way.
    pub fn live(&self) -> Vec<Rc<T>> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|entry| entry.strong_count() > 0);
        entries.iter().filter_map(Weak::upgrade).collect()
    }

    /// Returns `true` if at least one registered consumer is still alive.
    pub fn has_live(&self) -> bool {
        !self.live().is_empty()
    }
}
