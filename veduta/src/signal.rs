//! Single-threaded observer registries used to wire components together.
//!
//! Delegate-style single-slot callbacks do not compose when several parts of
//! the engine want to watch the same stream, so producers expose [`Signal`]s
//! (plain broadcast) or [`StateSignal`]s (broadcast with a retained current
//! value and repeat suppression) instead. Subscribing returns a
//! [`Cancelable`] that removes the observer.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::cancel::Cancelable;

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Entries<T> {
    next_id: u64,
    items: Vec<(u64, Callback<T>)>,
}

impl<T> Entries<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            items: Vec::new(),
        }
    }

    fn add(&mut self, callback: Callback<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push((id, callback));
        id
    }

    fn remove(&mut self, id: u64) {
        self.items.retain(|(entry_id, _)| *entry_id != id);
    }

    fn callbacks(&self) -> Vec<Callback<T>> {
        self.items.iter().map(|(_, callback)| callback.clone()).collect()
    }
}

/// A broadcast channel for values of type `T`.
///
/// Observers added or removed while a notification is being delivered do not
/// affect that delivery; they take effect from the next one.
pub struct Signal<T> {
    entries: Rc<RefCell<Entries<T>>>,
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Signal<T> {
    /// Creates a signal with no observers.
    pub fn new() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Entries::new())),
        }
    }

    /// Adds an observer. Cancel the returned handle to remove it.
    pub fn observe(&self, callback: impl FnMut(&T) + 'static) -> Cancelable {
        let callback: Callback<T> = Rc::new(RefCell::new(callback));
        let id = self.entries.borrow_mut().add(callback);
        let entries = Rc::downgrade(&self.entries);
        Cancelable::new(move || remove_entry(&entries, id))
    }

    /// Delivers `value` to every current observer.
    pub fn notify(&self, value: &T) {
        let callbacks = self.entries.borrow().callbacks();
        for callback in callbacks {
            (callback.borrow_mut())(value);
        }
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.entries.borrow().items.len()
    }
}

fn remove_entry<T>(entries: &Weak<RefCell<Entries<T>>>, id: u64) {
    if let Some(entries) = entries.upgrade() {
        entries.borrow_mut().remove(id);
    }
}

/// A [`Signal`] that retains its latest value and skips repeated emissions.
///
/// New observers immediately receive the current value, if one has been set.
/// Setting a value equal to the current one does not notify anybody.
/// Hooks can be attached to learn when the first observer arrives and the
/// last one leaves, which producers use to start and stop upstream work.
pub struct StateSignal<T> {
    entries: Rc<RefCell<Entries<T>>>,
    value: RefCell<Option<T>>,
    on_first_subscribe: RefCell<Option<Box<dyn Fn()>>>,
    on_last_unsubscribe: Rc<RefCell<Option<Box<dyn Fn()>>>>,
}

impl<T: 'static> Default for StateSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> StateSignal<T> {
    /// Creates a signal with no value and no observers.
    pub fn new() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Entries::new())),
            value: RefCell::new(None),
            on_first_subscribe: RefCell::new(None),
            on_last_unsubscribe: Rc::new(RefCell::new(None)),
        }
    }

    /// Sets the hook invoked when the observer count goes from zero to one.
    pub fn set_on_first_subscribe(&self, hook: impl Fn() + 'static) {
        *self.on_first_subscribe.borrow_mut() = Some(Box::new(hook));
    }

    /// Sets the hook invoked when the observer count drops back to zero.
    pub fn set_on_last_unsubscribe(&self, hook: impl Fn() + 'static) {
        *self.on_last_unsubscribe.borrow_mut() = Some(Box::new(hook));
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.entries.borrow().items.len()
    }
}

impl<T: Clone + PartialEq + 'static> StateSignal<T> {
    /// Adds an observer, delivering the current value to it right away.
    pub fn observe(&self, callback: impl FnMut(&T) + 'static) -> Cancelable {
        let was_empty = self.entries.borrow().items.is_empty();

        let callback: Callback<T> = Rc::new(RefCell::new(callback));
        let id = self.entries.borrow_mut().add(callback.clone());

        let current = self.value.borrow().clone();
        if let Some(current) = current {
            (callback.borrow_mut())(&current);
        }

        if was_empty {
            if let Some(hook) = &*self.on_first_subscribe.borrow() {
                hook();
            }
        }

        let entries = Rc::downgrade(&self.entries);
        let on_last_unsubscribe = self.on_last_unsubscribe.clone();
        Cancelable::new(move || {
            remove_entry(&entries, id);
            let is_empty = entries
                .upgrade()
                .map_or(true, |entries| entries.borrow().items.is_empty());
            if is_empty {
                if let Some(hook) = &*on_last_unsubscribe.borrow() {
                    hook();
                }
            }
        })
    }

    /// Stores `value` and notifies observers, unless it equals the current
    /// value.
    pub fn set(&self, value: T) {
        if self.value.borrow().as_ref() == Some(&value) {
            return;
        }
        *self.value.borrow_mut() = Some(value.clone());

        let callbacks = self.entries.borrow().callbacks();
        for callback in callbacks {
            (callback.borrow_mut())(&value);
        }
    }

    /// The latest value, if one has been set.
    pub fn value(&self) -> Option<T> {
        self.value.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn signal_notifies_all_observers() {
        let signal = Signal::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_a = log.clone();
        let _a = signal.observe(move |value: &i32| log_a.borrow_mut().push(("a", *value)));
        let log_b = log.clone();
        let _b = signal.observe(move |value: &i32| log_b.borrow_mut().push(("b", *value)));

        signal.notify(&7);
        assert_eq!(*log.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn canceled_observer_is_not_notified() {
        let signal = Signal::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_clone = log.clone();
        let token = signal.observe(move |value: &i32| log_clone.borrow_mut().push(*value));
        token.cancel();

        signal.notify(&1);
        assert!(log.borrow().is_empty());
        assert_eq!(signal.observer_count(), 0);
    }

    #[test]
    fn state_signal_skips_repeats() {
        let signal = StateSignal::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_clone = log.clone();
        let _token = signal.observe(move |value: &i32| log_clone.borrow_mut().push(*value));

        signal.set(1);
        signal.set(1);
        signal.set(2);

        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn state_signal_delivers_current_value_on_subscribe() {
        let signal = StateSignal::new();
        signal.set(42);

        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let _token = signal.observe(move |value: &i32| log_clone.borrow_mut().push(*value));

        assert_eq!(*log.borrow(), vec![42]);
    }

    #[test]
    fn subscription_hooks_fire_on_edges() {
        let signal: StateSignal<i32> = StateSignal::new();
        let first = Rc::new(RefCell::new(0));
        let last = Rc::new(RefCell::new(0));

        let first_clone = first.clone();
        signal.set_on_first_subscribe(move || *first_clone.borrow_mut() += 1);
        let last_clone = last.clone();
        signal.set_on_last_unsubscribe(move || *last_clone.borrow_mut() += 1);

        let a = signal.observe(|_| {});
        let b = signal.observe(|_| {});
        assert_eq!(*first.borrow(), 1);

        a.cancel();
        assert_eq!(*last.borrow(), 0);
        b.cancel();
        assert_eq!(*last.borrow(), 1);
    }
}
