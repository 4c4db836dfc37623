//! Cancellation handles for long-running operations.

use std::cell::RefCell;

/// A single-shot handle that stops the operation it was returned for.
///
/// Canceling more than once is a no-op. Dropping the handle without canceling
/// leaves the operation running; the owner of the handle decides when (and
/// whether) the operation ends.
pub struct Cancelable {
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Cancelable {
    /// Creates a handle that runs `action` when canceled.
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: RefCell::new(Some(Box::new(action))),
        }
    }

    /// Creates a handle that does nothing when canceled.
    pub fn empty() -> Self {
        Self {
            action: RefCell::new(None),
        }
    }

    /// Cancels the operation this handle was returned for.
    pub fn cancel(&self) {
        let action = self.action.borrow_mut().take();
        if let Some(action) = action {
            action();
        }
    }

    /// Returns `true` if this handle has already been canceled.
    pub fn is_canceled(&self) -> bool {
        self.action.borrow().is_none()
    }
}

impl std::fmt::Debug for Cancelable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancelable")
            .field("is_canceled", &self.is_canceled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn cancel_runs_action_once() {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        let cancelable = Cancelable::new(move || count_clone.set(count_clone.get() + 1));

        cancelable.cancel();
        cancelable.cancel();

        assert_eq!(count.get(), 1);
        assert!(cancelable.is_canceled());
    }

    #[test]
    fn drop_does_not_run_action() {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        drop(Cancelable::new(move || count_clone.set(count_clone.get() + 1)));

        assert_eq!(count.get(), 0);
    }
}
