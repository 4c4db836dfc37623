//! Deferred execution of tasks on the coordinator thread.
//!
//! Observer notifications must never fire synchronously from inside the call
//! that caused them, so that delivery order stays deterministic even when an
//! observer re-enters the coordinator from its own callback. Instead of
//! relying on a platform dispatch queue, deferral goes through an explicit
//! [`TaskQueue`] that the embedding application drains once per turn of its
//! event loop (typically right before rendering a frame).

use std::cell::RefCell;
use std::collections::VecDeque;

/// Destination for tasks that must run later, in submission order.
pub trait TaskQueue {
    /// Enqueues a task for deferred execution.
    fn defer(&self, task: Box<dyn FnOnce()>);
}

/// The default [`TaskQueue`] implementation: a FIFO drained by the embedder.
#[derive(Default)]
pub struct DeferredTaskQueue {
    pending: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl DeferredTaskQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every pending task in submission order.
    ///
    /// Tasks enqueued while draining are executed in the same pass, so by the
    /// time this returns the queue is empty.
    pub fn run_pending(&self) {
        loop {
            let task = self.pending.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Returns `true` if there is nothing to run.
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}

impl TaskQueue for DeferredTaskQueue {
    fn defer(&self, task: Box<dyn FnOnce()>) {
        self.pending.borrow_mut().push_back(task);
    }
}
