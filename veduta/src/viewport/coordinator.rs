//! The viewport coordinator.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::cancel::Cancelable;
use crate::task_queue::TaskQueue;
use crate::viewport::{
    TransitionCompletion, ViewportOptions, ViewportState, ViewportStatus,
    ViewportStatusChangeReason, ViewportStatusObserver, ViewportTransition,
};

struct Inner {
    status: ViewportStatus,
    default_transition: Rc<dyn ViewportTransition>,
    observers: Vec<Rc<dyn ViewportStatusObserver>>,
    /// Stops the current state or cancels the current transition.
    current_cancelable: Option<Cancelable>,
}

/// Owns the viewport status and serializes every change to it.
///
/// All entry points must be called on the engine thread. Status change
/// notifications are deferred to the task queue so that observers see
/// changes in the order they happened even when one of them re-enters the
/// coordinator from its own callback.
///
/// The completion handed to [`transition`](Viewport::transition) reports
/// whether the transition ran to completion (`true`) or was interrupted
/// (`false`). When the interruption came from another `transition` or
/// [`idle`](Viewport::idle) call, those calls determine the next status;
/// when the transition failed on its own the status becomes idle.
pub struct Viewport {
    queue: Rc<dyn TaskQueue>,
    options: Cell<ViewportOptions>,
    inner: RefCell<Inner>,
    weak_self: RefCell<Weak<Viewport>>,
}

impl Viewport {
    /// Creates an idle viewport. A default transition is required at all
    /// times.
    pub fn new(
        default_transition: Rc<dyn ViewportTransition>,
        queue: Rc<dyn TaskQueue>,
        options: ViewportOptions,
    ) -> Rc<Self> {
        let viewport = Rc::new(Self {
            queue,
            options: Cell::new(options),
            inner: RefCell::new(Inner {
                status: ViewportStatus::Idle,
                default_transition,
                observers: Vec::new(),
                current_cancelable: None,
            }),
            weak_self: RefCell::new(Weak::new()),
        });
        *viewport.weak_self.borrow_mut() = Rc::downgrade(&viewport);
        viewport
    }

    /// The current status.
    pub fn status(&self) -> ViewportStatus {
        self.inner.borrow().status.clone()
    }

    /// The current options.
    pub fn options(&self) -> ViewportOptions {
        self.options.get()
    }

    /// Replaces the options.
    pub fn set_options(&self, options: ViewportOptions) {
        self.options.set(options);
    }

    /// The transition used when [`transition`](Viewport::transition) is
    /// called without one.
    pub fn default_transition(&self) -> Rc<dyn ViewportTransition> {
        self.inner.borrow().default_transition.clone()
    }

    /// Replaces the default transition.
    pub fn set_default_transition(&self, transition: Rc<dyn ViewportTransition>) {
        self.inner.borrow_mut().default_transition = transition;
    }

    /// Registers a status observer. Registering the same observer twice has
    /// no effect.
    pub fn add_status_observer(&self, observer: Rc<dyn ViewportStatusObserver>) {
        let mut inner = self.inner.borrow_mut();
        if inner
            .observers
            .iter()
            .all(|existing| !Rc::ptr_eq(existing, &observer))
        {
            inner.observers.push(observer);
        }
    }

    /// Removes a status observer.
    pub fn remove_status_observer(&self, observer: &Rc<dyn ViewportStatusObserver>) {
        self.inner
            .borrow_mut()
            .observers
            .retain(|existing| !Rc::ptr_eq(existing, observer));
    }

    /// Stops the current state or transition and goes idle.
    ///
    /// An in-flight transition's completion is invoked with `false`.
    pub fn idle(&self) {
        self.set_idle(true, ViewportStatusChangeReason::IdleRequested);
    }

    /// Reports a user interaction with the map. Goes idle when
    /// [`ViewportOptions::transitions_to_idle_upon_user_interaction`] is
    /// set.
    pub fn handle_user_interaction(&self) {
        if self.options.get().transitions_to_idle_upon_user_interaction {
            self.set_idle(true, ViewportStatusChangeReason::UserInteraction);
        }
    }

    /// Moves the viewport to `to_state` using `transition` (or the default
    /// one).
    ///
    /// Transitioning to the state that is already current invokes
    /// `completion` synchronously with `true` and changes nothing.
    /// Transitioning to the target of the in-flight transition invokes it
    /// synchronously with `false` and changes nothing. In every other case
    /// the current state or transition is stopped first: a superseded
    /// transition's completion fires with `false` and its cancelable is
    /// canceled exactly once.
    pub fn transition(
        &self,
        to_state: Rc<dyn ViewportState>,
        transition: Option<Rc<dyn ViewportTransition>>,
        completion: Option<TransitionCompletion>,
    ) {
        let early_exit = {
            let inner = self.inner.borrow();
            match &inner.status {
                ViewportStatus::State(state) if Rc::ptr_eq(state, &to_state) => Some(true),
                ViewportStatus::Transition {
                    to_state: current_target,
                    ..
                } if Rc::ptr_eq(current_target, &to_state) => Some(false),
                _ => None,
            }
        };
        if let Some(finished) = early_exit {
            if let Some(completion) = completion {
                completion(finished);
            }
            return;
        }

        // Cancel any previous state or transition.
        let previous = self.inner.borrow_mut().current_cancelable.take();
        if let Some(previous) = previous {
            previous.cancel();
        }

        let transition =
            transition.unwrap_or_else(|| self.inner.borrow().default_transition.clone());

        let transition_canceled = Rc::new(Cell::new(false));
        let completion_invoked = Rc::new(Cell::new(false));
        let completion = Rc::new(RefCell::new(completion));

        let run_completion: TransitionCompletion = {
            let weak = self.weak_self.borrow().clone();
            let transition_canceled = transition_canceled.clone();
            let completion_invoked = completion_invoked.clone();
            let completion = completion.clone();
            let to_state = to_state.clone();
            Box::new(move |success: bool| {
                completion_invoked.set(true);

                // Transitions are allowed to invoke their completion when
                // the cancelable they returned is canceled. If we initiated
                // the cancellation, cleanup happens in the cancel block;
                // skip the rest.
                if transition_canceled.get() {
                    return;
                }

                if let Some(viewport) = weak.upgrade() {
                    if success {
                        // Transfer camera updating responsibility to the
                        // target state.
                        to_state.start_updating_camera();

                        let state_to_stop = to_state.clone();
                        let mut inner = viewport.inner.borrow_mut();
                        inner.current_cancelable =
                            Some(Cancelable::new(move || state_to_stop.stop_updating_camera()));

                        // Set the status before invoking the completion
                        // since it could trigger further status mutation
                        // which must win over this one.
                        let from = std::mem::replace(
                            &mut inner.status,
                            ViewportStatus::State(to_state.clone()),
                        );
                        let to = inner.status.clone();
                        drop(inner);
                        viewport.notify(from, to, ViewportStatusChangeReason::TransitionSucceeded);
                    } else {
                        // The transition failed on its own (e.g. its
                        // animations were canceled externally).
                        viewport.set_idle(false, ViewportStatusChangeReason::TransitionFailed);
                    }
                }

                if let Some(completion) = completion.borrow_mut().take() {
                    completion(success);
                }
            })
        };

        let transition_cancelable = transition.run(to_state.clone(), run_completion);

        // The transition may have completed synchronously, in which case the
        // completion above already installed the state cancelable; storing
        // the transition cancelable now would clobber it.
        if !completion_invoked.get() {
            let cancel = {
                let completion = completion.clone();
                Cancelable::new(move || {
                    // We canceled the transition; the flag makes its
                    // completion a no-op if canceling invokes it.
                    transition_canceled.set(true);
                    transition_cancelable.cancel();
                    if let Some(completion) = completion.borrow_mut().take() {
                        completion(false);
                    }
                })
            };

            let mut inner = self.inner.borrow_mut();
            inner.current_cancelable = Some(cancel);
            let from = std::mem::replace(
                &mut inner.status,
                ViewportStatus::Transition {
                    transition,
                    to_state,
                },
            );
            let to = inner.status.clone();
            drop(inner);
            self.notify(from, to, ViewportStatusChangeReason::TransitionStarted);
        }
    }

    fn set_idle(&self, invoking_cancelable: bool, reason: ViewportStatusChangeReason) {
        if invoking_cancelable {
            let previous = self.inner.borrow_mut().current_cancelable.take();
            if let Some(previous) = previous {
                previous.cancel();
            }
        }
        let mut inner = self.inner.borrow_mut();
        // Canceling above may have re-entered and installed a new
        // cancelable; going idle overrides it.
        inner.current_cancelable = None;
        let from = std::mem::replace(&mut inner.status, ViewportStatus::Idle);
        let to = inner.status.clone();
        drop(inner);
        self.notify(from, to, reason);
    }

    fn notify(
        &self,
        from: ViewportStatus,
        to: ViewportStatus,
        reason: ViewportStatusChangeReason,
    ) {
        if from == to {
            return;
        }
        let weak = self.weak_self.borrow().clone();
        self.queue.defer(Box::new(move || {
            let Some(viewport) = weak.upgrade() else {
                return;
            };
            let observers = viewport.inner.borrow().observers.clone();
            for observer in observers {
                observer.viewport_status_did_change(&from, &to, reason);
            }
        }));
    }
}

impl Drop for Viewport {
    fn drop(&mut self) {
        if let Some(cancelable) = self.inner.borrow_mut().current_cancelable.take() {
            cancelable.cancel();
        }
    }
}
