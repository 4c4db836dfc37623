//! Drives camera animators and pairs begin/end signals to the camera
//! surface.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::camera::{AnimatorStatus, CameraAnimator, CameraSurface};
use crate::cancel::Cancelable;

/// Owns the set of camera animators and advances the running ones once per
/// frame.
///
/// The runner keeps weak references to every animator it has seen and strong
/// references only to the running ones, so an animator stays alive exactly
/// while it is animating. Each animator's transitions into and out of the
/// running set are translated into exactly-paired
/// [`begin_animation`](CameraSurface::begin_animation)/
/// [`end_animation`](CameraSurface::end_animation) calls: a second `Started`
/// from an already-running animator does not signal again, and pausing or
/// stopping an animator that was counted signals the end exactly once.
pub struct CameraAnimatorsRunner {
    camera: Rc<dyn CameraSurface>,
    inner: RefCell<Inner>,
    weak_self: RefCell<Weak<CameraAnimatorsRunner>>,
}

struct Inner {
    enabled: bool,
    all: Vec<Weak<dyn CameraAnimator>>,
    running: Vec<Rc<dyn CameraAnimator>>,
    subscriptions: Vec<Cancelable>,
}

impl CameraAnimatorsRunner {
    /// Creates an enabled runner.
    pub fn new(camera: Rc<dyn CameraSurface>) -> Rc<Self> {
        let runner = Rc::new(Self {
            camera,
            inner: RefCell::new(Inner {
                enabled: true,
                all: Vec::new(),
                running: Vec::new(),
                subscriptions: Vec::new(),
            }),
            weak_self: RefCell::new(Weak::new()),
        });
        *runner.weak_self.borrow_mut() = Rc::downgrade(&runner);
        runner
    }

    /// Registers an animator with the runner.
    ///
    /// A disabled runner stops the animator immediately.
    pub fn add(&self, animator: Rc<dyn CameraAnimator>) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.all.retain(|entry| entry.strong_count() > 0);
            inner.all.push(Rc::downgrade(&animator));
        }

        let weak_runner = self.weak_self.borrow().clone();
        let weak_animator = Rc::downgrade(&animator);
        let subscription = animator.on_status_change(Box::new(move |status| {
            let (Some(runner), Some(animator)) = (weak_runner.upgrade(), weak_animator.upgrade())
            else {
                return;
            };
            match status {
                AnimatorStatus::Started => runner.animator_started(animator),
                AnimatorStatus::Paused | AnimatorStatus::Stopped { .. } => {
                    runner.animator_idled(&animator)
                }
            }
        }));
        self.inner.borrow_mut().subscriptions.push(subscription);

        let enabled = self.inner.borrow().enabled;
        if !enabled {
            animator.stop();
        }
    }

    /// Advances every running animator by one frame.
    pub fn update(&self) {
        let enabled = self.inner.borrow().enabled;
        if !enabled {
            self.cancel_animations();
            return;
        }
        let running = self.inner.borrow().running.clone();
        for animator in running {
            animator.update();
        }
    }

    /// Stops every animator the runner knows about.
    pub fn cancel_animations(&self) {
        let animators: Vec<Rc<dyn CameraAnimator>> = self
            .inner
            .borrow()
            .all
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for animator in animators {
            animator.stop();
        }
    }

    /// Enables or disables the runner. Disabling cancels all animations, and
    /// animations added while disabled are canceled on sight.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.borrow_mut().enabled = enabled;
        if !enabled {
            self.cancel_animations();
        }
    }

    /// Whether the runner advances animations.
    pub fn is_enabled(&self) -> bool {
        self.inner.borrow().enabled
    }

    /// Number of currently running animators.
    pub fn running_count(&self) -> usize {
        self.inner.borrow().running.len()
    }

    fn animator_started(&self, animator: Rc<dyn CameraAnimator>) {
        let mut inner = self.inner.borrow_mut();
        if inner
            .running
            .iter()
            .any(|running| Rc::ptr_eq(running, &animator))
        {
            return;
        }
        inner.running.push(animator);
        drop(inner);
        self.camera.begin_animation();
    }

    fn animator_idled(&self, animator: &Rc<dyn CameraAnimator>) {
        let mut inner = self.inner.borrow_mut();
        let previous_len = inner.running.len();
        inner
            .running
            .retain(|running| !Rc::ptr_eq(running, animator));
        let removed = inner.running.len() != previous_len;
        drop(inner);
        if removed {
            self.camera.end_animation();
        }
    }
}
