//! The camera animation state machine.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use web_time::SystemTime;

use crate::camera::{CameraSurface, CameraTransition};
use crate::cancel::Cancelable;
use crate::clock::Clock;
use crate::easing::{TimingCurve, UnitBezier};
use crate::signal::Signal;
use crate::task_queue::TaskQueue;

/// Position an animation settled at when it finished or was stopped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AnimatingPosition {
    /// The animation was stopped before it ever moved the camera.
    Start,
    /// The animation ran to its end.
    End,
    /// The animation was stopped partway through.
    Current,
}

/// Why a stopped animator stopped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The animation reached its end position.
    Finished,
    /// The animation was stopped or superseded before finishing.
    Cancelled,
}

/// Lifecycle notification sent by an animator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AnimatorStatus {
    /// The animator started or resumed running.
    Started,
    /// The animator was paused.
    Paused,
    /// The animator reached a final state.
    Stopped {
        /// Whether it finished or was interrupted.
        reason: StopReason,
    },
}

/// Callback invoked when an animation finishes or is stopped.
pub type AnimationCompletion = Box<dyn FnOnce(AnimatingPosition)>;

/// Common interface of camera animators as seen by the
/// [runner](crate::camera::CameraAnimatorsRunner).
pub trait CameraAnimator {
    /// Advances the animation by one frame.
    fn update(&self);
    /// Stops the animation, invoking pending completions.
    fn stop(&self);
    /// Returns `true` while the animation is running (not paused).
    fn is_running(&self) -> bool;
    /// Subscribes to lifecycle notifications.
    fn on_status_change(&self, callback: Box<dyn FnMut(&AnimatorStatus)>) -> Cancelable;
}

enum InternalState {
    Initial,
    Running {
        transition: CameraTransition,
        start: SystemTime,
        duration: Duration,
        from_fraction: f64,
    },
    Paused {
        transition: CameraTransition,
        fraction: f64,
    },
    Final(AnimatingPosition),
}

/// Animates the camera along a [`CameraTransition`] with a cubic bezier
/// timing curve.
///
/// The transition is built lazily from the current camera state the moment
/// the animator first starts (or is paused before starting), by handing a
/// fresh transition to the animation closure supplied at construction.
///
/// State machine: inactive (initial) -> active (running, with paused as an
/// active-only sub-state) -> inactive (final). Final animators cannot be
/// restarted. Every registered completion is invoked exactly once, in FIFO
/// order, whether the animation finishes naturally or is stopped.
pub struct BasicCameraAnimator {
    camera: Rc<dyn CameraSurface>,
    clock: Rc<dyn Clock>,
    queue: Rc<dyn TaskQueue>,
    curve: UnitBezier,
    duration: Duration,
    animation: Box<dyn Fn(&mut CameraTransition)>,
    state: RefCell<InternalState>,
    completions: RefCell<Vec<AnimationCompletion>>,
    status: Signal<AnimatorStatus>,
}

impl BasicCameraAnimator {
    /// Creates an animator that will run `animation` over `duration`.
    ///
    /// The `animation` closure receives the transition seeded with the
    /// camera state at start time and fills in the target values.
    pub fn new(
        duration: Duration,
        curve: TimingCurve,
        camera: Rc<dyn CameraSurface>,
        clock: Rc<dyn Clock>,
        queue: Rc<dyn TaskQueue>,
        animation: impl Fn(&mut CameraTransition) + 'static,
    ) -> Self {
        Self {
            camera,
            clock,
            queue,
            curve: UnitBezier::new(curve),
            duration,
            animation: Box::new(animation),
            state: RefCell::new(InternalState::Initial),
            completions: RefCell::new(Vec::new()),
            status: Signal::new(),
        }
    }

    /// Starts the animation.
    ///
    /// Calling this on an already-running animator does nothing; on a paused
    /// one it resumes over the remaining duration. Final animators cannot be
    /// restarted.
    pub fn start(&self) {
        self.start_after_delay(Duration::ZERO);
    }

    /// Starts the animation after waiting `delay`.
    ///
    /// The animator counts as running immediately, but does not touch the
    /// camera until the delay has elapsed.
    pub fn start_after_delay(&self, delay: Duration) {
        let now = self.clock.now();
        let previous = self.take_state();
        let (next, started) = match previous {
            InternalState::Initial => (
                InternalState::Running {
                    transition: self.make_transition(),
                    start: now + delay,
                    duration: self.duration,
                    from_fraction: 0.0,
                },
                true,
            ),
            InternalState::Paused {
                transition,
                fraction,
            } => (
                InternalState::Running {
                    transition,
                    start: now,
                    duration: self.duration.mul_f64((1.0 - fraction).max(0.0)),
                    from_fraction: fraction,
                },
                true,
            ),
            other => (other, false),
        };
        self.put_state(next);
        if started {
            self.status.notify(&AnimatorStatus::Started);
        }
    }

    /// Pauses a running animation, keeping its progress.
    pub fn pause(&self) {
        let now = self.clock.now();
        let previous = self.take_state();
        let (next, paused) = match previous {
            InternalState::Initial => (
                InternalState::Paused {
                    transition: self.make_transition(),
                    fraction: 0.0,
                },
                false,
            ),
            InternalState::Running {
                transition,
                start,
                duration,
                from_fraction,
            } => (
                InternalState::Paused {
                    transition,
                    fraction: raw_fraction(now, start, duration, from_fraction),
                },
                true,
            ),
            other => (other, false),
        };
        self.put_state(next);
        if paused {
            self.status.notify(&AnimatorStatus::Paused);
        }
    }

    /// Resumes a paused animation, scaling the remaining time by
    /// `duration_factor` (a factor of the original duration).
    pub fn continue_animation(&self, duration_factor: f64) {
        let now = self.clock.now();
        let previous = self.take_state();
        let (next, started) = match previous {
            InternalState::Paused {
                transition,
                fraction,
            } => (
                InternalState::Running {
                    transition,
                    start: now,
                    duration: self.duration.mul_f64(duration_factor.max(0.0)),
                    from_fraction: fraction,
                },
                true,
            ),
            other => {
                log::warn!("continue_animation called on an animator that is not paused");
                (other, false)
            }
        };
        self.put_state(next);
        if started {
            self.status.notify(&AnimatorStatus::Started);
        }
    }

    /// Registers a completion callback.
    ///
    /// If the animator has already reached a final state, the callback is
    /// scheduled on the task queue with the recorded final position.
    pub fn add_completion(&self, completion: AnimationCompletion) {
        let final_position = match &*self.state.borrow() {
            InternalState::Final(position) => Some(*position),
            _ => None,
        };
        match final_position {
            None => self.completions.borrow_mut().push(completion),
            Some(position) => self.queue.defer(Box::new(move || completion(position))),
        }
    }

    /// Returns `true` while the animation is running or paused.
    pub fn is_active(&self) -> bool {
        matches!(
            &*self.state.borrow(),
            InternalState::Running { .. } | InternalState::Paused { .. }
        )
    }

    fn make_transition(&self) -> CameraTransition {
        let mut transition =
            CameraTransition::new(self.camera.camera_state(), self.camera.anchor());
        (self.animation)(&mut transition);
        transition.optimize_paths();
        transition
    }

    fn take_state(&self) -> InternalState {
        std::mem::replace(&mut *self.state.borrow_mut(), InternalState::Initial)
    }

    fn put_state(&self, state: InternalState) {
        *self.state.borrow_mut() = state;
    }

    fn run_completions(&self, position: AnimatingPosition) {
        let completions = std::mem::take(&mut *self.completions.borrow_mut());
        for completion in completions {
            completion(position);
        }
    }
}

impl CameraAnimator for BasicCameraAnimator {
    fn update(&self) {
        let now = self.clock.now();
        let state = self.state.borrow();
        let InternalState::Running {
            transition,
            start,
            duration,
            from_fraction,
        } = &*state
        else {
            return;
        };
        // Not a single frame has been produced yet (delayed start).
        if now < *start {
            return;
        }

        let raw = raw_fraction(now, *start, *duration, *from_fraction);
        if raw >= 1.0 {
            let final_options = transition.to_camera_options();
            drop(state);
            self.camera.set_camera(&final_options);
            self.put_state(InternalState::Final(AnimatingPosition::End));
            self.status.notify(&AnimatorStatus::Stopped {
                reason: StopReason::Finished,
            });
            self.run_completions(AnimatingPosition::End);
        } else {
            let options = transition.camera_options(self.curve.solve(raw, 1e-6));
            drop(state);
            self.camera.set_camera(&options);
        }
    }

    fn stop(&self) {
        let now = self.clock.now();
        let previous = self.take_state();
        match previous {
            InternalState::Initial => {
                self.put_state(InternalState::Final(AnimatingPosition::Current));
                self.run_completions(AnimatingPosition::Current);
            }
            InternalState::Running { start, .. } => {
                let position = if now < start {
                    AnimatingPosition::Start
                } else {
                    AnimatingPosition::Current
                };
                self.put_state(InternalState::Final(position));
                self.status.notify(&AnimatorStatus::Stopped {
                    reason: StopReason::Cancelled,
                });
                self.run_completions(position);
            }
            InternalState::Paused { .. } => {
                self.put_state(InternalState::Final(AnimatingPosition::Current));
                self.status.notify(&AnimatorStatus::Stopped {
                    reason: StopReason::Cancelled,
                });
                self.run_completions(AnimatingPosition::Current);
            }
            final_state @ InternalState::Final(_) => {
                self.put_state(final_state);
            }
        }
    }

    fn is_running(&self) -> bool {
        matches!(&*self.state.borrow(), InternalState::Running { .. })
    }

    fn on_status_change(&self, mut callback: Box<dyn FnMut(&AnimatorStatus)>) -> Cancelable {
        self.status.observe(move |status| callback(status))
    }
}

fn raw_fraction(now: SystemTime, start: SystemTime, duration: Duration, from_fraction: f64) -> f64 {
    let elapsed = now.duration_since(start).unwrap_or_default();
    let linear = if duration.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
    };
    from_fraction + (1.0 - from_fraction) * linear
}
