//! Bundled viewport transition strategies.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::camera::{
    AnimatingPosition, CameraAnimator, CameraAnimatorsRunner, CameraSurface, FlyToCameraAnimator,
    FlyToInterpolator,
};
use crate::cancel::Cancelable;
use crate::clock::Clock;
use crate::task_queue::TaskQueue;
use crate::viewport::{TransitionCompletion, ViewportState, ViewportTransition};

/// A transition that jumps to the target state's camera without animating.
///
/// The camera is set as soon as the target state produces one; when the
/// state already has a camera this happens synchronously from `run`.
pub struct ImmediateViewportTransition {
    camera: Rc<dyn CameraSurface>,
}

impl ImmediateViewportTransition {
    /// Creates an immediate transition.
    pub fn new(camera: Rc<dyn CameraSurface>) -> Rc<Self> {
        Rc::new(Self { camera })
    }
}

impl ViewportTransition for ImmediateViewportTransition {
    fn run(
        &self,
        to_state: Rc<dyn ViewportState>,
        completion: TransitionCompletion,
    ) -> Cancelable {
        let camera = self.camera.clone();
        let completion = Rc::new(RefCell::new(Some(completion)));

        let completion_clone = completion.clone();
        let token = to_state.observe_camera(Box::new(move |options| {
            camera.set_camera(options);
            if let Some(completion) = completion_clone.borrow_mut().take() {
                completion(true);
            }
            false
        }));

        Cancelable::new(move || {
            // Unsubscribing suppresses any later completion.
            completion.borrow_mut().take();
            token.cancel();
        })
    }
}

const DEFAULT_MAX_DURATION: Duration = Duration::from_millis(3500);

/// The default transition: flies the camera to the target state's camera.
///
/// The flight duration is the ideal duration of the flight path, capped at
/// a configurable maximum. The run completes with `true` only when the
/// flight reaches its end position.
pub struct DefaultViewportTransition {
    runner: Rc<CameraAnimatorsRunner>,
    camera: Rc<dyn CameraSurface>,
    clock: Rc<dyn Clock>,
    queue: Rc<dyn TaskQueue>,
    max_duration: Duration,
}

impl DefaultViewportTransition {
    /// Creates a transition with the default maximum duration.
    pub fn new(
        runner: Rc<CameraAnimatorsRunner>,
        camera: Rc<dyn CameraSurface>,
        clock: Rc<dyn Clock>,
        queue: Rc<dyn TaskQueue>,
    ) -> Rc<Self> {
        Self::with_max_duration(runner, camera, clock, queue, DEFAULT_MAX_DURATION)
    }

    /// Creates a transition whose flights never exceed `max_duration`.
    pub fn with_max_duration(
        runner: Rc<CameraAnimatorsRunner>,
        camera: Rc<dyn CameraSurface>,
        clock: Rc<dyn Clock>,
        queue: Rc<dyn TaskQueue>,
        max_duration: Duration,
    ) -> Rc<Self> {
        Rc::new(Self {
            runner,
            camera,
            clock,
            queue,
            max_duration,
        })
    }
}

impl ViewportTransition for DefaultViewportTransition {
    fn run(
        &self,
        to_state: Rc<dyn ViewportState>,
        completion: TransitionCompletion,
    ) -> Cancelable {
        let completion = Rc::new(RefCell::new(Some(completion)));
        let animator_slot: Rc<RefCell<Option<Rc<FlyToCameraAnimator>>>> =
            Rc::new(RefCell::new(None));

        let runner = self.runner.clone();
        let camera = self.camera.clone();
        let clock = self.clock.clone();
        let queue = self.queue.clone();
        let max_duration = self.max_duration;
        let completion_clone = completion.clone();
        let animator_slot_clone = animator_slot.clone();

        let camera_token = to_state.observe_camera(Box::new(move |target| {
            let interpolator = FlyToInterpolator::new(
                &camera.camera_state(),
                target,
                &camera.camera_bounds(),
                camera.size(),
            );
            let duration = interpolator.duration(None).min(max_duration);

            let animator = Rc::new(FlyToCameraAnimator::new(
                *target,
                Some(duration),
                camera.clone(),
                clock.clone(),
                queue.clone(),
            ));
            let completion = completion_clone.clone();
            animator.add_completion(Box::new(move |position| {
                if let Some(completion) = completion.borrow_mut().take() {
                    completion(position == AnimatingPosition::End);
                }
            }));
            runner.add(animator.clone());
            animator.start();
            *animator_slot_clone.borrow_mut() = Some(animator);

            // Only the first camera emission starts the flight.
            false
        }));

        Cancelable::new(move || {
            // Suppress our completion before stopping the animator, whose
            // stop would otherwise report a cancelled flight.
            completion.borrow_mut().take();
            camera_token.cancel();
            if let Some(animator) = animator_slot.borrow_mut().take() {
                animator.stop();
            }
        })
    }
}
