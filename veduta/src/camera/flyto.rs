//! The "fly to" camera animation: an optimal zoom-out/pan/zoom-in path
//! between two cameras.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use nalgebra::Point2;
use web_time::SystemTime;

use crate::camera::{
    AnimatingPosition, AnimationCompletion, AnimatorStatus, CameraAnimator, CameraBounds,
    CameraOptions, CameraState, CameraSurface, Padding, ScreenSize, StopReason,
};
use crate::cancel::Cancelable;
use crate::clock::Clock;
use crate::geo::{project, unproject, GeoPoint};
use crate::interpolate::{unwrap_direction, Interpolate};
use crate::signal::Signal;
use crate::task_queue::TaskQueue;

/// ρ: the relative amount of zooming along the flight path. 1.42 is the
/// average value selected by participants in the user study in van Wijk
/// (2003). A value of 1 produces a circular motion.
const RHO: f64 = 1.42;

/// V: default average velocity, measured in ρ-screenfuls per second.
const DEFAULT_VELOCITY: f64 = 1.2;

/// Interpolator implementing the "optimal path" animation from:
///
/// Van Wijk, Jarke J.; Nuij, Wim A. A. "Smooth and efficient zooming and
/// panning." INFOVIS '03. pp. 15-22.
/// <https://www.win.tue.nl/~vanwijk/zoompan.pdf#page=5>
///
/// Variable names follow the paper where they appear in it. Distances are
/// measured in world pixels at the source zoom scale; the flight path length
/// is measured in ρ-screenfuls.
#[derive(Debug, Clone)]
pub struct FlyToInterpolator {
    source_zoom: f64,
    source_scale: f64,
    source_point: Point2<f64>,
    dest_point: Point2<f64>,
    source_bearing: f64,
    dest_bearing: f64,
    source_pitch: f64,
    dest_pitch: f64,
    source_padding: Padding,
    dest_padding: Padding,

    /// w₀: initial visible span in pixels - a "screenful".
    w0: f64,
    /// u₁: length of the projected flight path in pixels.
    u1: f64,
    /// r₀: zoom-out factor during ascent.
    r0: f64,
    /// Sign of the span change for the degenerate path.
    w_mult: f64,
    /// The path is too short for a full ascent and descent.
    is_close: bool,
    /// S: total length of the flight path in ρ-screenfuls.
    s_total: f64,
}

impl FlyToInterpolator {
    /// Builds the flight path from `source` to `dest`.
    ///
    /// Source parameters are taken as-is; destination zoom and pitch are
    /// clamped to `bounds`. `size` is the viewport size in pixels.
    pub fn new(
        source: &CameraState,
        dest: &CameraOptions,
        bounds: &CameraBounds,
        size: ScreenSize,
    ) -> Self {
        let source_zoom = source.zoom;
        let source_scale = 2f64.powf(source_zoom);

        let dest_padding = dest.padding.unwrap_or(source.padding);
        let dest_coord = dest.center.unwrap_or(source.center);
        let dest_zoom = dest
            .zoom
            .unwrap_or(source_zoom)
            .clamp(bounds.min_zoom, bounds.max_zoom);
        let dest_pitch = dest
            .pitch
            .unwrap_or(source.pitch)
            .clamp(bounds.min_pitch, bounds.max_pitch);

        // Minimize rotation by taking the shorter path around the circle.
        let source_bearing = source.bearing;
        let dest_bearing = unwrap_direction(source_bearing, dest.bearing.unwrap_or(source_bearing));

        let source_coord = source.center.unwrapped_for_shortest_path(&dest_coord);
        let source_point = project(&source_coord, source_scale);
        let dest_point = project(&dest_coord, source_scale);

        // w₀ and w₁: initial and final visible spans, both measured in
        // pixels with respect to the initial scale.
        let w0 = (size.width - dest_padding.left - dest_padding.right)
            .max(size.height - dest_padding.top - dest_padding.bottom);
        let w1 = w0 / 2f64.powf(dest_zoom - source_zoom);

        let u1 = (dest_point - source_point).norm();

        // rᵢ: zoom-out factor at either end of the animation.
        let r = |i: usize| -> f64 {
            let w2 = w1 * w1 - w0 * w0;
            let num_mult = if i == 0 { 1.0 } else { -1.0 };
            let rho4 = RHO * RHO * RHO * RHO * u1 * u1;
            let denom_mult = if i == 0 { w0 } else { w1 };
            let b = (w2 + num_mult * rho4) / (2.0 * denom_mult * RHO * RHO * u1);
            ((b * b + 1.0).sqrt() - b).ln()
        };

        let (r0, r1) = if u1 != 0.0 {
            (r(0), r(1))
        } else {
            (f64::INFINITY, f64::INFINITY)
        };

        // When u₀ = u₁ the optimal path does not require both ascent and
        // descent.
        let is_close = u1.abs() < 1e-6 || r0.is_infinite() || r1.is_infinite();
        let w_mult = if w1 < w0 { -1.0 } else { 1.0 };

        let s_total = if is_close {
            (w1 / w0).ln().abs() / RHO
        } else {
            (r1 - r0) / RHO
        };

        Self {
            source_zoom,
            source_scale,
            source_point,
            dest_point,
            source_bearing,
            dest_bearing,
            source_pitch: source.pitch,
            dest_pitch,
            source_padding: source.padding,
            dest_padding,
            w0,
            u1,
            r0,
            w_mult,
            is_close,
            s_total,
        }
    }

    /// w(s): visible span on the ground at `s`, in pixels with respect to
    /// the initial scale.
    fn w(&self, s: f64) -> f64 {
        if self.is_close {
            (self.w_mult * RHO * s).exp()
        } else {
            self.r0.cosh() / (self.r0 + RHO * s).cosh()
        }
    }

    /// u(s): distance along the projected flight path at `s`, as a fraction
    /// of the full path length.
    fn u(&self, s: f64) -> f64 {
        if self.is_close {
            0.0
        } else {
            self.w0 * (self.r0.cosh() * (self.r0 + RHO * s).tanh() - self.r0.sinh())
                / (RHO * RHO)
                / self.u1
        }
    }

    /// The coordinate at `fraction` of the flight, in `[0, 1]`.
    pub fn coordinate(&self, fraction: f64) -> GeoPoint {
        let s = fraction * self.s_total;
        let us = if fraction >= 1.0 { 1.0 } else { self.u(s) };

        let interpolated = Point2::new(
            self.source_point.x.interpolate(&self.dest_point.x, us),
            self.source_point.y.interpolate(&self.dest_point.y, us),
        );
        unproject(&interpolated, self.source_scale).wrapped()
    }

    /// The zoom level at `fraction` of the flight.
    pub fn zoom(&self, fraction: f64) -> f64 {
        let s = fraction * self.s_total;
        self.source_zoom + (1.0 / self.w(s)).log2()
    }

    /// The bearing at `fraction` of the flight (linear interpolation over
    /// the shortest angular path).
    pub fn bearing(&self, fraction: f64) -> f64 {
        self.source_bearing
            .interpolate(&self.dest_bearing, fraction)
    }

    /// The pitch at `fraction` of the flight (linear interpolation).
    pub fn pitch(&self, fraction: f64) -> f64 {
        self.source_pitch.interpolate(&self.dest_pitch, fraction)
    }

    /// The padding at `fraction` of the flight (linear interpolation).
    pub fn padding(&self, fraction: f64) -> Padding {
        self.source_padding
            .interpolate(&self.dest_padding, fraction)
    }

    /// The full camera delta at `fraction` of the flight.
    pub fn camera_options(&self, fraction: f64) -> CameraOptions {
        CameraOptions {
            center: Some(self.coordinate(fraction)),
            zoom: Some(self.zoom(fraction)),
            bearing: Some(self.bearing(fraction)),
            pitch: Some(self.pitch(fraction)),
            padding: Some(self.padding(fraction)),
            anchor: None,
        }
    }

    /// A suitable duration for the animation given an average velocity in
    /// ρ-screenfuls per second, or the default velocity.
    pub fn duration(&self, velocity: Option<f64>) -> Duration {
        let seconds = match velocity {
            Some(velocity) => self.s_total * RHO / velocity,
            None => self.s_total / DEFAULT_VELOCITY,
        };
        Duration::from_secs_f64(seconds.max(0.0))
    }
}

enum FlyState {
    Initial,
    Running {
        interpolator: FlyToInterpolator,
        start: SystemTime,
        duration: Duration,
    },
    Final(AnimatingPosition),
}

/// Animates the camera along a [`FlyToInterpolator`] flight path.
///
/// The path is built from the camera state at the moment the animator
/// starts. Unlike [`BasicCameraAnimator`](crate::camera::BasicCameraAnimator)
/// the flight has its easing built into the path itself, so the fraction is
/// advanced linearly and there is no pause support.
pub struct FlyToCameraAnimator {
    camera: Rc<dyn CameraSurface>,
    clock: Rc<dyn Clock>,
    queue: Rc<dyn TaskQueue>,
    to: CameraOptions,
    duration_override: Option<Duration>,
    state: RefCell<FlyState>,
    completions: RefCell<Vec<AnimationCompletion>>,
    status: Signal<AnimatorStatus>,
}

impl FlyToCameraAnimator {
    /// Creates an animator flying to `to`.
    ///
    /// When `duration` is `None` the ideal duration computed from the flight
    /// path is used.
    pub fn new(
        to: CameraOptions,
        duration: Option<Duration>,
        camera: Rc<dyn CameraSurface>,
        clock: Rc<dyn Clock>,
        queue: Rc<dyn TaskQueue>,
    ) -> Self {
        Self {
            camera,
            clock,
            queue,
            to,
            duration_override: duration,
            state: RefCell::new(FlyState::Initial),
            completions: RefCell::new(Vec::new()),
            status: Signal::new(),
        }
    }

    /// Starts the flight. Does nothing unless the animator is fresh.
    pub fn start(&self) {
        let is_initial = matches!(&*self.state.borrow(), FlyState::Initial);
        if !is_initial {
            return;
        }

        let interpolator = FlyToInterpolator::new(
            &self.camera.camera_state(),
            &self.to,
            &self.camera.camera_bounds(),
            self.camera.size(),
        );
        let duration = self
            .duration_override
            .unwrap_or_else(|| interpolator.duration(None));
        *self.state.borrow_mut() = FlyState::Running {
            interpolator,
            start: self.clock.now(),
            duration,
        };
        self.status.notify(&AnimatorStatus::Started);
    }

    /// Registers a completion callback, deferring it if the flight is
    /// already over.
    pub fn add_completion(&self, completion: AnimationCompletion) {
        let final_position = match &*self.state.borrow() {
            FlyState::Final(position) => Some(*position),
            _ => None,
        };
        match final_position {
            None => self.completions.borrow_mut().push(completion),
            Some(position) => self.queue.defer(Box::new(move || completion(position))),
        }
    }

    fn run_completions(&self, position: AnimatingPosition) {
        let completions = std::mem::take(&mut *self.completions.borrow_mut());
        for completion in completions {
            completion(position);
        }
    }
}

impl CameraAnimator for FlyToCameraAnimator {
    fn update(&self) {
        let now = self.clock.now();
        let state = self.state.borrow();
        let FlyState::Running {
            interpolator,
            start,
            duration,
        } = &*state
        else {
            return;
        };

        let elapsed = now.duration_since(*start).unwrap_or_default();
        let fraction = if duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
        };

        if fraction >= 1.0 {
            let final_options = interpolator.camera_options(1.0);
            drop(state);
            self.camera.set_camera(&final_options);
            *self.state.borrow_mut() = FlyState::Final(AnimatingPosition::End);
            self.status.notify(&AnimatorStatus::Stopped {
                reason: StopReason::Finished,
            });
            self.run_completions(AnimatingPosition::End);
        } else {
            let options = interpolator.camera_options(fraction);
            drop(state);
            self.camera.set_camera(&options);
        }
    }

    fn stop(&self) {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), FlyState::Initial);
        match previous {
            FlyState::Initial => {
                *self.state.borrow_mut() = FlyState::Final(AnimatingPosition::Current);
                self.run_completions(AnimatingPosition::Current);
            }
            FlyState::Running { .. } => {
                *self.state.borrow_mut() = FlyState::Final(AnimatingPosition::Current);
                self.status.notify(&AnimatorStatus::Stopped {
                    reason: StopReason::Cancelled,
                });
                self.run_completions(AnimatingPosition::Current);
            }
            final_state @ FlyState::Final(_) => {
                *self.state.borrow_mut() = final_state;
            }
        }
    }

    fn is_running(&self) -> bool {
        matches!(&*self.state.borrow(), FlyState::Running { .. })
    }

    fn on_status_change(&self, mut callback: Box<dyn FnMut(&AnimatorStatus)>) -> Cancelable {
        self.status.observe(move |status| callback(status))
    }
}
