//! Camera state, camera deltas and the animators that drive them.
//!
//! The map's camera itself is owned by the external rendering engine; this
//! module talks to it through [`CameraSurface`]. Everything else here is
//! bookkeeping for changing the camera over time: value types describing
//! camera configurations, per-property transitions, and animators that
//! sample those transitions once per frame.

use nalgebra::Point2;
use num_traits::Zero;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geo::{project, unproject, GeoPoint};

mod animator;
mod flyto;
mod runner;
mod transition;

pub use animator::{
    AnimatingPosition, AnimationCompletion, AnimatorStatus, BasicCameraAnimator, CameraAnimator,
    StopReason,
};
pub use flyto::{FlyToCameraAnimator, FlyToInterpolator};
pub use runner::CameraAnimatorsRunner;
pub use transition::{CameraTransition, TransitionProperty};

/// A point on the screen in pixels from the top-left corner.
pub type ScreenPoint = Point2<f64>;

/// Size of the map viewport in pixels.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScreenSize {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl ScreenSize {
    /// Creates a new size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero.
    pub fn is_zero(&self) -> bool {
        self.width.is_zero() || self.height.is_zero()
    }
}

/// Insets from the viewport edges that content should keep clear of.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Padding {
    /// Inset from the top edge in pixels.
    pub top: f64,
    /// Inset from the left edge in pixels.
    pub left: f64,
    /// Inset from the bottom edge in pixels.
    pub bottom: f64,
    /// Inset from the right edge in pixels.
    pub right: f64,
}

impl Padding {
    /// Creates a new padding.
    pub fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Padding of equal size on all edges.
    pub fn all(value: f64) -> Self {
        Self::new(value, value, value, value)
    }
}

/// A full snapshot of the camera. Every field is set.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraState {
    /// Coordinate at the center of the viewport.
    pub center: GeoPoint,
    /// Zoom level.
    pub zoom: f64,
    /// Bearing of the map in degrees clockwise from north.
    pub bearing: f64,
    /// Pitch of the camera in degrees from nadir.
    pub pitch: f64,
    /// Camera padding.
    pub padding: Padding,
}

/// A partial camera change. Only the set fields are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraOptions {
    /// New center coordinate.
    pub center: Option<GeoPoint>,
    /// New zoom level.
    pub zoom: Option<f64>,
    /// New bearing in degrees clockwise from north.
    pub bearing: Option<f64>,
    /// New pitch in degrees from nadir.
    pub pitch: Option<f64>,
    /// New camera padding.
    pub padding: Option<Padding>,
    /// Screen point around which zoom and rotation are applied.
    pub anchor: Option<ScreenPoint>,
}

impl From<CameraState> for CameraOptions {
    fn from(state: CameraState) -> Self {
        Self {
            center: Some(state.center),
            zoom: Some(state.zoom),
            bearing: Some(state.bearing),
            pitch: Some(state.pitch),
            padding: Some(state.padding),
            anchor: None,
        }
    }
}

/// Camera capability limits used for clamping animation targets.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraBounds {
    /// Minimum zoom level.
    pub min_zoom: f64,
    /// Maximum zoom level.
    pub max_zoom: f64,
    /// Minimum pitch in degrees.
    pub min_pitch: f64,
    /// Maximum pitch in degrees.
    pub max_pitch: f64,
}

impl Default for CameraBounds {
    fn default() -> Self {
        Self {
            min_zoom: 0.0,
            max_zoom: 22.0,
            min_pitch: 0.0,
            max_pitch: 85.0,
        }
    }
}

/// Interface to the camera of the external rendering engine.
///
/// `begin_animation`/`end_animation` bracket periods during which an
/// animator owns the camera; the engine uses them to suppress conflicting
/// internal updates. Calls are paired exactly by [`CameraAnimatorsRunner`].
pub trait CameraSurface {
    /// The current camera snapshot.
    fn camera_state(&self) -> CameraState;
    /// Applies a partial camera change.
    fn set_camera(&self, options: &CameraOptions);
    /// The camera capability limits.
    fn camera_bounds(&self) -> CameraBounds;
    /// The current viewport size.
    fn size(&self) -> ScreenSize;
    /// The default anchor point for transitions, usually the viewport center.
    fn anchor(&self) -> ScreenPoint;
    /// Marks the start of an animator-owned camera period.
    fn begin_animation(&self);
    /// Marks the end of an animator-owned camera period.
    fn end_animation(&self);
}

/// Computes a camera that frames all of `coordinates` within `size`, keeping
/// `padding` clear. Returns `None` when no coordinates are given or the
/// padded viewport is empty.
pub fn camera_for_coordinates(
    coordinates: &[GeoPoint],
    padding: Padding,
    bearing: Option<f64>,
    pitch: Option<f64>,
    size: ScreenSize,
) -> Option<CameraOptions> {
    if size.is_zero() {
        return None;
    }

    let mut points = coordinates.iter();
    let first = project(points.next()?, 1.0);
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in points {
        let projected = project(point, 1.0);
        min_x = min_x.min(projected.x);
        min_y = min_y.min(projected.y);
        max_x = max_x.max(projected.x);
        max_y = max_y.max(projected.y);
    }

    let available_width = size.width - padding.left - padding.right;
    let available_height = size.height - padding.top - padding.bottom;
    if available_width <= 0.0 || available_height <= 0.0 {
        return None;
    }

    // Degenerate (point or line) geometries still get a finite zoom.
    let span_x = (max_x - min_x).max(1e-9);
    let span_y = (max_y - min_y).max(1e-9);
    let scale_x = available_width / span_x;
    let scale_y = available_height / span_y;
    let zoom = scale_x.min(scale_y).log2();

    // Asymmetric padding moves the visible center away from the viewport
    // center; compensate in world pixels at the target zoom.
    let offset_x = (padding.left - padding.right) / 2.0;
    let offset_y = (padding.top - padding.bottom) / 2.0;
    let zoom_scale = 2f64.powf(zoom);
    let center = Point2::new(
        (min_x + max_x) / 2.0 - offset_x / zoom_scale,
        (min_y + max_y) / 2.0 - offset_y / zoom_scale,
    );

    Some(CameraOptions {
        center: Some(unproject(&center, 1.0)),
        zoom: Some(zoom),
        bearing,
        pitch,
        padding: Some(padding),
        anchor: None,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn camera_for_coordinates_centers_the_bounds() {
        let coordinates = [GeoPoint::new(10.0, 10.0), GeoPoint::new(20.0, 20.0)];
        let camera = camera_for_coordinates(
            &coordinates,
            Padding::default(),
            None,
            None,
            ScreenSize::new(800.0, 600.0),
        )
        .expect("camera should be computed");

        let center = camera.center.expect("center should be set");
        assert_abs_diff_eq!(center.lon(), 15.0, epsilon = 1e-9);
        assert!(center.lat() > 10.0 && center.lat() < 20.0);
        assert!(camera.zoom.expect("zoom should be set") > 0.0);
    }

    #[test]
    fn camera_for_coordinates_fits_within_viewport() {
        let coordinates = [GeoPoint::new(0.0, -10.0), GeoPoint::new(0.0, 10.0)];
        let camera = camera_for_coordinates(
            &coordinates,
            Padding::default(),
            None,
            None,
            ScreenSize::new(512.0, 512.0),
        )
        .expect("camera should be computed");

        let zoom = camera.zoom.expect("zoom should be set");
        // 20 degrees of longitude is 1/18th of the world; at the computed
        // zoom it must span exactly the viewport width.
        let world = 512.0 * 2f64.powf(zoom);
        assert_abs_diff_eq!(world / 18.0, 512.0, epsilon = 1e-6);
    }

    #[test]
    fn camera_for_coordinates_requires_input_and_space() {
        assert!(camera_for_coordinates(
            &[],
            Padding::default(),
            None,
            None,
            ScreenSize::new(100.0, 100.0)
        )
        .is_none());

        assert!(camera_for_coordinates(
            &[GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)],
            Padding::all(60.0),
            None,
            None,
            ScreenSize::new(100.0, 100.0)
        )
        .is_none());
    }
}
