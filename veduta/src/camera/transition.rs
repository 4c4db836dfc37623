//! Per-property records of an animated camera change.

use crate::camera::{CameraOptions, CameraState, Padding, ScreenPoint};
use crate::geo::GeoPoint;
use crate::interpolate::{unwrap_direction, Interpolate};

/// From/to values of a single animatable camera property.
///
/// A `None` target means the property does not participate in the
/// transition and keeps whatever value the camera currently has.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionProperty<T> {
    /// Value at the start of the transition.
    pub from: T,
    /// Target value, if the property is animated.
    pub to: Option<T>,
}

impl<T> TransitionProperty<T> {
    fn new(from: T) -> Self {
        Self { from, to: None }
    }
}

impl<T: Interpolate + Copy> TransitionProperty<T> {
    fn value(&self, fraction: f64) -> Option<T> {
        self.to.map(|to| self.from.interpolate(&to, fraction))
    }
}

/// The set of property changes a camera animation applies.
///
/// An animator creates the transition from the current camera state when it
/// starts, lets its animation closure fill in the targets, and then calls
/// [`CameraTransition::optimize_paths`] exactly once so that bearing and
/// center take the short way around for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraTransition {
    /// Center coordinate change.
    pub center: TransitionProperty<GeoPoint>,
    /// Zoom level change.
    pub zoom: TransitionProperty<f64>,
    /// Bearing change in degrees.
    pub bearing: TransitionProperty<f64>,
    /// Pitch change in degrees.
    pub pitch: TransitionProperty<f64>,
    /// Padding change.
    pub padding: TransitionProperty<Padding>,
    /// Anchor point change.
    pub anchor: TransitionProperty<ScreenPoint>,
}

impl CameraTransition {
    /// Creates a transition with no targets, starting from the given camera
    /// state.
    pub fn new(state: CameraState, initial_anchor: ScreenPoint) -> Self {
        Self {
            center: TransitionProperty::new(state.center),
            zoom: TransitionProperty::new(state.zoom),
            bearing: TransitionProperty::new(state.bearing),
            pitch: TransitionProperty::new(state.pitch),
            padding: TransitionProperty::new(state.padding),
            anchor: TransitionProperty::new(initial_anchor),
        }
    }

    /// Normalizes the bearing target onto the shortest angular path and the
    /// center target onto the shortest path across the antimeridian.
    ///
    /// Called once when the transition starts, never per frame.
    pub fn optimize_paths(&mut self) {
        if let Some(to) = self.bearing.to {
            self.bearing.to = Some(unwrap_direction(self.bearing.from, to));
        }
        if let Some(to) = self.center.to {
            self.center.from = self.center.from.unwrapped_for_shortest_path(&to);
        }
    }

    /// The camera delta at the given fraction of the transition.
    ///
    /// Only properties with a target participate; the center longitude is
    /// wrapped back into `[-180, 180]`.
    pub fn camera_options(&self, fraction: f64) -> CameraOptions {
        CameraOptions {
            center: self.center.value(fraction).map(|center| center.wrapped()),
            zoom: self.zoom.value(fraction),
            bearing: self.bearing.value(fraction),
            pitch: self.pitch.value(fraction),
            padding: self.padding.value(fraction),
            anchor: self.anchor.value(fraction),
        }
    }

    /// The camera delta at the end of the transition.
    pub fn to_camera_options(&self) -> CameraOptions {
        self.camera_options(1.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::camera::Padding;

    fn state() -> CameraState {
        CameraState {
            center: GeoPoint::new(10.0, 20.0),
            zoom: 5.0,
            bearing: 10.0,
            pitch: 0.0,
            padding: Padding::default(),
        }
    }

    #[test]
    fn unset_properties_are_left_out() {
        let mut transition = CameraTransition::new(state(), ScreenPoint::new(0.0, 0.0));
        transition.zoom.to = Some(8.0);
        transition.optimize_paths();

        let options = transition.camera_options(0.5);
        assert_abs_diff_eq!(options.zoom.expect("zoom should be set"), 6.5);
        assert!(options.center.is_none());
        assert!(options.bearing.is_none());
        assert!(options.padding.is_none());
    }

    #[test]
    fn bearing_path_is_normalized_once() {
        let mut transition = CameraTransition::new(state(), ScreenPoint::new(0.0, 0.0));
        transition.bearing.to = Some(350.0);
        transition.optimize_paths();

        // 10 -> 350 goes counter-clockwise through 0, not the long way.
        assert_abs_diff_eq!(transition.bearing.to.expect("bearing target"), -10.0);
        let options = transition.camera_options(0.5);
        assert_abs_diff_eq!(options.bearing.expect("bearing should be set"), 0.0);
    }

    #[test]
    fn center_crosses_antimeridian_the_short_way() {
        let mut transition = CameraTransition::new(
            CameraState {
                center: GeoPoint::new(0.0, 170.0),
                ..state()
            },
            ScreenPoint::new(0.0, 0.0),
        );
        transition.center.to = Some(GeoPoint::new(0.0, -170.0));
        transition.optimize_paths();

        let mid = transition
            .camera_options(0.5)
            .center
            .expect("center should be set");
        assert_abs_diff_eq!(mid.lon().abs(), 180.0, epsilon = 1e-9);

        let end = transition
            .camera_options(1.0)
            .center
            .expect("center should be set");
        assert_abs_diff_eq!(end.lon(), -170.0, epsilon = 1e-9);
    }
}
