//! Interpolation primitives shared by camera animations and the location
//! pipeline.

use crate::camera::{Padding, ScreenPoint};
use crate::geo::GeoPoint;

/// Linear interpolation between two values of the same type.
pub trait Interpolate {
    /// Returns the value at `fraction` of the way from `self` to `to`.
    ///
    /// Fractions outside `[0, 1]` extrapolate linearly; no clamping is
    /// applied.
    fn interpolate(&self, to: &Self, fraction: f64) -> Self;
}

impl Interpolate for f64 {
    fn interpolate(&self, to: &Self, fraction: f64) -> Self {
        self + (to - self) * fraction
    }
}

impl Interpolate for GeoPoint {
    fn interpolate(&self, to: &Self, fraction: f64) -> Self {
        GeoPoint::new(
            self.lat().interpolate(&to.lat(), fraction),
            self.lon().interpolate(&to.lon(), fraction),
        )
    }
}

impl Interpolate for ScreenPoint {
    fn interpolate(&self, to: &Self, fraction: f64) -> Self {
        ScreenPoint::new(
            self.x.interpolate(&to.x, fraction),
            self.y.interpolate(&to.y, fraction),
        )
    }
}

impl Interpolate for Padding {
    fn interpolate(&self, to: &Self, fraction: f64) -> Self {
        Padding {
            top: self.top.interpolate(&to.top, fraction),
            left: self.left.interpolate(&to.left, fraction),
            bottom: self.bottom.interpolate(&to.bottom, fraction),
            right: self.right.interpolate(&to.right, fraction),
        }
    }
}

/// Returns the direction `to` shifted by a multiple of 360° so that moving
/// from `from` to the result takes the shortest angular path.
///
/// A difference of exactly 180° resolves to the clockwise direction
/// (`from + 180`).
pub fn unwrap_direction(from: f64, to: f64) -> f64 {
    let mut delta = (to - from).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    from + delta
}

/// Interpolates between two directions in degrees along the shortest angular
/// path.
///
/// The result is not normalized back into `[0, 360)`: interpolating from 0°
/// towards 270° ends at -90°.
pub fn interpolate_direction(from: f64, to: f64, fraction: f64) -> f64 {
    from + (unwrap_direction(from, to) - from) * fraction
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn scalar_interpolation_is_linear() {
        assert_abs_diff_eq!(1.0_f64.interpolate(&3.0, 0.5), 2.0);
        assert_abs_diff_eq!(1.0_f64.interpolate(&3.0, 0.0), 1.0);
        assert_abs_diff_eq!(1.0_f64.interpolate(&3.0, 1.0), 3.0);
    }

    #[test]
    fn scalar_interpolation_extrapolates() {
        assert_abs_diff_eq!(0.0_f64.interpolate(&10.0, 1.5), 15.0);
        assert_abs_diff_eq!(0.0_f64.interpolate(&10.0, -0.5), -5.0);
    }

    #[test]
    fn direction_interpolation_takes_shortest_path() {
        assert_abs_diff_eq!(interpolate_direction(0.0, 90.0, 0.5), 45.0);
        assert_abs_diff_eq!(interpolate_direction(0.0, 270.0, 1.0), -90.0);
        assert_abs_diff_eq!(interpolate_direction(-90.0, 20.0, 1.0), 20.0);
        assert_abs_diff_eq!(interpolate_direction(350.0, 10.0, 0.5), 360.0);
    }

    #[test]
    fn opposite_directions_resolve_clockwise() {
        assert_abs_diff_eq!(interpolate_direction(0.0, 180.0, 1.0), 180.0);
        assert_abs_diff_eq!(interpolate_direction(90.0, 270.0, 0.5), 180.0);
    }

    #[test]
    fn point_interpolation_is_componentwise() {
        let from = GeoPoint::new(10.0, 20.0);
        let to = GeoPoint::new(20.0, 40.0);
        let mid = from.interpolate(&to, 0.5);
        assert_abs_diff_eq!(mid.lat(), 15.0);
        assert_abs_diff_eq!(mid.lon(), 30.0);
    }
}
