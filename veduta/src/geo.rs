//! Geographic primitives and the spherical-mercator projection.

use nalgebra::Point2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of a map tile in pixels. World size at zoom level `z` is
/// `TILE_SIZE * 2^z`.
pub const TILE_SIZE: f64 = 512.0;

/// Maximum latitude representable in the mercator projection.
pub const LATITUDE_MAX: f64 = 85.051_128_779_806_604;

/// Minimum latitude representable in the mercator projection.
pub const LATITUDE_MIN: f64 = -LATITUDE_MAX;

const EARTH_RADIUS: f64 = 6_378_137.0;

/// A geographic point given by latitude and longitude in degrees.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

impl GeoPoint {
    /// Creates a new point.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Latitude in degrees.
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Returns the same point with the longitude wrapped to `[-180, 180]`.
    pub fn wrapped(&self) -> Self {
        let mut lon = (self.lon + 180.0).rem_euclid(360.0) - 180.0;
        if lon == -180.0 && self.lon > 0.0 {
            lon = 180.0;
        }
        Self { lat: self.lat, lon }
    }

    /// Returns the same point with the longitude shifted by a multiple of
    /// 360° so that the path from it to `other` does not cross the
    /// antimeridian the long way around.
    pub fn unwrapped_for_shortest_path(&self, other: &GeoPoint) -> Self {
        let delta = other.lon - self.lon;
        if delta.abs() <= 180.0 {
            return *self;
        }
        let turns = (delta / 360.0).round();
        Self {
            lat: self.lat,
            lon: self.lon + turns * 360.0,
        }
    }
}

/// Projects a geographic point into world pixels at the given zoom scale
/// (`zoom_scale = 2^zoom`), measured from the top-left corner of the world
/// image. Latitude is clamped to the valid mercator range.
pub fn project(point: &GeoPoint, zoom_scale: f64) -> Point2<f64> {
    let world_size = TILE_SIZE * zoom_scale;
    let lat = point.lat.clamp(LATITUDE_MIN, LATITUDE_MAX);

    let x = (180.0 + point.lon) / 360.0 * world_size;
    let y = (180.0 - (180.0 / std::f64::consts::PI) * ((std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan()).ln())
        / 360.0
        * world_size;

    Point2::new(x, y)
}

/// Inverse of [`project`].
pub fn unproject(point: &Point2<f64>, zoom_scale: f64) -> GeoPoint {
    let world_size = TILE_SIZE * zoom_scale;

    let lon = point.x / world_size * 360.0 - 180.0;
    let y = 180.0 - point.y / world_size * 360.0;
    let lat = 360.0 / std::f64::consts::PI * (y.to_radians().exp()).atan() - 90.0;

    GeoPoint::new(lat, lon)
}

/// Distance in meters spanned by one pixel at the given latitude and zoom
/// level.
pub fn meters_per_pixel(latitude: f64, zoom: f64) -> f64 {
    let world_size = TILE_SIZE * 2f64.powf(zoom);
    latitude.to_radians().cos() * 2.0 * std::f64::consts::PI * EARTH_RADIUS / world_size
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn project_unproject_roundtrip() {
        let points = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(55.75, 37.61),
            GeoPoint::new(-33.86, 151.2),
            GeoPoint::new(84.0, -179.0),
        ];

        for point in points {
            let projected = project(&point, 2f64.powi(10));
            let restored = unproject(&projected, 2f64.powi(10));
            assert_abs_diff_eq!(restored.lat(), point.lat(), epsilon = 1e-9);
            assert_abs_diff_eq!(restored.lon(), point.lon(), epsilon = 1e-9);
        }
    }

    #[test]
    fn world_corners() {
        let projected = project(&GeoPoint::new(0.0, 0.0), 1.0);
        assert_abs_diff_eq!(projected.x, TILE_SIZE / 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(projected.y, TILE_SIZE / 2.0, epsilon = 1e-9);

        let top_left = project(&GeoPoint::new(LATITUDE_MAX, -180.0), 1.0);
        assert_abs_diff_eq!(top_left.x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(top_left.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn meters_per_pixel_at_equator() {
        assert_abs_diff_eq!(meters_per_pixel(0.0, 0.0), 78271.5169, epsilon = 1e-3);
        assert_abs_diff_eq!(meters_per_pixel(0.0, 1.0), 78271.5169 / 2.0, epsilon = 1e-3);
    }

    #[test]
    fn unwrap_for_shortest_path() {
        let from = GeoPoint::new(0.0, 170.0);
        let to = GeoPoint::new(0.0, -170.0);
        let unwrapped = from.unwrapped_for_shortest_path(&to);
        assert_abs_diff_eq!(unwrapped.lon(), -190.0);

        let near = GeoPoint::new(0.0, 10.0).unwrapped_for_shortest_path(&GeoPoint::new(0.0, 20.0));
        assert_abs_diff_eq!(near.lon(), 10.0);
    }

    #[test]
    fn wrapped_longitude() {
        assert_abs_diff_eq!(GeoPoint::new(0.0, 190.0).wrapped().lon(), -170.0);
        assert_abs_diff_eq!(GeoPoint::new(0.0, -190.0).wrapped().lon(), 170.0);
        assert_abs_diff_eq!(GeoPoint::new(0.0, 180.0).wrapped().lon(), 180.0);
    }
}
