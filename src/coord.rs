//! Fixed-point coordinates and spherical geometry helpers

use serde::{Deserialize, Serialize};

/// Fixed-point scale: 1e6 units per degree.
pub const COORDINATE_PRECISION: f64 = 1_000_000.0;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A WGS84 position stored as microdegrees. Equality is bit-exact on the
/// integer representation; all distance math converts back to floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: i32,
    pub lat: i32,
}

impl Coordinate {
    pub fn new(lon: i32, lat: i32) -> Self {
        Self { lon, lat }
    }

    /// Build from floating-point degrees, rounding to the fixed-point grid.
    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        Self {
            lon: (lon * COORDINATE_PRECISION).round() as i32,
            lat: (lat * COORDINATE_PRECISION).round() as i32,
        }
    }

    pub fn lon_deg(&self) -> f64 {
        self.lon as f64 / COORDINATE_PRECISION
    }

    pub fn lat_deg(&self) -> f64 {
        self.lat as f64 / COORDINATE_PRECISION
    }

    /// True if the position lies within the WGS84 world bounds.
    pub fn is_valid(&self) -> bool {
        self.lon.abs() as f64 <= 180.0 * COORDINATE_PRECISION
            && self.lat.abs() as f64 <= 90.0 * COORDINATE_PRECISION
    }
}

/// Haversine distance between two coordinates in meters.
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat_deg().to_radians();
    let lat2 = b.lat_deg().to_radians();
    let delta_lat = (b.lat_deg() - a.lat_deg()).to_radians();
    let delta_lon = (b.lon_deg() - a.lon_deg()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` to `b` in degrees, clockwise from north, [0, 360).
pub fn bearing_deg(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat_deg().to_radians();
    let lat2 = b.lat_deg().to_radians();
    let delta_lon = (b.lon_deg() - a.lon_deg()).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

/// Local flat-earth approximation anchored at a reference latitude.
///
/// Good to well under a meter over the few hundred meters that segment
/// projection and candidate ranking operate on; degrades near the poles.
#[derive(Debug, Clone, Copy)]
pub struct LocalProjection {
    meters_per_lon_deg: f64,
    meters_per_lat_deg: f64,
}

const METERS_PER_DEG_LAT: f64 = 111_132.954;

impl LocalProjection {
    pub fn new(anchor: Coordinate) -> Self {
        Self {
            meters_per_lon_deg: anchor.lat_deg().to_radians().cos() * METERS_PER_DEG_LAT,
            meters_per_lat_deg: METERS_PER_DEG_LAT,
        }
    }

    /// Approximate distance in meters between two nearby coordinates.
    pub fn distance_m(&self, a: Coordinate, b: Coordinate) -> f64 {
        let dx = (b.lon_deg() - a.lon_deg()) * self.meters_per_lon_deg;
        let dy = (b.lat_deg() - a.lat_deg()) * self.meters_per_lat_deg;
        (dx * dx + dy * dy).sqrt()
    }

    /// Project `p` onto the segment `a`-`b`.
    ///
    /// Returns the closest point on the segment, the interpolation ratio in
    /// [0, 1] from `a`, and the distance from `p` in meters.
    pub fn project_onto_segment(
        &self,
        p: Coordinate,
        a: Coordinate,
        b: Coordinate,
    ) -> (Coordinate, f64, f64) {
        let ax = a.lon_deg() * self.meters_per_lon_deg;
        let ay = a.lat_deg() * self.meters_per_lat_deg;
        let bx = b.lon_deg() * self.meters_per_lon_deg;
        let by = b.lat_deg() * self.meters_per_lat_deg;
        let px = p.lon_deg() * self.meters_per_lon_deg;
        let py = p.lat_deg() * self.meters_per_lat_deg;

        let dx = bx - ax;
        let dy = by - ay;
        let len_sq = dx * dx + dy * dy;

        let ratio = if len_sq < 1e-12 {
            0.0
        } else {
            (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
        };

        let snapped = Coordinate::from_degrees(
            a.lon_deg() + ratio * (b.lon_deg() - a.lon_deg()),
            a.lat_deg() + ratio * (b.lat_deg() - a.lat_deg()),
        );
        let dist = self.distance_m(p, snapped);
        (snapped, ratio, dist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_point_round_trip() {
        let c = Coordinate::from_degrees(4.351234, 50.846789);
        assert_eq!(c.lon, 4_351_234);
        assert_eq!(c.lat, 50_846_789);
        assert!((c.lon_deg() - 4.351234).abs() < 1e-9);
    }

    #[test]
    fn haversine_one_degree_longitude() {
        // One degree of longitude at the equator is ~111.2 km
        let a = Coordinate::from_degrees(0.0, 0.0);
        let b = Coordinate::from_degrees(1.0, 0.0);
        let d = haversine_m(a, b);
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn haversine_zero() {
        let a = Coordinate::from_degrees(4.35, 50.85);
        assert_eq!(haversine_m(a, a), 0.0);
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = Coordinate::from_degrees(0.0, 0.0);
        let north = Coordinate::from_degrees(0.0, 1.0);
        let east = Coordinate::from_degrees(1.0, 0.0);
        assert!(bearing_deg(origin, north).abs() < 0.5);
        assert!((bearing_deg(origin, east) - 90.0).abs() < 0.5);
    }

    #[test]
    fn projection_clamps_to_endpoints() {
        let proj = LocalProjection::new(Coordinate::from_degrees(0.0, 0.0));
        let a = Coordinate::from_degrees(0.0, 0.0);
        let b = Coordinate::from_degrees(0.001, 0.0);
        // Point beyond b projects onto b
        let p = Coordinate::from_degrees(0.002, 0.0001);
        let (snapped, ratio, _) = proj.project_onto_segment(p, a, b);
        assert_eq!(ratio, 1.0);
        assert_eq!(snapped, b);
    }

    #[test]
    fn projection_midpoint() {
        let proj = LocalProjection::new(Coordinate::from_degrees(0.0, 50.0));
        let a = Coordinate::from_degrees(0.0, 50.0);
        let b = Coordinate::from_degrees(0.001, 50.0);
        let p = Coordinate::from_degrees(0.0005, 50.0001);
        let (_, ratio, dist) = proj.project_onto_segment(p, a, b);
        assert!((ratio - 0.5).abs() < 1e-6);
        assert!((dist - 11.1).abs() < 0.5, "got {dist}");
    }
}
