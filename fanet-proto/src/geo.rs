//! Great-circle distance and bounding-box helpers shared by the validator,
//! the boundary tracker and the spatial index.

use crate::model::Position;

/// Mean Earth radius in kilometres, as used for the great-circle distance.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two (lat, lon) points, in metres.
///
/// Grounded on `rs1090::decode::cpr::haversine`, which computes the same
/// formula in kilometres for CPR position reconciliation.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = libm::sin(d_lat / 2.0) * libm::sin(d_lat / 2.0)
        + libm::cos(lat1.to_radians())
            * libm::cos(lat2.to_radians())
            * libm::sin(d_lon / 2.0)
            * libm::sin(d_lon / 2.0);
    let c = 2.0 * libm::atan2(libm::sqrt(a), libm::sqrt(1.0 - a));
    EARTH_RADIUS_KM * c * 1000.0
}

pub fn distance_m(a: &Position, b: &Position) -> f64 {
    haversine_m(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// An axis-aligned lat/lon bounding box (`QueryBounds`, §4.4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub sw_lat: f64,
    pub sw_lon: f64,
    pub ne_lat: f64,
    pub ne_lon: f64,
}

impl Bounds {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.sw_lat
            && lat <= self.ne_lat
            && lon >= self.sw_lon
            && lon <= self.ne_lon
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.sw_lat <= other.ne_lat
            && self.ne_lat >= other.sw_lat
            && self.sw_lon <= other.ne_lon
            && self.ne_lon >= other.sw_lon
    }

    /// A bounding box guaranteed to contain every point within `radius_km`
    /// of `center` — used by the spatial index to scope its quadtree
    /// traversal before the exact haversine check (§4.5).
    pub fn around(center_lat: f64, center_lon: f64, radius_km: f64) -> Bounds {
        let lat_delta = radius_km / 111.32;
        let lon_scale = (center_lat.to_radians().cos()).max(1e-6);
        let lon_delta = radius_km / (111.32 * lon_scale);
        Bounds {
            sw_lat: (center_lat - lat_delta).max(-90.0),
            sw_lon: (center_lon - lon_delta).max(-180.0),
            ne_lat: (center_lat + lat_delta).min(90.0),
            ne_lon: (center_lon + lon_delta).min(180.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_distance() {
        assert!(haversine_m(46.5, 8.5, 46.5, 8.5) < 1e-6);
    }

    #[test]
    fn haversine_known_distance() {
        // Roughly 1 degree of latitude is ~111.2 km.
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 500.0);
    }

    #[test]
    fn bounds_around_contains_center() {
        let b = Bounds::around(46.5, 8.5, 50.0);
        assert!(b.contains(46.5, 8.5));
        assert!(!b.contains(50.0, 8.5));
    }
}
