//! Great-circle distance and geofence checks.

use serde::{Deserialize, Serialize};

/// WGS84 mean Earth radius in meters.
pub const EARTH_MEAN_RADIUS_METERS: f64 = 6_371_008.8;

/// A validated WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Rejects NaN, infinities and out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance_meters(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Haversine distance in meters between two points given in degrees.
///
/// Non-finite input yields NaN, which [`is_within_radius`] never accepts.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair outside [0, 1] for antipodal points.
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_MEAN_RADIUS_METERS * c
}

pub fn is_within_radius(distance_meters: f64, radius_meters: f64) -> bool {
    distance_meters.is_finite()
        && radius_meters.is_finite()
        && distance_meters >= 0.0
        && distance_meters <= radius_meters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(distance_meters(-23.55, -46.63, -23.55, -46.63), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            ((0.0, 0.0), (0.0002, 0.0002)),
            ((-23.5505, -46.6333), (-22.9068, -43.1729)),
            ((51.5007, -0.1246), (40.6892, -74.0445)),
            ((89.9, 179.9), (-89.9, -179.9)),
        ];
        for ((a_lat, a_lon), (b_lat, b_lon)) in pairs {
            let ab = distance_meters(a_lat, a_lon, b_lat, b_lon);
            let ba = distance_meters(b_lat, b_lon, a_lat, a_lon);
            assert!((ab - ba).abs() < 1e-6, "{ab} vs {ba}");
            assert!(ab >= 0.0);
        }
    }

    #[test]
    fn small_offset_near_equator_is_about_31_meters() {
        let d = distance_meters(0.0, 0.0, 0.0002, 0.0002);
        assert!((d - 31.45).abs() < 0.5, "got {d}");
    }

    #[test]
    fn known_city_distance() {
        // São Paulo to Rio de Janeiro, roughly 361 km.
        let d = distance_meters(-23.5505, -46.6333, -22.9068, -43.1729);
        assert!((d / 1000.0 - 361.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn radius_comparison_is_inclusive() {
        assert!(is_within_radius(100.0, 100.0));
        assert!(is_within_radius(31.4, 100.0));
        assert!(!is_within_radius(100.01, 100.0));
    }

    #[test]
    fn non_finite_values_are_never_in_range() {
        assert!(!is_within_radius(f64::NAN, 100.0));
        assert!(!is_within_radius(f64::INFINITY, f64::INFINITY));
        assert!(!is_within_radius(10.0, f64::NAN));
        assert!(distance_meters(f64::NAN, 0.0, 0.0, 0.0).is_nan());
    }

    #[test]
    fn geo_point_rejects_invalid_coordinates() {
        assert!(GeoPoint::new(f64::NAN, 0.0).is_none());
        assert!(GeoPoint::new(0.0, f64::NEG_INFINITY).is_none());
        assert!(GeoPoint::new(91.0, 0.0).is_none());
        assert!(GeoPoint::new(0.0, 180.5).is_none());

        let p = GeoPoint::new(-23.5, -46.6).unwrap();
        assert_eq!(p.latitude(), -23.5);
        assert_eq!(p.longitude(), -46.6);
        assert_eq!(p.distance_to(&p), 0.0);
    }
}
