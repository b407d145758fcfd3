//! Great-circle distance math for appointment ranking.

/// Earth radius used by the haversine formula, in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers to miles.
const KM_TO_MI: f64 = 0.621371192;

/// A (longitude, latitude) pair in decimal degrees.
///
/// The feed delivers coordinates longitude-first, so the field order here
/// matches the wire order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Whether this coordinate is usable for distance computation.
    ///
    /// The feed emits `[0, 0]` (or null) for locations it failed to geocode;
    /// a zero component means the point is bogus, not off the coast of
    /// Africa.
    pub fn is_valid(&self) -> bool {
        self.lon != 0.0 && self.lat != 0.0 && self.lon.is_finite() && self.lat.is_finite()
    }
}

/// Great-circle distance between two points in miles (haversine).
pub fn distance_miles(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c * KM_TO_MI
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAN_FRANCISCO: Coordinate = Coordinate {
        lon: -122.4194,
        lat: 37.7749,
    };
    const LOS_ANGELES: Coordinate = Coordinate {
        lon: -118.2437,
        lat: 34.0522,
    };

    #[test]
    fn test_distance_symmetric() {
        let ab = distance_miles(SAN_FRANCISCO, LOS_ANGELES);
        let ba = distance_miles(LOS_ANGELES, SAN_FRANCISCO);
        assert!((ab - ba).abs() < 1e-6, "asymmetric: {} vs {}", ab, ba);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(distance_miles(SAN_FRANCISCO, SAN_FRANCISCO), 0.0);
    }

    #[test]
    fn test_sf_to_la_is_about_347_miles() {
        let d = distance_miles(SAN_FRANCISCO, LOS_ANGELES);
        assert!((d - 347.0).abs() < 2.0, "got {}", d);
    }

    #[test]
    fn test_zero_coordinate_is_invalid() {
        assert!(!Coordinate::new(0.0, 37.77).is_valid());
        assert!(!Coordinate::new(-122.41, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 0.0).is_valid());
        assert!(Coordinate::new(-122.41, 37.77).is_valid());
    }

    #[test]
    fn test_nan_coordinate_is_invalid() {
        assert!(!Coordinate::new(f64::NAN, 37.77).is_valid());
    }
}
