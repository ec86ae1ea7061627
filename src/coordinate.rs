//! Geographic coordinates and great-circle distance.

use crate::error::TideError;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for haversine distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated point in decimal degrees.
///
/// The only ways to obtain one are [`Coordinate::new`] and deserialization,
/// and both reject values outside latitude [-90, 90] / longitude [-180, 180].
///
/// # Example
/// ```
/// use tide_engine::coordinate::Coordinate;
///
/// let tokyo = Coordinate::new(35.6762, 139.6503).unwrap();
/// assert_eq!(tokyo.latitude(), 35.6762);
/// assert!(Coordinate::new(90.0001, 0.0).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = TideError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    /// Validate and build a coordinate. NaN is rejected along with out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, TideError> {
        let lat_ok = (-90.0..=90.0).contains(&latitude);
        let lon_ok = (-180.0..=180.0).contains(&longitude);
        if lat_ok && lon_ok {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(TideError::InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Haversine great-circle distance in kilometres.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let d_phi = (other.latitude - self.latitude).to_radians();
        let d_lambda = (other.longitude - self.longitude).to_radians();

        let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }

    /// Latitude and longitude rounded to four decimals (about 11 m), with
    /// negative zero folded into zero so equal points always render equally.
    pub fn rounded(&self) -> (f64, f64) {
        (round4(self.latitude), round4(self.longitude))
    }

    /// The coordinate snapped to the 4-decimal grid used for cache keys.
    pub fn normalized(&self) -> Coordinate {
        let (latitude, longitude) = self.rounded();
        Coordinate { latitude, longitude }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0 + 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn accepts_range_boundaries() {
        for (lat, lon) in [(-90.0, -180.0), (90.0, 180.0), (-90.0, 180.0), (90.0, -180.0)] {
            assert!(Coordinate::new(lat, lon).is_ok(), "({lat}, {lon}) should be valid");
        }
    }

    #[test]
    fn rejects_just_outside_range() {
        assert!(matches!(
            Coordinate::new(90.0001, 0.0),
            Err(TideError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            Coordinate::new(0.0, -180.0001),
            Err(TideError::InvalidCoordinate { .. })
        ));
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: Coordinate = serde_json::from_str(r#"{"latitude":35.0,"longitude":139.0}"#).unwrap();
        assert_eq!(ok.longitude(), 139.0);

        let bad = serde_json::from_str::<Coordinate>(r#"{"latitude":91.0,"longitude":0.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Tokyo to Osaka is roughly 400 km.
        let tokyo = Coordinate::new(35.6762, 139.6503).unwrap();
        let osaka = Coordinate::new(34.6937, 135.5023).unwrap();
        let d = tokyo.distance_km(&osaka);
        assert!((390.0..=410.0).contains(&d), "distance {d}");
        assert_abs_diff_eq!(tokyo.distance_km(&tokyo), 0.0);
        assert_abs_diff_eq!(d, osaka.distance_km(&tokyo), epsilon = 1e-9);
    }

    #[test]
    fn rounding_folds_negative_zero() {
        let c = Coordinate::new(-0.00001, 12.345678).unwrap();
        let (lat, lon) = c.rounded();
        assert_eq!(format!("{lat:.4}"), "0.0000");
        assert_eq!(lon, 12.3457);
    }

    #[test]
    fn normalized_matches_rounded() {
        let c = Coordinate::new(35.67621, 139.65034).unwrap();
        let n = c.normalized();
        assert_eq!((n.latitude(), n.longitude()), c.rounded());
        assert_eq!(n.normalized(), n);

        let edge = Coordinate::new(89.99999, -179.99999).unwrap().normalized();
        assert_eq!((edge.latitude(), edge.longitude()), (90.0, -180.0));
    }
}
