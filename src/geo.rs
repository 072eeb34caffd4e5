//! Great-circle geometry helpers shared by the identity resolver and the
//! topology builder. Distances are in kilometers; LoRa range is what makes
//! them useful as a disambiguation signal.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees.
///
/// Nodes that hide their position report null or zeroed coordinates; use
/// [`Location::from_coords`] so those never masquerade as a point off the
/// coast of West Africa.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build a location from optional coordinates. Returns `None` when either
    /// coordinate is missing or when both are exactly zero (the "hidden
    /// location" convention on the wire).
    pub fn from_coords(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        match (lat, lon) {
            (Some(lat), Some(lon)) if lat != 0.0 || lon != 0.0 => Some(Self { lat, lon }),
            _ => None,
        }
    }
}

/// Haversine great-circle distance between two points in kilometers.
pub fn haversine_km(a: Location, b: Location) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().asin() * EARTH_RADIUS_KM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        let p = Location::new(47.6062, -122.3321);
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn seattle_to_portland_roughly_correct() {
        let seattle = Location::new(47.6062, -122.3321);
        let portland = Location::new(45.5152, -122.6784);
        let d = haversine_km(seattle, portland);
        // Real-world value is ~234 km.
        assert!((d - 234.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn hidden_location_conventions() {
        assert!(Location::from_coords(None, Some(1.0)).is_none());
        assert!(Location::from_coords(Some(1.0), None).is_none());
        assert!(Location::from_coords(Some(0.0), Some(0.0)).is_none());
        // A true equator crossing with non-zero longitude is a real point.
        assert!(Location::from_coords(Some(0.0), Some(12.5)).is_some());
    }
}
