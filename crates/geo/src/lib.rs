//! Geospatial helpers for ShopVerse delivery tracking.
//!
//! This crate provides:
//! - Coordinates with range validation
//! - Haversine distance calculations
//! - A tolerance grid used to key route caches
//! - Encoded polyline decoding (Directions API format)
//!
//! # Example
//!
//! ```
//! use shopverse_geo::{haversine_distance_meters, Coordinate};
//!
//! let courier = Coordinate::new(37.000, -122.000);
//! let customer = Coordinate::new(37.010, -122.010);
//!
//! let distance_m = haversine_distance_meters(&courier, &customer);
//! assert!((distance_m - 1_423.0).abs() < 5.0);
//! ```

mod error;
mod grid;
mod haversine;
pub mod polyline;

pub use error::{GeoError, Result};
pub use grid::GridCell;
pub use haversine::{haversine_distance, haversine_distance_meters, EARTH_RADIUS_KM, EARTH_RADIUS_M};
pub use polyline::{decode_polyline, encode_polyline, path_length_meters};

use std::fmt;
use std::str::FromStr;

/// A geographic coordinate with latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a new coordinate without validating it.
    #[inline]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Creates a coordinate, rejecting out-of-range or non-finite values.
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self> {
        let coord = Self::new(latitude, longitude);
        if coord.is_valid() {
            Ok(coord)
        } else {
            Err(GeoError::InvalidCoordinate(format!(
                "({latitude}, {longitude}) is outside the valid range"
            )))
        }
    }

    /// Returns true if the coordinate has valid values.
    ///
    /// NaN and infinities fail every comparison and are rejected.
    #[inline]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Converts degrees to radians for internal calculations.
    #[inline]
    pub(crate) fn to_radians(self) -> (f64, f64) {
        (self.latitude.to_radians(), self.longitude.to_radians())
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self::new(lat, lng)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Parses `"lat,lng"`, the format used on the command line and by the
/// Directions API.
impl FromStr for Coordinate {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| GeoError::InvalidCoordinate(format!("expected `lat,lng`, got `{s}`")))?;

        let parse = |part: &str| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| GeoError::InvalidCoordinate(format!("`{}`: {e}", part.trim())))
        };

        Self::try_new(parse(lat)?, parse(lng)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_creation() {
        let coord = Coordinate::new(37.0, -122.0);
        assert_eq!(coord.latitude, 37.0);
        assert_eq!(coord.longitude, -122.0);
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(0.0, 0.0).is_valid());
        assert!(Coordinate::new(90.0, 180.0).is_valid());
        assert!(Coordinate::new(-90.0, -180.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 181.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_try_new_rejects_invalid() {
        assert!(Coordinate::try_new(37.0, -122.0).is_ok());
        assert!(matches!(
            Coordinate::try_new(120.0, 0.0),
            Err(GeoError::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn test_parse_from_str() {
        let coord: Coordinate = "37.010, -122.010".parse().unwrap();
        assert_eq!(coord, Coordinate::new(37.010, -122.010));

        assert!("37.0".parse::<Coordinate>().is_err());
        assert!("north,-122".parse::<Coordinate>().is_err());
        assert!("95.0,0.0".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let coord = Coordinate::new(37.123456, -122.654321);
        let parsed: Coordinate = coord.to_string().parse().unwrap();
        assert_eq!(parsed, coord);
    }

    #[test]
    fn test_coordinate_from_tuple() {
        let coord: Coordinate = (37.0, -122.0).into();
        assert_eq!(coord.latitude, 37.0);
    }
}
