//! Haversine distance calculation.
//!
//! Great-circle distance on a spherical earth. Accurate to well under a metre
//! at the street-level distances a delivery covers.

use crate::Coordinate;

/// Earth's mean radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Earth's mean radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculates the great-circle distance between two coordinates in kilometers.
///
/// # Example
/// ```
/// use shopverse_geo::{haversine_distance, Coordinate};
///
/// let warehouse = Coordinate::new(37.7749, -122.4194);
/// let customer = Coordinate::new(37.8044, -122.2712);
///
/// let distance = haversine_distance(&warehouse, &customer);
/// assert!((distance - 13.4).abs() < 0.5);
/// ```
#[inline]
pub fn haversine_distance(from: &Coordinate, to: &Coordinate) -> f64 {
    central_angle(*from, *to) * EARTH_RADIUS_KM
}

/// Calculates the great-circle distance between two coordinates in meters.
///
/// This is the unit every tracking threshold is expressed in.
#[inline]
pub fn haversine_distance_meters(from: &Coordinate, to: &Coordinate) -> f64 {
    central_angle(*from, *to) * EARTH_RADIUS_M
}

#[inline]
fn central_angle(from: Coordinate, to: Coordinate) -> f64 {
    let (lat1, lon1) = from.to_radians();
    let (lat2, lon2) = to.to_radians();

    let half_d_lat = (lat2 - lat1) / 2.0;
    let half_d_lon = (lon2 - lon1) / 2.0;

    let a = half_d_lat.sin().powi(2) + lat1.cos() * lat2.cos() * half_d_lon.sin().powi(2);

    // Clamp: rounding can push `a` a hair above 1 for antipodal points
    2.0 * a.clamp(0.0, 1.0).sqrt().asin()
}
