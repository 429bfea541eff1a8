//! Tolerance grid for cache keys.
//!
//! Two fixes a few metres apart should hit the same cached route. Snapping
//! coordinates onto a square grid of `tolerance_m` cells gives a hashable key
//! with that property.

use crate::Coordinate;
use std::fmt;

/// Metres per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// A cell of the tolerance grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    lat_index: i64,
    lng_index: i64,
    tolerance_cm: u32,
}

impl GridCell {
    /// Snaps a coordinate onto a grid with cells of roughly `tolerance_m`.
    ///
    /// Cells are square in degrees, so they narrow in the east-west
    /// direction away from the equator. Tolerances below one metre are
    /// raised to one metre and the key keeps centimetre precision.
    #[allow(clippy::cast_possible_truncation)]
    pub fn snap(coord: &Coordinate, tolerance_m: f64) -> Self {
        let tolerance_cm = tolerance_cm(tolerance_m);
        let step = step_degrees(tolerance_cm);
        Self {
            lat_index: (coord.latitude / step).round() as i64,
            lng_index: (coord.longitude / step).round() as i64,
            tolerance_cm,
        }
    }

    /// Centre of the cell.
    #[allow(clippy::cast_precision_loss)]
    pub fn center(&self) -> Coordinate {
        let step = step_degrees(self.tolerance_cm);
        Coordinate::new(self.lat_index as f64 * step, self.lng_index as f64 * step)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn tolerance_cm(tolerance_m: f64) -> u32 {
    let tolerance = if tolerance_m.is_finite() { tolerance_m.clamp(1.0, 100_000.0) } else { 1.0 };
    (tolerance * 100.0).round() as u32
}

fn step_degrees(tolerance_cm: u32) -> f64 {
    f64::from(tolerance_cm) / 100.0 / METERS_PER_DEGREE
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let center = self.center();
        write!(f, "{:.5},{:.5}", center.latitude, center.longitude)
    }
}
