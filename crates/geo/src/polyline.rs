//! Encoded polyline format.
//!
//! The Directions API returns route geometry as an "encoded polyline":
//! coordinates scaled by 1e5, delta-encoded against the previous point,
//! zig-zag signed and split into 5-bit chunks offset by 63 into printable
//! ASCII.

use crate::{haversine_distance_meters, Coordinate, GeoError, Result};

const PRECISION: f64 = 1e5;

/// Decodes an encoded polyline into coordinates.
///
/// # Example
/// ```
/// use shopverse_geo::decode_polyline;
///
/// let points = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
/// assert_eq!(points.len(), 3);
/// assert!((points[0].latitude - 38.5).abs() < 1e-9);
/// assert!((points[0].longitude + 120.2).abs() < 1e-9);
/// ```
pub fn decode_polyline(encoded: &str) -> Result<Vec<Coordinate>> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::with_capacity(bytes.len() / 4);
    let mut offset = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while offset < bytes.len() {
        lat += next_value(bytes, &mut offset)?;
        if offset >= bytes.len() {
            return Err(GeoError::InvalidPolyline {
                offset,
                reason: "latitude without longitude",
            });
        }
        lng += next_value(bytes, &mut offset)?;

        #[allow(clippy::cast_precision_loss)]
        let coord = Coordinate::new(lat as f64 / PRECISION, lng as f64 / PRECISION);
        if !coord.is_valid() {
            return Err(GeoError::InvalidPolyline {
                offset,
                reason: "point outside the valid coordinate range",
            });
        }
        points.push(coord);
    }

    Ok(points)
}

fn next_value(bytes: &[u8], offset: &mut usize) -> Result<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let Some(&byte) = bytes.get(*offset) else {
            return Err(GeoError::InvalidPolyline {
                offset: *offset,
                reason: "unexpected end of input",
            });
        };
        if !(63..=126).contains(&byte) {
            return Err(GeoError::InvalidPolyline {
                offset: *offset,
                reason: "character outside the encoding alphabet",
            });
        }
        if shift > 30 {
            return Err(GeoError::InvalidPolyline {
                offset: *offset,
                reason: "value too long",
            });
        }
        *offset += 1;

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}

/// Encodes coordinates as an encoded polyline.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_polyline(points: &[Coordinate]) -> String {
    let mut encoded = String::with_capacity(points.len() * 8);
    let mut prev_lat = 0i64;
    let mut prev_lng = 0i64;

    for point in points {
        let lat = (point.latitude * PRECISION).round() as i64;
        let lng = (point.longitude * PRECISION).round() as i64;
        push_value(&mut encoded, lat - prev_lat);
        push_value(&mut encoded, lng - prev_lng);
        prev_lat = lat;
        prev_lng = lng;
    }

    encoded
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn push_value(out: &mut String, value: i64) {
    let mut v = (if value < 0 { !(value << 1) } else { value << 1 }) as u64;
    while v >= 0x20 {
        out.push(char::from(((0x20 | (v & 0x1f)) + 63) as u8));
        v >>= 5;
    }
    out.push(char::from((v + 63) as u8));
}

/// Total length of a path in meters.
pub fn path_length_meters(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance_meters(&pair[0], &pair[1]))
        .sum()
}
