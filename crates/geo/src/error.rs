//! Error types for the geo crate.

use thiserror::Error;

/// Result type alias for geo operations.
pub type Result<T> = std::result::Result<T, GeoError>;

/// Errors that can occur during geo operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeoError {
    /// Invalid coordinate values
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Malformed encoded polyline
    #[error("Invalid polyline at byte {offset}: {reason}")]
    InvalidPolyline {
        /// Byte offset where decoding failed
        offset: usize,
        /// What went wrong
        reason: &'static str,
    },
}

/// Error code for integration with shopverse-core error handling.
/// Values line up with the core `ErrorCode` numbering.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoErrorCode {
    /// Invalid coordinate values
    InvalidCoordinate = 6002,
    /// Malformed encoded polyline
    InvalidPolyline = 7002,
}

impl GeoError {
    /// Returns the error code for this error.
    pub fn code(&self) -> GeoErrorCode {
        match self {
            GeoError::InvalidCoordinate(_) => GeoErrorCode::InvalidCoordinate,
            GeoError::InvalidPolyline { .. } => GeoErrorCode::InvalidPolyline,
        }
    }
}
