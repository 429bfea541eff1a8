//! Error types for the tracking core

use crate::model::TripStatus;
use shopverse_api_client::ApiError;
use shopverse_core::ErrorCode;
use shopverse_crypto::CryptoError;
use thiserror::Error;

/// Result type alias for tracking operations
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Errors surfaced by the session, location, route and trip components
#[derive(Error, Debug)]
pub enum TrackingError {
    /// Stored credential could not be decrypted or decoded
    #[error("Credential store is corrupted: {0}")]
    CorruptedStore(String),

    /// No credential is stored
    #[error("Not signed in")]
    NotAuthenticated,

    /// The refresh token was rejected; the user must sign in again
    #[error("Session expired")]
    SessionExpired,

    /// The positioning feed failed or closed
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    /// No route could be computed and none was cached
    #[error("Route unavailable: {0}")]
    RouteUnavailable(String),

    /// A non-terminal trip already exists
    #[error("Trip {trip_id} is still in progress")]
    TripAlreadyActive {
        /// The trip in progress
        trip_id: String,
    },

    /// The referenced trip is not the current one
    #[error("Trip not found: {0}")]
    TripNotFound(String),

    /// The trip state machine refused a transition
    #[error("Cannot move trip from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: TripStatus,
        /// Requested status
        to: TripStatus,
    },

    /// Backend request failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Transient failure that outlived its retry budget
    #[error("Network error: {0}")]
    Network(String),

    /// Sealing or key handling failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Filesystem failure outside of decryption
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The coordinator task is gone
    #[error("Tracking coordinator has stopped")]
    CoordinatorClosed,
}

impl TrackingError {
    /// Map to the shared error code space
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CorruptedStore(_) => ErrorCode::CorruptedStore,
            Self::NotAuthenticated => ErrorCode::NotAuthenticated,
            Self::SessionExpired => ErrorCode::SessionExpired,
            Self::LocationUnavailable(_) => ErrorCode::LocationUnavailable,
            Self::RouteUnavailable(_) => ErrorCode::RouteUnavailable,
            Self::TripAlreadyActive { .. } => ErrorCode::TripAlreadyActive,
            Self::TripNotFound(_) => ErrorCode::TripNotFound,
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::Api(e) => e.code(),
            Self::Network(_) => ErrorCode::NetworkError,
            Self::Crypto(e) if e.is_corruption() => ErrorCode::DecryptionFailed,
            Self::Crypto(_) => ErrorCode::SecurityError,
            Self::Io(_) => ErrorCode::IoError,
            Self::CoordinatorClosed => ErrorCode::Internal,
        }
    }

    /// Whether retrying later could succeed without user action
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api(e) => e.is_transient(),
            Self::Network(_) | Self::Io(_) => true,
            _ => false,
        }
    }
}

impl From<TrackingError> for shopverse_core::Error {
    fn from(err: TrackingError) -> Self {
        let code = err.code();
        let error = shopverse_core::Error::new(code, err.to_string());
        match code {
            ErrorCode::NotAuthenticated | ErrorCode::SessionExpired | ErrorCode::CorruptedStore => {
                error.with_suggestion("Run `shopverse-track login` to sign in")
            }
            ErrorCode::TripAlreadyActive => error.with_suggestion("Cancel the current trip first"),
            ErrorCode::RouteUnavailable => error.with_suggestion("Check MAPS_API_KEY and your connection"),
            _ => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(TrackingError::SessionExpired.code(), ErrorCode::SessionExpired);
        assert_eq!(
            TrackingError::TripAlreadyActive { trip_id: "t".into() }.code().code(),
            8001
        );
        assert_eq!(
            TrackingError::Api(ApiError::api_response(401, "JWT expired")).code(),
            ErrorCode::NotAuthenticated
        );
        assert_eq!(
            TrackingError::Crypto(CryptoError::Opening).code(),
            ErrorCode::DecryptionFailed
        );
    }

    #[test]
    fn test_transient() {
        assert!(TrackingError::Api(ApiError::api_response(503, "busy")).is_transient());
        assert!(!TrackingError::Api(ApiError::api_response(400, "bad")).is_transient());
        assert!(!TrackingError::SessionExpired.is_transient());
    }

    #[test]
    fn test_into_core_error_has_suggestion() {
        let err: shopverse_core::Error = TrackingError::NotAuthenticated.into();
        assert_eq!(err.code, ErrorCode::NotAuthenticated);
        assert!(err.suggestion.unwrap().contains("login"));
    }
}
