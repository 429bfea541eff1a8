//! Data shared between the tracking components

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shopverse_api_client::AuthSession;
use shopverse_geo::Coordinate;
use std::fmt;

/// Access and refresh token pair with the access token's expiry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Short-lived bearer token
    pub access_token: String,
    /// Single-use token exchanged for the next credential
    pub refresh_token: String,
    /// Instant after which the access token is rejected
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build from a token endpoint response received at `now`
    #[must_use]
    pub fn from_session(session: &AuthSession, now: DateTime<Utc>) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: now + Duration::seconds(session.expires_in),
        }
    }

    /// Whether the access token has expired at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the access token expires within `skew` of `now`
    #[must_use]
    pub fn expires_within(&self, skew: Duration, now: DateTime<Utc>) -> bool {
        now + skew >= self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A filtered device position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Position
    pub coordinate: Coordinate,
    /// Horizontal accuracy radius in meters
    pub accuracy_m: f64,
    /// When the fix was taken
    pub captured_at: DateTime<Utc>,
}

/// A computed route between two grid cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Snapped origin cell
    pub origin_id: String,
    /// Snapped destination cell
    pub destination_id: String,
    /// Decoded path
    pub polyline: Vec<Coordinate>,
    /// Expected travel time
    pub eta_seconds: u64,
    /// Path length
    pub distance_meters: u64,
    /// When the directions service produced it
    pub computed_at: DateTime<Utc>,
    /// Served from cache after the directions service failed
    pub stale: bool,
}

/// Trip lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    /// Waiting for the first valid sample
    Pending,
    /// Moving towards the destination
    Active,
    /// Reached the destination
    Arrived,
    /// Stopped on request
    Cancelled,
}

impl TripStatus {
    /// Arrived and cancelled trips never change again
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Arrived | Self::Cancelled)
    }

    /// Value stored in the backend `trips.status` column
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Arrived => "ARRIVED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
