//! Trip position and status tables

use crate::client::ShopverseClient;
use crate::error::ApiResult;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Trip API interface
#[derive(Clone)]
pub struct TripsApi {
    client: ShopverseClient,
}

impl TripsApi {
    /// Create a new trips API interface
    pub(crate) fn new(client: ShopverseClient) -> Self {
        Self { client }
    }

    /// Insert one position row into `trip_positions`
    pub async fn push_position(&self, access_token: &str, report: &PositionReport) -> ApiResult<()> {
        self.client
            .insert_minimal("rest/v1/trip_positions", access_token, report)
            .await
    }

    /// Set the status column of a trip row
    pub async fn update_status(&self, access_token: &str, trip_id: &str, status: &str) -> ApiResult<()> {
        let path = format!("rest/v1/trips?trip_id=eq.{trip_id}");
        self.client
            .update_minimal(&path, access_token, &json!({ "status": status }))
            .await
    }
}

/// Row written to `trip_positions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    /// Trip the position belongs to
    pub trip_id: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy_m: f64,
    /// Capture time (RFC 3339)
    pub captured_at: String,
    /// Remaining travel time, if a route is known
    pub eta_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::test_support::MockServer;
    use shopverse_core::retry::RetryConfig;

    fn trips_for(server: &MockServer) -> TripsApi {
        let config = ClientConfig::development()
            .with_base_url(server.url())
            .with_anon_key("anon")
            .with_retry(RetryConfig::no_retry());
        ShopverseClient::with_config(config).unwrap().trips()
    }

    #[tokio::test]
    async fn test_push_position() {
        let server = MockServer::start(vec![(201, "")]).await;
        let report = PositionReport {
            trip_id: "trip-1".into(),
            latitude: 37.0,
            longitude: -122.0,
            accuracy_m: 8.0,
            captured_at: "2024-05-01T12:00:00Z".into(),
            eta_seconds: Some(240),
        };
        trips_for(&server).push_position("jwt", &report).await.unwrap();

        let request = &server.requests()[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/rest/v1/trip_positions");
        assert_eq!(request.header("prefer"), Some("return=minimal"));
        let sent: PositionReport = serde_json::from_str(&request.body).unwrap();
        assert_eq!(sent, report);
    }

    #[tokio::test]
    async fn test_update_status() {
        let server = MockServer::start(vec![(204, "")]).await;
        trips_for(&server).update_status("jwt", "trip-1", "ARRIVED").await.unwrap();

        let request = &server.requests()[0];
        assert_eq!(request.method, "PATCH");
        assert_eq!(request.path, "/rest/v1/trips?trip_id=eq.trip-1");
        assert_eq!(request.body, r#"{"status":"ARRIVED"}"#);
    }
}
