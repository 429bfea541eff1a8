//! Google Directions JSON API
//!
//! Unlike the Supabase endpoints this talks to a third-party host, so it owns
//! its own `reqwest::Client` and does not retry: callers decide how often to
//! ask again.

use crate::config::DirectionsClientConfig;
use crate::error::{parse_error_message, ApiError, ApiResult};
use reqwest::Client;
use serde::Deserialize;
use shopverse_geo::{decode_polyline, Coordinate};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Directions API interface
#[derive(Clone)]
pub struct DirectionsApi {
    inner: Client,
    config: DirectionsClientConfig,
}

/// Route as the directions service describes it
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsRoute {
    /// Decoded overview polyline
    pub polyline: Vec<Coordinate>,
    /// Sum of leg durations in seconds
    pub eta_seconds: u64,
    /// Sum of leg distances in meters
    pub distance_meters: u64,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<RouteJson>,
}

#[derive(Debug, Deserialize)]
struct RouteJson {
    overview_polyline: PolylineJson,
    #[serde(default)]
    legs: Vec<LegJson>,
}

#[derive(Debug, Deserialize)]
struct PolylineJson {
    points: String,
}

#[derive(Debug, Deserialize)]
struct LegJson {
    duration: ValueJson,
    distance: ValueJson,
}

#[derive(Debug, Deserialize)]
struct ValueJson {
    value: u64,
}

impl DirectionsApi {
    /// Create a directions client
    pub fn new(config: DirectionsClientConfig) -> ApiResult<Self> {
        config.validate()?;
        let inner = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Request)?;
        Ok(Self { inner, config })
    }

    /// Ask for a driving route between two points
    #[instrument(skip(self), fields(request_id))]
    pub async fn route(&self, origin: Coordinate, destination: Coordinate) -> ApiResult<DirectionsRoute> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let response = self
            .inner
            .get(&self.config.base_url)
            .query(&[
                ("origin", origin.to_string()),
                ("destination", destination.to_string()),
                ("key", self.config.api_key.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::api_response(status.as_u16(), parse_error_message(&body)));
        }

        let route = parse_directions(&body)?;
        debug!(
            request_id = %request_id,
            points = route.polyline.len(),
            eta_seconds = route.eta_seconds,
            distance_meters = route.distance_meters,
            "Directions received"
        );
        Ok(route)
    }
}

/// Parse a Directions JSON body
pub fn parse_directions(body: &str) -> ApiResult<DirectionsRoute> {
    let response: DirectionsResponse = serde_json::from_str(body)?;

    if response.status != "OK" {
        return Err(ApiError::Directions {
            message: response.error_message.unwrap_or_default(),
            status: response.status,
        });
    }

    let route = response.routes.into_iter().next().ok_or_else(|| ApiError::Directions {
        status: "ZERO_RESULTS".to_string(),
        message: "response contained no routes".to_string(),
    })?;

    if route.legs.is_empty() {
        return Err(ApiError::Malformed("route has no legs".to_string()));
    }

    let polyline = decode_polyline(&route.overview_polyline.points)
        .map_err(|e| ApiError::Malformed(e.to_string()))?;

    Ok(DirectionsRoute {
        polyline,
        eta_seconds: route.legs.iter().map(|l| l.duration.value).sum(),
        distance_meters: route.legs.iter().map(|l| l.distance.value).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockServer;
    use std::time::Duration;

    const OK_BODY: &str = r#"{
        "status": "OK",
        "geocoded_waypoints": [],
        "routes": [{
            "summary": "Main St",
            "overview_polyline": {"points": "_p~iF~ps|U_ulLnnqC_mqNvxq`@"},
            "legs": [{
                "duration": {"text": "4 mins", "value": 240},
                "distance": {"text": "1.4 km", "value": 1423}
            }]
        }]
    }"#;

    #[test]
    fn test_parse_ok() {
        let route = parse_directions(OK_BODY).unwrap();
        assert_eq!(route.eta_seconds, 240);
        assert_eq!(route.distance_meters, 1423);
        assert_eq!(route.polyline.len(), 3);
        assert!((route.polyline[0].latitude - 38.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_denied() {
        let err = parse_directions(
            r#"{"status":"REQUEST_DENIED","error_message":"The provided API key is invalid.","routes":[]}"#,
        )
        .unwrap_err();
        match err {
            ApiError::Directions { status, message } => {
                assert_eq!(status, "REQUEST_DENIED");
                assert!(message.contains("API key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_transient_status_is_retryable() {
        let err = parse_directions(r#"{"status":"OVER_QUERY_LIMIT","routes":[]}"#).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_directions("<html>"), Err(ApiError::Json(_))));
        assert!(matches!(
            parse_directions(r#"{"status":"OK","routes":[{"overview_polyline":{"points":"_p~iF~ps|U"},"legs":[]}]}"#),
            Err(ApiError::Malformed(_))
        ));
        assert!(matches!(
            parse_directions(
                r#"{"status":"OK","routes":[{"overview_polyline":{"points":"_p~"},"legs":[{"duration":{"value":1},"distance":{"value":1}}]}]}"#
            ),
            Err(ApiError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_route_request() {
        let server = MockServer::start(vec![(200, OK_BODY)]).await;
        let api = DirectionsApi::new(DirectionsClientConfig {
            base_url: format!("{}/maps/api/directions/json", server.url()),
            api_key: "maps-key".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let route = api
            .route(Coordinate::new(37.0, -122.0), Coordinate::new(37.01, -122.01))
            .await
            .unwrap();
        assert_eq!(route.eta_seconds, 240);

        let request = &server.requests()[0];
        assert!(request.path.starts_with("/maps/api/directions/json?"));
        assert!(request.path.contains("origin=37.000000%2C-122.000000"));
        assert!(request.path.contains("key=maps-key"));
    }
}
