use super::{DirectionsError, DirectionsService};
use async_trait::async_trait;
use shopverse_api_client::{ApiError, DirectionsApi, DirectionsRoute};
use shopverse_geo::Coordinate;

impl From<ApiError> for DirectionsError {
    fn from(error: ApiError) -> Self {
        match &error {
            ApiError::Json(_) | ApiError::Malformed(_) => Self::Malformed(error.to_string()),
            _ if error.is_transient() => Self::Network(error.to_string()),
            _ => Self::Rejected(error.to_string()),
        }
    }
}

#[async_trait]
impl DirectionsService for DirectionsApi {
    async fn directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<DirectionsRoute, DirectionsError> {
        Ok(self.route(origin, destination).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let over_limit = ApiError::Directions {
            status: "OVER_QUERY_LIMIT".into(),
            message: String::new(),
        };
        assert!(matches!(DirectionsError::from(over_limit), DirectionsError::Network(_)));

        let denied = ApiError::Directions {
            status: "REQUEST_DENIED".into(),
            message: "bad key".into(),
        };
        assert!(matches!(DirectionsError::from(denied), DirectionsError::Rejected(_)));

        assert!(matches!(
            DirectionsError::from(ApiError::api_response(502, "Bad Gateway")),
            DirectionsError::Network(_)
        ));
        assert!(matches!(
            DirectionsError::from(ApiError::Malformed("no legs".into())),
            DirectionsError::Malformed(_)
        ));
    }
}
