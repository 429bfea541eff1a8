//! Supabase implementations of the backend traits

use crate::error::Result;
use crate::model::{Credential, TripStatus};
use crate::session::{AuthBackend, RefreshError, SessionManager};
use async_trait::async_trait;
use chrono::Utc;
use shopverse_api_client::{ApiError, Order, PositionReport, ShopverseClient};
use std::sync::Arc;

/// Where trip updates go
#[async_trait]
pub trait TripBackend: Send + Sync {
    /// Publish one position of an active trip
    async fn push_position(&self, report: &PositionReport) -> Result<()>;

    /// Record a trip status change
    async fn report_status(&self, trip_id: &str, status: TripStatus) -> Result<()>;
}

/// Token endpoint of the Supabase project
#[derive(Clone)]
pub struct SupabaseAuthBackend {
    client: ShopverseClient,
}

impl SupabaseAuthBackend {
    /// Wrap a configured client
    pub fn new(client: ShopverseClient) -> Self {
        Self { client }
    }

    /// Sign in with email and password
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Credential> {
        let session = self.client.auth().sign_in_with_password(email, password).await?;
        Ok(Credential::from_session(&session, Utc::now()))
    }
}

/// Only a definitive 4xx answer means the refresh token is gone; rate
/// limiting and request timeouts are retried like network failures
fn classify(error: &ApiError) -> RefreshError {
    let throttled = matches!(error.status(), Some(408 | 429));
    if error.is_client_error() && !throttled && !error.is_transient() {
        RefreshError::Rejected(error.to_string())
    } else {
        RefreshError::Transient(error.to_string())
    }
}

#[async_trait]
impl AuthBackend for SupabaseAuthBackend {
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<Credential, RefreshError> {
        let session = self
            .client
            .auth()
            .refresh(refresh_token)
            .await
            .map_err(|e| classify(&e))?;
        Ok(Credential::from_session(&session, Utc::now()))
    }

    async fn sign_out(&self, access_token: &str) -> std::result::Result<(), RefreshError> {
        self.client
            .auth()
            .sign_out(access_token)
            .await
            .map_err(|e| classify(&e))
    }
}

/// Trip tables of the Supabase project, accessed as the signed-in user
#[derive(Clone)]
pub struct SupabaseTripBackend {
    client: ShopverseClient,
    session: Arc<SessionManager>,
}

impl SupabaseTripBackend {
    /// Write through `client` with tokens from `session`
    pub fn new(client: ShopverseClient, session: Arc<SessionManager>) -> Self {
        Self { client, session }
    }
}

#[async_trait]
impl TripBackend for SupabaseTripBackend {
    async fn push_position(&self, report: &PositionReport) -> Result<()> {
        self.session
            .authorized(|token| {
                let trips = self.client.trips();
                async move { trips.push_position(&token, report).await }
            })
            .await
    }

    async fn report_status(&self, trip_id: &str, status: TripStatus) -> Result<()> {
        self.session
            .authorized(|token| {
                let trips = self.client.trips();
                async move { trips.update_status(&token, trip_id, status.as_str()).await }
            })
            .await
    }
}

/// Order history of the signed-in user
#[derive(Clone)]
pub struct OrderHistory {
    client: ShopverseClient,
    session: Arc<SessionManager>,
}

impl OrderHistory {
    /// Read through `client` with tokens from `session`
    pub fn new(client: ShopverseClient, session: Arc<SessionManager>) -> Self {
        Self { client, session }
    }

    /// Orders newest first, optionally only those with `status`
    pub async fn list(&self, status: Option<&str>) -> Result<Vec<Order>> {
        self.session
            .authorized(|token| {
                let auth = self.client.auth();
                let orders = self.client.orders();
                async move {
                    let user = auth.user(&token).await?;
                    orders.list(&token, &user.id, status).await
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_classification() {
        assert!(matches!(
            classify(&ApiError::api_response(400, "invalid_grant: Already Used")),
            RefreshError::Rejected(_)
        ));
        assert!(matches!(
            classify(&ApiError::api_response(401, "bad jwt")),
            RefreshError::Rejected(_)
        ));
        assert!(matches!(
            classify(&ApiError::api_response(503, "busy")),
            RefreshError::Transient(_)
        ));
        assert!(matches!(classify(&ApiError::CircuitOpen), RefreshError::Transient(_)));
    }

    #[test]
    fn test_throttled_refresh_is_transient() {
        assert!(matches!(
            classify(&ApiError::api_response(429, "Too Many Requests")),
            RefreshError::Transient(_)
        ));
        assert!(matches!(
            classify(&ApiError::api_response(408, "Request Timeout")),
            RefreshError::Transient(_)
        ));
        assert!(matches!(
            classify(&ApiError::api_response(403, "invalid_grant")),
            RefreshError::Rejected(_)
        ));
    }

    /// Token endpoint that answers every refresh with 429
    struct RateLimitedAuth;

    #[async_trait]
    impl AuthBackend for RateLimitedAuth {
        async fn refresh(&self, _refresh_token: &str) -> std::result::Result<Credential, RefreshError> {
            Err(classify(&ApiError::api_response(429, "Too Many Requests")))
        }

        async fn sign_out(&self, _access_token: &str) -> std::result::Result<(), RefreshError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_refresh_keeps_session() {
        use crate::error::TrackingError;
        use crate::session::tests::credential;
        use crate::storage::{MemoryStorage, SecureStorage};
        use crate::token_store::TokenStore;
        use shopverse_core::retry::RetryConfig;
        use std::time::Duration;

        let storage = Arc::new(MemoryStorage::new());
        let retry = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            jitter: false,
            ..RetryConfig::default()
        };
        let session =
            SessionManager::new(TokenStore::new(storage.clone()), Arc::new(RateLimitedAuth)).with_retry(retry);
        session.login(credential("access-0", "refresh-0", 5)).unwrap();

        let err = session
            .authorized(|token| async move { Ok::<_, ApiError>(token) })
            .await
            .unwrap_err();
        assert!(matches!(err, TrackingError::Network(_)));
        assert!(storage.get().unwrap().is_some());
        assert_eq!(session.current().unwrap().unwrap().refresh_token, "refresh-0");
    }
}
