//! Supabase Auth (GoTrue) endpoints

use crate::client::ShopverseClient;
use crate::error::ApiResult;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Authentication API interface
#[derive(Clone)]
pub struct AuthApi {
    client: ShopverseClient,
}

impl AuthApi {
    /// Create a new auth API interface
    pub(crate) fn new(client: ShopverseClient) -> Self {
        Self { client }
    }

    /// Exchange email and password for a session
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> ApiResult<AuthSession> {
        self.client
            .post(
                "auth/v1/token?grant_type=password",
                &json!({ "email": email, "password": password }),
            )
            .await
    }

    /// Exchange a refresh token for a new session
    ///
    /// The refresh token is single use: the response carries its successor.
    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<AuthSession> {
        self.client
            .post(
                "auth/v1/token?grant_type=refresh_token",
                &json!({ "refresh_token": refresh_token }),
            )
            .await
    }

    /// Revoke the session behind an access token
    pub async fn sign_out(&self, access_token: &str) -> ApiResult<()> {
        self.client
            .post_authorized("auth/v1/logout", access_token, &json!({}))
            .await
    }

    /// Fetch the user an access token belongs to
    pub async fn user(&self, access_token: &str) -> ApiResult<User> {
        self.client.get_authorized("auth/v1/user", access_token).await
    }
}

/// Session issued by the token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Short-lived JWT
    pub access_token: String,
    /// Single-use refresh token
    pub refresh_token: String,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
    /// Usually `bearer`
    #[serde(default)]
    pub token_type: String,
    /// Signed-in user
    pub user: Option<User>,
}

/// Supabase user record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User UUID
    pub id: String,
    /// Email address
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: Option<String>,
    /// Last sign-in timestamp (RFC 3339)
    pub last_sign_in_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::test_support::MockServer;
    use shopverse_core::retry::RetryConfig;

    const SESSION: &str = r#"{
        "access_token": "jwt-1",
        "token_type": "bearer",
        "expires_in": 3600,
        "expires_at": 1700000000,
        "refresh_token": "refresh-1",
        "user": {"id": "4b1c", "email": "ada@example.com", "phone": "", "created_at": "2024-01-01T00:00:00Z"}
    }"#;

    fn auth_for(server: &MockServer) -> AuthApi {
        let config = ClientConfig::development()
            .with_base_url(server.url())
            .with_anon_key("anon")
            .with_retry(RetryConfig::no_retry());
        ShopverseClient::with_config(config).unwrap().auth()
    }

    #[test]
    fn test_session_deserialize() {
        let session: AuthSession = serde_json::from_str(SESSION).unwrap();
        assert_eq!(session.access_token, "jwt-1");
        assert_eq!(session.expires_in, 3600);
        assert_eq!(session.user.unwrap().email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_password_sign_in() {
        let server = MockServer::start(vec![(200, SESSION)]).await;
        let session = auth_for(&server)
            .sign_in_with_password("ada@example.com", "hunter2")
            .await
            .unwrap();

        assert_eq!(session.refresh_token, "refresh-1");
        let request = &server.requests()[0];
        assert_eq!(request.path, "/auth/v1/token?grant_type=password");
        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["email"], "ada@example.com");
        assert!(request.header("authorization").is_none());
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let server = MockServer::start(vec![(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token: Already Used"}"#,
        )])
        .await;
        let err = auth_for(&server).refresh("refresh-1").await.unwrap_err();

        assert!(err.is_client_error());
        assert!(err.to_string().contains("Already Used"));
        assert_eq!(server.requests()[0].path, "/auth/v1/token?grant_type=refresh_token");
    }

    #[tokio::test]
    async fn test_sign_out_sends_bearer() {
        let server = MockServer::start(vec![(204, "")]).await;
        auth_for(&server).sign_out("jwt-1").await.unwrap();

        let request = &server.requests()[0];
        assert_eq!(request.path, "/auth/v1/logout");
        assert_eq!(request.header("authorization"), Some("Bearer jwt-1"));
    }
}
