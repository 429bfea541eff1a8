//! Main API client implementation

use crate::config::ClientConfig;
use crate::endpoints::{AuthApi, OrdersApi, TripsApi};
use crate::error::{parse_error_message, ApiError, ApiResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shopverse_core::retry::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Request correlation ID header
const X_REQUEST_ID: &str = "X-Request-ID";

/// API key header for Supabase
const APIKEY_HEADER: &str = "apikey";

/// PostgREST preference header
const PREFER_HEADER: &str = "Prefer";

/// Supabase API client with built-in resilience patterns
///
/// This client wraps `reqwest` and adds:
/// - Automatic retry with exponential backoff
/// - Circuit breaker to prevent cascading failures
/// - Request correlation IDs for tracing
/// - Bearer tokens per request, never stored on the client
#[derive(Clone)]
pub struct ShopverseClient {
    inner: Client,
    config: Arc<ClientConfig>,
    circuit_breaker: Arc<CircuitBreaker>,
}

/// One logical request, possibly sent several times
struct Call<'a, B> {
    method: Method,
    url: String,
    body: Option<&'a B>,
    bearer: Option<&'a str>,
    prefer: Option<&'static str>,
}

impl ShopverseClient {
    /// Create a new client with default configuration from environment
    pub fn new() -> ApiResult<Self> {
        let config = ClientConfig::from_env()?;
        Self::with_config(config)
    }

    /// Create a new client with specific configuration
    pub fn with_config(config: ClientConfig) -> ApiResult<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("shopverse-api-client/", env!("CARGO_PKG_VERSION"))),
        );

        if let Some(ref key) = config.anon_key {
            let value = HeaderValue::from_str(key)
                .map_err(|_| ApiError::config("anon_key contains invalid header characters"))?;
            default_headers.insert(APIKEY_HEADER, value);
        }

        let inner = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(ApiError::Request)?;

        let circuit_breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));

        Ok(Self {
            inner,
            config: Arc::new(config),
            circuit_breaker,
        })
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get circuit breaker state
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Reset the circuit breaker
    pub fn reset_circuit(&self) {
        self.circuit_breaker.reset();
    }

    // -------------------------------------------------------------------------
    // Endpoint API accessors
    // -------------------------------------------------------------------------

    /// Access authentication endpoints
    #[must_use]
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Access trip tracking endpoints
    #[must_use]
    pub fn trips(&self) -> TripsApi {
        TripsApi::new(self.clone())
    }

    /// Access order history endpoints
    #[must_use]
    pub fn orders(&self) -> OrdersApi {
        OrdersApi::new(self.clone())
    }

    // -------------------------------------------------------------------------
    // Low-level HTTP methods with resilience
    // -------------------------------------------------------------------------

    /// Perform an anonymous GET request
    #[instrument(skip(self), fields(request_id))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(self.call::<()>(Method::GET, path, None, None)).await
    }

    /// Perform an anonymous POST request
    #[instrument(skip(self, body), fields(request_id))]
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.request(self.call(Method::POST, path, Some(body), None)).await
    }

    /// Perform a GET request on behalf of a signed-in user
    #[instrument(skip(self, token), fields(request_id))]
    pub async fn get_authorized<T: DeserializeOwned>(&self, path: &str, token: &str) -> ApiResult<T> {
        self.request(self.call::<()>(Method::GET, path, None, Some(token))).await
    }

    /// Perform a POST request on behalf of a signed-in user
    #[instrument(skip(self, token, body), fields(request_id))]
    pub async fn post_authorized<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.request(self.call(Method::POST, path, Some(body), Some(token))).await
    }

    /// POST a row without asking for it back (`Prefer: return=minimal`)
    #[instrument(skip(self, token, body), fields(request_id))]
    pub async fn insert_minimal<B: Serialize>(&self, path: &str, token: &str, body: &B) -> ApiResult<()> {
        let mut call = self.call(Method::POST, path, Some(body), Some(token));
        call.prefer = Some("return=minimal");
        self.request(call).await
    }

    /// PATCH rows without asking for them back (`Prefer: return=minimal`)
    #[instrument(skip(self, token, body), fields(request_id))]
    pub async fn update_minimal<B: Serialize>(&self, path: &str, token: &str, body: &B) -> ApiResult<()> {
        let mut call = self.call(Method::PATCH, path, Some(body), Some(token));
        call.prefer = Some("return=minimal");
        self.request(call).await
    }

    fn call<'a, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&'a B>,
        bearer: Option<&'a str>,
    ) -> Call<'a, B> {
        Call {
            method,
            url: format!("{}/{}", self.config.base_url.trim_end_matches('/'), path.trim_start_matches('/')),
            body,
            bearer,
            prefer: None,
        }
    }

    /// Execute a request with full resilience patterns
    async fn request<T: DeserializeOwned, B: Serialize>(&self, call: Call<'_, B>) -> ApiResult<T> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        if !self.circuit_breaker.can_execute() {
            warn!(
                request_id = %request_id,
                url = %call.url,
                "Circuit breaker is open, rejecting request"
            );
            return Err(ApiError::CircuitOpen);
        }

        self.execute_with_retry(&request_id, &call).await
    }

    /// Execute request with retry logic
    async fn execute_with_retry<T: DeserializeOwned, B: Serialize>(
        &self,
        request_id: &str,
        call: &Call<'_, B>,
    ) -> ApiResult<T> {
        let retry_config = &self.config.retry;
        let max_attempts = retry_config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = retry_config.delay_for_attempt(attempt);
                debug!(
                    request_id = %request_id,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after delay"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            let result = match retry_config.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, self.execute_single_request(request_id, call))
                    .await
                    .unwrap_or(Err(ApiError::Timeout(limit))),
                None => self.execute_single_request(request_id, call).await,
            };
            let elapsed = start.elapsed();
            attempt += 1;

            match result {
                Ok(value) => {
                    self.circuit_breaker.record_success();
                    debug!(
                        request_id = %request_id,
                        method = %call.method,
                        attempt = attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Request succeeded"
                    );
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    self.circuit_breaker.record_failure();
                    if attempt < max_attempts {
                        debug!(
                            request_id = %request_id,
                            attempt = attempt,
                            error = %e,
                            "Request failed, will retry"
                        );
                        continue;
                    }
                    warn!(
                        request_id = %request_id,
                        method = %call.method,
                        attempts = attempt,
                        error = %e,
                        "Request failed, retries exhausted"
                    );
                    return Err(if max_attempts > 1 {
                        ApiError::RetriesExhausted {
                            attempts: attempt,
                            last_error: Box::new(e),
                        }
                    } else {
                        e
                    });
                }
                Err(e) => {
                    debug!(
                        request_id = %request_id,
                        attempt = attempt,
                        error = %e,
                        "Request failed, not retrying"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Execute a single request without retry
    async fn execute_single_request<T: DeserializeOwned, B: Serialize>(
        &self,
        request_id: &str,
        call: &Call<'_, B>,
    ) -> ApiResult<T> {
        let mut request = self
            .inner
            .request(call.method.clone(), &call.url)
            .header(X_REQUEST_ID, request_id);

        if let Some(token) = call.bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(prefer) = call.prefer {
            request = request.header(PREFER_HEADER, prefer);
        }
        if let Some(b) = call.body {
            request = request.json(b);
        }

        let response = request.send().await?;
        Self::handle_response(response).await
    }

    /// Handle HTTP response and deserialize
    ///
    /// Empty bodies (204, `return=minimal`) deserialize as JSON `null`, so
    /// callers can ask for `()` or `Option<T>`.
    async fn handle_response<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                Ok(serde_json::from_str("null")?)
            } else {
                Ok(serde_json::from_slice(&bytes)?)
            }
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::api_response(status.as_u16(), parse_error_message(&body)))
        }
    }
}
