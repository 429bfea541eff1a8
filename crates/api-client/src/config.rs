//! Configuration for the ShopVerse API client
//!
//! Supports environment-based configuration with sensible defaults.

use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use shopverse_core::config::{BackendConfig, DirectionsConfig};
use shopverse_core::retry::RetryConfig;
use std::env;
use std::time::Duration;

/// Local Supabase started by `supabase start`
const LOCAL_SUPABASE_URL: &str = "http://localhost:54321";

/// Environment types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development (typically localhost Supabase)
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    #[default]
    Production,
}

impl Environment {
    /// Parse an environment name, defaulting to production
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "development" | "dev" | "local" => Self::Development,
            "staging" | "stage" => Self::Staging,
            _ => Self::Production,
        }
    }

    /// Parse from the `SHOPVERSE_ENV` environment variable
    pub fn from_env() -> Self {
        Self::parse(&env::var("SHOPVERSE_ENV").unwrap_or_default())
    }

    fn retry(self) -> RetryConfig {
        match self {
            Self::Development => RetryConfig::quick(),
            Self::Staging => RetryConfig::default(),
            Self::Production => RetryConfig::patient(),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Supabase project root URL (`/auth/v1` and `/rest/v1` hang off it)
    pub base_url: String,
    /// Supabase anonymous key, sent as the `apikey` header
    pub anon_key: Option<String>,
    /// Request timeout
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
    /// Current environment
    pub environment: Environment,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: LOCAL_SUPABASE_URL.to_string(),
            anon_key: None,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            environment: Environment::default(),
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables
    ///
    /// Reads the following environment variables:
    /// - `SHOPVERSE_API_URL` or `SUPABASE_URL`: Supabase project URL (required)
    /// - `SUPABASE_ANON_KEY`: Anonymous key sent with every request
    /// - `SHOPVERSE_ENV`: Environment (development/staging/production)
    /// - `SHOPVERSE_TIMEOUT_SECS`: Request timeout in seconds
    pub fn from_env() -> ApiResult<Self> {
        let environment = Environment::from_env();

        let base_url = env::var("SHOPVERSE_API_URL")
            .or_else(|_| env::var("SUPABASE_URL"))
            .map_err(|_| ApiError::missing_env("SHOPVERSE_API_URL or SUPABASE_URL"))?;

        let timeout = env::var("SHOPVERSE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(Duration::from_secs(30), Duration::from_secs);

        Ok(Self {
            base_url,
            anon_key: env::var("SUPABASE_ANON_KEY").ok(),
            timeout,
            retry: environment.retry(),
            environment,
        })
    }

    /// Build from the `[backend]` section of the shared configuration file
    #[must_use]
    pub fn from_backend(backend: &BackendConfig) -> Self {
        let environment = Environment::parse(&backend.environment);
        Self {
            base_url: backend.url.clone(),
            anon_key: Some(backend.anon_key.clone()).filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(backend.timeout_secs),
            retry: environment.retry(),
            environment,
        }
    }

    /// Create development configuration (local Supabase)
    #[must_use]
    pub fn development() -> Self {
        Self {
            base_url: LOCAL_SUPABASE_URL.to_string(),
            anon_key: env::var("SUPABASE_ANON_KEY").ok(),
            timeout: Duration::from_secs(10),
            retry: RetryConfig::quick(),
            environment: Environment::Development,
        }
    }

    /// Create staging configuration
    pub fn staging() -> ApiResult<Self> {
        Ok(Self {
            base_url: env::var("STAGING_SUPABASE_URL")
                .map_err(|_| ApiError::missing_env("STAGING_SUPABASE_URL"))?,
            anon_key: env::var("STAGING_SUPABASE_ANON_KEY")
                .or_else(|_| env::var("SUPABASE_ANON_KEY"))
                .ok(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            environment: Environment::Staging,
        })
    }

    /// Create production configuration
    pub fn production() -> ApiResult<Self> {
        Ok(Self {
            base_url: env::var("SUPABASE_URL").map_err(|_| ApiError::missing_env("SUPABASE_URL"))?,
            anon_key: env::var("SUPABASE_ANON_KEY").ok(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::patient(),
            environment: Environment::Production,
        })
    }

    /// Builder-style method to set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Builder-style method to set anon key
    #[must_use]
    pub fn with_anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = Some(key.into());
        self
    }

    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder-style method to set retry config
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.base_url.is_empty() {
            return Err(ApiError::config("base_url cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ApiError::config("base_url must start with http:// or https://"));
        }

        if self.timeout.is_zero() {
            return Err(ApiError::config("timeout cannot be zero"));
        }

        Ok(())
    }
}

/// Directions client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionsClientConfig {
    /// Directions JSON endpoint
    pub base_url: String,
    /// API key appended as the `key` query parameter
    pub api_key: String,
    /// Request timeout
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl DirectionsClientConfig {
    /// Build from the `[directions]` section of the shared configuration file
    #[must_use]
    pub fn from_directions(directions: &DirectionsConfig) -> Self {
        Self {
            base_url: directions.base_url.clone(),
            api_key: directions.api_key.clone(),
            timeout: Duration::from_secs(directions.timeout_secs),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(ApiError::missing_env("MAPS_API_KEY"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ApiError::config("directions base_url must start with http:// or https://"));
        }
        if self.timeout.is_zero() {
            return Err(ApiError::config("timeout cannot be zero"));
        }
        Ok(())
    }
}
