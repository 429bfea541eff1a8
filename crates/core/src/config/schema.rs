//! Configuration schema definitions

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSchema {
    /// Supabase backend settings
    pub backend: BackendConfig,
    /// Directions service settings
    pub directions: DirectionsConfig,
    /// Location filtering settings
    pub location: LocationConfig,
    /// Trip tracking settings
    pub tracking: TrackingConfig,
    /// Route cache and retry settings
    pub route: RouteConfig,
    /// Local storage settings
    pub storage: StorageConfig,
}

/// Supabase backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project root URL, e.g. `https://xyz.supabase.co`
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Public anon key sent as the `apikey` header
    #[serde(default)]
    pub anon_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Deployment environment name
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            anon_key: String::new(),
            timeout_secs: default_timeout_secs(),
            environment: default_environment(),
        }
    }
}

/// Directions service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsConfig {
    /// API key for the directions service
    #[serde(default)]
    pub api_key: String,

    /// Endpoint for directions requests
    #[serde(default = "default_directions_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_directions_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_directions_url(),
            timeout_secs: default_directions_timeout_secs(),
        }
    }
}

/// Location stream filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Minimum time between emitted samples
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Minimum distance between emitted samples
    #[serde(default = "default_min_displacement_m")]
    pub min_displacement_m: f64,

    /// Fixes with a worse accuracy radius are dropped
    #[serde(default = "default_accuracy_threshold_m")]
    pub accuracy_threshold_m: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            min_displacement_m: default_min_displacement_m(),
            accuracy_threshold_m: default_accuracy_threshold_m(),
        }
    }
}

impl LocationConfig {
    /// Minimum interval as a duration
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Trip tracking thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Distance to destination at which a trip counts as arrived
    #[serde(default = "default_arrival_threshold_m")]
    pub arrival_threshold_m: f64,

    /// Distance from the last route origin that triggers a new route
    #[serde(default = "default_reroute_distance_m")]
    pub reroute_distance_m: f64,

    /// Samples with a worse accuracy invalidate the cached route
    #[serde(default = "default_route_invalidate_accuracy_m")]
    pub route_invalidate_accuracy_m: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            arrival_threshold_m: default_arrival_threshold_m(),
            reroute_distance_m: default_reroute_distance_m(),
            route_invalidate_accuracy_m: default_route_invalidate_accuracy_m(),
        }
    }
}

/// Route cache and retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// How long a computed route counts as fresh
    #[serde(default = "default_route_ttl_secs")]
    pub ttl_secs: u64,

    /// How long a route may serve as a stale fallback
    #[serde(default = "default_route_max_stale_secs")]
    pub max_stale_secs: u64,

    /// Maximum number of cached routes
    #[serde(default = "default_route_capacity")]
    pub capacity: usize,

    /// Grid tolerance for cache keys
    #[serde(default = "default_grid_meters")]
    pub grid_meters: f64,

    /// Directions attempts before falling back
    #[serde(default = "default_route_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_route_ttl_secs(),
            max_stale_secs: default_route_max_stale_secs(),
            capacity: default_route_capacity(),
            grid_meters: default_grid_meters(),
            max_attempts: default_route_max_attempts(),
        }
    }
}

/// Local storage settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the sealed credential store and key file
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the storage directory, falling back to the platform data dir
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("shopverse")
        })
    }
}

impl ConfigSchema {
    /// Check values that would make the tracking stack misbehave
    pub fn validate(&self) -> Result<()> {
        validate_url("backend.url", &self.backend.url)?;
        validate_url("directions.base_url", &self.directions.base_url)?;

        positive("location.accuracy_threshold_m", self.location.accuracy_threshold_m)?;
        non_negative("location.min_displacement_m", self.location.min_displacement_m)?;
        positive("tracking.arrival_threshold_m", self.tracking.arrival_threshold_m)?;
        positive("tracking.reroute_distance_m", self.tracking.reroute_distance_m)?;
        positive(
            "tracking.route_invalidate_accuracy_m",
            self.tracking.route_invalidate_accuracy_m,
        )?;
        positive("route.grid_meters", self.route.grid_meters)?;

        if self.backend.timeout_secs == 0 {
            return Err(Error::invalid_config_value("backend.timeout_secs", "must be > 0"));
        }
        if self.route.ttl_secs == 0 {
            return Err(Error::invalid_config_value("route.ttl_secs", "must be > 0"));
        }
        if self.route.max_stale_secs < self.route.ttl_secs {
            return Err(Error::invalid_config_value(
                "route.max_stale_secs",
                "must be at least route.ttl_secs",
            ));
        }
        if self.route.capacity == 0 {
            return Err(Error::invalid_config_value("route.capacity", "must be > 0"));
        }
        if self.route.max_attempts == 0 {
            return Err(Error::invalid_config_value("route.max_attempts", "must be > 0"));
        }

        Ok(())
    }
}

fn validate_url(key: &str, url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(Error::invalid_config_value(key, "must not be empty"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(Error::invalid_config_value(
            key,
            format!("`{url}` must start with http:// or https://"),
        ));
    }
    Ok(())
}

fn positive(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_config_value(key, format!("{value} must be > 0")))
    }
}

fn non_negative(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_config_value(key, format!("{value} must be >= 0")))
    }
}

// Default value functions
fn default_backend_url() -> String {
    "http://localhost:54321".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_directions_url() -> String {
    "https://maps.googleapis.com/maps/api/directions/json".to_string()
}
fn default_directions_timeout_secs() -> u64 {
    10
}
fn default_min_interval_ms() -> u64 {
    5_000
}
fn default_min_displacement_m() -> f64 {
    10.0
}
fn default_accuracy_threshold_m() -> f64 {
    100.0
}
fn default_arrival_threshold_m() -> f64 {
    50.0
}
fn default_reroute_distance_m() -> f64 {
    200.0
}
fn default_route_invalidate_accuracy_m() -> f64 {
    50.0
}
fn default_route_ttl_secs() -> u64 {
    600
}
fn default_route_max_stale_secs() -> u64 {
    1_800
}
fn default_route_capacity() -> usize {
    64
}
fn default_grid_meters() -> f64 {
    10.0
}
fn default_route_max_attempts() -> u32 {
    3
}
