//! Route computation with caching and stale fallback
//!
//! Routes are cached per (origin, destination) pair snapped to a grid, so
//! small movements reuse the same entry. A miss triggers one coalesced
//! directions call per key, retried with backoff on transient failures.
//! When every attempt fails the engine falls back to an older route for the
//! same key, then to the newest route towards the same destination, marking
//! the result stale.

mod google;

use crate::error::{Result, TrackingError};
use crate::model::Route;
use async_trait::async_trait;
use chrono::Utc;
use shopverse_api_client::DirectionsRoute;
use shopverse_core::cache::{CacheStats, TtlCache, TtlCacheConfig};
use shopverse_core::config::RouteConfig;
use shopverse_core::retry::{retry_async, RetryConfig};
use shopverse_core::singleflight::SingleFlight;
use shopverse_geo::{Coordinate, GridCell};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why the directions service produced no route
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectionsError {
    /// Connection problems, timeouts, 5xx and rate limiting
    #[error("directions service unreachable: {0}")]
    Network(String),
    /// The answer could not be understood
    #[error("malformed directions response: {0}")]
    Malformed(String),
    /// The service refused the request or found no route
    #[error("directions request rejected: {0}")]
    Rejected(String),
}

impl DirectionsError {
    /// Only network failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Something that can route between two points
#[async_trait]
pub trait DirectionsService: Send + Sync {
    /// Compute a route from `origin` to `destination`
    async fn directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> std::result::Result<DirectionsRoute, DirectionsError>;
}

/// Cache key: snapped origin and destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteKey {
    /// Snapped origin
    pub origin: GridCell,
    /// Snapped destination
    pub destination: GridCell,
}

/// Route engine tuning
#[derive(Debug, Clone)]
pub struct RouteEngineConfig {
    /// Grid tolerance for cache keys in meters
    pub grid_meters: f64,
    /// Freshness, stale window and capacity of the cache
    pub cache: TtlCacheConfig,
    /// Backoff between directions attempts
    pub retry: RetryConfig,
}

impl Default for RouteEngineConfig {
    fn default() -> Self {
        Self::from(&RouteConfig::default())
    }
}

impl From<&RouteConfig> for RouteEngineConfig {
    fn from(config: &RouteConfig) -> Self {
        Self {
            grid_meters: config.grid_meters,
            cache: TtlCacheConfig {
                ttl: Duration::from_secs(config.ttl_secs),
                max_stale: Duration::from_secs(config.max_stale_secs),
                capacity: config.capacity,
            },
            retry: RetryConfig::default().with_max_attempts(config.max_attempts),
        }
    }
}

/// Computes and caches routes
pub struct RouteEngine {
    service: Arc<dyn DirectionsService>,
    cache: TtlCache<RouteKey, Arc<Route>>,
    flights: SingleFlight<RouteKey, std::result::Result<Arc<Route>, DirectionsError>>,
    grid_meters: f64,
    retry: RetryConfig,
}

impl RouteEngine {
    /// Engine over `service`
    pub fn new(service: Arc<dyn DirectionsService>, config: RouteEngineConfig) -> Self {
        Self {
            service,
            cache: TtlCache::new(config.cache),
            flights: SingleFlight::new(),
            grid_meters: config.grid_meters,
            retry: config.retry,
        }
    }

    /// Snap a pair of points to their cache key
    pub fn key(&self, origin: &Coordinate, destination: &Coordinate) -> RouteKey {
        RouteKey {
            origin: GridCell::snap(origin, self.grid_meters),
            destination: GridCell::snap(destination, self.grid_meters),
        }
    }

    /// Route from `origin` to `destination`
    ///
    /// Returns a fresh cached route when there is one. Otherwise asks the
    /// directions service; if that fails the result is a stale fallback or
    /// [`TrackingError::RouteUnavailable`].
    pub async fn compute_route(&self, origin: Coordinate, destination: Coordinate) -> Result<Arc<Route>> {
        let key = self.key(&origin, &destination);

        if let Some(route) = self.cache.get_fresh(&key) {
            debug!(origin = %key.origin, destination = %key.destination, "Route cache hit");
            return Ok(route);
        }

        let outcome = self
            .flights
            .run(key, || self.fetch(key, origin, destination))
            .await;

        match outcome {
            Ok(route) => Ok(route),
            Err(error) => self.fallback(&key, &error),
        }
    }

    async fn fetch(
        &self,
        key: RouteKey,
        origin: Coordinate,
        destination: Coordinate,
    ) -> std::result::Result<Arc<Route>, DirectionsError> {
        if let Some(route) = self.cache.get_fresh(&key) {
            return Ok(route);
        }

        let outcome = retry_async(
            &self.retry,
            |_| self.service.directions(origin, destination),
            DirectionsError::is_transient,
        )
        .await;

        match outcome {
            Ok(done) => {
                let directions = done.value;
                let route = Arc::new(Route {
                    origin_id: key.origin.to_string(),
                    destination_id: key.destination.to_string(),
                    polyline: directions.polyline,
                    eta_seconds: directions.eta_seconds,
                    distance_meters: directions.distance_meters,
                    computed_at: Utc::now(),
                    stale: false,
                });
                info!(
                    origin = %route.origin_id,
                    destination = %route.destination_id,
                    eta_seconds = route.eta_seconds,
                    distance_meters = route.distance_meters,
                    attempts = done.attempts,
                    "Route computed"
                );
                self.cache.insert(key, Arc::clone(&route));
                Ok(route)
            }
            Err(failure) => {
                warn!(
                    origin = %key.origin,
                    destination = %key.destination,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "Directions failed"
                );
                Err(failure.error)
            }
        }
    }

    fn fallback(&self, key: &RouteKey, error: &DirectionsError) -> Result<Arc<Route>> {
        let cached = self
            .cache
            .get_any(key)
            .or_else(|| self.cache.latest_where(|k| k.destination == key.destination));

        match cached {
            Some(cached) => {
                debug!(age_secs = cached.age.as_secs(), "Serving stale route");
                Ok(mark_stale(cached.value))
            }
            None => Err(TrackingError::RouteUnavailable(error.to_string())),
        }
    }

    /// Stop treating the route between two points as fresh
    ///
    /// The entry stays available as a stale fallback.
    pub fn invalidate(&self, origin: &Coordinate, destination: &Coordinate) -> bool {
        let key = self.key(origin, destination);
        let expired = self.cache.expire(&key);
        if expired {
            debug!(origin = %key.origin, destination = %key.destination, "Route invalidated");
        }
        expired
    }

    /// Cache occupancy
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn mark_stale(route: Arc<Route>) -> Arc<Route> {
    if route.stale {
        return route;
    }
    Arc::new(Route {
        stale: true,
        ..Route::clone(&route)
    })
}
