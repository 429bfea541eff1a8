//! Core utilities for the ShopVerse delivery tracking stack
//!
//! This crate provides shared functionality used by every other crate in the
//! workspace:
//!
//! - **Error handling**: errors with codes, context, and recovery suggestions
//! - **Retry**: async exponential backoff with jitter, circuit breaker
//! - **Caching**: in-memory TTL cache with LRU eviction and a stale window
//! - **Single-flight**: coalescing of concurrent calls for the same key
//! - **Configuration**: TOML-based configuration with env overrides and validation
//!
//! # Example
//!
//! ```rust,no_run
//! use shopverse_core::config::Config;
//!
//! let config = Config::load(None).expect("invalid configuration");
//! println!("backend: {}", config.schema.backend.url);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod error;
pub mod retry;
pub mod singleflight;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{Cached, TtlCache, TtlCacheConfig};
    pub use crate::config::{Config, ConfigSchema};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
    pub use crate::retry::{retry_async, CircuitBreaker, RetryConfig, RetryError};
    pub use crate::singleflight::SingleFlight;
}
