//! HTTP clients for the ShopVerse backend and the directions service
//!
//! This crate provides a resilient client for the Supabase project behind
//! the ShopVerse customer app (Auth and PostgREST) plus a thin client for
//! the Google Directions JSON API.
//!
//! # Features
//!
//! - **Environment-based configuration**: Load URLs and keys from environment variables
//! - **Retry with exponential backoff**: Automatic retry for transient failures
//! - **Circuit breaker**: Prevent cascading failures during outages
//! - **Request correlation**: Every request carries a unique `X-Request-ID`
//!
//! # Example
//!
//! ```rust,no_run
//! use shopverse_api_client::{ClientConfig, ShopverseClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ShopverseClient::with_config(ClientConfig::from_env()?)?;
//!
//!     let session = client.auth().sign_in_with_password("ada@example.com", "secret").await?;
//!     let user = client.auth().user(&session.access_token).await?;
//!     let orders = client.orders().list(&session.access_token, &user.id, None).await?;
//!     println!("{} orders", orders.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;

#[cfg(test)]
mod test_support;

pub use client::ShopverseClient;
pub use config::{ClientConfig, DirectionsClientConfig, Environment};
pub use endpoints::{AuthSession, DirectionsApi, DirectionsRoute, Order, OrderItem, PositionReport, User};
pub use error::{ApiError, ApiResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::client::ShopverseClient;
    pub use crate::config::{ClientConfig, DirectionsClientConfig, Environment};
    pub use crate::endpoints::{
        AuthApi, AuthSession, DirectionsApi, DirectionsRoute, Order, OrdersApi, PositionReport, TripsApi, User,
    };
    pub use crate::error::{ApiError, ApiResult};
}
