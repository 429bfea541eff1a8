//! Endpoint-specific API implementations
//!
//! Each module provides a typed interface for a specific set of backend endpoints.
//!
//! | Module | Backend | Description |
//! |--------|---------|-------------|
//! | `auth` | `auth/v1` | Password sign-in, token refresh, sign-out, current user |
//! | `trips` | `rest/v1/trip_positions`, `rest/v1/trips` | Live position rows and trip status |
//! | `orders` | `rest/v1/orders` | Order history |
//! | `directions` | Google Directions JSON API | Polyline, ETA and distance between two points |

pub mod auth;
pub mod directions;
pub mod orders;
pub mod trips;

pub use auth::{AuthApi, AuthSession, User};
pub use directions::{DirectionsApi, DirectionsRoute};
pub use orders::{Order, OrderItem, OrdersApi};
pub use trips::{PositionReport, TripsApi};
