//! Delivery tracking for the ShopVerse customer app
//!
//! This crate ties together the pieces behind live order tracking:
//!
//! - **Session**: encrypted credential storage and single-flight token refresh
//! - **Location**: filtered position streams from a platform or replay source
//! - **Routing**: cached directions with stale fallback
//! - **Coordination**: the trip state machine and position pushes
//!
//! # Example
//!
//! ```rust,no_run
//! use shopverse_geo::Coordinate;
//! use shopverse_tracking::coordinator::{self, CoordinatorConfig, CoordinatorDeps};
//!
//! # async fn run(deps: CoordinatorDeps) -> shopverse_tracking::Result<()> {
//! let (handle, _task) = coordinator::spawn(deps, CoordinatorConfig::default());
//! let trip = handle.start_trip(Coordinate::new(37.01, -122.01), None).await?;
//! println!("tracking {}", trip.trip_id);
//!
//! let finished = handle.wait_until_finished().await?;
//! println!("{} is {}", finished.trip_id, finished.status);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod coordinator;
pub mod error;
pub mod location;
pub mod model;
pub mod route;
pub mod session;
pub mod storage;
pub mod token_store;

pub use coordinator::{CoordinatorConfig, CoordinatorDeps, CoordinatorHandle, Trip, TripEvent};
pub use error::{Result, TrackingError};
pub use model::{Credential, LocationSample, Route, TripStatus};
pub use session::SessionManager;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backend::{OrderHistory, SupabaseAuthBackend, SupabaseTripBackend, TripBackend};
    pub use crate::coordinator::{
        spawn, CoordinatorConfig, CoordinatorDeps, CoordinatorHandle, SampleOutcome, Trip, TripEvent,
    };
    pub use crate::error::{Result, TrackingError};
    pub use crate::location::{ChannelSource, LocationProvider, PositionSource, RawFix, ReplaySource};
    pub use crate::model::{Credential, LocationSample, Route, TripStatus};
    pub use crate::route::{DirectionsService, RouteEngine, RouteEngineConfig};
    pub use crate::session::{AuthBackend, SessionManager};
    pub use crate::storage::{EncryptedFileStorage, MemoryStorage, SecureStorage};
    pub use crate::token_store::TokenStore;
}
