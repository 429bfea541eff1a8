//! Trip state machine
//!
//! ```text
//! PENDING --first valid sample--> ACTIVE --within arrival threshold--> ARRIVED
//!    |                              |
//!    +-----------cancel-------------+------------------------------> CANCELLED
//! ```

use crate::error::{Result, TrackingError};
use crate::model::{LocationSample, Route, TripStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shopverse_geo::{haversine_distance_meters, Coordinate};
use std::sync::Arc;

/// One delivery being tracked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trip {
    /// Backend identifier
    pub trip_id: String,
    /// Where the trip ends
    pub destination: Coordinate,
    /// Latest route towards the destination
    pub route: Option<Arc<Route>>,
    /// Newest accepted sample
    pub last_sample: Option<LocationSample>,
    /// Lifecycle state
    pub status: TripStatus,
    /// Creation time
    pub started_at: DateTime<Utc>,
    /// Time of the last state change or accepted sample
    pub updated_at: DateTime<Utc>,
}

/// What applying a sample did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// The sample was ignored
    Rejected(RejectReason),
    /// The sample became the trip position
    Accepted {
        /// This sample moved the trip from PENDING to ACTIVE
        activated: bool,
        /// Straight-line distance to the destination
        distance_m: f64,
    },
    /// The sample is within the arrival threshold; the trip is over
    Arrived {
        /// This sample moved the trip from PENDING to ACTIVE first
        activated: bool,
        /// Straight-line distance to the destination
        distance_m: f64,
    },
}

/// Why a sample was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Captured at or before the last accepted sample
    OutOfOrder,
    /// The trip already ended
    Terminal,
}

impl Trip {
    /// New PENDING trip
    pub fn new(trip_id: impl Into<String>, destination: Coordinate, now: DateTime<Utc>) -> Self {
        Self {
            trip_id: trip_id.into(),
            destination,
            route: None,
            last_sample: None,
            status: TripStatus::Pending,
            started_at: now,
            updated_at: now,
        }
    }

    /// Straight-line distance from the last sample to the destination
    pub fn distance_remaining_m(&self) -> Option<f64> {
        self.last_sample
            .map(|s| haversine_distance_meters(&s.coordinate, &self.destination))
    }

    /// Advance the trip with a new sample
    pub fn apply_sample(&mut self, sample: LocationSample, arrival_threshold_m: f64) -> SampleOutcome {
        if self.status.is_terminal() {
            return SampleOutcome::Rejected(RejectReason::Terminal);
        }
        if self
            .last_sample
            .is_some_and(|last| sample.captured_at <= last.captured_at)
        {
            return SampleOutcome::Rejected(RejectReason::OutOfOrder);
        }

        let activated = self.status == TripStatus::Pending;
        self.status = TripStatus::Active;
        self.last_sample = Some(sample);
        self.updated_at = sample.captured_at;

        let distance_m = haversine_distance_meters(&sample.coordinate, &self.destination);
        if distance_m <= arrival_threshold_m {
            self.status = TripStatus::Arrived;
            SampleOutcome::Arrived { activated, distance_m }
        } else {
            SampleOutcome::Accepted { activated, distance_m }
        }
    }

    /// Stop the trip
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(TrackingError::InvalidTransition {
                from: self.status,
                to: TripStatus::Cancelled,
            });
        }
        self.status = TripStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Replace the route
    pub fn set_route(&mut self, route: Arc<Route>) {
        self.route = Some(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    const DESTINATION: Coordinate = Coordinate {
        latitude: 37.010,
        longitude: -122.010,
    };

    fn sample(secs: i64, latitude: f64, longitude: f64) -> LocationSample {
        LocationSample {
            coordinate: Coordinate::new(latitude, longitude),
            accuracy_m: 5.0,
            captured_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    fn trip() -> Trip {
        Trip::new("trip-1", DESTINATION, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn test_scenario_pending_active_arrived() {
        let mut trip = trip();
        assert_eq!(trip.status, TripStatus::Pending);

        match trip.apply_sample(sample(1, 37.000, -122.000), 50.0) {
            SampleOutcome::Accepted { activated, distance_m } => {
                assert!(activated);
                assert!((distance_m - 1423.0).abs() < 5.0);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(trip.status, TripStatus::Active);

        assert!(matches!(
            trip.apply_sample(sample(60, 37.005, -122.005), 50.0),
            SampleOutcome::Accepted { activated: false, .. }
        ));

        // ~28 m from the destination
        assert!(matches!(
            trip.apply_sample(sample(120, 37.0098, -122.0098), 50.0),
            SampleOutcome::Arrived { activated: false, .. }
        ));
        assert_eq!(trip.status, TripStatus::Arrived);
        assert!(trip.distance_remaining_m().unwrap() <= 50.0);

        assert_eq!(
            trip.apply_sample(sample(180, 37.0, -122.0), 50.0),
            SampleOutcome::Rejected(RejectReason::Terminal)
        );
    }

    #[test]
    fn test_out_of_order_sample_is_rejected() {
        let mut trip = trip();
        trip.apply_sample(sample(10, 37.0, -122.0), 50.0);
        assert_eq!(
            trip.apply_sample(sample(10, 37.001, -122.0), 50.0),
            SampleOutcome::Rejected(RejectReason::OutOfOrder)
        );
        assert_eq!(
            trip.apply_sample(sample(5, 37.001, -122.0), 50.0),
            SampleOutcome::Rejected(RejectReason::OutOfOrder)
        );
        assert_eq!(trip.last_sample.unwrap().coordinate.latitude, 37.0);
    }

    #[test]
    fn test_cancel_transitions() {
        let now = Utc::now();
        let mut pending = trip();
        pending.cancel(now).unwrap();
        assert_eq!(pending.status, TripStatus::Cancelled);
        assert!(matches!(
            pending.cancel(now),
            Err(TrackingError::InvalidTransition {
                from: TripStatus::Cancelled,
                to: TripStatus::Cancelled
            })
        ));

        let mut active = trip();
        active.apply_sample(sample(1, 37.0, -122.0), 50.0);
        active.cancel(now).unwrap();
        assert_eq!(active.status, TripStatus::Cancelled);

        let mut arrived = trip();
        arrived.apply_sample(sample(1, DESTINATION.latitude, DESTINATION.longitude), 50.0);
        assert_eq!(arrived.status, TripStatus::Arrived);
        assert!(arrived.cancel(now).is_err());
    }

    proptest! {
        #[test]
        fn prop_last_sample_time_never_decreases(
            offsets in proptest::collection::vec(-1_000i64..1_000, 1..60)
        ) {
            let mut trip = trip();
            let mut previous: Option<DateTime<Utc>> = None;

            for (i, secs) in offsets.into_iter().enumerate() {
                let lat = 36.9 - (i as f64) * 0.0001;
                let candidate = sample(secs, lat, -122.0);
                let before = trip.last_sample.map(|s| s.captured_at);
                let outcome = trip.apply_sample(candidate, 50.0);

                if before.is_some_and(|b| candidate.captured_at <= b) {
                    prop_assert_eq!(outcome, SampleOutcome::Rejected(RejectReason::OutOfOrder));
                    prop_assert_eq!(trip.last_sample.map(|s| s.captured_at), before);
                }

                let now = trip.last_sample.map(|s| s.captured_at);
                if let (Some(p), Some(n)) = (previous, now) {
                    prop_assert!(n >= p);
                }
                previous = now;
            }
        }
    }
}
