//! Normalized, filtered device location
//!
//! A [`PositionSource`] produces raw fixes. The [`LocationProvider`] turns
//! them into [`LocationSample`] streams that drop inaccurate or invalid
//! fixes and thin the rest by time and distance. Each subscription opens its
//! own feed on first poll and ends with
//! [`TrackingError::LocationUnavailable`] when the feed fails or closes.

mod replay;

pub use replay::ReplaySource;

use crate::error::{Result, TrackingError};
use crate::model::LocationSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopverse_geo::{haversine_distance_meters, Coordinate};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Buffer between a source and one subscription
const FEED_BUFFER: usize = 64;

/// Fix as reported by the positioning hardware
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy_m: f64,
    /// When the fix was taken
    pub captured_at: DateTime<Utc>,
}

/// Failure reported by a positioning capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The user or platform refused location access
    #[error("location permission denied")]
    PermissionDenied,
    /// The hardware or service stopped delivering fixes
    #[error("{0}")]
    Failed(String),
}

/// Receiving end of a positioning feed
pub type FixFeed = mpsc::Receiver<std::result::Result<RawFix, LocationError>>;

/// A positioning capability
///
/// Every call to [`open`](PositionSource::open) starts an independent feed.
/// It is called from within the tokio runtime.
pub trait PositionSource: Send + Sync {
    /// Start delivering fixes; dropping the receiver stops the feed
    fn open(&self) -> FixFeed;
}

/// Source fed by a platform bridge or a test through [`publish`](ChannelSource::publish)
#[derive(Debug, Default)]
pub struct ChannelSource {
    feeds: Mutex<Vec<mpsc::Sender<std::result::Result<RawFix, LocationError>>>>,
}

impl ChannelSource {
    /// Source with no open feeds
    pub fn new() -> Self {
        Self::default()
    }

    fn broadcast(&self, item: &std::result::Result<RawFix, LocationError>) {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        feeds.retain(|feed| match feed.try_send(item.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Location feed full, dropping fix");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Deliver a fix to every open feed
    pub fn publish(&self, fix: RawFix) {
        self.broadcast(&Ok(fix));
    }

    /// Report a failure to every open feed
    pub fn fail(&self, error: LocationError) {
        self.broadcast(&Err(error));
    }

    /// Close every open feed
    pub fn close(&self) {
        self.feeds.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Number of feeds still open
    pub fn open_feeds(&self) -> usize {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        feeds.retain(|feed| !feed.is_closed());
        feeds.len()
    }
}

impl PositionSource for ChannelSource {
    fn open(&self) -> FixFeed {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        self.feeds.lock().unwrap_or_else(PoisonError::into_inner).push(tx);
        rx
    }
}

/// Why a fix was not emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Latitude or longitude out of range
    InvalidCoordinate,
    /// Accuracy radius above the threshold
    PoorAccuracy,
    /// Not newer than the last emitted sample
    OutOfOrder,
    /// Too soon after the last emitted sample
    TooSoon,
    /// Too close to the last emitted sample
    TooClose,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidCoordinate => "invalid coordinate",
            Self::PoorAccuracy => "poor accuracy",
            Self::OutOfOrder => "out of order",
            Self::TooSoon => "too soon",
            Self::TooClose => "too close",
        })
    }
}

/// Per-subscription thinning of raw fixes
#[derive(Debug, Clone)]
pub struct SampleFilter {
    accuracy_threshold_m: f64,
    min_interval: chrono::Duration,
    min_displacement_m: f64,
    last: Option<LocationSample>,
}

impl SampleFilter {
    /// Filter with the given thresholds and no history
    pub fn new(accuracy_threshold_m: f64, min_interval: Duration, min_displacement_m: f64) -> Self {
        Self {
            accuracy_threshold_m,
            min_interval: chrono::Duration::from_std(min_interval).unwrap_or(chrono::Duration::MAX),
            min_displacement_m,
            last: None,
        }
    }

    /// Admit `fix` as the next sample or say why not
    pub fn accept(&mut self, fix: RawFix) -> std::result::Result<LocationSample, DropReason> {
        let coordinate = Coordinate::new(fix.latitude, fix.longitude);
        if !coordinate.is_valid() {
            return Err(DropReason::InvalidCoordinate);
        }
        if !(fix.accuracy_m <= self.accuracy_threshold_m) {
            return Err(DropReason::PoorAccuracy);
        }

        if let Some(last) = &self.last {
            if fix.captured_at <= last.captured_at {
                return Err(DropReason::OutOfOrder);
            }
            if fix.captured_at - last.captured_at < self.min_interval {
                return Err(DropReason::TooSoon);
            }
            if haversine_distance_meters(&last.coordinate, &coordinate) < self.min_displacement_m {
                return Err(DropReason::TooClose);
            }
        }

        let sample = LocationSample {
            coordinate,
            accuracy_m: fix.accuracy_m,
            captured_at: fix.captured_at,
        };
        self.last = Some(sample);
        Ok(sample)
    }
}

/// Creates location subscriptions over one positioning capability
#[derive(Clone)]
pub struct LocationProvider {
    source: Arc<dyn PositionSource>,
    accuracy_threshold_m: f64,
}

impl LocationProvider {
    /// Provider dropping fixes less accurate than `accuracy_threshold_m`
    pub fn new(source: Arc<dyn PositionSource>, accuracy_threshold_m: f64) -> Self {
        Self {
            source,
            accuracy_threshold_m,
        }
    }

    /// Accuracy threshold in meters
    pub fn accuracy_threshold_m(&self) -> f64 {
        self.accuracy_threshold_m
    }

    /// Start a lazy, independent stream of samples
    ///
    /// Nothing is opened until the first call to
    /// [`LocationSubscription::next`].
    pub fn subscribe(&self, min_interval: Duration, min_displacement_m: f64) -> LocationSubscription {
        LocationSubscription {
            source: Arc::clone(&self.source),
            feed: None,
            filter: SampleFilter::new(self.accuracy_threshold_m, min_interval, min_displacement_m),
            cancel: CancellationToken::new(),
            finished: false,
        }
    }
}

/// Cancels a subscription from elsewhere
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    cancel: CancellationToken,
}

impl SubscriptionHandle {
    /// End the stream; the next poll returns `None`
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the stream was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Stream of filtered samples
pub struct LocationSubscription {
    source: Arc<dyn PositionSource>,
    feed: Option<FixFeed>,
    filter: SampleFilter,
    cancel: CancellationToken,
    finished: bool,
}

impl LocationSubscription {
    /// Handle that cancels this subscription
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Next accepted sample
    ///
    /// Returns `None` once cancelled or after the terminal error was yielded.
    pub async fn next(&mut self) -> Option<Result<LocationSample>> {
        if self.finished {
            return None;
        }
        let feed = self.feed.get_or_insert_with(|| self.source.open());

        loop {
            let item = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    self.finished = true;
                    return None;
                }
                item = feed.recv() => item,
            };

            match item {
                Some(Ok(fix)) => match self.filter.accept(fix) {
                    Ok(sample) => return Some(Ok(sample)),
                    Err(reason) => trace!(%reason, accuracy_m = fix.accuracy_m, "Fix dropped"),
                },
                Some(Err(error)) => {
                    warn!(%error, "Positioning failed");
                    self.finished = true;
                    return Some(Err(TrackingError::LocationUnavailable(error.to_string())));
                }
                None => {
                    debug!("Positioning feed closed");
                    self.finished = true;
                    return Some(Err(TrackingError::LocationUnavailable(
                        "positioning feed closed".to_string(),
                    )));
                }
            }
        }
    }
}
