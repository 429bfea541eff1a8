//! Position push loop of one trip
//!
//! Only the newest report matters: a report that arrives while an older one
//! is being retried replaces it. Transient failures back off up to the
//! configured cap and retry until the trip's token is cancelled.

use super::TripEvent;
use crate::backend::TripBackend;
use crate::error::TrackingError;
use shopverse_api_client::PositionReport;
use shopverse_core::retry::RetryConfig;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(super) struct Pusher {
    pub trip_id: String,
    pub backend: Arc<dyn TripBackend>,
    pub reports: watch::Receiver<Option<PositionReport>>,
    pub cancel: CancellationToken,
    pub backoff: RetryConfig,
    pub events: broadcast::Sender<TripEvent>,
}

impl Pusher {
    pub async fn run(mut self) {
        let mut pending: Option<PositionReport> = None;
        let mut attempt = 0u32;

        loop {
            let Some(report) = pending.clone() else {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return,
                    changed = self.reports.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        pending = self.reports.borrow_and_update().clone();
                        attempt = 0;
                    }
                }
                continue;
            };

            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return,
                result = self.backend.push_position(&report) => result,
            };

            match result {
                Ok(()) => {
                    debug!(trip_id = %self.trip_id, captured_at = %report.captured_at, "Position pushed");
                    let _ = self.events.send(TripEvent::Pushed {
                        trip_id: self.trip_id.clone(),
                        captured_at: report.captured_at.clone(),
                    });
                    pending = None;
                }
                Err(TrackingError::SessionExpired | TrackingError::NotAuthenticated) => {
                    warn!(trip_id = %self.trip_id, "Session ended, position pushes stopped");
                    let _ = self.events.send(TripEvent::SessionExpired {
                        trip_id: self.trip_id.clone(),
                    });
                    return;
                }
                Err(error) => {
                    attempt = attempt.saturating_add(1);
                    let delay = self.backoff.delay_for_attempt(attempt);
                    warn!(
                        trip_id = %self.trip_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Position push failed"
                    );
                    let _ = self.events.send(TripEvent::PushFailed {
                        trip_id: self.trip_id.clone(),
                        attempt,
                        error: error.to_string(),
                    });

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return,
                        changed = self.reports.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            debug!(trip_id = %self.trip_id, "Failed report superseded");
                            pending = self.reports.borrow_and_update().clone();
                            attempt = 0;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
