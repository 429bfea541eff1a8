//! Trip coordination actor
//!
//! One tokio task owns the current [`Trip`] and processes commands from
//! [`CoordinatorHandle`]s plus results from the tasks it spawns (location
//! feed, route computation). Position pushes run in a per-trip task fed
//! through a `watch` channel so only the newest report is ever retried.
//!
//! Every trip owns a [`CancellationToken`]; finishing the trip cancels its
//! location subscription, route computation and pushes, discarding results
//! still in flight.

mod push;
mod trip;

pub use trip::{RejectReason, SampleOutcome, Trip};

use crate::backend::TripBackend;
use crate::error::{Result, TrackingError};
use crate::location::{LocationProvider, SubscriptionHandle};
use crate::model::{LocationSample, Route, TripStatus};
use crate::route::RouteEngine;
use chrono::Utc;
use push::Pusher;
use serde::Serialize;
use shopverse_api_client::PositionReport;
use shopverse_core::config::ConfigSchema;
use shopverse_core::retry::{retry_async, RetryConfig};
use shopverse_geo::{haversine_distance_meters, Coordinate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMMAND_BUFFER: usize = 32;
const INTERNAL_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;

/// Coordinator thresholds
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Distance to the destination at which a trip is ARRIVED
    pub arrival_threshold_m: f64,
    /// Distance from the route origin after which a new route is computed
    pub reroute_distance_m: f64,
    /// Samples less accurate than this invalidate the current route
    pub route_invalidate_accuracy_m: f64,
    /// Minimum time between samples
    pub min_interval: Duration,
    /// Minimum distance between samples
    pub min_displacement_m: f64,
    /// Backoff shape for position pushes; the attempt budget is ignored
    pub push_backoff: RetryConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&ConfigSchema::default())
    }
}

impl From<&ConfigSchema> for CoordinatorConfig {
    fn from(schema: &ConfigSchema) -> Self {
        Self {
            arrival_threshold_m: schema.tracking.arrival_threshold_m,
            reroute_distance_m: schema.tracking.reroute_distance_m,
            route_invalidate_accuracy_m: schema.tracking.route_invalidate_accuracy_m,
            min_interval: schema.location.min_interval(),
            min_displacement_m: schema.location.min_displacement_m,
            push_backoff: RetryConfig {
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(60),
                ..RetryConfig::default()
            },
        }
    }
}

/// Collaborators of the coordinator
pub struct CoordinatorDeps {
    /// Device positions
    pub location: LocationProvider,
    /// Routes towards the destination
    pub routes: Arc<RouteEngine>,
    /// Position and status sink
    pub backend: Arc<dyn TripBackend>,
}

/// Something that happened to the current trip
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TripEvent {
    /// A trip was created in PENDING
    Started { trip_id: String, destination: Coordinate },
    /// The first valid sample arrived
    Activated { trip_id: String },
    /// A sample was accepted
    Position {
        trip_id: String,
        sample: LocationSample,
        distance_m: f64,
    },
    /// A route was computed or taken from cache
    RouteUpdated {
        trip_id: String,
        eta_seconds: u64,
        distance_meters: u64,
        stale: bool,
    },
    /// No route could be produced
    RouteUnavailable { trip_id: String, reason: String },
    /// A position report reached the backend
    Pushed { trip_id: String, captured_at: String },
    /// A position report failed and will be retried
    PushFailed {
        trip_id: String,
        attempt: u32,
        error: String,
    },
    /// Pushes stopped because the user must sign in again
    SessionExpired { trip_id: String },
    /// The location feed ended; resubscribe to continue
    LocationLost { trip_id: String, reason: String },
    /// The destination was reached
    Arrived { trip_id: String },
    /// The trip was cancelled
    Cancelled { trip_id: String },
}

enum Command {
    Start {
        trip_id: Option<String>,
        destination: Coordinate,
        reply: oneshot::Sender<Result<Trip>>,
    },
    Cancel {
        trip_id: String,
        reply: oneshot::Sender<Result<Trip>>,
    },
    Snapshot {
        reply: oneshot::Sender<Option<Trip>>,
    },
    Resubscribe {
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown,
}

enum Internal {
    Sample {
        trip_id: String,
        generation: u64,
        sample: LocationSample,
    },
    LocationLost {
        trip_id: String,
        generation: u64,
        reason: String,
    },
    RouteReady {
        trip_id: String,
        origin: Coordinate,
        result: std::result::Result<Arc<Route>, String>,
    },
}

/// Client side of the coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<TripEvent>,
    state: watch::Receiver<Option<Trip>>,
}

impl CoordinatorHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| TrackingError::CoordinatorClosed)?;
        response.await.map_err(|_| TrackingError::CoordinatorClosed)
    }

    /// Start a trip towards `destination`
    ///
    /// Fails with [`TrackingError::TripAlreadyActive`] while another trip is
    /// PENDING or ACTIVE. Without a `trip_id` a random one is assigned.
    pub async fn start_trip(&self, destination: Coordinate, trip_id: Option<String>) -> Result<Trip> {
        self.request(|reply| Command::Start {
            trip_id,
            destination,
            reply,
        })
        .await?
    }

    /// Cancel the current trip
    pub async fn cancel_trip(&self, trip_id: &str) -> Result<Trip> {
        let trip_id = trip_id.to_string();
        self.request(|reply| Command::Cancel { trip_id, reply }).await?
    }

    /// Current trip as the coordinator sees it
    pub async fn snapshot(&self) -> Result<Option<Trip>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Reopen the location feed of the current trip
    pub async fn resubscribe(&self) -> Result<()> {
        self.request(|reply| Command::Resubscribe { reply }).await?
    }

    /// Stop the coordinator, cancelling any trip in progress
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// Subscribe to trip events
    pub fn events(&self) -> broadcast::Receiver<TripEvent> {
        self.events.subscribe()
    }

    /// Last published trip state, without a round trip to the actor
    pub fn current(&self) -> Option<Trip> {
        self.state.borrow().clone()
    }

    /// Latest trip state, updated on every change
    pub fn watch(&self) -> watch::Receiver<Option<Trip>> {
        self.state.clone()
    }

    /// Wait until the current trip is ARRIVED or CANCELLED
    pub async fn wait_until_finished(&self) -> Result<Trip> {
        let mut state = self.state.clone();
        let trip = state
            .wait_for(|trip| trip.as_ref().is_some_and(|t| t.status.is_terminal()))
            .await
            .map_err(|_| TrackingError::CoordinatorClosed)?;
        trip.clone().ok_or(TrackingError::CoordinatorClosed)
    }
}

/// Start the coordinator task
pub fn spawn(deps: CoordinatorDeps, config: CoordinatorConfig) -> (CoordinatorHandle, JoinHandle<()>) {
    let (actor, handle) = Actor::new(deps, config);
    let task = tokio::spawn(actor.run());
    (handle, task)
}

/// Runtime resources of a non-terminal trip
struct ActiveTrip {
    cancel: CancellationToken,
    subscription: SubscriptionHandle,
    generation: u64,
    reports: watch::Sender<Option<PositionReport>>,
    route_origin: Option<Coordinate>,
    route_in_flight: bool,
    route_suspect: bool,
}

struct Actor {
    deps: CoordinatorDeps,
    config: CoordinatorConfig,
    commands: mpsc::Receiver<Command>,
    internal_tx: mpsc::Sender<Internal>,
    internal_rx: mpsc::Receiver<Internal>,
    events: broadcast::Sender<TripEvent>,
    state: watch::Sender<Option<Trip>>,
    trip: Option<Trip>,
    active: Option<ActiveTrip>,
    generation: u64,
}

impl Actor {
    fn new(deps: CoordinatorDeps, config: CoordinatorConfig) -> (Self, CoordinatorHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (internal_tx, internal_rx) = mpsc::channel(INTERNAL_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (state, state_rx) = watch::channel(None);

        let actor = Self {
            deps,
            config,
            commands,
            internal_tx,
            internal_rx,
            events: events.clone(),
            state,
            trip: None,
            active: None,
            generation: 0,
        };
        let handle = CoordinatorHandle {
            commands: commands_tx,
            events,
            state: state_rx,
        };
        (actor, handle)
    }

    async fn run(mut self) {
        debug!("Coordinator started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(message) = self.internal_rx.recv() => self.handle_internal(message),
            }
        }

        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.subscription.cancel();
        }
        debug!("Coordinator stopped");
    }

    fn emit(&self, event: TripEvent) {
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        self.state.send_replace(self.trip.clone());
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start {
                trip_id,
                destination,
                reply,
            } => {
                let _ = reply.send(self.start(trip_id, destination));
            }
            Command::Cancel { trip_id, reply } => {
                let _ = reply.send(self.cancel(&trip_id));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.trip.clone());
            }
            Command::Resubscribe { reply } => {
                let _ = reply.send(self.resubscribe());
            }
            Command::Shutdown => {}
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Sample {
                trip_id,
                generation,
                sample,
            } => self.on_sample(&trip_id, generation, sample),
            Internal::LocationLost {
                trip_id,
                generation,
                reason,
            } => {
                let current = self.active.as_ref().is_some_and(|a| a.generation == generation);
                if current && self.is_current(&trip_id) {
                    warn!(trip_id = %trip_id, reason = %reason, "Location lost");
                    self.emit(TripEvent::LocationLost { trip_id, reason });
                }
            }
            Internal::RouteReady {
                trip_id,
                origin,
                result,
            } => self.on_route(trip_id, origin, result),
        }
    }

    fn is_current(&self, trip_id: &str) -> bool {
        self.trip.as_ref().is_some_and(|t| t.trip_id == trip_id)
    }

    fn start(&mut self, trip_id: Option<String>, destination: Coordinate) -> Result<Trip> {
        if let Some(current) = self.trip.as_ref().filter(|t| !t.status.is_terminal()) {
            return Err(TrackingError::TripAlreadyActive {
                trip_id: current.trip_id.clone(),
            });
        }

        let trip_id = trip_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let trip = Trip::new(trip_id.clone(), destination, Utc::now());
        let cancel = CancellationToken::new();
        let (subscription, generation) = self.spawn_location(&trip_id, &cancel);

        let (reports, reports_rx) = watch::channel(None);
        tokio::spawn(
            Pusher {
                trip_id: trip_id.clone(),
                backend: Arc::clone(&self.deps.backend),
                reports: reports_rx,
                cancel: cancel.clone(),
                backoff: self.config.push_backoff.clone(),
                events: self.events.clone(),
            }
            .run(),
        );

        self.active = Some(ActiveTrip {
            cancel,
            subscription,
            generation,
            reports,
            route_origin: None,
            route_in_flight: false,
            route_suspect: false,
        });
        self.trip = Some(trip.clone());

        info!(trip_id = %trip_id, destination = %destination, "Trip started");
        self.emit(TripEvent::Started { trip_id, destination });
        self.publish();
        Ok(trip)
    }

    fn cancel(&mut self, trip_id: &str) -> Result<Trip> {
        let trip = self
            .trip
            .as_mut()
            .filter(|t| t.trip_id == trip_id)
            .ok_or_else(|| TrackingError::TripNotFound(trip_id.to_string()))?;
        trip.cancel(Utc::now())?;
        let trip = trip.clone();
        self.finish(&trip);
        Ok(trip)
    }

    fn resubscribe(&mut self) -> Result<()> {
        let Some(trip_id) = self
            .trip
            .as_ref()
            .filter(|_| self.active.is_some())
            .map(|t| t.trip_id.clone())
        else {
            return Err(TrackingError::TripNotFound("no trip in progress".to_string()));
        };
        let Some(cancel) = self.active.as_ref().map(|a| a.cancel.clone()) else {
            return Err(TrackingError::TripNotFound(trip_id));
        };

        let (subscription, generation) = self.spawn_location(&trip_id, &cancel);
        if let Some(active) = self.active.as_mut() {
            active.subscription.cancel();
            active.subscription = subscription;
            active.generation = generation;
        }
        info!(trip_id = %trip_id, "Location resubscribed");
        Ok(())
    }

    fn spawn_location(&mut self, trip_id: &str, cancel: &CancellationToken) -> (SubscriptionHandle, u64) {
        self.generation += 1;
        let generation = self.generation;
        let mut subscription = self
            .deps
            .location
            .subscribe(self.config.min_interval, self.config.min_displacement_m);
        let handle = subscription.handle();
        let tx = self.internal_tx.clone();
        let trip_id = trip_id.to_string();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    item = subscription.next() => item,
                };
                let message = match item {
                    Some(Ok(sample)) => Internal::Sample {
                        trip_id: trip_id.clone(),
                        generation,
                        sample,
                    },
                    Some(Err(error)) => Internal::LocationLost {
                        trip_id: trip_id.clone(),
                        generation,
                        reason: error.to_string(),
                    },
                    None => return,
                };
                let lost = matches!(message, Internal::LocationLost { .. });
                if tx.send(message).await.is_err() || lost {
                    return;
                }
            }
        });

        (handle, generation)
    }

    fn on_sample(&mut self, trip_id: &str, generation: u64, sample: LocationSample) {
        let (Some(trip), Some(active)) = (self.trip.as_mut(), self.active.as_mut()) else {
            return;
        };
        // A restarted trip may reuse the id; samples queued by an earlier feed
        // carry an older generation.
        if trip.trip_id != trip_id || active.generation != generation {
            debug!(trip_id = %trip_id, generation, "Sample from a closed feed dropped");
            return;
        }

        let (activated, distance_m, arrived) = match trip.apply_sample(sample, self.config.arrival_threshold_m) {
            SampleOutcome::Rejected(reason) => {
                debug!(trip_id = %trip_id, ?reason, "Sample ignored");
                return;
            }
            SampleOutcome::Accepted { activated, distance_m } => (activated, distance_m, false),
            SampleOutcome::Arrived { activated, distance_m } => (activated, distance_m, true),
        };

        let mut events = Vec::with_capacity(2);
        if activated {
            info!(trip_id = %trip_id, "Trip active");
            events.push(TripEvent::Activated {
                trip_id: trip_id.to_string(),
            });
        }
        events.push(TripEvent::Position {
            trip_id: trip_id.to_string(),
            sample,
            distance_m,
        });

        let mut reroute = false;
        if !arrived {
            if sample.accuracy_m > self.config.route_invalidate_accuracy_m {
                if let Some(origin) = active.route_origin {
                    self.deps.routes.invalidate(&origin, &trip.destination);
                }
                active.route_suspect = true;
            }

            reroute = match (&trip.route, active.route_origin) {
                (Some(route), Some(origin)) => {
                    route.stale
                        || (active.route_suspect && sample.accuracy_m <= self.config.route_invalidate_accuracy_m)
                        || haversine_distance_meters(&origin, &sample.coordinate) > self.config.reroute_distance_m
                }
                _ => true,
            };

            active.reports.send_replace(Some(PositionReport {
                trip_id: trip_id.to_string(),
                latitude: sample.coordinate.latitude,
                longitude: sample.coordinate.longitude,
                accuracy_m: sample.accuracy_m,
                captured_at: sample.captured_at.to_rfc3339(),
                eta_seconds: trip.route.as_ref().map(|r| r.eta_seconds),
            }));
        }

        for event in events {
            self.emit(event);
        }

        if arrived {
            info!(trip_id = %trip_id, distance_m, "Trip arrived");
            if let Some(trip) = self.trip.clone() {
                self.finish(&trip);
            }
        } else {
            self.publish();
            if reroute {
                self.request_route(sample.coordinate);
            }
        }
    }

    fn request_route(&mut self, origin: Coordinate) {
        let (Some(trip), Some(active)) = (self.trip.as_ref(), self.active.as_mut()) else {
            return;
        };
        if active.route_in_flight {
            return;
        }
        active.route_in_flight = true;

        let routes = Arc::clone(&self.deps.routes);
        let tx = self.internal_tx.clone();
        let cancel = active.cancel.clone();
        let trip_id = trip.trip_id.clone();
        let destination = trip.destination;

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                result = routes.compute_route(origin, destination) => result,
            };
            let _ = tx
                .send(Internal::RouteReady {
                    trip_id,
                    origin,
                    result: result.map_err(|e| e.to_string()),
                })
                .await;
        });
    }

    fn on_route(&mut self, trip_id: String, origin: Coordinate, result: std::result::Result<Arc<Route>, String>) {
        let (Some(trip), Some(active)) = (self.trip.as_mut(), self.active.as_mut()) else {
            return;
        };
        if trip.trip_id != trip_id {
            return;
        }
        active.route_in_flight = false;

        match result {
            Ok(route) => {
                debug!(trip_id = %trip_id, eta_seconds = route.eta_seconds, stale = route.stale, "Route updated");
                let event = TripEvent::RouteUpdated {
                    trip_id,
                    eta_seconds: route.eta_seconds,
                    distance_meters: route.distance_meters,
                    stale: route.stale,
                };
                trip.set_route(route);
                active.route_origin = Some(origin);
                active.route_suspect = false;
                self.emit(event);
                self.publish();
            }
            Err(reason) => {
                warn!(trip_id = %trip_id, reason = %reason, "Route unavailable");
                self.emit(TripEvent::RouteUnavailable { trip_id, reason });
            }
        }
    }

    /// Tear down a trip that just became terminal
    fn finish(&mut self, trip: &Trip) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.subscription.cancel();
        }

        let backend = Arc::clone(&self.deps.backend);
        let backoff = self.config.push_backoff.clone();
        let trip_id = trip.trip_id.clone();
        let status = trip.status;
        tokio::spawn(async move {
            let outcome = retry_async(
                &backoff,
                |_| backend.report_status(&trip_id, status),
                TrackingError::is_transient,
            )
            .await;
            match outcome {
                Ok(_) => debug!(trip_id = %trip_id, %status, "Trip status reported"),
                Err(e) => warn!(trip_id = %trip_id, %status, error = %e.error, "Trip status not reported"),
            }
        });

        let event = match trip.status {
            TripStatus::Cancelled => TripEvent::Cancelled {
                trip_id: trip.trip_id.clone(),
            },
            _ => TripEvent::Arrived {
                trip_id: trip.trip_id.clone(),
            },
        };
        info!(trip_id = %trip.trip_id, status = %trip.status, "Trip finished");
        self.emit(event);
        self.publish();
    }
}
