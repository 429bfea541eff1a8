//! Live trip tracking against a recorded location feed

use crate::context::AppContext;
use crate::output::{format_distance, format_duration, json_line, Format, Status};
use owo_colors::OwoColorize;
use shopverse_core::Result;
use shopverse_geo::Coordinate;
use shopverse_tracking::backend::SupabaseTripBackend;
use shopverse_tracking::coordinator::{self, CoordinatorConfig, CoordinatorDeps, CoordinatorHandle};
use shopverse_tracking::location::{LocationProvider, ReplaySource};
use shopverse_tracking::{TrackingError, TripEvent, TripStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

pub struct TrackArgs<'a> {
    pub destination: Coordinate,
    pub replay: &'a Path,
    pub trip_id: Option<String>,
    pub pace: Duration,
}

enum Ending {
    Finished,
    Interrupted,
    LocationLost(String),
}

pub async fn run(ctx: &AppContext, args: TrackArgs<'_>, format: Format) -> Result<()> {
    if ctx.session.current()?.is_none() {
        return Err(TrackingError::NotAuthenticated.into());
    }

    let source = ReplaySource::from_path(args.replay, args.pace)?;
    if source.is_empty() {
        return Err(TrackingError::LocationUnavailable(format!("{} has no fixes", args.replay.display())).into());
    }
    debug!(fixes = source.len(), "Replay loaded");

    let schema = &ctx.config.schema;
    let deps = CoordinatorDeps {
        location: LocationProvider::new(Arc::new(source), schema.location.accuracy_threshold_m),
        routes: ctx.route_engine()?,
        backend: Arc::new(SupabaseTripBackend::new(ctx.client.clone(), ctx.session.clone())),
    };
    let (handle, task) = coordinator::spawn(deps, CoordinatorConfig::from(schema));

    let mut events = handle.events();
    let trip = handle.start_trip(args.destination, args.trip_id).await?;
    if !format.is_json() {
        Status::info(&format!("Trip {} towards {}", trip.trip_id.bold(), args.destination));
    }

    let ending = follow(&handle, &trip.trip_id, &mut events, format).await;

    let outcome = match ending {
        Ending::Finished => Ok(()),
        Ending::Interrupted => {
            cancel(&handle, &trip.trip_id).await;
            Ok(())
        }
        Ending::LocationLost(reason) => {
            cancel(&handle, &trip.trip_id).await;
            Err(TrackingError::LocationUnavailable(reason).into())
        }
    };

    if let Ok(Some(last)) = handle.snapshot().await {
        summarize(&last, format);
    }
    handle.shutdown().await;
    if let Err(e) = task.await {
        warn!(error = %e, "Coordinator task failed");
    }
    outcome
}

async fn follow(
    handle: &CoordinatorHandle,
    trip_id: &str,
    events: &mut tokio::sync::broadcast::Receiver<TripEvent>,
    format: Format,
) -> Ending {
    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !format.is_json() {
                    Status::warning("Interrupted, cancelling trip");
                }
                return Ending::Interrupted;
            }
            event = events.recv() => event,
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Trip events dropped");
                continue;
            }
            Err(RecvError::Closed) => return Ending::Finished,
        };

        print_event(&event, format);

        match event {
            TripEvent::Arrived { trip_id: id } | TripEvent::Cancelled { trip_id: id } if id == trip_id => {
                return Ending::Finished;
            }
            TripEvent::LocationLost { reason, .. } => return Ending::LocationLost(reason),
            _ => {}
        }

        if handle.current().is_some_and(|t| t.status.is_terminal()) {
            return Ending::Finished;
        }
    }
}

async fn cancel(handle: &CoordinatorHandle, trip_id: &str) {
    match handle.cancel_trip(trip_id).await {
        Ok(_) | Err(TrackingError::InvalidTransition { .. }) => {}
        Err(e) => warn!(trip_id, error = %e, "Could not cancel trip"),
    }
}

fn print_event(event: &TripEvent, format: Format) {
    if format.is_json() {
        json_line(event);
        return;
    }

    match event {
        TripEvent::Started { .. } | TripEvent::Pushed { .. } | TripEvent::Cancelled { .. } => {}
        TripEvent::Activated { .. } => Status::success("First position received, trip active"),
        TripEvent::Position { sample, distance_m, .. } => {
            println!(
                "  {}  {}  {} to go",
                sample.captured_at.format("%H:%M:%S").dimmed(),
                sample.coordinate,
                format_distance(*distance_m).bold()
            );
        }
        TripEvent::RouteUpdated {
            eta_seconds,
            distance_meters,
            stale,
            ..
        } => {
            let line = format!(
                "Route: {} ({})",
                format_duration(Duration::from_secs(*eta_seconds)),
                format_distance(*distance_meters as f64)
            );
            if *stale {
                Status::warning(&format!("{line}, cached"));
            } else {
                Status::info(&line);
            }
        }
        TripEvent::RouteUnavailable { reason, .. } => Status::warning(&format!("No route: {reason}")),
        TripEvent::PushFailed { attempt, error, .. } => {
            Status::warning(&format!("Position upload failed (attempt {attempt}): {error}"));
        }
        TripEvent::SessionExpired { .. } => {
            Status::error("Session expired, positions are no longer uploaded. Run `shopverse-track login`");
        }
        TripEvent::LocationLost { reason, .. } => Status::warning(&format!("Location lost: {reason}")),
        TripEvent::Arrived { .. } => Status::success("Arrived"),
    }
}

fn summarize(trip: &shopverse_tracking::Trip, format: Format) {
    if format.is_json() {
        json_line(trip);
        return;
    }

    Status::header(&format!("Trip {}", trip.trip_id));
    let status = match trip.status {
        TripStatus::Arrived => trip.status.green().to_string(),
        TripStatus::Cancelled => trip.status.yellow().to_string(),
        _ => trip.status.to_string(),
    };
    Status::field("Status", status);
    if let Some(distance) = trip.distance_remaining_m() {
        Status::field("Remaining", format_distance(distance));
    }
    let elapsed = (trip.updated_at - trip.started_at).to_std().unwrap_or_default();
    Status::field("Duration", format_duration(elapsed));
}
