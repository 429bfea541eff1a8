use crate::context::AppContext;
use crate::output::{format_distance, format_duration, json_line, Format, Status};
use shopverse_core::Result;
use shopverse_geo::{path_length_meters, Coordinate};
use std::time::Duration;

pub async fn show(ctx: &AppContext, from: Coordinate, to: Coordinate, format: Format) -> Result<()> {
    let engine = ctx.route_engine()?;
    let route = engine.compute_route(from, to).await?;

    if format.is_json() {
        json_line(&*route);
        return Ok(());
    }

    if route.stale {
        Status::warning("Directions unavailable, showing a cached route");
    }
    Status::header(&format!("{from} → {to}"));
    Status::field("ETA", format_duration(Duration::from_secs(route.eta_seconds)));
    Status::field("Distance", format_distance(route.distance_meters as f64));
    Status::field("Points", route.polyline.len());
    Status::field("Path length", format_distance(path_length_meters(&route.polyline)));
    Ok(())
}
