//! Benchmarks for the hot geo paths of the tracking loop.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shopverse_geo::{
    decode_polyline, encode_polyline, haversine_distance_meters, path_length_meters, Coordinate,
    GridCell,
};

fn create_route(count: usize) -> Vec<Coordinate> {
    (0..count)
        .map(|i| {
            // A meandering path heading north-east out of San Francisco
            let step = i as f64 * 0.0005;
            Coordinate::new(37.7749 + step, -122.4194 + step + (i % 7) as f64 * 0.0001)
        })
        .collect()
}

fn bench_single_distance(c: &mut Criterion) {
    let courier = Coordinate::new(37.000, -122.000);
    let customer = Coordinate::new(37.010, -122.010);

    c.bench_function("haversine_single", |b| {
        b.iter(|| haversine_distance_meters(black_box(&courier), black_box(&customer)))
    });
}

fn bench_grid_snap(c: &mut Criterion) {
    let coord = Coordinate::new(37.7749, -122.4194);

    c.bench_function("grid_snap_10m", |b| {
        b.iter(|| GridCell::snap(black_box(&coord), black_box(10.0)))
    });
}

fn bench_polyline(c: &mut Criterion) {
    let mut group = c.benchmark_group("polyline");

    for size in [10, 100, 1000].iter() {
        let route = create_route(*size);
        let encoded = encode_polyline(&route);

        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
            b.iter(|| decode_polyline(black_box(encoded)))
        });
        group.bench_with_input(BenchmarkId::new("path_length", size), &route, |b, route| {
            b.iter(|| path_length_meters(black_box(route)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_distance, bench_grid_snap, bench_polyline);
criterion_main!(benches);
