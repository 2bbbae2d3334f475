use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;
use velometer::telemetry::distance_accumulator::haversine_distance;
use velometer::{RawFix, TelemetrySession, TelemetrySnapshot, TelemetryStore};

fn create_sample_fix(point_no: usize) -> RawFix {
    let seconds = point_no as f64 * 0.1; // 10Hz receiver
    RawFix {
        latitude: 45.0 + seconds * 1e-4,
        longitude: 7.0 + seconds * 5e-5,
        timestamp: 1_700_000_000.0 + seconds,
        speed: Some((point_no % 300) as f64 * 0.1),
        heading: Some(30.0),
    }
}

fn bench_geometry(c: &mut Criterion) {
    let mut group = c.benchmark_group("geometry");

    group.bench_function("haversine_distance", |b| {
        b.iter(|| {
            black_box(haversine_distance(
                black_box(45.0),
                black_box(7.0),
                black_box(45.001),
                black_box(7.002),
            ))
        });
    });

    group.finish();
}

fn bench_session_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");

    group.bench_function("process_100_fixes", |b| {
        let fixes: Vec<RawFix> = (0..100).map(create_sample_fix).collect();
        b.iter(|| {
            let mut session = TelemetrySession::load(TelemetryStore::in_memory());
            for fix in &fixes {
                black_box(session.process_fix(fix));
            }
        });
    });

    group.bench_function("process_1000_fixes", |b| {
        let fixes: Vec<RawFix> = (0..1000).map(create_sample_fix).collect();
        b.iter(|| {
            let mut session = TelemetrySession::load(TelemetryStore::in_memory());
            for fix in &fixes {
                black_box(session.process_fix(fix));
            }
        });
    });

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    let mut session = TelemetrySession::load(TelemetryStore::in_memory());
    for i in 0..50 {
        session.process_fix(&create_sample_fix(i));
    }
    let snapshot = session.snapshot();

    group.bench_function("serialize_snapshot", |b| {
        b.iter(|| black_box(serde_json::to_string(&snapshot).unwrap()));
    });

    let json = serde_json::to_string(&snapshot).unwrap();
    group.bench_function("deserialize_snapshot", |b| {
        b.iter(|| black_box(serde_json::from_str::<TelemetrySnapshot>(&json).unwrap()));
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(100);
    targets = bench_geometry, bench_session_processing, bench_serialization
}
criterion_main!(benches);
