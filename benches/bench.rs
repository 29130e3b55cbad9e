// Criterion benchmarks for lifelog

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lifelog::core::distance::{calculate_bounding_box, haversine_distance};
use lifelog::core::resolver::rank_candidates;
use lifelog::models::{ExternalVenue, LocationOrigin, Point, SavedLocation};

fn query() -> Point {
    Point::new(40.7128, -74.0060).unwrap()
}

fn create_saved(id: usize) -> SavedLocation {
    let lat = 40.7128 + ((id % 20) as f64 - 10.0) * 0.0004;
    let lon = -74.0060 + ((id / 20 % 20) as f64 - 10.0) * 0.0005;
    let promoted = id % 5 == 0;

    SavedLocation {
        id: id as i64,
        user_id: "user".to_string(),
        name: format!("Place {}", id),
        category: None,
        address: None,
        point: Point::new(lat, lon).unwrap(),
        origin: if promoted { LocationOrigin::External } else { LocationOrigin::User },
        external_id: promoted.then(|| format!("fsq{}", id)),
        created_at: None,
    }
}

fn create_venue(id: usize) -> ExternalVenue {
    let lat = 40.7128 + ((id % 10) as f64 - 5.0) * 0.0007;
    let lon = -74.0060 + ((id / 10 % 10) as f64 - 5.0) * 0.0009;

    ExternalVenue {
        external_id: format!("fsq{}", id),
        name: format!("Venue {}", id),
        category: Some("Coffee Shop".to_string()),
        point: Point::new(lat, lon).unwrap(),
        address: None,
    }
}

fn bench_haversine_distance(c: &mut Criterion) {
    let from = query();
    let to = Point::new(40.72, -74.01).unwrap();

    c.bench_function("haversine_distance", |b| {
        b.iter(|| haversine_distance(black_box(from), black_box(to)))
    });
}

fn bench_bounding_box(c: &mut Criterion) {
    c.bench_function("calculate_bounding_box", |b| {
        b.iter(|| calculate_bounding_box(black_box(query()), black_box(1_000.0)))
    });
}

fn bench_rank_candidates(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_candidates");

    for size in [10usize, 100, 1_000].iter() {
        let saved: Vec<SavedLocation> = (0..*size).map(create_saved).collect();
        let venues: Vec<ExternalVenue> = (0..50).map(create_venue).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| rank_candidates(black_box(query()), black_box(&saved), venues.clone(), black_box(1_000.0)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_haversine_distance, bench_bounding_box, bench_rank_candidates);
criterion_main!(benches);
