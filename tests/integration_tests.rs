// Integration tests for the lifelog proximity resolver

use async_trait::async_trait;
use lifelog::core::{plan_venue_checkin, CheckInTarget, NoVenueLookup, ProximityResolver, VenueLookup, VenueLookupError};
use lifelog::models::{ExternalVenue, LocationOrigin, NearbyCandidate, Point, SavedLocation};

struct StaticVenues(Vec<ExternalVenue>);

#[async_trait]
impl VenueLookup for StaticVenues {
    async fn search(&self, _point: Point, _radius_m: f64, _limit: usize) -> Result<Vec<ExternalVenue>, VenueLookupError> {
        Ok(self.0.clone())
    }
}

struct Unauthorized;

#[async_trait]
impl VenueLookup for Unauthorized {
    async fn search(&self, _point: Point, _radius_m: f64, _limit: usize) -> Result<Vec<ExternalVenue>, VenueLookupError> {
        Err(VenueLookupError::Unauthorized)
    }
}

fn saved(id: i64, name: &str, lat: f64, lon: f64) -> SavedLocation {
    SavedLocation {
        id,
        user_id: "user".to_string(),
        name: name.to_string(),
        category: None,
        address: None,
        point: Point::new(lat, lon).unwrap(),
        origin: LocationOrigin::User,
        external_id: None,
        created_at: None,
    }
}

fn promoted(id: i64, name: &str, external_id: &str, lat: f64, lon: f64) -> SavedLocation {
    SavedLocation {
        origin: LocationOrigin::External,
        external_id: Some(external_id.to_string()),
        ..saved(id, name, lat, lon)
    }
}

fn venue(external_id: &str, name: &str, lat: f64, lon: f64) -> ExternalVenue {
    ExternalVenue {
        external_id: external_id.to_string(),
        name: name.to_string(),
        category: None,
        point: Point::new(lat, lon).unwrap(),
        address: None,
    }
}

/// Haversine written out by hand, independent of the crate's implementation
fn reference_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let r = 6_371_008.8_f64;
    let (p1, p2) = (lat1.to_radians(), lat2.to_radians());
    let dp = (lat2 - lat1).to_radians();
    let dl = (lon2 - lon1).to_radians();
    let a = (dp / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dl / 2.0).sin().powi(2);
    2.0 * r * a.sqrt().asin()
}

#[test]
fn test_integration_home_then_cafe() {
    let resolver = ProximityResolver::default();
    let lookup = StaticVenues(vec![venue("fsq1", "Cafe X", 40.0008, -73.0002)]);

    let ranked = tokio_test::block_on(resolver.resolve(
        40.0,
        -73.0,
        &[saved(1, "Home", 40.0005, -73.0)],
        &lookup,
        1_000.0,
        50,
    ))
    .unwrap();

    let names: Vec<&str> = ranked.iter().map(|r| r.name()).collect();
    assert_eq!(names, vec!["Home", "Cafe X"]);
    assert!(ranked[0].distance_m < ranked[1].distance_m);
    assert!(ranked[0].distance_m > 50.0 && ranked[0].distance_m < 60.0);
    assert!(ranked[1].distance_m > 85.0 && ranked[1].distance_m < 100.0);
}

#[test]
fn test_integration_promoted_cafe_is_suppressed() {
    let resolver = ProximityResolver::default();
    // Name and category differ from the saved copy; only the id matters
    let lookup = StaticVenues(vec![venue("fsq1", "CAFE X - Downtown", 40.0008, -73.0002)]);
    let locations = vec![
        saved(1, "Home", 40.0005, -73.0),
        promoted(2, "Cafe X", "fsq1", 40.0008, -73.0002),
    ];

    let ranked = tokio_test::block_on(resolver.resolve(40.0, -73.0, &locations, &lookup, 1_000.0, 50)).unwrap();

    assert_eq!(ranked.len(), 2);
    assert!(ranked.iter().all(|r| r.is_saved()));
    assert!(ranked.iter().all(|r| r.name() != "CAFE X - Downtown"));
}

#[test]
fn test_integration_every_saved_location_once_with_exact_distance() {
    let resolver = ProximityResolver::default();
    let mut locations = Vec::new();
    for i in 0..10 {
        for j in 0..10 {
            let lat = 52.5 + (i as f64 - 5.0) * 0.0012;
            let lon = 13.4 + (j as f64 - 5.0) * 0.0017;
            locations.push(saved(i * 10 + j, &format!("Spot {}-{}", i, j), lat, lon));
        }
    }

    let ranked =
        tokio_test::block_on(resolver.resolve(52.5, 13.4, &locations, &NoVenueLookup, 5_000.0, 50)).unwrap();

    assert_eq!(ranked.len(), locations.len());

    let mut seen = std::collections::HashSet::new();
    for candidate in &ranked {
        assert!(seen.insert(candidate.name().to_string()), "{} listed twice", candidate.name());

        let p = candidate.candidate.point();
        let expected = reference_distance(52.5, 13.4, p.latitude(), p.longitude());
        assert!((candidate.distance_m - expected).abs() < 0.01);
    }
}

#[test]
fn test_integration_sorted_by_distance_then_name() {
    let resolver = ProximityResolver::default();
    let locations = vec![
        saved(1, "bravo", 10.001, 20.0),
        saved(2, "Alpha", 10.001, 20.0),
        saved(3, "charlie", 10.0005, 20.0),
        saved(4, "delta", 10.002, 20.0),
    ];
    let lookup = StaticVenues(vec![venue("v1", "echo", 10.0015, 20.0), venue("v2", "Able", 10.001, 20.0)]);

    let ranked = tokio_test::block_on(resolver.resolve(10.0, 20.0, &locations, &lookup, 1_000.0, 50)).unwrap();

    for pair in ranked.windows(2) {
        assert!(pair[0].distance_m <= pair[1].distance_m);
        if pair[0].distance_m == pair[1].distance_m {
            assert!(pair[0].name().to_lowercase() <= pair[1].name().to_lowercase());
        }
    }

    let names: Vec<&str> = ranked.iter().map(|r| r.name()).collect();
    assert_eq!(names, vec!["charlie", "Able", "Alpha", "bravo", "echo", "delta"]);
}

#[test]
fn test_integration_ceiling_excludes_both_sources() {
    let resolver = ProximityResolver::default();
    let locations = vec![saved(1, "Near", 40.0005, -73.0), saved(2, "Far", 40.02, -73.0)];
    let lookup = StaticVenues(vec![
        venue("v-near", "Kiosk", 40.0, -73.001),
        venue("v-far", "Mall", 40.0, -73.05),
    ]);

    let ranked = tokio_test::block_on(resolver.resolve(40.0, -73.0, &locations, &lookup, 500.0, 50)).unwrap();

    let names: Vec<&str> = ranked.iter().map(|r| r.name()).collect();
    assert_eq!(names, vec!["Near", "Kiosk"]);
    assert!(ranked.iter().all(|r| r.distance_m <= 500.0));
}

#[test]
fn test_integration_lookup_errors_never_propagate() {
    let resolver = ProximityResolver::default();
    let locations = vec![saved(1, "Home", 40.0005, -73.0)];

    let unauthorized = tokio_test::block_on(resolver.resolve(40.0, -73.0, &locations, &Unauthorized, 1_000.0, 50));
    let empty = tokio_test::block_on(resolver.resolve(40.0, -73.0, &locations, &StaticVenues(vec![]), 1_000.0, 50));

    assert_eq!(unauthorized.unwrap().len(), 1);
    assert_eq!(empty.unwrap().len(), 1);
}

#[test]
fn test_integration_pole_boundary() {
    let resolver = ProximityResolver::default();

    assert!(tokio_test::block_on(resolver.resolve(90.0, 0.0, &[], &NoVenueLookup, 1_000.0, 50)).is_ok());
    assert!(tokio_test::block_on(resolver.resolve(91.0, 0.0, &[], &NoVenueLookup, 1_000.0, 50)).is_err());
    assert!(tokio_test::block_on(resolver.resolve(0.0, 200.0, &[], &NoVenueLookup, 1_000.0, 50)).is_err());
}

#[test]
fn test_integration_checkin_after_promotion_reuses_location() {
    let cafe = venue("fsq1", "Cafe X", 40.0008, -73.0002);

    // First check-in promotes the venue
    let first = plan_venue_checkin(&[saved(1, "Home", 40.0005, -73.0)], cafe.clone());
    assert!(matches!(first, CheckInTarget::Promote(_)));

    // Once saved, the same venue maps onto the saved row
    let locations = vec![saved(1, "Home", 40.0005, -73.0), promoted(7, "Cafe X", "fsq1", 40.0008, -73.0002)];
    assert_eq!(plan_venue_checkin(&locations, cafe), CheckInTarget::Existing(7));
}

#[test]
fn test_integration_nearby_response_shape() {
    let resolver = ProximityResolver::default();
    let lookup = StaticVenues(vec![venue("fsq1", "Cafe X", 40.0008, -73.0002)]);

    let ranked = tokio_test::block_on(resolver.resolve(
        40.0,
        -73.0,
        &[saved(1, "Home", 40.0005, -73.0)],
        &lookup,
        1_000.0,
        50,
    ))
    .unwrap();

    let json: Vec<serde_json::Value> = ranked
        .into_iter()
        .map(|r| serde_json::to_value(NearbyCandidate::from(r)).unwrap())
        .collect();

    assert_eq!(json[0]["source"], "saved");
    assert_eq!(json[0]["locationId"], 1);
    assert_eq!(json[0]["origin"], "user");
    assert_eq!(json[1]["source"], "external");
    assert_eq!(json[1]["externalId"], "fsq1");
}
