use std::collections::HashSet;

use crate::core::distance::haversine_distance;
use crate::models::{Candidate, ExternalVenue, GpsPosition, Point, RankedCandidate, SavedLocation};

/// External ids already covered by a promoted saved location
///
/// Venues carrying one of these ids are the same physical place as a saved
/// copy and must not be offered twice.
pub fn suppression_set(saved: &[SavedLocation]) -> HashSet<&str> {
    saved
        .iter()
        .filter_map(SavedLocation::promoted_external_id)
        .collect()
}

/// Annotate saved locations with their distance, keeping those within range
#[inline]
pub fn annotate_saved(
    query: Point,
    saved: &[SavedLocation],
    max_distance_m: f64,
) -> Vec<RankedCandidate> {
    saved
        .iter()
        .filter_map(|location| {
            let distance_m = haversine_distance(query, location.point);
            (distance_m <= max_distance_m).then(|| RankedCandidate {
                candidate: Candidate::Saved(location.clone()),
                distance_m,
            })
        })
        .collect()
}

/// Annotate external venues with their distance
///
/// Skips venues whose id is suppressed, venues beyond `max_distance_m`, and
/// repeated ids within the same lookup response (first one wins).
pub fn annotate_external(
    query: Point,
    venues: Vec<ExternalVenue>,
    suppressed: &HashSet<&str>,
    max_distance_m: f64,
) -> Vec<RankedCandidate> {
    let mut seen: HashSet<String> = HashSet::new();

    venues
        .into_iter()
        .filter(|venue| !suppressed.contains(venue.external_id.as_str()))
        .filter(|venue| seen.insert(venue.external_id.clone()))
        .filter_map(|venue| {
            let distance_m = haversine_distance(query, venue.point);
            (distance_m <= max_distance_m).then(|| RankedCandidate {
                candidate: Candidate::External(venue),
                distance_m,
            })
        })
        .collect()
}

/// GPS positions within `max_distance_m` of a point
pub fn positions_within(
    query: Point,
    positions: Vec<GpsPosition>,
    max_distance_m: f64,
) -> Vec<GpsPosition> {
    positions
        .into_iter()
        .filter(|position| haversine_distance(query, position.point) <= max_distance_m)
        .collect()
}
