use std::cmp::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::filters::{annotate_external, annotate_saved, suppression_set};
use crate::models::{ExternalVenue, InvalidPoint, Point, RankedCandidate, SavedLocation};

/// Default time allowed for the venue lookup before it counts as degraded
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors returned by [`ProximityResolver::resolve`]
#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("invalid query point: {0}")]
    InvalidPoint(#[from] InvalidPoint),

    #[error("max distance must be a positive number of meters, got {0}")]
    InvalidDistance(f64),
}

/// Failures of an external venue lookup. Never surfaced past the resolver.
#[derive(Debug, Error)]
pub enum VenueLookupError {
    #[error("venue lookup is not configured")]
    NotConfigured,

    #[error("venue lookup request failed: {0}")]
    Transport(String),

    #[error("venue lookup rejected credentials")]
    Unauthorized,

    #[error("venue lookup returned status {0}")]
    Status(u16),

    #[error("venue lookup response could not be parsed: {0}")]
    InvalidResponse(String),
}

/// Source of nearby venues from an external catalog
#[async_trait]
pub trait VenueLookup: Send + Sync {
    async fn search(
        &self,
        point: Point,
        radius_m: f64,
        limit: usize,
    ) -> Result<Vec<ExternalVenue>, VenueLookupError>;
}

/// Lookup used when no places API credentials are configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVenueLookup;

#[async_trait]
impl VenueLookup for NoVenueLookup {
    async fn search(
        &self,
        _point: Point,
        _radius_m: f64,
        _limit: usize,
    ) -> Result<Vec<ExternalVenue>, VenueLookupError> {
        Err(VenueLookupError::NotConfigured)
    }
}

/// Nearest-location resolver for the check-in and add-event pickers
///
/// # Pipeline Stages
/// 1. Distance-annotate saved locations, keep those within the ceiling
/// 2. Build the suppression set from promoted locations
/// 3. Fetch external venues, drop suppressed or out-of-range ones
/// 4. Merge and sort by distance, then case-insensitive name
#[derive(Debug, Clone)]
pub struct ProximityResolver {
    lookup_timeout: Duration,
}

impl ProximityResolver {
    pub fn new(lookup_timeout: Duration) -> Self {
        Self { lookup_timeout }
    }

    /// Resolve the ranked candidate list around a query point
    ///
    /// # Arguments
    /// * `latitude`, `longitude` - Raw query coordinates, validated here
    /// * `saved` - All of the user's saved locations
    /// * `lookup` - External venue source; its failures degrade to saved-only output
    /// * `max_distance_m` - Inclusive distance ceiling for both sources
    /// * `limit` - Fetch size passed to the lookup, does not cap the output
    pub async fn resolve(
        &self,
        latitude: f64,
        longitude: f64,
        saved: &[SavedLocation],
        lookup: &dyn VenueLookup,
        max_distance_m: f64,
        limit: usize,
    ) -> Result<Vec<RankedCandidate>, ResolveError> {
        let query = Point::new(latitude, longitude)?;
        if !max_distance_m.is_finite() || max_distance_m <= 0.0 {
            return Err(ResolveError::InvalidDistance(max_distance_m));
        }

        let venues = match tokio::time::timeout(
            self.lookup_timeout,
            lookup.search(query, max_distance_m, limit),
        )
        .await
        {
            Ok(Ok(venues)) => venues,
            Ok(Err(e)) => {
                tracing::debug!("Venue lookup degraded, using saved locations only: {}", e);
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    "Venue lookup timed out after {:?}, using saved locations only",
                    self.lookup_timeout
                );
                Vec::new()
            }
        };

        Ok(rank_candidates(query, saved, venues, max_distance_m))
    }
}

impl Default for ProximityResolver {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKUP_TIMEOUT)
    }
}

/// Merge saved locations and already-fetched venues into one ranked list
pub fn rank_candidates(
    query: Point,
    saved: &[SavedLocation],
    venues: Vec<ExternalVenue>,
    max_distance_m: f64,
) -> Vec<RankedCandidate> {
    let suppressed = suppression_set(saved);

    let mut ranked = annotate_saved(query, saved, max_distance_m);
    ranked.extend(annotate_external(query, venues, &suppressed, max_distance_m));

    ranked.sort_by(compare_candidates);
    ranked
}

/// Distance ascending, then case-insensitive name, then saved before external
pub fn compare_candidates(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    a.distance_m
        .partial_cmp(&b.distance_m)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
        .then_with(|| b.is_saved().cmp(&a.is_saved()))
}
