use crate::core::{ProximityResolver, ResolveError, VenueLookup};
use crate::models::{Point, RankedCandidate};
use crate::services::postgres::{LocationStore, PostgresError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NearbyError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Failed to load saved locations: {0}")]
    Store(#[from] PostgresError),
}

/// Ranked candidates around a point for one user
///
/// Loads the user's saved locations from `store` and hands them to the
/// resolver together with the venue source.
pub async fn nearby_for_user(
    resolver: &ProximityResolver,
    store: &dyn LocationStore,
    lookup: &dyn VenueLookup,
    user_id: &str,
    latitude: f64,
    longitude: f64,
    max_distance_m: f64,
    limit: usize,
) -> Result<Vec<RankedCandidate>, NearbyError> {
    // Reject bad input before touching the store
    Point::new(latitude, longitude).map_err(ResolveError::from)?;
    if !max_distance_m.is_finite() || max_distance_m <= 0.0 {
        return Err(ResolveError::InvalidDistance(max_distance_m).into());
    }

    let saved = store.fetch_saved_locations(user_id).await?;

    let ranked = resolver
        .resolve(latitude, longitude, &saved, lookup, max_distance_m, limit)
        .await?;

    tracing::debug!(
        "Resolved {} candidates for user {} ({} saved locations considered)",
        ranked.len(),
        user_id,
        saved.len()
    );

    Ok(ranked)
}
