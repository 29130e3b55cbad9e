use std::time::Duration;

use crate::models::{ExternalVenue, Point};

/// In-process cache for venue lookups
///
/// Places API responses change slowly and the pickers are often reopened at
/// the same spot, so successful searches are kept for a short TTL.
#[derive(Clone)]
pub struct VenueCache {
    entries: moka::future::Cache<String, Vec<ExternalVenue>>,
}

impl VenueCache {
    /// Create a new cache holding up to `capacity` searches
    pub fn new(capacity: u64, ttl_secs: u64) -> Self {
        let entries = moka::future::CacheBuilder::new(capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { entries }
    }

    /// Get a cached search result
    pub async fn get(&self, key: &str) -> Option<Vec<ExternalVenue>> {
        let hit = self.entries.get(key).await;
        if hit.is_some() {
            tracing::trace!("Venue cache hit: {}", key);
        } else {
            tracing::trace!("Venue cache miss: {}", key);
        }
        hit
    }

    /// Store a search result
    pub async fn insert(&self, key: String, venues: Vec<ExternalVenue>) {
        self.entries.insert(key, venues).await;
    }

    /// Drop every cached search
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a venue search
    ///
    /// Coordinates are rounded to 4 decimals (~11 m) so nearby repeats share
    /// an entry.
    pub fn venue_search(point: Point, radius_m: f64, limit: usize) -> String {
        format!(
            "venues:{:.4}:{:.4}:{}:{}",
            point.latitude(),
            point.longitude(),
            radius_m.round() as u64,
            limit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue(id: &str) -> ExternalVenue {
        ExternalVenue {
            external_id: id.to_string(),
            name: "Cafe".to_string(),
            category: None,
            point: Point::new(40.0, -73.0).unwrap(),
            address: None,
        }
    }

    #[tokio::test]
    async fn test_cache_insert_get() {
        let cache = VenueCache::new(100, 60);
        let key = CacheKey::venue_search(Point::new(40.0, -73.0).unwrap(), 1000.0, 50);

        assert!(cache.get(&key).await.is_none());

        cache.insert(key.clone(), vec![venue("fsq1")]).await;
        let hit = cache.get(&key).await.unwrap();
        assert_eq!(hit[0].external_id, "fsq1");

        cache.invalidate_all();
        assert!(cache.get(&key).await.is_none());
    }

    #[test]
    fn test_cache_key_builder() {
        let point = Point::new(40.71284, -74.00601).unwrap();
        assert_eq!(CacheKey::venue_search(point, 1000.0, 50), "venues:40.7128:-74.0060:1000:50");
    }
}
