use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::core::{VenueLookup, VenueLookupError};
use crate::models::{ExternalVenue, Point};
use crate::services::cache::{CacheKey, VenueCache};

/// Largest radius the places search accepts, in meters
const MAX_RADIUS_M: u64 = 100_000;

/// Largest page the places search returns
const MAX_LIMIT: usize = 50;

/// Foursquare Places API client
///
/// Owns all network I/O for venue lookups: authentication header, timeout,
/// response decoding and error translation. Failures are logged here and
/// reported to the resolver as [`VenueLookupError`], which degrades them to
/// "no external candidates".
pub struct FoursquareClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
    cache: Option<VenueCache>,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    fsq_id: String,
    name: String,
    #[serde(default)]
    categories: Vec<PlaceCategory>,
    #[serde(default)]
    geocodes: Option<Geocodes>,
    #[serde(default)]
    location: Option<PlaceLocation>,
}

#[derive(Debug, Deserialize)]
struct PlaceCategory {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Geocodes {
    main: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct PlaceLocation {
    formatted_address: Option<String>,
}

impl PlaceResult {
    fn into_venue(self) -> Option<ExternalVenue> {
        let coords = self.geocodes?.main?;
        let point = Point::new(coords.latitude, coords.longitude).ok()?;

        Some(ExternalVenue {
            external_id: self.fsq_id,
            name: self.name,
            category: self.categories.into_iter().next().map(|c| c.name),
            point,
            address: self.location.and_then(|l| l.formatted_address),
        })
    }
}

impl FoursquareClient {
    /// Create a new places client
    ///
    /// Without an API key every search reports [`VenueLookupError::NotConfigured`].
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, VenueLookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VenueLookupError::Transport(e.to_string()))?;

        Ok(Self {
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
            cache: None,
        })
    }

    /// Cache successful searches in `cache`
    pub fn with_cache(mut self, cache: VenueCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Search places around a point
    pub async fn search_places(
        &self,
        point: Point,
        radius_m: f64,
        limit: usize,
    ) -> Result<Vec<ExternalVenue>, VenueLookupError> {
        let api_key = self.api_key.as_deref().ok_or(VenueLookupError::NotConfigured)?;

        let ll = format!("{},{}", point.latitude(), point.longitude());
        let radius = (radius_m.ceil().max(1.0) as u64).min(MAX_RADIUS_M);
        let limit = limit.clamp(1, MAX_LIMIT);

        let url = format!(
            "{}/places/search?ll={}&radius={}&limit={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&ll),
            radius,
            limit
        );

        tracing::debug!("Searching places: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| VenueLookupError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(VenueLookupError::Unauthorized);
            }
            status => {
                return Err(VenueLookupError::Status(status.as_u16()));
            }
        }

        let body: PlacesResponse = response
            .json()
            .await
            .map_err(|e| VenueLookupError::InvalidResponse(e.to_string()))?;

        let venues: Vec<ExternalVenue> = body
            .results
            .into_iter()
            .filter_map(PlaceResult::into_venue)
            .collect();

        tracing::debug!("Places search returned {} venues", venues.len());

        Ok(venues)
    }
}

#[async_trait]
impl VenueLookup for FoursquareClient {
    async fn search(
        &self,
        point: Point,
        radius_m: f64,
        limit: usize,
    ) -> Result<Vec<ExternalVenue>, VenueLookupError> {
        let key = CacheKey::venue_search(point, radius_m, limit);
        if let Some(cache) = &self.cache {
            if let Some(venues) = cache.get(&key).await {
                return Ok(venues);
            }
        }

        match self.search_places(point, radius_m, limit).await {
            Ok(venues) => {
                if let Some(cache) = &self.cache {
                    cache.insert(key, venues.clone()).await;
                }
                Ok(venues)
            }
            Err(VenueLookupError::NotConfigured) => {
                tracing::debug!("Places API key not configured, skipping venue lookup");
                Err(VenueLookupError::NotConfigured)
            }
            Err(e) => {
                tracing::warn!("Venue lookup failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const BODY: &str = r#"{
        "results": [
            {
                "fsq_id": "fsq1",
                "name": "Cafe X",
                "categories": [{"id": 13035, "name": "Coffee Shop"}],
                "geocodes": {"main": {"latitude": 40.0008, "longitude": -73.0002}},
                "location": {"formatted_address": "1 Main St"},
                "distance": 91
            },
            {
                "fsq_id": "fsq-no-geo",
                "name": "Nowhere"
            }
        ]
    }"#;

    fn client(url: String, key: Option<&str>) -> FoursquareClient {
        FoursquareClient::new(url, key.map(str::to_string), Duration::from_secs(2)).unwrap()
    }

    fn query() -> Point {
        Point::new(40.0, -73.0).unwrap()
    }

    #[tokio::test]
    async fn test_search_parses_venues() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/places/search")
            .match_header("authorization", "test_key")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ll".into(), "40,-73".into()),
                Matcher::UrlEncoded("radius".into(), "1000".into()),
                Matcher::UrlEncoded("limit".into(), "50".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .create_async()
            .await;

        let venues = client(server.url(), Some("test_key"))
            .search(query(), 1000.0, 50)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(venues.len(), 1);
        assert_eq!(venues[0].external_id, "fsq1");
        assert_eq!(venues[0].category.as_deref(), Some("Coffee Shop"));
        assert_eq!(venues[0].address.as_deref(), Some("1 Main St"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/places/search")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let result = client(server.url(), Some("bad")).search(query(), 1000.0, 10).await;
        assert!(matches!(result, Err(VenueLookupError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/places/search")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let result = client(server.url(), Some("key")).search(query(), 1000.0, 10).await;
        assert!(matches!(result, Err(VenueLookupError::Status(503))));
    }

    #[tokio::test]
    async fn test_garbage_body_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/places/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let result = client(server.url(), Some("key")).search(query(), 1000.0, 10).await;
        assert!(matches!(result, Err(VenueLookupError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_missing_key_skips_network() {
        let result = client("http://127.0.0.1:9".to_string(), Some("  "))
            .search(query(), 1000.0, 10)
            .await;
        assert!(matches!(result, Err(VenueLookupError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_searches() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/places/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(BODY)
            .expect(1)
            .create_async()
            .await;

        let client = client(server.url(), Some("key")).with_cache(VenueCache::new(10, 60));
        let first = client.search(query(), 1000.0, 50).await.unwrap();
        let second = client.search(query(), 1000.0, 50).await.unwrap();

        mock.assert_async().await;
        assert_eq!(first, second);
    }
}
