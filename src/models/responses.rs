use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::domain::{ApiKey, Candidate, Event, GpsPosition, LocationOrigin, RankedCandidate, SavedLocation};

/// One entry of the nearby picker
#[derive(Debug, Clone, Serialize)]
pub struct NearbyCandidate {
    /// `saved` or `external`
    pub source: &'static str,
    #[serde(rename = "locationId")]
    pub location_id: Option<i64>,
    #[serde(rename = "externalId")]
    pub external_id: Option<String>,
    pub origin: LocationOrigin,
    pub name: String,
    pub category: Option<String>,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "distanceM")]
    pub distance_m: f64,
}

impl From<RankedCandidate> for NearbyCandidate {
    fn from(ranked: RankedCandidate) -> Self {
        let distance_m = ranked.distance_m;
        match ranked.candidate {
            Candidate::Saved(location) => Self {
                source: "saved",
                location_id: Some(location.id),
                external_id: location.promoted_external_id().map(str::to_string),
                origin: location.origin,
                latitude: location.point.latitude(),
                longitude: location.point.longitude(),
                name: location.name,
                category: location.category,
                address: location.address,
                distance_m,
            },
            Candidate::External(venue) => Self {
                source: "external",
                location_id: None,
                origin: LocationOrigin::External,
                latitude: venue.point.latitude(),
                longitude: venue.point.longitude(),
                external_id: Some(venue.external_id),
                name: venue.name,
                category: venue.category,
                address: venue.address,
                distance_m,
            },
        }
    }
}

/// Response for the nearby pickers
#[derive(Debug, Clone, Serialize)]
pub struct NearbyResponse {
    pub candidates: Vec<NearbyCandidate>,
    #[serde(rename = "totalResults")]
    pub total_results: usize,
}

/// Events of one local day with navigation dates
#[derive(Debug, Clone, Serialize)]
pub struct TimelineResponse {
    pub date: NaiveDate,
    #[serde(rename = "previousDate")]
    pub previous_date: NaiveDate,
    #[serde(rename = "nextDate")]
    pub next_date: NaiveDate,
    pub events: Vec<Event>,
}

/// GPS positions of one local day
#[derive(Debug, Clone, Serialize)]
pub struct GpsDayResponse {
    pub date: NaiveDate,
    pub positions: Vec<GpsPosition>,
}

/// Outcome of a GPX import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResponse {
    pub imported: u64,
    pub duplicates: u64,
    pub skipped: u64,
}

/// Outcome of a check-in
#[derive(Debug, Clone, Serialize)]
pub struct CheckInResponse {
    pub event: Event,
    pub location: SavedLocation,
    /// Whether the venue was saved as a new location by this check-in
    pub promoted: bool,
}

/// Newly created API key, the only time the plaintext key is returned
#[derive(Debug, Clone, Serialize)]
pub struct CreatedApiKeyResponse {
    #[serde(flatten)]
    pub key: ApiKey,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::{ExternalVenue, Point};

    #[test]
    fn test_external_candidate_shape() {
        let ranked = RankedCandidate {
            candidate: Candidate::External(ExternalVenue {
                external_id: "fsq1".to_string(),
                name: "Cafe X".to_string(),
                category: None,
                point: Point::new(40.0008, -73.0002).unwrap(),
                address: None,
            }),
            distance_m: 90.6,
        };

        let json = serde_json::to_value(NearbyCandidate::from(ranked)).unwrap();
        assert_eq!(json["source"], "external");
        assert_eq!(json["externalId"], "fsq1");
        assert_eq!(json["origin"], "external");
        assert!(json["locationId"].is_null());
        assert_eq!(json["distanceM"], 90.6);
    }
}
