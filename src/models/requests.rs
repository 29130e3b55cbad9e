use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::{EventType, ExternalVenue, InvalidPoint, Point};

/// Query for the nearby pickers
///
/// GET /api/v1/locations/nearby?lat=..&lon=..&radius=..&limit=..
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,
    /// Distance ceiling in meters
    pub radius: Option<f64>,
    /// External lookup fetch size
    pub limit: Option<usize>,
}

/// Create or replace a saved location
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LocationRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub address: Option<String>,
}

impl LocationRequest {
    pub fn point(&self) -> Result<Point, InvalidPoint> {
        Point::new(self.latitude, self.longitude)
    }
}

/// Create or replace an event
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EventRequest {
    #[serde(rename = "eventType")]
    pub event_type: EventType,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "endTime", default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "locationId", default)]
    pub location_id: Option<i64>,
    /// Location to create alongside the event, used when `locationId` is absent
    #[serde(rename = "newLocation", default)]
    #[validate(nested)]
    pub new_location: Option<LocationRequest>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
}

impl EventRequest {
    /// End time must not precede start time
    pub fn has_valid_span(&self) -> bool {
        self.end_time.map_or(true, |end| end >= self.start_time)
    }
}

/// Venue picked from the nearby list
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VenueRequest {
    #[validate(length(min = 1, max = 100))]
    #[serde(rename = "externalId")]
    pub external_id: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

impl VenueRequest {
    pub fn into_venue(self) -> Result<ExternalVenue, InvalidPoint> {
        Ok(ExternalVenue {
            point: Point::new(self.latitude, self.longitude)?,
            external_id: self.external_id,
            name: self.name,
            category: self.category,
            address: self.address,
        })
    }
}

/// Check in at a saved location or an external venue
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckInRequest {
    #[serde(rename = "locationId", default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    #[validate(nested)]
    pub venue: Option<VenueRequest>,
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A single GPS fix posted by a logger app
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LogPositionRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub accuracy: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub speed: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 360.0))]
    pub bearing: Option<f64>,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub provider: Option<String>,
}

/// Local day selector for timeline views
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
}

/// GET /api/v1/gps/near?lat=..&lon=..&radius=..
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearPositionsQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius: Option<f64>,
}

/// Request to create an API key
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}
