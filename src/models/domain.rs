use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a coordinate pair is rejected
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidPoint {
    #[error("coordinates must be finite numbers")]
    NotFinite,

    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

/// WGS84 coordinate pair. Always within range once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint")]
pub struct Point {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawPoint {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawPoint> for Point {
    type Error = InvalidPoint;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        Point::new(raw.latitude, raw.longitude)
    }
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidPoint> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(InvalidPoint::NotFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidPoint::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidPoint::Longitude(longitude));
        }

        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl From<Point> for geo::Point<f64> {
    fn from(point: Point) -> Self {
        geo::Point::new(point.longitude, point.latitude)
    }
}

/// Provenance of a saved location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "location_origin", rename_all = "lowercase")]
pub enum LocationOrigin {
    /// Entered by the user (map click, geolocation)
    User,
    /// Promoted from a venue of the external catalog
    External,
}

/// A location the user has saved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedLocation {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    pub category: Option<String>,
    pub address: Option<String>,
    #[serde(flatten)]
    pub point: Point,
    pub origin: LocationOrigin,
    #[serde(rename = "externalId")]
    pub external_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SavedLocation {
    /// External catalog id, only for locations promoted from a venue
    pub fn promoted_external_id(&self) -> Option<&str> {
        match self.origin {
            LocationOrigin::External => self.external_id.as_deref(),
            LocationOrigin::User => None,
        }
    }
}

/// Venue returned by the places API for one request. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalVenue {
    #[serde(rename = "externalId")]
    pub external_id: String,
    pub name: String,
    pub category: Option<String>,
    #[serde(flatten)]
    pub point: Point,
    pub address: Option<String>,
}

/// Either source of a nearby candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Saved(SavedLocation),
    External(ExternalVenue),
}

impl Candidate {
    pub fn name(&self) -> &str {
        match self {
            Candidate::Saved(location) => &location.name,
            Candidate::External(venue) => &venue.name,
        }
    }

    pub fn point(&self) -> Point {
        match self {
            Candidate::Saved(location) => location.point,
            Candidate::External(venue) => venue.point,
        }
    }

    pub fn origin(&self) -> LocationOrigin {
        match self {
            Candidate::Saved(location) => location.origin,
            Candidate::External(_) => LocationOrigin::External,
        }
    }
}

/// A candidate annotated with its distance from the query point
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub distance_m: f64,
}

impl RankedCandidate {
    pub fn name(&self) -> &str {
        self.candidate.name()
    }

    pub fn is_saved(&self) -> bool {
        matches!(self.candidate, Candidate::Saved(_))
    }
}

/// Kinds of logged activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "event_type", rename_all = "lowercase")]
pub enum EventType {
    Meal,
    Travel,
    Hygiene,
    Work,
    Social,
    Exercise,
    CheckIn,
    Other,
}

/// A timestamped entry in the user's log
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "eventType")]
    pub event_type: EventType,
    pub title: String,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "endTime")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "locationId")]
    pub location_id: Option<i64>,
    pub notes: Option<String>,
    pub attributes: serde_json::Value,
}

/// Where a GPS fix came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "gps_source", rename_all = "snake_case")]
pub enum GpsSource {
    Logger,
    GpxImport,
}

/// A single recorded GPS fix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpsPosition {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub point: Point,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub bearing: Option<f64>,
    pub provider: Option<String>,
    pub source: GpsSource,
}

/// API key metadata. The key itself is only ever shown once.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKey {
    pub id: i64,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastUsed")]
    pub last_used: Option<DateTime<Utc>>,
}

/// Geospatial bounding box
///
/// `min_lon > max_lon` means the box crosses the antimeridian and covers
/// `[min_lon, 180]` plus `[-180, max_lon]`.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    /// Longitude intervals covered by the box. The second repeats the first
    /// when the box does not wrap.
    pub fn longitude_ranges(&self) -> [(f64, f64); 2] {
        if self.crosses_antimeridian() {
            [(self.min_lon, 180.0), (-180.0, self.max_lon)]
        } else {
            [(self.min_lon, self.max_lon); 2]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_bounds() {
        assert!(Point::new(90.0, 180.0).is_ok());
        assert!(Point::new(-90.0, -180.0).is_ok());
        assert_eq!(Point::new(91.0, 0.0), Err(InvalidPoint::Latitude(91.0)));
        assert_eq!(Point::new(0.0, 200.0), Err(InvalidPoint::Longitude(200.0)));
        assert_eq!(Point::new(f64::NAN, 0.0), Err(InvalidPoint::NotFinite));
    }

    #[test]
    fn test_point_deserialize_validates() {
        let ok: Result<Point, _> = serde_json::from_str(r#"{"latitude": 40.0, "longitude": -73.0}"#);
        assert!(ok.is_ok());

        let bad: Result<Point, _> = serde_json::from_str(r#"{"latitude": 95.0, "longitude": -73.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_user_location_has_no_promoted_id() {
        let location = SavedLocation {
            id: 1,
            user_id: "u".to_string(),
            name: "Home".to_string(),
            category: None,
            address: None,
            point: Point::new(40.0, -73.0).unwrap(),
            origin: LocationOrigin::User,
            external_id: Some("stale".to_string()),
            created_at: None,
        };

        assert_eq!(location.promoted_external_id(), None);
    }

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(serde_json::to_string(&EventType::CheckIn).unwrap(), "\"checkin\"");
        assert_eq!(serde_json::to_string(&GpsSource::GpxImport).unwrap(), "\"gpx_import\"");
    }
}
