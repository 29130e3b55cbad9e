// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    ApiKey, BoundingBox, Candidate, Event, EventType, ExternalVenue, GpsPosition, GpsSource, InvalidPoint,
    LocationOrigin, Point, RankedCandidate, SavedLocation,
};
pub use requests::{
    CheckInRequest, CreateApiKeyRequest, DayQuery, EventRequest, LocationRequest, LogPositionRequest,
    NearPositionsQuery, NearbyQuery, VenueRequest,
};
pub use responses::{
    CheckInResponse, CreatedApiKeyResponse, ErrorResponse, GpsDayResponse, HealthResponse, ImportResponse,
    NearbyCandidate, NearbyResponse, TimelineResponse,
};
