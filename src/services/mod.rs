// Service exports
pub mod cache;
pub mod foursquare;
pub mod postgres;
pub mod proximity;

pub use cache::{CacheKey, VenueCache};
pub use foursquare::FoursquareClient;
pub use postgres::{InsertStats, LocationStore, NewCheckIn, NewEvent, PostgresClient, PostgresError, RecordedCheckIn};
pub use proximity::{nearby_for_user, NearbyError};
