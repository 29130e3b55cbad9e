// Core algorithm exports
pub mod checkin;
pub mod distance;
pub mod filters;
pub mod gpx;
pub mod resolver;
pub mod timeline;

pub use checkin::{plan_venue_checkin, CheckInTarget, NewLocation};
pub use distance::{haversine_distance, calculate_bounding_box, is_within_bounding_box};
pub use filters::{annotate_external, annotate_saved, positions_within, suppression_set};
pub use gpx::{parse_gpx, GpxError, GpxTrack};
pub use resolver::{NoVenueLookup, ProximityResolver, ResolveError, VenueLookup, VenueLookupError};
pub use timeline::DayWindow;
