use crate::models::{ExternalVenue, LocationOrigin, Point, SavedLocation};

/// Location to create when a venue is promoted
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub name: String,
    pub point: Point,
    pub category: Option<String>,
    pub address: Option<String>,
    pub origin: LocationOrigin,
    pub external_id: Option<String>,
}

impl NewLocation {
    /// A location entered directly by the user
    pub fn user(name: String, point: Point, category: Option<String>, address: Option<String>) -> Self {
        Self {
            name,
            point,
            category,
            address,
            origin: LocationOrigin::User,
            external_id: None,
        }
    }

    /// A location promoted from an external venue
    pub fn promoted(venue: ExternalVenue) -> Self {
        Self {
            name: venue.name,
            point: venue.point,
            category: venue.category,
            address: venue.address,
            origin: LocationOrigin::External,
            external_id: Some(venue.external_id),
        }
    }
}

/// What a check-in against a venue resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum CheckInTarget {
    /// The venue was already promoted earlier
    Existing(i64),
    /// The venue needs to be saved first
    Promote(NewLocation),
}

/// Decide whether a venue check-in reuses a saved location or promotes a new one
pub fn plan_venue_checkin(saved: &[SavedLocation], venue: ExternalVenue) -> CheckInTarget {
    match saved
        .iter()
        .find(|location| location.promoted_external_id() == Some(venue.external_id.as_str()))
    {
        Some(existing) => CheckInTarget::Existing(existing.id),
        None => CheckInTarget::Promote(NewLocation::promoted(venue)),
    }
}

/// Title for a check-in event when the user did not provide one
pub fn checkin_title(location_name: &str) -> String {
    format!("Checked in at {}", location_name)
}
