//! Lifelog - personal life-logging service
//!
//! Events, saved locations, check-ins and GPS tracks for a single user.
//! The check-in and add-event pickers are backed by the proximity resolver,
//! which merges saved locations with nearby venues from a places API.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    distance::{calculate_bounding_box, haversine_distance},
    ProximityResolver, ResolveError, VenueLookup, VenueLookupError,
};
pub use crate::models::{Candidate, ExternalVenue, Point, RankedCandidate, SavedLocation};
