use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use validator::Validate;

use crate::core::{plan_venue_checkin, CheckInTarget};
use crate::models::{CheckInRequest, CheckInResponse, NearbyQuery};
use crate::routes::{bad_request, nearby_candidates, store_error, validation_error, AppState, AuthenticatedUser};
use crate::services::{LocationStore, NewCheckIn};

/// Configure check-in routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/checkins/nearby", web::get().to(nearby))
        .route("/checkins", web::post().to(check_in));
}

/// GET /api/v1/checkins/nearby?lat=..&lon=..
async fn nearby(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<NearbyQuery>,
) -> impl Responder {
    nearby_candidates(&state, &user, &query).await
}

/// POST /api/v1/checkins
///
/// Request body names exactly one of:
/// ```json
/// { "locationId": 7 }
/// { "venue": { "externalId": "fsq1", "name": "Cafe X", "latitude": 40.0008, "longitude": -73.0002 } }
/// ```
/// A venue the user never checked in at is saved as an `external` location first.
async fn check_in(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<CheckInRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let req = req.into_inner();

    let target = match (req.location_id, req.venue) {
        (Some(location_id), None) => CheckInTarget::Existing(location_id),
        (None, Some(venue)) => {
            let venue = match venue.into_venue() {
                Ok(venue) => venue,
                Err(e) => return bad_request("invalid_point", e.to_string()),
            };

            let saved = match state.postgres.fetch_saved_locations(&user.user_id).await {
                Ok(saved) => saved,
                Err(e) => return store_error("Failed to load saved locations", e),
            };

            plan_venue_checkin(&saved, venue)
        }
        _ => {
            return bad_request(
                "invalid_target",
                "Exactly one of locationId or venue is required",
            )
        }
    };

    let checkin = NewCheckIn {
        title: req.title,
        notes: req.notes,
        timestamp: req.timestamp.unwrap_or_else(Utc::now),
    };

    match state.postgres.record_checkin(&user.user_id, target, checkin).await {
        Ok(recorded) => HttpResponse::Created().json(CheckInResponse {
            event: recorded.event,
            location: recorded.location,
            promoted: recorded.promoted,
        }),
        Err(e) => store_error("Failed to record check-in", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{test_state, test_token};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::json;

    const SECRET: &str = "secret";

    async fn post(body: serde_json::Value) -> StatusCode {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(SECRET)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/checkins")
            .insert_header(("Authorization", format!("Bearer {}", test_token(SECRET, "alice"))))
            .set_json(body)
            .to_request();

        test::call_service(&app, req).await.status()
    }

    #[actix_web::test]
    async fn test_requires_a_target() {
        assert_eq!(post(json!({"title": "Here"})).await, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_rejects_both_targets() {
        let body = json!({
            "locationId": 1,
            "venue": {"externalId": "fsq1", "name": "Cafe X", "latitude": 40.0, "longitude": -73.0}
        });
        assert_eq!(post(body).await, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_rejects_invalid_venue() {
        let body = json!({
            "venue": {"externalId": "", "name": "Cafe X", "latitude": 40.0, "longitude": -73.0}
        });
        assert_eq!(post(body).await, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_rejects_oversized_venue_fields() {
        let category = json!({
            "venue": {"externalId": "fsq1", "name": "Cafe X", "category": "c".repeat(101),
                      "latitude": 40.0, "longitude": -73.0}
        });
        let address = json!({
            "venue": {"externalId": "fsq1", "name": "Cafe X", "address": "a".repeat(256),
                      "latitude": 40.0, "longitude": -73.0}
        });

        assert_eq!(post(category).await, StatusCode::BAD_REQUEST);
        assert_eq!(post(address).await, StatusCode::BAD_REQUEST);
    }
}
