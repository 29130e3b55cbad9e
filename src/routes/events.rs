use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

use crate::core::NewLocation;
use crate::models::{DayQuery, ErrorResponse, EventRequest, TimelineResponse};
use crate::routes::{bad_request, store_error, validation_error, AppState, AuthenticatedUser, RequestContext};
use crate::services::NewEvent;

/// Configure all event routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/events", web::get().to(list_events))
        .route("/events", web::post().to(create_event))
        .route("/events/{id}", web::get().to(get_event))
        .route("/events/{id}", web::put().to(update_event))
        .route("/events/{id}", web::delete().to(delete_event))
        .route("/timeline", web::get().to(timeline));
}

/// Split a validated request into the event and the location to create with it
fn into_parts(req: EventRequest) -> Result<(NewEvent, Option<NewLocation>), HttpResponse> {
    if let Err(errors) = req.validate() {
        return Err(validation_error(errors));
    }
    if !req.has_valid_span() {
        return Err(bad_request("invalid_span", "endTime must not precede startTime"));
    }

    let attributes = req.attributes.unwrap_or_else(|| serde_json::json!({}));
    if !attributes.is_object() {
        return Err(bad_request("invalid_attributes", "attributes must be a JSON object"));
    }

    let new_location = match req.new_location {
        Some(location) => {
            let point = location
                .point()
                .map_err(|e| bad_request("invalid_point", e.to_string()))?;
            Some(NewLocation::user(location.name, point, location.category, location.address))
        }
        None => None,
    };

    let event = NewEvent {
        event_type: req.event_type,
        title: req.title,
        start_time: req.start_time,
        end_time: req.end_time,
        location_id: req.location_id,
        notes: req.notes,
        attributes,
    };

    Ok((event, new_location))
}

/// POST /api/v1/events
///
/// Request body:
/// ```json
/// {
///   "eventType": "meal",
///   "title": "Lunch",
///   "startTime": "2024-03-01T12:00:00Z",
///   "locationId": 7,
///   "attributes": {"with": "Sam"}
/// }
/// ```
/// `newLocation` may replace `locationId`; it is saved in the same transaction.
async fn create_event(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<EventRequest>,
) -> impl Responder {
    let (event, new_location) = match into_parts(req.into_inner()) {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    match state
        .postgres
        .create_event(&user.user_id, &event, new_location.as_ref())
        .await
    {
        Ok(created) => HttpResponse::Created().json(created),
        Err(e) => store_error("Failed to create event", e),
    }
}

/// GET /api/v1/events
async fn list_events(state: web::Data<AppState>, user: AuthenticatedUser) -> impl Responder {
    match state.postgres.list_events(&user.user_id).await {
        Ok(events) => HttpResponse::Ok().json(events),
        Err(e) => store_error("Failed to list events", e),
    }
}

async fn get_event(state: web::Data<AppState>, user: AuthenticatedUser, path: web::Path<i64>) -> impl Responder {
    match state.postgres.get_event(&user.user_id, path.into_inner()).await {
        Ok(event) => HttpResponse::Ok().json(event),
        Err(e) => store_error("Failed to fetch event", e),
    }
}

async fn update_event(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    req: web::Json<EventRequest>,
) -> impl Responder {
    let (event, new_location) = match into_parts(req.into_inner()) {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    match state
        .postgres
        .update_event(&user.user_id, path.into_inner(), &event, new_location.as_ref())
        .await
    {
        Ok(updated) => HttpResponse::Ok().json(updated),
        Err(e) => store_error("Failed to update event", e),
    }
}

async fn delete_event(state: web::Data<AppState>, user: AuthenticatedUser, path: web::Path<i64>) -> impl Responder {
    let event_id = path.into_inner();
    match state.postgres.delete_event(&user.user_id, event_id).await {
        Ok(true) => HttpResponse::NoContent().finish(),
        Ok(false) => HttpResponse::NotFound().json(ErrorResponse::new(
            "not_found",
            format!("Event {} not found", event_id),
            404,
        )),
        Err(e) => store_error("Failed to delete event", e),
    }
}

/// GET /api/v1/timeline?date=YYYY-MM-DD
///
/// Events starting on one local day, with the neighbouring dates for paging.
async fn timeline(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    ctx: RequestContext,
    query: web::Query<DayQuery>,
) -> impl Responder {
    let window = ctx.day_window(query.date.as_deref());

    match state
        .postgres
        .events_between(&user.user_id, window.start, window.end)
        .await
    {
        Ok(events) => HttpResponse::Ok().json(TimelineResponse {
            date: window.date,
            previous_date: window.previous_date(),
            next_date: window.next_date(),
            events,
        }),
        Err(e) => store_error("Failed to load timeline", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use serde_json::json;

    fn request(body: serde_json::Value) -> EventRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_parts_default_attributes() {
        let (event, location) = into_parts(request(json!({
            "eventType": "meal",
            "title": "Lunch",
            "startTime": "2024-03-01T12:00:00Z"
        })))
        .unwrap();

        assert_eq!(event.event_type, EventType::Meal);
        assert_eq!(event.attributes, json!({}));
        assert!(location.is_none());
    }

    #[test]
    fn test_parts_carry_new_location() {
        let (_, location) = into_parts(request(json!({
            "eventType": "work",
            "title": "Standup",
            "startTime": "2024-03-01T09:00:00Z",
            "newLocation": {"name": "Office", "latitude": 52.52, "longitude": 13.405}
        })))
        .unwrap();

        let location = location.unwrap();
        assert_eq!(location.name, "Office");
        assert!(location.external_id.is_none());
    }

    #[test]
    fn test_parts_reject_reversed_span() {
        let result = into_parts(request(json!({
            "eventType": "travel",
            "title": "Train",
            "startTime": "2024-03-01T10:00:00Z",
            "endTime": "2024-03-01T09:00:00Z"
        })));
        assert!(result.is_err());
    }

    #[test]
    fn test_parts_reject_non_object_attributes() {
        let result = into_parts(request(json!({
            "eventType": "other",
            "title": "Note",
            "startTime": "2024-03-01T10:00:00Z",
            "attributes": [1, 2]
        })));
        assert!(result.is_err());
    }

    #[test]
    fn test_parts_reject_invalid_nested_location() {
        let result = into_parts(request(json!({
            "eventType": "social",
            "title": "Party",
            "startTime": "2024-03-01T20:00:00Z",
            "newLocation": {"name": "", "latitude": 0.0, "longitude": 0.0}
        })));
        assert!(result.is_err());
    }
}
