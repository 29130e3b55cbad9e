use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

use crate::core::NewLocation;
use crate::models::{LocationRequest, NearbyQuery};
use crate::routes::{bad_request, nearby_candidates, store_error, validation_error, AppState, AuthenticatedUser};
use crate::services::LocationStore;

/// Configure all saved-location routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/locations", web::get().to(list_locations))
        .route("/locations", web::post().to(create_location))
        .route("/locations/nearby", web::get().to(nearby))
        .route("/locations/{id}", web::get().to(get_location))
        .route("/locations/{id}", web::put().to(update_location))
        .route("/locations/{id}", web::delete().to(delete_location));
}

/// GET /api/v1/locations
async fn list_locations(state: web::Data<AppState>, user: AuthenticatedUser) -> impl Responder {
    match state.postgres.fetch_saved_locations(&user.user_id).await {
        Ok(locations) => HttpResponse::Ok().json(locations),
        Err(e) => store_error("Failed to list locations", e),
    }
}

/// POST /api/v1/locations
///
/// Creates a `user`-origin location.
async fn create_location(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<LocationRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let req = req.into_inner();
    let point = match req.point() {
        Ok(point) => point,
        Err(e) => return bad_request("invalid_point", e.to_string()),
    };

    let location = NewLocation::user(req.name, point, req.category, req.address);

    match state.postgres.create_saved_location(&user.user_id, &location).await {
        Ok(saved) => {
            tracing::info!("User {} saved location {} ({})", user.user_id, saved.id, saved.name);
            HttpResponse::Created().json(saved)
        }
        Err(e) => store_error("Failed to create location", e),
    }
}

/// GET /api/v1/locations/nearby?lat=..&lon=..
///
/// Candidates for the add-event picker.
async fn nearby(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<NearbyQuery>,
) -> impl Responder {
    nearby_candidates(&state, &user, &query).await
}

async fn get_location(state: web::Data<AppState>, user: AuthenticatedUser, path: web::Path<i64>) -> impl Responder {
    match state.postgres.get_location(&user.user_id, path.into_inner()).await {
        Ok(location) => HttpResponse::Ok().json(location),
        Err(e) => store_error("Failed to fetch location", e),
    }
}

/// PUT /api/v1/locations/{id}
///
/// Name, point, category and address are replaced; the origin never changes.
async fn update_location(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    req: web::Json<LocationRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let point = match req.point() {
        Ok(point) => point,
        Err(e) => return bad_request("invalid_point", e.to_string()),
    };

    match state
        .postgres
        .update_location(
            &user.user_id,
            path.into_inner(),
            &req.name,
            point,
            req.category.as_deref(),
            req.address.as_deref(),
        )
        .await
    {
        Ok(location) => HttpResponse::Ok().json(location),
        Err(e) => store_error("Failed to update location", e),
    }
}

/// DELETE /api/v1/locations/{id}
///
/// 409 while any event still points at the location.
async fn delete_location(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> impl Responder {
    match state.postgres.delete_location(&user.user_id, path.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => store_error("Failed to delete location", e),
    }
}
