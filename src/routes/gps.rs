use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use validator::Validate;

use crate::core::{calculate_bounding_box, parse_gpx, positions_within};
use crate::models::{
    DayQuery, GpsDayResponse, GpsPosition, GpsSource, ImportResponse, LogPositionRequest, NearPositionsQuery, Point,
};
use crate::routes::{bad_request, store_error, validation_error, AppState, AuthenticatedUser, RequestContext};

/// Largest accepted GPX upload
const MAX_GPX_BYTES: usize = 16 * 1024 * 1024;

/// Configure GPS track routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/gps", web::get().to(positions_for_day))
        .route("/gps", web::post().to(log_position))
        .route("/gps/near", web::get().to(positions_near))
        .service(
            web::resource("/gps/import")
                .app_data(web::PayloadConfig::new(MAX_GPX_BYTES))
                .route(web::post().to(import_gpx)),
        );
}

/// POST /api/v1/gps
///
/// Single fix from a logger app. A fix at an already stored timestamp is
/// counted as a duplicate and dropped.
async fn log_position(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<LogPositionRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let req = req.into_inner();
    let point = match Point::new(req.latitude, req.longitude) {
        Ok(point) => point,
        Err(e) => return bad_request("invalid_point", e.to_string()),
    };

    let position = GpsPosition {
        timestamp: req.timestamp.unwrap_or_else(Utc::now),
        point,
        altitude: req.altitude,
        accuracy: req.accuracy,
        speed: req.speed,
        bearing: req.bearing,
        provider: req.provider,
        source: GpsSource::Logger,
    };

    match state.postgres.insert_position(&user.user_id, &position).await {
        Ok(inserted) => {
            let response = ImportResponse {
                imported: u64::from(inserted),
                duplicates: u64::from(!inserted),
                skipped: 0,
            };
            if inserted {
                HttpResponse::Created().json(response)
            } else {
                HttpResponse::Ok().json(response)
            }
        }
        Err(e) => store_error("Failed to store position", e),
    }
}

/// POST /api/v1/gps/import
///
/// Body is a GPX document. Track and route points with a timestamp are stored.
async fn import_gpx(state: web::Data<AppState>, user: AuthenticatedUser, body: String) -> impl Responder {
    let track = match parse_gpx(&body) {
        Ok(track) => track,
        Err(e) => {
            tracing::info!("Rejected GPX upload from user {}: {}", user.user_id, e);
            return bad_request("invalid_gpx", e.to_string());
        }
    };

    let skipped = track.skipped as u64;
    let positions: Vec<GpsPosition> = track.points.into_iter().map(|p| p.into_position()).collect();

    match state.postgres.insert_positions(&user.user_id, &positions).await {
        Ok(stats) => HttpResponse::Ok().json(ImportResponse {
            imported: stats.inserted,
            duplicates: stats.duplicates,
            skipped,
        }),
        Err(e) => store_error("Failed to import GPX track", e),
    }
}

/// GET /api/v1/gps?date=YYYY-MM-DD
async fn positions_for_day(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    ctx: RequestContext,
    query: web::Query<DayQuery>,
) -> impl Responder {
    let window = ctx.day_window(query.date.as_deref());

    match state
        .postgres
        .positions_between(&user.user_id, window.start, window.end)
        .await
    {
        Ok(positions) => HttpResponse::Ok().json(GpsDayResponse {
            date: window.date,
            positions,
        }),
        Err(e) => store_error("Failed to load positions", e),
    }
}

/// GET /api/v1/gps/near?lat=..&lon=..&radius=..
///
/// Positions within `radius` meters, newest first.
async fn positions_near(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<NearPositionsQuery>,
) -> impl Responder {
    let center = match Point::new(query.lat, query.lon) {
        Ok(point) => point,
        Err(e) => return bad_request("invalid_query", e.to_string()),
    };

    let radius_m = query.radius.unwrap_or(state.proximity.max_distance_m);
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return bad_request("invalid_query", format!("Radius must be positive, got {}", radius_m));
    }

    // Index-friendly box first, exact distance second
    let bbox = calculate_bounding_box(center, radius_m);

    match state.postgres.positions_in_box(&user.user_id, &bbox).await {
        Ok(candidates) => HttpResponse::Ok().json(positions_within(center, candidates, radius_m)),
        Err(e) => store_error("Failed to load positions", e),
    }
}
