use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use lifelog::config::{LoggingSettings, Settings};
use lifelog::core::{ProximityResolver, VenueLookup};
use lifelog::routes::{self, AppState, JwtVerifier};
use lifelog::services::{FoursquareClient, PostgresClient, VenueCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("Query error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle path parameter errors
pub fn handle_path_error(err: error::PathError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_path".to_string(),
        message: format!("Invalid path: {}", err),
        status_code: 404,
    }
    .into()
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Logging settings come from the config, so load it before anything logs
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(&LoggingSettings::default());
            error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e));
        }
    };

    init_tracing(&settings.logging);

    info!("Starting lifelog service...");

    // Initialize PostgreSQL client
    let db_max_conn = settings.database.max_connections.unwrap_or(10);

    let postgres = PostgresClient::from_settings(
        &settings.database.url,
        Some(db_max_conn),
        settings.database.min_connections,
        settings.database.acquire_timeout_secs,
        settings.database.idle_timeout_secs,
    )
    .await
    .map_err(|e| {
        error!("Failed to connect to PostgreSQL: {}", e);
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e)
    })?;

    info!("PostgreSQL client initialized (max: {} connections)", db_max_conn);

    // Venue lookups degrade to saved locations only when no key is configured
    let venue_cache = VenueCache::new(settings.cache.venue_cache_size, settings.cache.venue_ttl_secs);
    let foursquare = FoursquareClient::new(
        settings.foursquare.endpoint.clone(),
        settings.foursquare.api_key.clone(),
        Duration::from_secs(settings.foursquare.timeout_secs),
    )
    .map_err(|e| {
        error!("Failed to build places client: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?
    .with_cache(venue_cache);

    if foursquare.is_configured() {
        info!(
            "Places client initialized (cache: {} entries, TTL: {}s)",
            settings.cache.venue_cache_size, settings.cache.venue_ttl_secs
        );
    } else {
        warn!("FOURSQUARE_API_KEY not set, nearby pickers will only offer saved locations");
    }

    let venues: Arc<dyn VenueLookup> = Arc::new(foursquare);

    let resolver = ProximityResolver::new(Duration::from_secs(settings.proximity.lookup_timeout_secs));

    info!(
        "Proximity resolver initialized (ceiling: {} m, lookup limit: {})",
        settings.proximity.max_distance_m, settings.proximity.lookup_limit
    );

    let app_state = AppState {
        postgres: Arc::new(postgres),
        venues,
        resolver,
        proximity: settings.proximity.clone(),
        jwt: JwtVerifier::new(&settings.auth.jwt_secret, settings.auth.jwt_issuer.as_deref()),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
