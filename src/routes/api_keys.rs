use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

use crate::models::{CreateApiKeyRequest, CreatedApiKeyResponse, ErrorResponse};
use crate::routes::auth::{generate_api_key, hash_api_key};
use crate::routes::{store_error, validation_error, AppState, AuthenticatedUser};

/// Configure API key management routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api-keys", web::get().to(list_keys))
        .route("/api-keys", web::post().to(create_key))
        .route("/api-keys/{id}", web::delete().to(delete_key));
}

/// POST /api/v1/api-keys
///
/// The plaintext key is only ever part of this response.
async fn create_key(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<CreateApiKeyRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let api_key = generate_api_key();

    match state
        .postgres
        .create_api_key(&user.user_id, req.name.trim(), &hash_api_key(&api_key))
        .await
    {
        Ok(key) => {
            tracing::info!("User {} created API key {} ({})", user.user_id, key.id, key.name);
            HttpResponse::Created().json(CreatedApiKeyResponse { key, api_key })
        }
        Err(e) => store_error("Failed to create API key", e),
    }
}

/// GET /api/v1/api-keys
async fn list_keys(state: web::Data<AppState>, user: AuthenticatedUser) -> impl Responder {
    match state.postgres.list_api_keys(&user.user_id).await {
        Ok(keys) => HttpResponse::Ok().json(keys),
        Err(e) => store_error("Failed to list API keys", e),
    }
}

/// DELETE /api/v1/api-keys/{id}
async fn delete_key(state: web::Data<AppState>, user: AuthenticatedUser, path: web::Path<i64>) -> impl Responder {
    let key_id = path.into_inner();
    match state.postgres.delete_api_key(&user.user_id, key_id).await {
        Ok(true) => {
            tracing::info!("User {} revoked API key {}", user.user_id, key_id);
            HttpResponse::NoContent().finish()
        }
        Ok(false) => HttpResponse::NotFound().json(ErrorResponse::new(
            "not_found",
            format!("API key {} not found", key_id),
            404,
        )),
        Err(e) => store_error("Failed to delete API key", e),
    }
}
