//! Request authentication
//!
//! Browser and app clients send `Authorization: Bearer <jwt>`; the `sub`
//! claim is the user id. Device loggers that cannot refresh tokens send
//! `X-API-Key: <key>` instead, which is looked up by its SHA-256 digest.

use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ErrorResponse;
use crate::routes::AppState;

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unknown API key")]
    UnknownApiKey,

    #[error("Authentication backend unavailable: {0}")]
    Backend(String),
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Backend(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error = match self {
            AuthError::Backend(_) => "auth_unavailable",
            _ => "unauthorized",
        };

        HttpResponse::build(status).json(ErrorResponse::new(error, self.to_string(), status.as_u16()))
    }
}

/// JWT claims accepted by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// HS256 bearer token verification
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["exp", "iss"]);
        }

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and return its subject
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let subject = data.claims.sub.trim();
        if subject.is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }

        Ok(subject.to_string())
    }
}

/// Generate a new plaintext API key (64 hex chars)
pub fn generate_api_key() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Digest stored in place of the plaintext key
pub fn hash_api_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.trim().as_bytes()))
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn api_key(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// The user a request acts for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl AuthenticatedUser {
    async fn from_http(req: HttpRequest) -> Result<Self, AuthError> {
        let state = req
            .app_data::<web::Data<AppState>>()
            .ok_or_else(|| AuthError::Backend("application state missing".to_string()))?;

        if let Some(token) = bearer_token(&req) {
            let user_id = state.jwt.verify(token)?;
            return Ok(Self { user_id });
        }

        if let Some(key) = api_key(&req) {
            let user_id = state
                .postgres
                .authenticate_api_key(&hash_api_key(key))
                .await
                .map_err(|e| {
                    tracing::error!("API key lookup failed: {}", e);
                    AuthError::Backend(e.to_string())
                })?
                .ok_or(AuthError::UnknownApiKey)?;

            tracing::debug!("Authenticated user {} via API key", user_id);
            return Ok(Self { user_id });
        }

        Err(AuthError::MissingCredentials)
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AuthError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        Box::pin(Self::from_http(req.clone()))
    }
}
