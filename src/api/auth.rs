//! Administrator bearer-token authentication
//!
//! Tokens are HS256 JWTs issued by the platform's user service. Only the
//! `role` claim and the numeric `sub` are consumed here.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::state::AppState;
use super::types::{ApiError, error_codes};

pub const ADMIN_ROLE: &str = "admin";

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Administrator id as a decimal string
    pub sub: String,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

/// Authenticated administrator, injected into request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminIdentity {
    pub admin_id: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Administrator role required")]
    NotAdmin,
}

pub struct AdminAuth {
    secret: String,
}

impl AdminAuth {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<AdminIdentity, AuthError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(|_| AuthError::InvalidToken)?
            .claims;

        if claims.role != ADMIN_ROLE {
            return Err(AuthError::NotAdmin);
        }
        let admin_id = claims
            .sub
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(AuthError::InvalidToken)?;
        Ok(AdminIdentity { admin_id })
    }

    /// Sign a token; used by tooling and tests.
    pub fn issue_token(
        &self,
        sub: i64,
        role: &str,
        ttl: chrono::Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            role: role.to_string(),
            exp: (now + ttl).timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }
}

pub async fn admin_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::unauthorized(error_codes::MISSING_AUTH, "Missing Authorization header")
        })?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized(error_codes::AUTH_FAILED, "Invalid token format"))?;

    match state.admin_auth.verify_token(token) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(AuthError::NotAdmin) => Err(ApiError::new(
            axum::http::StatusCode::FORBIDDEN,
            error_codes::FORBIDDEN,
            AuthError::NotAdmin.to_string(),
        )),
        Err(e) => Err(ApiError::unauthorized(error_codes::AUTH_FAILED, e.to_string())),
    }
}
