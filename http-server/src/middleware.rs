use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use crate::{AppState, error::ApiError, models::AuthenticatedUser};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

// Axum extractor for authenticated users
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: AuthenticatedUser,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Extract the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or(ApiError::Unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid Authorization header format"))?
            .trim();

        let user_id = state
            .sessions
            .user_id(token)
            .ok_or(ApiError::Unauthorized("Invalid token"))?;
        let user = state
            .house
            .user(user_id)
            .map_err(|_| ApiError::Unauthorized("Invalid token"))?;

        Ok(AuthUser {
            user: AuthenticatedUser::from(user),
            token: token.to_string(),
        })
    }
}

// Optional `Idempotency-Key` header
#[derive(Debug, Clone, Default)]
pub struct IdempotencyKey(pub Option<String>);

impl IdempotencyKey {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for IdempotencyKey {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(IDEMPOTENCY_KEY_HEADER) {
            None => Ok(IdempotencyKey(None)),
            Some(value) => value
                .to_str()
                .map(|key| IdempotencyKey(Some(key.trim().to_string())))
                .map_err(|_| ApiError::BadRequest("Idempotency-Key must be ASCII".to_string())),
        }
    }
}

// Admin check for operator endpoints
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(ApiError::Unauthorized("Admin endpoints are disabled"));
    };
    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized("Missing admin token"))?;

    if provided != expected {
        tracing::warn!("Rejected admin request with a bad token");
        return Err(ApiError::Unauthorized("Invalid admin token"));
    }
    Ok(())
}
