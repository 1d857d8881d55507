use axum::{Json, extract::State, http::StatusCode};
use casino::house::SignupRequest;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError, middleware::AuthUser, models::AuthenticatedUser};

// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// Signup and login response
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: AuthenticatedUser,
}

// User profile response
#[derive(Serialize)]
pub struct UserProfileResponse {
    pub success: bool,
    pub user: AuthenticatedUser,
    pub message: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

// Signup endpoint; password hashing runs off the async workers
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let house = state.house.clone();
    let user = tokio::task::spawn_blocking(move || house.signup(payload)).await??;
    let token = state.sessions.create(user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "Account created".to_string(),
            token,
            user: AuthenticatedUser::from(user),
        }),
    ))
}

// Login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    let house = state.house.clone();
    let user =
        tokio::task::spawn_blocking(move || house.login(&payload.username, &payload.password))
            .await??;
    let token = state.sessions.create(user.id);
    tracing::info!("User {} logged in", user.id);

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        token,
        user: AuthenticatedUser::from(user),
    }))
}

pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Json<MessageResponse> {
    state.sessions.revoke(&auth.token);
    Json(MessageResponse {
        success: true,
        message: "Logged out".to_string(),
    })
}

// Get user profile endpoint (protected route)
pub async fn get_profile(auth: AuthUser) -> Json<UserProfileResponse> {
    Json(UserProfileResponse {
        success: true,
        user: auth.user,
        message: "Profile retrieved successfully".to_string(),
    })
}
