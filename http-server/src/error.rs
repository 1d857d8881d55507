use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use casino::CasinoError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Casino(#[from] CasinoError),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

// Error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Casino(err) => match err {
                CasinoError::Validation(_)
                | CasinoError::InsufficientBalance { .. }
                | CasinoError::InvalidWalletProof(_)
                | CasinoError::IllegalMove(_) => StatusCode::BAD_REQUEST,
                CasinoError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                CasinoError::UserNotFound(_)
                | CasinoError::MatchNotFound(_)
                | CasinoError::BetNotFound(_)
                | CasinoError::RoundNotFound(_) => StatusCode::NOT_FOUND,
                CasinoError::UsernameTaken
                | CasinoError::EmailTaken
                | CasinoError::WalletInUse
                | CasinoError::MatchFinished(_)
                | CasinoError::IdempotencyConflict => StatusCode::CONFLICT,
                CasinoError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
