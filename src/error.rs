use std::sync::OnceLock;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

// Set once at startup; gates whether internal error detail reaches clients.
static DEV_MODE: OnceLock<bool> = OnceLock::new();

pub fn set_dev_mode(enabled: bool) {
    let _ = DEV_MODE.set(enabled);
}

fn dev_mode() -> bool {
    *DEV_MODE.get().unwrap_or(&false)
}

/// Error taxonomy for every API operation. Each variant maps to exactly one
/// HTTP status and a `{"success": false, "error": ...}` JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Missing bearer token on a protected route.
    #[error("Access denied. No token provided.")]
    MissingToken,

    /// Covers both unknown (roll_no, role) and wrong password. The message is
    /// deliberately identical for both so callers cannot enumerate users.
    #[error("Authentication failed: invalid credentials.")]
    InvalidCredentials,

    #[error("Forbidden: token has expired.")]
    TokenExpired,

    #[error("Forbidden: invalid token.")]
    TokenMalformed,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error.")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn internal<E: Into<anyhow::Error>>(err: E) -> Self {
        let err = err.into();
        tracing::error!(error = %err, "internal error");
        ApiError::Internal(err)
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => {
                ApiError::NotFound("Resource not found.".to_string())
            }
            other => ApiError::internal(other),
        }
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        ApiError::internal(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingToken | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::TokenExpired | ApiError::TokenMalformed | ApiError::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // Internal detail stays in the logs unless explicitly running in
            // development mode.
            ApiError::Internal(source) if dev_mode() => format!("{source:#}"),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": message,
        }))
    }
}
