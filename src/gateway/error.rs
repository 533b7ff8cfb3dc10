// Linkauth — Gateway error responses
//
// Store outcomes are mapped to HTTP kinds explicitly; handlers return
// `Result<_, ApiError>` and never translate errors by catching them.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::messenger::MessengerError;
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized { realm: String },

    #[error("{0}")]
    NotFound(String),

    #[error("Unsupported media type")]
    UnsupportedMediaType,

    #[error("Service unavailable")]
    Unavailable,

    #[error("Internal server error")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserAlreadyExists(_) => ApiError::BadRequest("User already exists".to_string()),
            StoreError::BadUsername(_) => ApiError::BadRequest("Username is invalid".to_string()),
            StoreError::Validation(msg) => ApiError::BadRequest(msg),
            StoreError::UserNotFound(_) => ApiError::NotFound("User does not exist".to_string()),
            StoreError::FieldNotFound(_) => ApiError::NotFound("Field does not exist".to_string()),
            StoreError::Messenger(MessengerError::TooManyRetries { retries }) => {
                tracing::error!(retries, "Audit trail unreachable");
                ApiError::Unavailable
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Unauthorized { .. } => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing or invalid credentials".to_string(),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::UnsupportedMediaType => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                "Requests must be application/json".to_string(),
            ),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                "Audit trail unavailable".to_string(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code: code.to_string(),
                message,
            },
        };
        let mut response = (status, Json(body)).into_response();

        if let ApiError::Unauthorized { realm } = &self {
            match HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm)) {
                Ok(value) => {
                    response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
                }
                Err(e) => tracing::warn!(error = %e, "Realm is not a valid header value"),
            }
        }

        response
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
