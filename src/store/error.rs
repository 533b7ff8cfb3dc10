// Linkauth — Store error types

use thiserror::Error;

use crate::messenger::MessengerError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Username is invalid: {0:?}")]
    BadUsername(String),

    #[error("{0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Backing store error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("Audit trail unavailable: {0}")]
    Messenger(#[from] MessengerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
