// Linkauth — Top-level error types
//
// Aggregates errors from the store, messenger and configuration layers into
// a single error enum for the CLI and process bootstrap.

use thiserror::Error;

/// Top-level error type for all Linkauth operations.
#[derive(Debug, Error)]
pub enum LinkauthError {
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Messenger error: {0}")]
    Messenger(#[from] crate::messenger::MessengerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LinkauthError>;
