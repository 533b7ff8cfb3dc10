// Linkauth — Messenger error types

use thiserror::Error;

/// Failure reported by a broker transport.
///
/// `ConnectionClosed` covers every way the link to the broker can go away
/// (refused, reset, heartbeat timeout, closed channel). The messenger treats
/// it as transient and reconnects; `Other` is propagated as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Broker connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Broker error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("Maximum retries of {retries} exceeded")]
    TooManyRetries { retries: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
