//! Error types for the sync client.

use std::time::Duration;

use autoserv_stomp::StompError;
use thiserror::Error;

use crate::schedule::BoardError;

/// Errors surfaced by the sync client.
///
/// Most of these never reach a caller directly: the transport converts them
/// into a connection status string and the snapshot fetcher into `None`. They
/// propagate as values only from schedule mutations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not authenticated: no session available")]
    NotAuthenticated,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("STOMP protocol error: {0}")]
    Stomp(#[from] StompError),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Board(#[from] BoardError),
}

impl SyncError {
    /// Create an API error from response details.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Returns true for errors caused by a missing or rejected session.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::Api { status: 401 | 403, .. })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
