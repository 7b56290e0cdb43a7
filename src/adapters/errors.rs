//! Adapter error types
//!
//! Every boundary collaborator (stream transport, REST history, durable
//! store, notifier) has its own thiserror enum so callers can pick the
//! recovery path without string matching.

use thiserror::Error;

/// Transport-level failures for a live subscription
#[derive(Error, Debug)]
pub enum StreamError {
    /// Connection could not be established or was dropped
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Server answered the subscription with a non-2xx status
    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// Endpoint URL could not be parsed or has an unsupported scheme
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The owning feed was torn down before the subscription opened
    #[error("Subscription cancelled")]
    Cancelled,

    /// No frame arrived within the configured idle window
    #[error("Stream stalled: no frame for {0}ms")]
    Stalled(u64),

    /// HTTP client error (connect, read, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket protocol error (boxed to reduce enum size)
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        StreamError::WebSocket(Box::new(err))
    }
}

/// Result type alias for transport operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Request/response history fetch failures
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Decode error: {0}")]
    Decode(String),
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Durable storage failures
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Notification delivery failures
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
