//! WebSocket error types.
//!
//! Provides error types for the order feed client.

use tokio_tungstenite::tungstenite;

/// WebSocket errors.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    /// The socket failed while connecting, reading or writing.
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// Connection attempt timed out.
    #[error("connection timed out")]
    Timeout,

    /// The server ended the session.
    #[error("closed by server")]
    ServerClosed,

    /// Failed to serialize an outbound message.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Subscription target is not a valid channel name.
    #[error("invalid target: {0:?}")]
    InvalidTarget(String),

    /// Client was closed.
    #[error("client closed")]
    Closed,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
