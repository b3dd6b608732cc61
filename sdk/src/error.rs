//! SDK error types.
//!
//! Provides error types for order types and channel names.

/// SDK errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkError {
    /// Invalid channel name.
    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    /// Invalid order status.
    #[error("invalid order status: {0}")]
    InvalidStatus(String),
}
