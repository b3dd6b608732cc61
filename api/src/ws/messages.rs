//! WebSocket and producer message types.
//!
//! The socket wire format is shared with the client crate; this module adds
//! the producer-facing `POST /emit` bodies and the inbound frame handling.

use orderwire_sdk::OrderEvent;
use serde::{Deserialize, Serialize};

pub use orderwire_sdk::ws::messages::{ClientMessage, ControlMessage, ServerMessage};

/// Body of `POST /emit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitRequest {
    /// Channel the event originated on.
    pub origin: String,
    /// Event to distribute.
    pub event: OrderEvent,
}

/// Response of `POST /emit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitResponse {
    /// Distinct connections the event was queued to.
    pub delivered: usize,
}

/// Parses an inbound text frame.
///
/// # Errors
///
/// Returns an error if the frame is not a known client message.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Returns the reply owed to a client message.
#[must_use]
pub const fn reply_to(message: &ClientMessage) -> ServerMessage {
    match message {
        ClientMessage::Ping { timestamp } => ServerMessage::pong(*timestamp),
    }
}
