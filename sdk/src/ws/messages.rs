//! WebSocket message types.
//!
//! Order events travel as their bare envelope; the only other traffic is an
//! application-level ping/pong pair.

use serde::{Deserialize, Serialize};

use crate::types::OrderEvent;

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Keepalive ping.
    Ping {
        /// Client timestamp in milliseconds.
        timestamp: u64,
    },
}

impl ClientMessage {
    /// Creates a ping stamped with the current time.
    #[must_use]
    pub fn ping() -> Self {
        Self::Ping {
            timestamp: now_millis(),
        }
    }
}

/// Control messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Reply to a client ping, echoing its timestamp.
    Pong {
        /// Timestamp from the ping.
        timestamp: u64,
    },
}

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Order lifecycle event.
    Event(OrderEvent),

    /// Control message.
    Control(ControlMessage),
}

impl ServerMessage {
    /// Creates a pong reply.
    #[must_use]
    pub const fn pong(timestamp: u64) -> Self {
        Self::Control(ControlMessage::Pong { timestamp })
    }

    /// Returns the order event, if this is one.
    #[must_use]
    pub const fn as_event(&self) -> Option<&OrderEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Control(_) => None,
        }
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
