//! WebSocket connection handler.
//!
//! Provides the upgrade handler and the per-connection reader and writer
//! tasks.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use orderwire_sdk::Channel;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::connection::{Connection, Delivery};
use super::messages::{parse_client_message, reply_to};
use super::metrics::WsMetrics;
use crate::state::AppState;

/// Query parameters of the handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandshakeParams {
    /// Channel to register under.
    pub target: Option<String>,
}

/// Reasons a handshake is refused before upgrade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    /// No `target` parameter.
    #[error("missing target")]
    MissingTarget,

    /// `target` is not a valid channel name.
    #[error("invalid target: {0:?}")]
    InvalidTarget(String),
}

impl IntoResponse for HandshakeError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Validates handshake parameters and resolves the target channel.
///
/// # Errors
///
/// Returns an error if the target is missing or invalid.
pub fn validate_handshake(params: &HandshakeParams) -> Result<Channel, HandshakeError> {
    let target = params
        .target
        .as_deref()
        .ok_or(HandshakeError::MissingTarget)?;
    Channel::parse(target).ok_or_else(|| HandshakeError::InvalidTarget(target.to_string()))
}

/// WebSocket upgrade handler.
///
/// Rejects the request with 400 before upgrading when the target is missing
/// or invalid.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HandshakeParams>,
    State(state): State<AppState>,
) -> Response {
    match validate_handshake(&params) {
        Ok(channel) => ws.on_upgrade(move |socket| handle_connection(socket, channel, state)),
        Err(e) => {
            state.metrics.record_handshake_rejected();
            warn!(error = %e, "handshake rejected");
            e.into_response()
        }
    }
}

/// Handles a WebSocket connection.
async fn handle_connection(socket: WebSocket, channel: Channel, state: AppState) {
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(state.config.outbound_buffer);
    let connection = Arc::new(Connection::new(channel.clone(), tx));
    let connection_id = connection.id();

    state
        .registry
        .register(channel.clone(), Arc::clone(&connection))
        .await;
    state.metrics.record_connection_opened();
    info!(connection_id, channel = %channel, "WebSocket connection opened");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Forward queued payloads to the socket, one bounded write at a time.
    let writer = {
        let connection = Arc::clone(&connection);
        let metrics = Arc::clone(&state.metrics);
        let cancel = connection.cancellation();
        let write_timeout = state.config.write_timeout;

        tokio::spawn(async move {
            loop {
                let payload = tokio::select! {
                    () = cancel.cancelled() => break,
                    payload = rx.recv() => match payload {
                        Some(payload) => payload,
                        None => break,
                    },
                };

                let frame = Message::Text(payload.to_string().into());
                match time::timeout(write_timeout, ws_sender.send(frame)).await {
                    Ok(Ok(())) => metrics.record_message_sent(),
                    Ok(Err(e)) => {
                        debug!(connection_id, error = %e, "socket write failed");
                        metrics.record_error();
                        break;
                    }
                    Err(_) => {
                        warn!(connection_id, ?write_timeout, "socket write timed out");
                        metrics.record_error();
                        break;
                    }
                }
            }

            connection.close();
            let _ = time::timeout(write_timeout, ws_sender.close()).await;
        })
    };

    // Handle incoming frames
    let cancel = connection.cancellation();
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => {
                debug!(connection_id, "connection closed by server");
                break;
            }
            frame = ws_receiver.next() => frame,
        };

        let msg = match frame {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!(connection_id, error = %e, "WebSocket error");
                state.metrics.record_error();
                break;
            }
            None => break,
        };

        connection.touch();
        state.metrics.record_message_received();

        match msg {
            Message::Text(text) => {
                handle_text_message(text.as_str(), &connection, &state.metrics);
            }
            Message::Ping(_) | Message::Pong(_) => {
                debug!(connection_id, "control frame received");
            }
            Message::Binary(_) => {
                debug!(connection_id, "binary frame ignored");
            }
            Message::Close(_) => {
                info!(connection_id, "WebSocket close requested");
                break;
            }
        }
    }

    // Cleanup
    connection.close();
    state.registry.unregister(&channel, connection_id).await;
    state.metrics.record_connection_closed();
    if let Err(e) = writer.await {
        error!(connection_id, error = %e, "writer task failed");
    }

    info!(connection_id, channel = %channel, "WebSocket connection closed");
}

/// Handles a text frame from the client.
///
/// Malformed or unknown messages are logged and dropped.
fn handle_text_message(text: &str, connection: &Connection, metrics: &WsMetrics) {
    let message = match parse_client_message(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(connection_id = connection.id(), error = %e, "dropping malformed message");
            return;
        }
    };

    let reply = match serde_json::to_string(&reply_to(&message)) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "failed to serialize reply");
            metrics.record_error();
            return;
        }
    };

    if connection.try_deliver(Arc::from(reply)) != Delivery::Queued {
        debug!(connection_id = connection.id(), "reply not queued");
    }
}
