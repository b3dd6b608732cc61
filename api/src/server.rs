//! HTTP server and routes.
//!
//! Routes:
//!
//! - `GET /ws?target=<channel>` — WebSocket subscription
//! - `POST /emit` — producer hook, `{ origin, event }` -> `{ delivered }`
//! - `GET /health` — liveness plus counters

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use orderwire_sdk::Channel;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{ConfigError, ServerConfig};
use crate::state::AppState;
use crate::ws::handler::ws_handler;
use crate::ws::health::SweepMode;
use crate::ws::messages::{EmitRequest, EmitResponse};
use crate::ws::metrics::WsMetricsSnapshot;

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Could not bind the listener.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that failed.
        addr: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server answers.
    pub status: &'static str,
    /// Registered connections.
    pub connections: usize,
    /// Live channels.
    pub channels: usize,
    /// Whether the health monitor is in aggressive mode.
    pub aggressive: bool,
    /// Counters.
    pub metrics: WsMetricsSnapshot,
}

/// Error body for rejected producer calls.
#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    error: String,
}

/// The order event server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Creates a server.
    #[must_use]
    pub const fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Creates a server and its state from configuration.
    #[must_use]
    pub fn from_config(config: ServerConfig) -> Self {
        let state = AppState::new(config.clone());
        Self::new(config, state)
    }

    /// Returns the shared state.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Builds the router.
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .route("/emit", post(emit_handler))
            .route("/health", get(health_handler))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(state)
    }

    /// Binds the configured address and serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, binding fails, or
    /// the server stops with an I/O error.
    pub async fn run(self) -> Result<(), ServerError> {
        self.config.validate()?;

        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!(%addr, "listening");

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                return;
            }
            info!("shutdown requested");
            signal.cancel();
        });

        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` fires.
    ///
    /// The health monitor runs for the lifetime of the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server stops with an I/O error.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let monitor = tokio::spawn(
            Arc::clone(&self.state.health).run(shutdown.child_token()),
        );

        let app = Self::router(self.state);
        let signal = shutdown.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
            .map_err(ServerError::Serve);

        shutdown.cancel();
        if let Err(e) = monitor.await {
            warn!(error = %e, "health monitor task failed");
        }
        info!("server stopped");
        result
    }
}

async fn emit_handler(State(state): State<AppState>, Json(request): Json<EmitRequest>) -> Response {
    let Some(origin) = Channel::parse(&request.origin) else {
        warn!(origin = %request.origin, "emit with invalid origin channel");
        let body = ErrorBody {
            error: format!("invalid origin: {:?}", request.origin),
        };
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    let delivered = state.dispatcher.broadcast(&origin, &request.event).await;
    (StatusCode::ACCEPTED, Json(EmitResponse { delivered })).into_response()
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.registry.connection_count().await,
        channels: state.registry.channel_count().await,
        aggressive: state.health.mode() == SweepMode::Aggressive,
        metrics: state.metrics_snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use orderwire_sdk::{OrderEvent, OrderSnapshot};
    use serde_json::json;

    use super::*;

    fn test_server() -> TestServer {
        TestServer::new(Server::router(AppState::default())).expect("test server")
    }

    #[tokio::test]
    async fn test_health() {
        let server = test_server();
        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["aggressive"], false);
    }

    #[tokio::test]
    async fn test_emit_accepted() {
        let server = test_server();
        let event = OrderEvent::created(OrderSnapshot::new("42").with_table("7"));

        let response = server
            .post("/emit")
            .json(&EmitRequest {
                origin: "7".to_string(),
                event,
            })
            .await;

        response.assert_status(StatusCode::ACCEPTED);
        let body: EmitResponse = response.json();
        assert_eq!(body.delivered, 0);
    }

    #[tokio::test]
    async fn test_emit_invalid_origin() {
        let server = test_server();
        let event = OrderEvent::created(OrderSnapshot::new("42"));

        let response = server
            .post("/emit")
            .json(&EmitRequest {
                origin: "restaurant-".to_string(),
                event,
            })
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_emit_malformed_body() {
        let server = test_server();
        let response = server
            .post("/emit")
            .json(&json!({ "origin": "7", "event": { "type": "Deleted" } }))
            .expect_failure()
            .await;

        assert!(response.status_code().is_client_error());
    }

    #[tokio::test]
    async fn test_ws_without_upgrade_rejected() {
        let server = test_server();
        let response = server.get("/ws").expect_failure().await;
        assert!(response.status_code().is_client_error());
    }
}
