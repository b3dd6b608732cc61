//! WebSocket fan-out.
//!
//! Connections register under one channel at handshake time. Order events
//! are pushed to the origin channel, the kitchen, and the order's table and
//! restaurant channels, each connection receiving an event at most once.
//!
//! # Channels
//!
//! - `<table id>` — Customer session
//! - `kitchen` — Kitchen and staff dashboard
//! - `restaurant-<id>` — Restaurant admin
//!
//! # Message Types
//!
//! - `OrderCreated` / `OrderUpdated` — Order events (server to client)
//! - `ping` / `pong` — Application keepalive

pub mod cache;
pub mod channels;
pub mod connection;
pub mod dispatcher;
pub mod handler;
pub mod health;
pub mod messages;
pub mod metrics;

pub use cache::{CacheConfig, MessageCache};
pub use channels::ConnectionRegistry;
pub use connection::{Connection, Delivery};
pub use dispatcher::Dispatcher;
pub use handler::{validate_handshake, ws_handler, HandshakeError, HandshakeParams};
pub use health::{HealthConfig, HealthMonitor, SweepMode, SweepReport};
pub use messages::{ClientMessage, EmitRequest, EmitResponse, ServerMessage};
pub use metrics::{WsMetrics, WsMetricsSnapshot};
