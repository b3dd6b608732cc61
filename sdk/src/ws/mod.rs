//! Reconnecting WebSocket client for the order event feed.
//!
//! The client keeps one link per subscription target. Each link runs an
//! explicit `Idle / Connecting / Connected / Backoff` state machine and
//! reconnects with jittered exponential backoff. Frames from every link
//! pass through a shared deduplicator and an apply-if-newer order state.
//!
//! # Example
//!
//! ```rust,ignore
//! use orderwire_sdk::ws::{OrderFeedClient, WsConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OrderFeedClient::new(WsConfig::new("ws://127.0.0.1:8080/ws"))?;
//!
//!     // Table session plus the restaurant-wide channel
//!     client.connect("table-7", Some("restaurant-r1")).await?;
//!
//!     loop {
//!         let event = client.next_event().await?;
//!         println!("{} {}", event.event_type(), event.order().id);
//!     }
//! }
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod dedup;
pub mod error;
pub mod link;
pub mod messages;
pub mod reconcile;

pub use backoff::BackoffPolicy;
pub use client::OrderFeedClient;
pub use config::WsConfig;
pub use dedup::Deduplicator;
pub use error::WsError;
pub use link::{LinkState, StateMachine};
pub use messages::{ClientMessage, ControlMessage, ServerMessage};
pub use reconcile::{Applied, OrderState};
