//! Orderwire API - WebSocket fan-out server for order events.
//!
//! Customer sessions, the kitchen dashboard and restaurant admins each hold
//! a WebSocket registered under one channel. The order storage service
//! calls `POST /emit` (or [`ws::Dispatcher::emit`] in-process) after every
//! committed change, and the event is pushed to every interested
//! connection. A background health monitor evicts dead and idle sockets.
//!
//! # Example
//!
//! ```rust,ignore
//! use orderwire_api::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_env()?;
//!     Server::from_config(config).run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod server;
pub mod state;
pub mod ws;

pub use config::{ConfigError, ServerConfig};
pub use server::{HealthResponse, Server, ServerError};
pub use state::AppState;
