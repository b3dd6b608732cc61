//! Orderwire SDK - types and client for the real-time order event feed.
//!
//! # Core Types
//!
//! - [`Channel`] — Subscription channel (session, kitchen, restaurant)
//! - [`OrderSnapshot`] — Full state of one order at a point in time
//! - [`OrderStatus`] — Order lifecycle status
//! - [`OrderEvent`] — `OrderCreated` / `OrderUpdated` wire event
//! - [`Fingerprint`] — Identity used for deduplication and caching
//!
//! # Client
//!
//! - [`ws::OrderFeedClient`] — Reconnecting subscriber with deduplication
//!   and apply-if-newer reconciliation
//!
//! # Example
//!
//! ```rust
//! use orderwire_sdk::{Channel, OrderEvent, OrderSnapshot, OrderStatus};
//!
//! let order = OrderSnapshot::new("42")
//!     .with_restaurant("r1")
//!     .with_status(OrderStatus::Preparing);
//! let event = OrderEvent::updated(order);
//!
//! assert_eq!(event.event_type(), "OrderUpdated");
//! assert_eq!(Channel::parse("kitchen"), Some(Channel::Kitchen));
//! ```

pub mod error;
pub mod types;
pub mod ws;

pub use error::SdkError;
pub use types::{
    Channel, Fingerprint, LineItem, OrderEvent, OrderSnapshot, OrderStatus, KITCHEN_CHANNEL,
    RESTAURANT_PREFIX,
};
