//! Core types shared by the server and the client.
//!
//! This module provides channel names, order snapshots, lifecycle events
//! and message fingerprints.

pub mod channel;
pub mod event;
pub mod fingerprint;
pub mod order;

pub use channel::{Channel, KITCHEN_CHANNEL, RESTAURANT_PREFIX};
pub use event::OrderEvent;
pub use fingerprint::Fingerprint;
pub use order::{LineItem, OrderSnapshot, OrderStatus};
