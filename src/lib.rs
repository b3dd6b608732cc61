//! Orderwire - real-time order event distribution.
//!
//! This crate bundles the two halves of the subsystem:
//!
//! - [`api`]: the fan-out server (connection registry, broadcast dispatcher,
//!   message cache and connection health monitor).
//! - [`sdk`]: shared order types and the reconnecting client with its
//!   deduplicator and apply-if-newer reconciler.

pub use orderwire_api as api;
pub use orderwire_sdk as sdk;

pub use orderwire_sdk::{Channel, OrderEvent, OrderSnapshot, OrderStatus};
