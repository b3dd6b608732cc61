//! Order lifecycle events.
//!
//! Wire envelope: `{ "type": "OrderCreated" | "OrderUpdated", "order": {..} }`.

use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;
use super::order::OrderSnapshot;

/// Order lifecycle event carrying the latest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    /// A new order was committed.
    OrderCreated {
        /// Snapshot of the new order.
        order: OrderSnapshot,
    },

    /// An existing order changed.
    OrderUpdated {
        /// Snapshot after the change.
        order: OrderSnapshot,
    },
}

impl OrderEvent {
    /// Creates an `OrderCreated` event.
    #[must_use]
    pub const fn created(order: OrderSnapshot) -> Self {
        Self::OrderCreated { order }
    }

    /// Creates an `OrderUpdated` event.
    #[must_use]
    pub const fn updated(order: OrderSnapshot) -> Self {
        Self::OrderUpdated { order }
    }

    /// Returns the wire name of the event type.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "OrderCreated",
            Self::OrderUpdated { .. } => "OrderUpdated",
        }
    }

    /// Returns the carried snapshot.
    #[must_use]
    pub const fn order(&self) -> &OrderSnapshot {
        match self {
            Self::OrderCreated { order } | Self::OrderUpdated { order } => order,
        }
    }

    /// Consumes the event and returns the snapshot.
    #[must_use]
    pub fn into_order(self) -> OrderSnapshot {
        match self {
            Self::OrderCreated { order } | Self::OrderUpdated { order } => order,
        }
    }

    /// Returns the dedup fingerprint for this event.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let order = self.order();
        Fingerprint::for_order(self.event_type(), &order.id, &order.timestamp)
    }
}
