//! Apply-if-newer reconciliation of order snapshots.
//!
//! Snapshots arrive over the live feed and from the external order fetch.
//! Either path may deliver stale or repeated data; a snapshot only replaces
//! the held one when its timestamp is not older.

use std::collections::HashMap;

use crate::types::OrderSnapshot;

/// Outcome of applying one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// First snapshot seen for this order.
    Inserted,
    /// Replaced an older or equally old snapshot.
    Replaced,
    /// Discarded because the held snapshot is newer.
    Stale,
}

impl Applied {
    /// Returns true if local state changed.
    #[must_use]
    pub const fn changed(&self) -> bool {
        !matches!(self, Self::Stale)
    }
}

/// Locally visible orders keyed by order id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderState {
    orders: HashMap<String, OrderSnapshot>,
}

impl OrderState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a snapshot in place.
    pub fn apply(&mut self, incoming: OrderSnapshot) -> Applied {
        match self.orders.get(&incoming.id) {
            Some(held) if incoming.timestamp < held.timestamp => Applied::Stale,
            Some(_) => {
                self.orders.insert(incoming.id.clone(), incoming);
                Applied::Replaced
            }
            None => {
                self.orders.insert(incoming.id.clone(), incoming);
                Applied::Inserted
            }
        }
    }

    /// Applies a batch, returning how many snapshots changed state.
    pub fn apply_all(&mut self, snapshots: impl IntoIterator<Item = OrderSnapshot>) -> usize {
        snapshots
            .into_iter()
            .filter(|snapshot| self.apply(snapshot.clone()).changed())
            .count()
    }

    /// Returns the held snapshot for an order.
    #[must_use]
    pub fn get(&self, order_id: &str) -> Option<&OrderSnapshot> {
        self.orders.get(order_id)
    }

    /// Returns the number of orders held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Returns true if no orders are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Returns all held snapshots, newest first.
    #[must_use]
    pub fn snapshots(&self) -> Vec<OrderSnapshot> {
        let mut all: Vec<OrderSnapshot> = self.orders.values().cloned().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        all
    }
}

/// Returns `state` with `incoming` applied if it is not older than the held
/// snapshot for the same order.
#[must_use]
pub fn apply(mut state: OrderState, incoming: OrderSnapshot) -> OrderState {
    state.apply(incoming);
    state
}
