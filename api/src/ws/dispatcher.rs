//! Broadcast fan-out.
//!
//! An event published on an origin channel reaches:
//!
//! 1. every connection on the origin channel
//! 2. the kitchen channel, unless the kitchen is the origin
//! 3. the order's table channel, if it differs from the origin
//! 4. the order's restaurant channel, if it differs from the origin
//!
//! Each connection receives the event at most once per broadcast, even when
//! it appears in several of these sets.

use std::collections::HashSet;
use std::sync::Arc;

use orderwire_sdk::{Channel, OrderEvent};
use tracing::{debug, error, warn};

use super::cache::MessageCache;
use super::channels::ConnectionRegistry;
use super::connection::{Connection, Delivery};
use super::metrics::WsMetrics;

/// Pushes events to every interested connection.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    cache: Arc<MessageCache>,
    metrics: Arc<WsMetrics>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub const fn new(
        registry: Arc<ConnectionRegistry>,
        cache: Arc<MessageCache>,
        metrics: Arc<WsMetrics>,
    ) -> Self {
        Self {
            registry,
            cache,
            metrics,
        }
    }

    /// Producer entry point: validates the origin name and broadcasts.
    ///
    /// An invalid origin is logged and nothing is delivered.
    pub async fn emit(&self, origin: &str, event: &OrderEvent) -> usize {
        let Some(origin) = Channel::parse(origin) else {
            warn!(origin, order_id = %event.order().id, "emit with invalid origin channel");
            return 0;
        };
        self.broadcast(&origin, event).await
    }

    /// Broadcasts an event, returning the number of distinct connections
    /// it was queued to.
    pub async fn broadcast(&self, origin: &Channel, event: &OrderEvent) -> usize {
        let order = event.order();

        // Every target set is captured before the first send.
        let mut targets = vec![self.registry.snapshot(origin).await];
        if !origin.is_kitchen() {
            targets.push(self.registry.snapshot(&Channel::Kitchen).await);
        }
        for channel in [order.table_channel(), order.restaurant_channel()]
            .into_iter()
            .flatten()
        {
            if &channel != origin {
                targets.push(self.registry.snapshot(&channel).await);
            }
        }

        let payload = match self.cache.get_or_encode(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, order_id = %order.id, "failed to serialize event");
                self.metrics.record_error();
                return 0;
            }
        };

        let mut sent = HashSet::new();
        let mut delivered = 0;
        for connection in targets.iter().flatten() {
            if !sent.insert(connection.id()) {
                continue;
            }
            if self.deliver(connection, &payload) {
                delivered += 1;
            }
        }

        self.metrics.record_broadcast(delivered);
        debug!(
            origin = %origin,
            event_type = event.event_type(),
            order_id = %order.id,
            delivered,
            "event broadcast"
        );
        delivered
    }

    fn deliver(&self, connection: &Connection, payload: &Arc<str>) -> bool {
        match connection.try_deliver(Arc::clone(payload)) {
            Delivery::Queued => true,
            Delivery::Dropped => {
                self.metrics.record_dropped();
                debug!(connection_id = connection.id(), "outbound queue full, event dropped");
                false
            }
            Delivery::Failed => {
                // Flagged here, removed by the next sweep.
                connection.close();
                self.metrics.record_send_failure();
                warn!(connection_id = connection.id(), "send failed, connection flagged");
                false
            }
        }
    }
}
