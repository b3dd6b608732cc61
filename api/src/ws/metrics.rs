//! WebSocket metrics tracking.
//!
//! Provides atomic counters for monitoring connections, fan-out and sweeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Metrics for the WebSocket server.
#[derive(Debug)]
pub struct WsMetrics {
    /// Total connections opened.
    connections_opened: AtomicU64,

    /// Total connections closed.
    connections_closed: AtomicU64,

    /// Handshakes rejected before upgrade.
    handshakes_rejected: AtomicU64,

    /// Total frames received.
    messages_received: AtomicU64,

    /// Total frames written to sockets.
    messages_sent: AtomicU64,

    /// Events passed to broadcast.
    events_broadcast: AtomicU64,

    /// Per-connection deliveries queued by broadcasts.
    deliveries: AtomicU64,

    /// Deliveries lost to a full outbound queue.
    dropped: AtomicU64,

    /// Deliveries that failed because the connection was gone.
    send_failures: AtomicU64,

    /// Connections evicted by the health monitor.
    evictions: AtomicU64,

    /// Health sweeps completed.
    sweeps: AtomicU64,

    /// Total errors.
    errors: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for WsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WsMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            handshakes_rejected: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            events_broadcast: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            sweeps: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a connection opened.
    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connection closed.
    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejected handshake.
    pub fn record_handshake_rejected(&self) {
        self.handshakes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a frame received.
    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a frame written.
    pub fn record_message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a broadcast that reached `delivered` connections.
    pub fn record_broadcast(&self, delivered: usize) {
        self.events_broadcast.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
    }

    /// Records a delivery lost to a full queue.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a delivery to a dead connection.
    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed sweep.
    pub fn record_sweep(&self, evicted: usize) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    /// Records an error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total connections opened.
    #[must_use]
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    /// Returns the total connections closed.
    #[must_use]
    pub fn connections_closed(&self) -> u64 {
        self.connections_closed.load(Ordering::Relaxed)
    }

    /// Returns the current active connections.
    #[must_use]
    pub fn active_connections(&self) -> u64 {
        self.connections_opened()
            .saturating_sub(self.connections_closed())
    }

    /// Returns the rejected handshake count.
    #[must_use]
    pub fn handshakes_rejected(&self) -> u64 {
        self.handshakes_rejected.load(Ordering::Relaxed)
    }

    /// Returns the total frames received.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Returns the total frames written.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Returns the number of events broadcast.
    #[must_use]
    pub fn events_broadcast(&self) -> u64 {
        self.events_broadcast.load(Ordering::Relaxed)
    }

    /// Returns the number of queued deliveries.
    #[must_use]
    pub fn deliveries(&self) -> u64 {
        self.deliveries.load(Ordering::Relaxed)
    }

    /// Returns the number of dropped deliveries.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of failed deliveries.
    #[must_use]
    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of evicted connections.
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Returns the number of completed sweeps.
    #[must_use]
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// Returns the total errors.
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> WsMetricsSnapshot {
        WsMetricsSnapshot {
            connections_opened: self.connections_opened(),
            connections_closed: self.connections_closed(),
            active_connections: self.active_connections(),
            handshakes_rejected: self.handshakes_rejected(),
            messages_received: self.messages_received(),
            messages_sent: self.messages_sent(),
            events_broadcast: self.events_broadcast(),
            deliveries: self.deliveries(),
            dropped: self.dropped(),
            send_failures: self.send_failures(),
            evictions: self.evictions(),
            sweeps: self.sweeps(),
            errors: self.errors(),
            uptime_secs: self.uptime().as_secs(),
            cache_hits: 0,
            cache_misses: 0,
        }
    }
}

/// A point-in-time snapshot of WebSocket metrics.
#[derive(Debug, Clone, Serialize)]
pub struct WsMetricsSnapshot {
    /// Total connections opened.
    pub connections_opened: u64,
    /// Total connections closed.
    pub connections_closed: u64,
    /// Active connections.
    pub active_connections: u64,
    /// Handshakes rejected.
    pub handshakes_rejected: u64,
    /// Frames received.
    pub messages_received: u64,
    /// Frames written.
    pub messages_sent: u64,
    /// Events broadcast.
    pub events_broadcast: u64,
    /// Deliveries queued.
    pub deliveries: u64,
    /// Deliveries dropped on full queues.
    pub dropped: u64,
    /// Deliveries to dead connections.
    pub send_failures: u64,
    /// Connections evicted by sweeps.
    pub evictions: u64,
    /// Sweeps completed.
    pub sweeps: u64,
    /// Errors.
    pub errors: u64,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Message cache hits.
    pub cache_hits: u64,
    /// Message cache misses.
    pub cache_misses: u64,
}

impl WsMetricsSnapshot {
    /// Adds message cache counters.
    #[must_use]
    pub const fn with_cache(mut self, hits: u64, misses: u64) -> Self {
        self.cache_hits = hits;
        self.cache_misses = misses;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = WsMetrics::new();
        assert_eq!(metrics.connections_opened(), 0);
        assert_eq!(metrics.connections_closed(), 0);
        assert_eq!(metrics.active_connections(), 0);
    }

    #[test]
    fn test_metrics_record_connection() {
        let metrics = WsMetrics::new();

        metrics.record_connection_opened();
        metrics.record_connection_opened();
        assert_eq!(metrics.connections_opened(), 2);
        assert_eq!(metrics.active_connections(), 2);

        metrics.record_connection_closed();
        assert_eq!(metrics.connections_closed(), 1);
        assert_eq!(metrics.active_connections(), 1);
    }

    #[test]
    fn test_metrics_record_broadcast() {
        let metrics = WsMetrics::new();

        metrics.record_broadcast(3);
        metrics.record_broadcast(0);
        metrics.record_dropped();
        metrics.record_send_failure();

        assert_eq!(metrics.events_broadcast(), 2);
        assert_eq!(metrics.deliveries(), 3);
        assert_eq!(metrics.dropped(), 1);
        assert_eq!(metrics.send_failures(), 1);
    }

    #[test]
    fn test_metrics_record_sweep() {
        let metrics = WsMetrics::new();

        metrics.record_sweep(4);
        metrics.record_sweep(0);

        assert_eq!(metrics.sweeps(), 2);
        assert_eq!(metrics.evictions(), 4);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = WsMetrics::new();

        metrics.record_connection_opened();
        metrics.record_handshake_rejected();
        metrics.record_message_received();
        metrics.record_message_sent();

        let snapshot = metrics.snapshot().with_cache(5, 2);

        assert_eq!(snapshot.connections_opened, 1);
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.handshakes_rejected, 1);
        assert_eq!(snapshot.messages_received, 1);
        assert_eq!(snapshot.messages_sent, 1);
        assert_eq!(snapshot.cache_hits, 5);
        assert_eq!(snapshot.cache_misses, 2);
    }
}
