//! WebSocket connection state.
//!
//! A [`Connection`] is the server-side handle for one socket: its channel,
//! the bounded outbound queue drained by the writer task, the last time any
//! frame arrived, and a cancellation token that ends both socket tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use orderwire_sdk::Channel;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Global connection ID counter.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique connection ID.
#[must_use]
pub fn next_connection_id() -> u64 {
    CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Result of a non-blocking delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The payload was queued.
    Queued,
    /// The outbound queue is full; this payload is lost for this consumer.
    Dropped,
    /// The connection is gone.
    Failed,
}

/// Server-side connection handle.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    channel: Channel,
    sender: mpsc::Sender<Arc<str>>,
    last_activity: Mutex<Instant>,
    cancel: CancellationToken,
}

impl Connection {
    /// Creates a connection registered under `channel`.
    #[must_use]
    pub fn new(channel: Channel, sender: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            id: next_connection_id(),
            channel,
            sender,
            last_activity: Mutex::new(Instant::now()),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the connection ID.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the channel the connection registered under.
    #[must_use]
    pub const fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Returns the token cancelled when the connection closes.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Records activity now.
    pub fn touch(&self) {
        self.touch_at(Instant::now());
    }

    /// Records activity at `at`.
    pub fn touch_at(&self, at: Instant) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = at;
        }
    }

    /// Returns the last recorded activity.
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
            .lock()
            .map_or_else(|poisoned| *poisoned.into_inner(), |last| *last)
    }

    /// Returns how long the connection has been silent as of `now`.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity())
    }

    /// Returns true if the connection was closed or its writer is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.sender.is_closed()
    }

    /// Closes the connection. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Queues a serialized payload without waiting.
    pub fn try_deliver(&self, payload: Arc<str>) -> Delivery {
        if self.cancel.is_cancelled() {
            return Delivery::Failed;
        }
        match self.sender.try_send(payload) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Failed,
        }
    }
}
