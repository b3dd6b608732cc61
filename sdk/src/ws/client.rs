//! Order feed client.
//!
//! Provides the consumer-facing client: one primary subscription target and
//! an optional secondary restaurant-scoped target, each served by its own
//! reconnecting link. Everything received on either link goes through one
//! shared deduplicator and one apply-if-newer order state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tracing::{debug, warn};

use super::config::WsConfig;
use super::dedup::Deduplicator;
use super::error::WsError;
use super::link::{LinkHandle, LinkState};
use super::messages::{ControlMessage, ServerMessage};
use super::reconcile::OrderState;
use crate::types::{Channel, OrderEvent, OrderSnapshot};

/// Receive path shared by all links of a client.
#[derive(Debug)]
pub(crate) struct Inbound {
    dedup: Mutex<Deduplicator>,
    orders: RwLock<OrderState>,
    last_message: watch::Sender<Option<OrderEvent>>,
    events: RwLock<Option<mpsc::Sender<OrderEvent>>>,
    dropped: AtomicU64,
}

impl Inbound {
    fn new(config: &WsConfig, events: mpsc::Sender<OrderEvent>) -> Self {
        let (last_message, _) = watch::channel(None);
        Self {
            dedup: Mutex::new(Deduplicator::new(config.dedup_capacity)),
            orders: RwLock::new(OrderState::new()),
            last_message,
            events: RwLock::new(Some(events)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Handles one inbound text frame.
    pub(crate) async fn handle_text(&self, raw: &str) {
        let message = match serde_json::from_str::<ServerMessage>(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping malformed message");
                return;
            }
        };

        let event = match message {
            ServerMessage::Event(event) => event,
            ServerMessage::Control(ControlMessage::Pong { timestamp }) => {
                debug!(timestamp, "pong received");
                return;
            }
        };

        if !self.dedup.lock().await.accept(raw) {
            debug!(fingerprint = %event.fingerprint(), "duplicate event suppressed");
            return;
        }

        let applied = self.orders.write().await.apply(event.order().clone());
        debug!(
            event_type = event.event_type(),
            order_id = %event.order().id,
            ?applied,
            "event accepted"
        );

        self.last_message.send_replace(Some(event.clone()));

        if let Some(events) = self.events.read().await.as_ref() {
            if let Err(mpsc::error::TrySendError::Full(event)) = events.try_send(event) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    order_id = %event.order().id,
                    "event queue full, dropping newest event"
                );
            }
        }
    }
}

/// Reconnecting client for the order event feed.
#[derive(Debug)]
pub struct OrderFeedClient {
    config: WsConfig,
    primary: RwLock<Option<LinkHandle>>,
    secondary: RwLock<Option<LinkHandle>>,
    inbound: Arc<Inbound>,
    event_rx: Mutex<mpsc::Receiver<OrderEvent>>,
}

impl OrderFeedClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WsConfig) -> Result<Self, WsError> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);
        let inbound = Arc::new(Inbound::new(&config, event_tx));

        Ok(Self {
            config,
            primary: RwLock::new(None),
            secondary: RwLock::new(None),
            inbound,
            event_rx: Mutex::new(event_rx),
        })
    }

    /// Creates a new client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_defaults() -> Result<Self, WsError> {
        Self::new(WsConfig::default())
    }

    /// Creates a new client with the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_url(url: impl Into<String>) -> Result<Self, WsError> {
        Self::new(WsConfig::new(url))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Subscribes to `primary` and, optionally, a secondary target.
    ///
    /// Returns as soon as the links have been told about their targets;
    /// progress is visible through [`Self::is_connected`] and
    /// [`Self::state_changes`]. Calling again with a different target moves
    /// the existing link; passing `None` for the secondary closes it.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a target is not a valid channel name.
    pub async fn connect(&self, primary: &str, secondary: Option<&str>) -> Result<(), WsError> {
        let primary =
            Channel::parse(primary).ok_or_else(|| WsError::InvalidTarget(primary.to_string()))?;
        let secondary = secondary
            .map(|s| Channel::parse(s).ok_or_else(|| WsError::InvalidTarget(s.to_string())))
            .transpose()?;

        self.reopen_events().await;
        self.point(&self.primary, "primary", Some(primary)).await;
        self.point(&self.secondary, "secondary", secondary).await;

        Ok(())
    }

    /// Replaces the event queue ended by [`Self::close`].
    async fn reopen_events(&self) {
        let mut events = self.inbound.events.write().await;
        if events.is_some() {
            return;
        }
        let (event_tx, event_rx) = mpsc::channel(self.config.event_buffer);
        *self.event_rx.lock().await = event_rx;
        *events = Some(event_tx);
        debug!("event queue reopened");
    }

    async fn point(
        &self,
        slot: &RwLock<Option<LinkHandle>>,
        label: &'static str,
        target: Option<Channel>,
    ) {
        let mut slot = slot.write().await;
        match (slot.as_mut(), target) {
            (Some(link), Some(target)) => link.retarget(target),
            (None, Some(target)) => {
                *slot = Some(LinkHandle::spawn(
                    label,
                    target,
                    &self.config,
                    Arc::clone(&self.inbound),
                ));
            }
            (Some(link), None) => {
                link.close();
                *slot = None;
            }
            (None, None) => {}
        }
    }

    /// Returns true if the primary link is connected.
    pub async fn is_connected(&self) -> bool {
        self.state().await.is_connected()
    }

    /// Returns the primary link state.
    pub async fn state(&self) -> LinkState {
        self.primary
            .read()
            .await
            .as_ref()
            .map_or(LinkState::Idle, LinkHandle::state)
    }

    /// Returns the primary target, if one is set.
    pub async fn target(&self) -> Option<Channel> {
        self.primary.read().await.as_ref().map(|l| l.target().clone())
    }

    /// Returns a receiver observing the primary link state.
    pub async fn state_changes(&self) -> Option<watch::Receiver<LinkState>> {
        self.primary
            .read()
            .await
            .as_ref()
            .map(LinkHandle::subscribe_state)
    }

    /// Sends a text message over the primary link.
    ///
    /// This is a no-op returning false when the link is not connected.
    pub async fn send(&self, message: impl Into<String>) -> bool {
        let primary = self.primary.read().await;
        match primary.as_ref() {
            Some(link) if link.state().is_connected() => {
                link.send(message.into());
                true
            }
            _ => {
                debug!("send ignored, not connected");
                false
            }
        }
    }

    /// Returns the most recently accepted event.
    #[must_use]
    pub fn last_message(&self) -> Option<OrderEvent> {
        self.inbound.last_message.borrow().clone()
    }

    /// Returns the next accepted event.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] once the client is closed and the queue
    /// is drained.
    pub async fn next_event(&self) -> Result<OrderEvent, WsError> {
        self.event_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(WsError::Closed)
    }

    /// Returns the next queued event without waiting.
    pub async fn try_next_event(&self) -> Option<OrderEvent> {
        self.event_rx.lock().await.try_recv().ok()
    }

    /// Returns the reconciled snapshot of an order.
    pub async fn order(&self, order_id: &str) -> Option<OrderSnapshot> {
        self.inbound.orders.read().await.get(order_id).cloned()
    }

    /// Returns all reconciled orders, newest first.
    pub async fn orders(&self) -> Vec<OrderSnapshot> {
        self.inbound.orders.read().await.snapshots()
    }

    /// Merges snapshots from the external order fetch.
    ///
    /// Returns how many snapshots changed local state.
    pub async fn reconcile(&self, snapshots: impl IntoIterator<Item = OrderSnapshot>) -> usize {
        self.inbound.orders.write().await.apply_all(snapshots)
    }

    /// Returns how many events were dropped because the queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.inbound.dropped.load(Ordering::Relaxed)
    }

    /// Returns how many duplicate events were suppressed.
    pub async fn duplicates_suppressed(&self) -> u64 {
        self.inbound.dedup.lock().await.rejected()
    }

    /// Closes all links and ends the event queue.
    ///
    /// A later [`Self::connect`] starts a fresh queue; events still queued
    /// at that point are discarded.
    pub async fn close(&self) {
        self.point(&self.primary, "primary", None).await;
        self.point(&self.secondary, "secondary", None).await;
        self.inbound.events.write().await.take();
    }
}
