//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::ws::cache::MessageCache;
use crate::ws::channels::ConnectionRegistry;
use crate::ws::dispatcher::Dispatcher;
use crate::ws::health::HealthMonitor;
use crate::ws::metrics::{WsMetrics, WsMetricsSnapshot};

/// State shared by every route and connection task.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Channel to connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Serialized event cache.
    pub cache: Arc<MessageCache>,
    /// Counters.
    pub metrics: Arc<WsMetrics>,
    /// Broadcast fan-out.
    pub dispatcher: Dispatcher,
    /// Dead connection sweeper.
    pub health: Arc<HealthMonitor>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl AppState {
    /// Builds the state from configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let cache = Arc::new(MessageCache::new(config.cache.clone()));
        let metrics = Arc::new(WsMetrics::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            Arc::clone(&metrics),
        );
        let health = Arc::new(HealthMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&metrics),
            config.health.clone(),
        ));

        Self {
            config: Arc::new(config),
            registry,
            cache,
            metrics,
            dispatcher,
            health,
        }
    }

    /// Returns counters including the message cache.
    #[must_use]
    pub fn metrics_snapshot(&self) -> WsMetricsSnapshot {
        self.metrics
            .snapshot()
            .with_cache(self.cache.hits(), self.cache.misses())
    }
}
