//! Connection registry.
//!
//! Tracks which live connections are registered under which channel. A
//! channel exists only while at least one connection is registered under it.

use std::collections::HashMap;
use std::sync::Arc;

use orderwire_sdk::Channel;
use tokio::sync::RwLock;

use super::connection::Connection;

/// Map from channel to the connections registered under it.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    channels: RwLock<HashMap<Channel, HashMap<u64, Arc<Connection>>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection under a channel.
    pub async fn register(&self, channel: Channel, connection: Arc<Connection>) {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel)
            .or_default()
            .insert(connection.id(), connection);
    }

    /// Removes a connection from a channel, pruning the channel if it
    /// becomes empty. Returns true if the connection was registered.
    pub async fn unregister(&self, channel: &Channel, connection_id: u64) -> bool {
        let mut channels = self.channels.write().await;
        let Some(connections) = channels.get_mut(channel) else {
            return false;
        };

        let removed = connections.remove(&connection_id).is_some();
        if connections.is_empty() {
            channels.remove(channel);
        }
        removed
    }

    /// Returns a point-in-time copy of a channel's connections.
    pub async fn snapshot(&self, channel: &Channel) -> Vec<Arc<Connection>> {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns a point-in-time copy of every registered connection.
    pub async fn all_connections(&self) -> Vec<Arc<Connection>> {
        let channels = self.channels.read().await;
        channels
            .values()
            .flat_map(|c| c.values().cloned())
            .collect()
    }

    /// Returns a point-in-time copy of every (channel, connection) pair.
    pub async fn registrations(&self) -> Vec<(Channel, Arc<Connection>)> {
        let channels = self.channels.read().await;
        channels
            .iter()
            .flat_map(|(channel, c)| {
                c.values()
                    .map(move |conn| (channel.clone(), Arc::clone(conn)))
            })
            .collect()
    }

    /// Returns the number of connections registered under a channel.
    pub async fn subscriber_count(&self, channel: &Channel) -> usize {
        let channels = self.channels.read().await;
        channels.get(channel).map_or(0, HashMap::len)
    }

    /// Returns the total number of registrations.
    pub async fn connection_count(&self) -> usize {
        let channels = self.channels.read().await;
        channels.values().map(HashMap::len).sum()
    }

    /// Returns the number of live channels.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Returns the size of the most populated channel.
    pub async fn max_channel_density(&self) -> usize {
        let channels = self.channels.read().await;
        channels.values().map(HashMap::len).max().unwrap_or(0)
    }
}
