//! Short-lived cache of serialized event payloads.
//!
//! A broadcast serializes the event once; producers that emit the same event
//! to several origins in quick succession reuse the encoded form. Entries
//! expire after a TTL and the cache never grows past its capacity.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use orderwire_sdk::{Fingerprint, OrderEvent};
use serde::Serialize;
use tracing::debug;

use crate::config::ConfigError;

/// Default entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

/// Default maximum number of entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Default number of aged entries removed per overflow pass.
pub const DEFAULT_PURGE_BATCH: usize = 32;

/// Message cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an entry stays valid.
    pub ttl: Duration,
    /// Maximum number of entries.
    pub capacity: usize,
    /// Entries older than this are purged first on overflow.
    pub purge_age: Duration,
    /// Maximum entries removed per overflow pass.
    pub purge_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            capacity: DEFAULT_CACHE_CAPACITY,
            purge_age: DEFAULT_CACHE_TTL / 2,
            purge_batch: DEFAULT_PURGE_BATCH,
        }
    }
}

impl CacheConfig {
    /// Sets the TTL and derives the purge age from it.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self.purge_age = ttl / 2;
        self
    }

    /// Sets the capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the overflow purge batch size.
    #[must_use]
    pub const fn with_purge_batch(mut self, batch: usize) -> Self {
        self.purge_batch = batch;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::Invalid("cache ttl must be positive".into()));
        }
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("cache capacity must be positive".into()));
        }
        if self.purge_batch == 0 {
            return Err(ConfigError::Invalid("cache purge batch must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Entry {
    event: OrderEvent,
    payload: Arc<str>,
    inserted: Instant,
}

/// Memoizes serialized events by fingerprint.
#[derive(Debug)]
pub struct MessageCache {
    config: CacheConfig,
    entries: Mutex<HashMap<Fingerprint, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl MessageCache {
    /// Creates a cache.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cache configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the serialized form of `event`, encoding it on a miss.
    ///
    /// A hit requires the cached event to equal `event`; a fingerprint
    /// collision is treated as a miss and replaces the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized.
    pub fn get_or_encode(&self, event: &OrderEvent) -> Result<Arc<str>, serde_json::Error> {
        self.get_or_encode_at(event, Instant::now())
    }

    /// Same as [`Self::get_or_encode`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized.
    pub fn get_or_encode_at(
        &self,
        event: &OrderEvent,
        now: Instant,
    ) -> Result<Arc<str>, serde_json::Error> {
        let (fingerprint, encoded) = if event.order().id.is_empty() {
            let payload = encode(event)?;
            (Fingerprint::for_content(&payload), Some(payload))
        } else {
            (event.fingerprint(), None)
        };

        let Ok(mut entries) = self.entries.lock() else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return encoded.map_or_else(|| encode(event), Ok);
        };

        if let Some(entry) = entries.get(&fingerprint) {
            if now.saturating_duration_since(entry.inserted) < self.config.ttl
                && entry.event == *event
            {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(&entry.payload));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let payload = match encoded {
            Some(payload) => payload,
            None => encode(event)?,
        };

        entries.insert(
            fingerprint,
            Entry {
                event: event.clone(),
                payload: Arc::clone(&payload),
                inserted: now,
            },
        );
        if entries.len() > self.config.capacity {
            self.evict(&mut entries, now);
        }

        Ok(payload)
    }

    fn evict(&self, entries: &mut HashMap<Fingerprint, Entry>, now: Instant) {
        let aged: Vec<Fingerprint> = entries
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.inserted) > self.config.purge_age)
            .map(|(k, _)| k.clone())
            .take(self.config.purge_batch)
            .collect();

        if aged.is_empty() {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
            return;
        }

        debug!(purged = aged.len(), "message cache purged aged entries");
        for key in aged {
            entries.remove(&key);
        }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |e| e.len())
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the hit count.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns the miss count.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

fn encode(event: &impl Serialize) -> Result<Arc<str>, serde_json::Error> {
    serde_json::to_string(event).map(Arc::from)
}
