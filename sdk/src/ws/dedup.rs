//! Inbound message deduplication.
//!
//! The same event can arrive more than once: over both the primary and the
//! secondary link, or again after a producer retry. The deduplicator keeps a
//! bounded set of recently seen fingerprints and drops repeats.

use std::collections::{HashSet, VecDeque};

use crate::types::{Fingerprint, OrderEvent};

/// Bounded recently-seen filter.
#[derive(Debug)]
pub struct Deduplicator {
    seen: HashSet<Fingerprint>,
    insertion_order: VecDeque<Fingerprint>,
    capacity: usize,
    rejected: u64,
}

impl Deduplicator {
    /// Creates a deduplicator holding up to `capacity` fingerprints.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            seen: HashSet::with_capacity(capacity),
            insertion_order: VecDeque::with_capacity(capacity),
            capacity,
            rejected: 0,
        }
    }

    /// Accepts a raw message unless it was already seen.
    pub fn accept(&mut self, raw: &str) -> bool {
        self.accept_fingerprint(Fingerprint::of_raw(raw))
    }

    /// Accepts a decoded event unless it was already seen.
    pub fn accept_event(&mut self, event: &OrderEvent) -> bool {
        self.accept_fingerprint(event.fingerprint())
    }

    /// Accepts a fingerprint unless it was already seen.
    pub fn accept_fingerprint(&mut self, fingerprint: Fingerprint) -> bool {
        if self.seen.contains(&fingerprint) {
            self.rejected = self.rejected.saturating_add(1);
            return false;
        }

        self.seen.insert(fingerprint.clone());
        self.insertion_order.push_back(fingerprint);

        if self.seen.len() > self.capacity {
            self.discard_oldest_half();
        }

        true
    }

    /// Returns the number of fingerprints currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if nothing has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Returns how many messages were rejected as duplicates.
    #[must_use]
    pub const fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.seen.clear();
        self.insertion_order.clear();
    }

    fn discard_oldest_half(&mut self) {
        let discard = self.insertion_order.len() / 2;
        for fingerprint in self.insertion_order.drain(..discard) {
            self.seen.remove(&fingerprint);
        }
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(super::config::DEFAULT_DEDUP_CAPACITY)
    }
}
