//! Single-use challenge nonces.
//!
//! Entries live in a sharded concurrent map keyed by nonce value. Consuming a
//! nonce removes its entry in one map operation, so of any number of racing
//! `consume` calls for the same value at most one observes the entry.

use crate::auth::token::{generate_nonce, RandomSource};
use crate::clock::Clock;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// An issued challenge nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct NonceEntry {
    expires_at: DateTime<Utc>,
}

pub struct NonceRegistry {
    entries: DashMap<String, NonceEntry>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
    ttl: TimeDelta,
}

impl NonceRegistry {
    pub fn new(clock: Arc<dyn Clock>, random: Arc<dyn RandomSource>, ttl: TimeDelta) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            random,
            ttl,
        }
    }

    /// Validity window of a freshly issued nonce.
    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Issue a fresh nonce and register it.
    pub fn issue(&self) -> Nonce {
        let issued_at = self.clock.now();
        let expires_at = issued_at + self.ttl;

        loop {
            let value = generate_nonce(self.random.as_ref());
            // Never overwrite an outstanding nonce.
            if let Entry::Vacant(slot) = self.entries.entry(value.clone()) {
                slot.insert(NonceEntry { expires_at });
                return Nonce {
                    value,
                    issued_at,
                    expires_at,
                };
            }
        }
    }

    /// Atomically check and burn a nonce.
    ///
    /// Returns `true` only if the nonce was outstanding and unexpired. The
    /// entry is removed either way, so every later call returns `false`.
    pub fn consume(&self, value: &str) -> bool {
        match self.entries.remove(value) {
            Some((_, entry)) => self.clock.now() < entry.expires_at,
            None => false,
        }
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
