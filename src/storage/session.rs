//! In-memory session store.
//!
//! Sessions map an opaque id to the address proven at sign-in. They are
//! immutable once created; the only mutation is removal (logout, expiry).

use crate::auth::address::EvmAddress;
use crate::auth::token::{generate_token, RandomSource};
use crate::clock::Clock;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub address: EvmAddress,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: DashMap<String, Session>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
    ttl: TimeDelta,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>, random: Arc<dyn RandomSource>, ttl: TimeDelta) -> Self {
        Self {
            sessions: DashMap::new(),
            clock,
            random,
            ttl,
        }
    }

    /// Open a session for `address` and return its id.
    pub fn create(&self, address: EvmAddress) -> (String, Session) {
        let created_at = self.clock.now();
        let session = Session {
            address,
            created_at,
            expires_at: created_at + self.ttl,
        };

        loop {
            let id = generate_token(self.random.as_ref());
            if let Entry::Vacant(slot) = self.sessions.entry(id.clone()) {
                slot.insert(session.clone());
                return (id, session);
            }
        }
    }

    /// Look up a live session. Expired sessions are evicted and reported as absent.
    pub fn get(&self, id: &str) -> Option<Session> {
        let now = self.clock.now();
        let session = self.sessions.get(id).map(|s| s.value().clone())?;
        if now < session.expires_at {
            return Some(session);
        }

        self.sessions.remove_if(id, |_, s| now >= s.expires_at);
        None
    }

    /// Remove a session. Absence is not an error; returns whether one was removed.
    pub fn delete(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now < s.expires_at);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
