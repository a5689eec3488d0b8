//! Best-effort suppression of repeated payment initiations.
//!
//! A customer double-clicking "Pay" should not open two gateway transactions. The deduplicator remembers
//! `(identity, amount)` pairs for a short window and reports a repeat inside that window as a duplicate.
//!
//! This is a rate limiter, not a correctness mechanism. Entries are process-local and may be lost at any time; the
//! only guarantee against duplicate *orders* is the unique external transaction id in storage.
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{mapref::entry::Entry, DashMap};
use log::*;

pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct RequestDeduplicator {
    entries: Arc<DashMap<String, Instant>>,
    ttl: Duration,
}

impl Default for RequestDeduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_TTL)
    }
}

impl RequestDeduplicator {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Arc::new(DashMap::new()), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Keys are deliberately narrow: the exact amount string, and the identity with only case and whitespace folded.
    /// A missed duplicate is harmless, blocking a legitimate payment is not.
    pub fn dedup_key(identity: &str, amount: &str) -> String {
        format!("{}|{}", identity.trim().to_ascii_lowercase(), amount.trim())
    }

    /// Returns `true` if the same identity asked for the same amount within the TTL. The original timestamp is kept in
    /// that case, so repeated hammering does not extend the window. Otherwise the request is recorded and `false` is
    /// returned.
    pub fn check_and_record(&self, identity: &str, amount: &str) -> bool {
        self.check_and_record_at(identity, amount, Instant::now())
    }

    fn check_and_record_at(&self, identity: &str, amount: &str, now: Instant) -> bool {
        let key = Self::dedup_key(identity, amount);
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if now.saturating_duration_since(*entry.get()) < self.ttl {
                    debug!("🔄️ Duplicate initiation request for [{}]", entry.key());
                    true
                } else {
                    entry.insert(now);
                    false
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(now);
                false
            },
        }
    }

    /// Removes the record for this request, e.g. because it failed before anything was opened with the gateway.
    pub fn forget(&self, identity: &str, amount: &str) {
        self.entries.remove(&Self::dedup_key(identity, amount));
    }

    /// Drops every entry older than the TTL and returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    fn evict_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, recorded| now.saturating_duration_since(*recorded) < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
