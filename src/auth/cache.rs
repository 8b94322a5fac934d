//! Small concurrent cache with per-entry expiry.

use dashmap::DashMap;
use std::{
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};

const PURGE_THRESHOLD: usize = 10_000;

#[derive(Clone, Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Clone, Debug)]
pub struct TtlCache<K: Eq + Hash, V> {
    entries: Arc<DashMap<K, Entry<V>>>,
    ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Arc::new(DashMap::new()), ttl }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let hit = self.entries.get(key).and_then(|e| (e.expires_at > Instant::now()).then(|| e.value.clone()));
        if hit.is_none() {
            self.entries.remove_if(key, |_, e| e.expires_at <= Instant::now());
        }
        hit
    }

    /// Caches `value` for the configured TTL, or less if `max_age` is shorter.
    pub fn insert(&self, key: K, value: V, max_age: Option<Duration>) {
        let age = max_age.map_or(self.ttl, |max| max.min(self.ttl));
        if age.is_zero() {
            return;
        }
        if self.entries.len() >= PURGE_THRESHOLD {
            self.purge_expired();
        }
        self.entries.insert(key, Entry { value, expires_at: Instant::now() + age });
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
