//! In-memory response cache
//!
//! Bounded map with an explicit insertion-order queue. Eviction removes the
//! oldest inserted key regardless of how recently it was read.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{CacheStats, ResponseCache, StatsCounter};
use crate::constants::cache as cache_constants;
use crate::types::Result;

struct Entry {
    value: String,
    tokens_used: u64,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    order: VecDeque<String>,
}

impl Inner {
    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(entry)
    }
}

pub struct MemoryCache {
    inner: RwLock<Inner>,
    capacity: usize,
    ttl: Duration,
    stats: StatsCounter,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl MemoryCache {
    /// Create a cache; zero capacity or zero TTL select the defaults.
    /// TTLs beyond `MAX_TTL_HOURS` are capped.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = if capacity == 0 {
            cache_constants::DEFAULT_CAPACITY
        } else {
            capacity
        };
        let ttl = if ttl.is_zero() {
            Duration::from_secs(cache_constants::DEFAULT_TTL_HOURS * 3600)
        } else {
            ttl.min(max_ttl())
        };

        Self {
            inner: RwLock::new(Inner::default()),
            capacity,
            ttl,
            stats: StatsCounter::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entries
            .contains_key(key)
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let expired = {
            let inner = self
                .inner
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            match inner.entries.get(key) {
                None => {
                    self.stats.miss();
                    return None;
                }
                Some(entry) if Instant::now() < entry.expires_at => {
                    self.stats.hit(entry.tokens_used);
                    return Some(entry.value.clone());
                }
                Some(_) => true,
            }
        };

        if expired {
            let mut inner = self
                .inner
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            // Re-check: a writer may have refreshed the entry in between
            if let Some(entry) = inner.entries.get(key)
                && Instant::now() < entry.expires_at
            {
                self.stats.hit(entry.tokens_used);
                return Some(entry.value.clone());
            }

            if inner.remove(key).is_some() {
                self.stats.expiration();
                debug!(key, "memory cache entry expired");
            }
        }

        self.stats.miss();
        None
    }

    fn set(&self, key: &str, value: &str, tokens_used: u64) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Overwrite counts as a fresh insertion
        inner.remove(key);

        while inner.entries.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            self.stats.eviction();
            debug!(key = %oldest, "memory cache evicted oldest entry");
        }

        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                tokens_used,
                expires_at: expiry_from_now(self.ttl),
            },
        );
        inner.order.push_back(key.to_string());
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.entries.clear();
        inner.order.clear();
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }
}

fn max_ttl() -> Duration {
    Duration::from_secs(cache_constants::MAX_TTL_HOURS * 3600)
}

/// Expiry instant, saturating at the capped lifetime if the clock cannot reach it
fn expiry_from_now(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl)
        .or_else(|| now.checked_add(max_ttl()))
        .unwrap_or(now)
}
