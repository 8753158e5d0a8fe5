//! Response Cache
//!
//! Stores raw LLM responses keyed by a fingerprint of the request so repeated
//! inputs do not pay the token cost again.
//!
//! ## Backends
//!
//! - `MemoryCache`: bounded, insertion-ordered, process-local
//! - `FileCache`: one JSON file per key, survives restarts
//!
//! Both are selected by the caller before building the extractor and are
//! shared as `Arc<dyn ResponseCache>`.

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{CacheBackend, CacheConfig, ConfigLoader};
use crate::constants::cache as cache_constants;
use crate::types::{ExtractError, Result};

/// Cache contract shared by all backends.
///
/// `set` never fails the caller: backends swallow write errors.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str, tokens_used: u64);

    /// Remove every entry
    fn clear(&self) -> Result<()>;

    fn stats(&self) -> CacheStats;
}

pub type SharedCache = Arc<dyn ResponseCache>;

/// Build the configured backend
pub fn create_cache(config: &CacheConfig) -> Result<SharedCache> {
    let ttl = Duration::from_secs(config.ttl_hours.saturating_mul(3600));
    match config.backend {
        CacheBackend::Memory => {
            debug!(capacity = config.capacity, "Using memory cache");
            Ok(Arc::new(MemoryCache::new(config.capacity, ttl)))
        }
        CacheBackend::File => {
            let dir = config
                .dir
                .clone()
                .or_else(ConfigLoader::global_cache_dir)
                .ok_or_else(|| {
                    ExtractError::Cache("cannot determine cache directory".to_string())
                })?;
            debug!(dir = %dir.display(), "Using file cache");
            Ok(Arc::new(FileCache::new(dir, ttl)?))
        }
    }
}

/// Cache key for a request: SHA-256 over the schema-namespaced text,
/// first 16 bytes hex encoded.
pub fn fingerprint(text: &str, schema_type: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "extract:{}:{}:{}",
            schema_type,
            cache_constants::KEY_VERSION,
            text
        )
        .as_bytes(),
    );
    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

// =============================================================================
// Statistics
// =============================================================================

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Tokens not spent thanks to hits
    pub tokens_saved: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Cache hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters backing `CacheStats`
#[derive(Debug, Default)]
struct StatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    tokens_saved: AtomicU64,
}

impl StatsCounter {
    fn hit(&self, tokens_used: u64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.tokens_saved.fetch_add(tokens_used, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            tokens_saved: self.tokens_saved.load(Ordering::Relaxed),
            entries,
        }
    }
}
