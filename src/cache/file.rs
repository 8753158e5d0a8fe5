//! File-backed response cache
//!
//! One JSON file per key: `{ "response", "tokens_used", "expires_at" }`.
//! Expired or unreadable files count as misses; expired files are deleted on
//! read so the directory cleans itself over time.
//!
//! Only files named like a fingerprint (32 hex digits) count as entries, so
//! `clear` and `len` leave anything else in a shared directory alone.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CacheStats, ResponseCache, StatsCounter};
use crate::constants::cache as cache_constants;
use crate::types::{ExtractError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    response: String,
    tokens_used: u64,
    expires_at: DateTime<Utc>,
}

pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
    stats: StatsCounter,
}

impl FileCache {
    /// Open a cache rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            ExtractError::Cache(format!(
                "failed to create cache directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let ttl = if ttl.is_zero() {
            Duration::from_secs(cache_constants::DEFAULT_TTL_HOURS * 3600)
        } else {
            ttl
        };

        Ok(Self {
            dir,
            ttl,
            stats: StatsCounter::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of entry files currently on disk (expired ones included)
    pub fn len(&self) -> usize {
        self.entry_files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    fn entry_files(&self) -> Vec<PathBuf> {
        let Ok(read_dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_entry_file(path))
            .collect()
    }

    fn write_entry(&self, path: &Path, entry: &FileEntry) -> Result<()> {
        let data = serde_json::to_vec(entry)?;

        // Write to a sibling temp file then rename so readers never see a partial entry
        let suffix: u32 = rand::rng().random();
        let tmp = path.with_extension(format!("json.tmp-{:08x}", suffix));
        fs::write(&tmp, data)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// `<32 hex digits>.json`, the name `set` gives a fingerprint key
fn is_entry_file(path: &Path) -> bool {
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let is_fingerprint = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.len() == 32 && stem.bytes().all(|b| b.is_ascii_hexdigit()));
    is_json && is_fingerprint && path.is_file()
}

impl ResponseCache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);

        let entry = fs::read(&path)
            .ok()
            .and_then(|data| serde_json::from_slice::<FileEntry>(&data).ok());

        let Some(entry) = entry else {
            self.stats.miss();
            return None;
        };

        if Utc::now() >= entry.expires_at {
            if let Err(e) = fs::remove_file(&path) {
                debug!(path = %path.display(), error = %e, "failed to remove expired cache file");
            }
            self.stats.expiration();
            self.stats.miss();
            return None;
        }

        self.stats.hit(entry.tokens_used);
        Some(entry.response)
    }

    fn set(&self, key: &str, value: &str, tokens_used: u64) {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let entry = FileEntry {
            response: value.to_string(),
            tokens_used,
            expires_at: Utc::now()
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let path = self.entry_path(key);
        if let Err(e) = self.write_entry(&path, &entry) {
            debug!(path = %path.display(), error = %e, "cache write dropped");
        }
    }

    fn clear(&self) -> Result<()> {
        for path in self.entry_files() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fingerprint;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn key(text: &str) -> String {
        fingerprint(text, "business_rule")
    }

    fn cache_in(dir: &TempDir) -> FileCache {
        FileCache::new(dir.path().join("cache"), Duration::from_secs(3600)).unwrap()
    }

    #[test]
    fn test_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        assert!(cache.dir().is_dir());

        // Existing directory is fine
        FileCache::new(cache.dir(), Duration::ZERO).unwrap();
    }

    #[test]
    fn test_create_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();

        let err = FileCache::new(blocker.join("cache"), Duration::ZERO)
            .err()
            .unwrap();
        assert!(err.to_string().contains("failed to create cache directory"));
    }

    #[test]
    fn test_round_trip_and_overwrite() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);

        assert_eq!(cache.get("missing"), None);

        let test_key = key("refund policy");
        cache.set(&test_key, r#"{"test": "value"}"#, 100);
        assert_eq!(cache.get(&test_key).as_deref(), Some(r#"{"test": "value"}"#));

        cache.set(&test_key, "value2", 60);
        assert_eq!(cache.get(&test_key).as_deref(), Some("value2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_file_format() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        cache.set("abc123", "payload", 42);

        let raw = fs::read_to_string(cache.dir().join("abc123.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["response"], "payload");
        assert_eq!(json["tokens_used"], 42);
        assert!(json["expires_at"].as_str().unwrap().parse::<DateTime<Utc>>().is_ok());
    }

    #[test]
    fn test_expired_entry_is_deleted() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        let path = cache.dir().join("expired_key.json");
        fs::write(
            &path,
            r#"{"response":"value","tokens_used":100,"expires_at":"2000-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(cache.get("expired_key"), None);
        assert!(!path.exists());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_ttl_expiry() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path(), Duration::from_millis(50)).unwrap();
        cache.set("short", "value", 1);
        assert!(cache.get("short").is_some());

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.get("short"), None);
    }

    #[test]
    fn test_corrupt_file_is_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        fs::write(cache.dir().join("corrupt_key.json"), "not valid json").unwrap();

        assert_eq!(cache.get("corrupt_key"), None);
    }

    #[test]
    fn test_unsafe_key_stays_in_directory() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        cache.set("../escape", "value", 1);

        assert_eq!(cache.get("../escape").as_deref(), Some("value"));
        assert!(cache.dir().join("___escape.json").exists());
    }

    #[test]
    fn test_clear_removes_entries() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        cache.set(&key("a"), "1", 0);
        cache.set(&key("b"), "2", 0);
        assert_eq!(cache.len(), 2);

        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_leaves_unrelated_files() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        let notes = cache.dir().join("notes.json");
        let manifest = cache.dir().join("package.json");
        fs::write(&notes, r#"{"keep": true}"#).unwrap();
        fs::write(&manifest, "{}").unwrap();
        cache.set(&key("refund policy"), "value", 1);

        assert_eq!(cache.stats().entries, 1);

        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(notes.exists());
        assert!(manifest.exists());
    }

    #[test]
    fn test_concurrent_access() {
        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(cache_in(&tmp));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let entry_key = key(&format!("document {i}"));
                    cache.set(&entry_key, &format!("value_{i}"), 100);
                    assert_eq!(cache.get(&entry_key), Some(format!("value_{i}")));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 10);
    }
}
