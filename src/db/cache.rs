//! Query result caching.
//!
//! Backend-agnostic key/value store with per-entry TTL. The bundled
//! backends are an in-process map and a file-backed store; a remote cache
//! service plugs in by implementing [`QueryCacheStore`] and installing it
//! via the connection manager.
//!
//! An entry is visible iff `now < stored_at + ttl`; expired entries are
//! treated as absent regardless of when they are physically deleted.

use crate::models::QueryResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default TTL for cached query results, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Contract shared by every cache backend.
///
/// `set` followed by `get` with the same key within the TTL window returns
/// the just-stored value; the backend must make each per-key write atomic
/// with respect to concurrent readers.
pub trait QueryCacheStore: Send + Sync {
    /// Fetch a live entry, treating expired ones as absent.
    fn get(&self, key: &str) -> Option<QueryResult>;

    /// Store an entry with the given TTL.
    fn set(&self, key: &str, value: QueryResult, ttl: Duration);

    /// Remove the entry with the given key, and every entry whose key
    /// starts with it.
    fn invalidate(&self, key_or_prefix: &str);

    /// Number of live entries, for diagnostics.
    fn len(&self) -> usize;
}

/// Backend selection for [`crate::db::ConnectionManager::configure_cache`].
#[derive(Debug, Clone)]
pub enum CacheOptions {
    /// In-process map.
    Memory,
    /// One JSON file per entry under the given directory.
    File { dir: PathBuf },
}

// =============================================================================
// In-memory backend
// =============================================================================

struct MemoryEntry {
    stored_at: Instant,
    ttl: Duration,
    value: QueryResult,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// Mutex-guarded map with lazy expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueryCacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<QueryResult> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: QueryResult, ttl: Duration) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.to_string(),
            MemoryEntry {
                stored_at: Instant::now(),
                ttl,
                value,
            },
        );
    }

    fn invalidate(&self, key_or_prefix: &str) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.retain(|key, _| !key.starts_with(key_or_prefix));
    }

    fn len(&self) -> usize {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries.values().filter(|e| !e.is_expired()).count()
    }
}

// =============================================================================
// File backend
// =============================================================================

/// On-disk entry format. The full key is stored inside the file because
/// file names only carry its hash.
#[derive(Serialize, Deserialize)]
struct FileEntry {
    key: String,
    stored_at_unix: i64,
    ttl_secs: u64,
    value: QueryResult,
}

impl FileEntry {
    fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.stored_at_unix + self.ttl_secs as i64
    }
}

/// One JSON file per entry. Writes go through a temp file plus rename, so a
/// concurrent reader sees either the old entry or the new one, never a
/// partial write.
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Create a file cache rooted at `dir`, creating the directory if
    /// needed.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        self.dir.join(format!("{:016x}.json", hasher.finish()))
    }

    fn read_entry(&self, path: &PathBuf) -> Option<FileEntry> {
        let data = std::fs::read(path).ok()?;
        serde_json::from_slice(&data).ok()
    }
}

impl QueryCacheStore for FileCache {
    fn get(&self, key: &str) -> Option<QueryResult> {
        let path = self.entry_path(key);
        let entry = self.read_entry(&path)?;
        if entry.key != key {
            // hash collision, treat as absent
            return None;
        }
        if entry.is_expired() {
            let _ = std::fs::remove_file(&path);
            return None;
        }
        Some(entry.value)
    }

    fn set(&self, key: &str, value: QueryResult, ttl: Duration) {
        let entry = FileEntry {
            key: key.to_string(),
            stored_at_unix: chrono::Utc::now().timestamp(),
            ttl_secs: ttl.as_secs(),
            value,
        };
        let path = self.entry_path(key);
        let tmp = path.with_extension("tmp");
        let write = serde_json::to_vec(&entry)
            .map_err(std::io::Error::other)
            .and_then(|data| std::fs::write(&tmp, data))
            .and_then(|_| std::fs::rename(&tmp, &path));
        if let Err(e) = write {
            // Cache writes are best effort; the next get is a miss
            warn!(error = %e, "Failed to write cache entry");
        }
    }

    fn invalidate(&self, key_or_prefix: &str) {
        let Ok(dir) = std::fs::read_dir(&self.dir) else {
            return;
        };
        for file in dir.flatten() {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(entry) = self.read_entry(&path) {
                if entry.key.starts_with(key_or_prefix) {
                    debug!(key = %entry.key, "Invalidating cache entry");
                    let _ = std::fs::remove_file(&path);
                }
            }
        }
    }

    fn len(&self) -> usize {
        let Ok(dir) = std::fs::read_dir(&self.dir) else {
            return 0;
        };
        dir.flatten()
            .filter_map(|file| self.read_entry(&file.path()))
            .filter(|entry| !entry.is_expired())
            .count()
    }
}
