//! Directory listing cache.
//!
//! Maps `(mount id, sub-path)` to a previously computed [`ListingResult`] so
//! repeated listings skip the object-storage `LIST` call. The cache is
//! process-local and best-effort: it only bounds staleness (by TTL and by
//! explicit invalidation from mutating operations), it never decides
//! correctness.
//!
//! One [`DirectoryCache`] is created at startup and shared as an `Arc` with
//! every component that lists or mutates.
//!
//! ## Bounds
//!
//! Two independent thresholds: entry count and estimated memory. When a
//! `set` pushes the cache over either one, it prunes: if expired entries make
//! up at least `prune_percentage` of all entries they are dropped; otherwise
//! the least recently accessed `prune_percentage` of entries are evicted.
//! Eviction then continues, oldest first, until both thresholds hold.

mod lru;
mod size;

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bucketfs_types::ListingResult;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::vfs::paths;

pub use lru::LruList;
pub use size::ApproxSize;

/// Cache limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_memory_bytes: usize,
    /// Fraction of entries removed by one prune pass, in `(0, 1]`.
    pub prune_percentage: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_memory_bytes: 50 * 1024 * 1024,
            prune_percentage: 0.2,
        }
    }
}

/// Cache key. Structured, so no two `(mount, path)` pairs can collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub mount_id: String,
    /// Canonical directory sub-path (`/` or `/a/b`).
    pub path: String,
}

impl CacheKey {
    pub fn new(mount_id: &str, path: &str) -> Self {
        Self {
            mount_id: mount_id.to_string(),
            path: paths::canonical_dir(path),
        }
    }

    /// Flat string form: mount id, `:`, base64url of the path.
    pub fn encoded(&self) -> String {
        format!("{}:{}", self.mount_id, URL_SAFE_NO_PAD.encode(self.path.as_bytes()))
    }

    fn is_within(&self, mount_id: &str, dir: &str) -> bool {
        self.mount_id == mount_id
            && (dir == "/" || self.path == dir || self.path.starts_with(&format!("{}/", dir)))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: ListingResult,
    expires_at: Instant,
    last_accessed_at: Instant,
    estimated_size: usize,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Counters and current footprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub estimated_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: LruList<CacheKey, CacheEntry>,
    total_bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Inner {
    fn remove(&mut self, key: &CacheKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.total_bytes = self.total_bytes.saturating_sub(entry.estimated_size);
                true
            }
            None => false,
        }
    }

    fn pop_lru(&mut self) -> bool {
        match self.entries.pop_lru() {
            Some((_, entry)) => {
                self.total_bytes = self.total_bytes.saturating_sub(entry.estimated_size);
                self.evictions += 1;
                true
            }
            None => false,
        }
    }

    fn remove_where(&mut self, pred: impl Fn(&CacheKey) -> bool) -> usize {
        let keys = self.entries.keys_where(|k, _| pred(k));
        keys.iter().filter(|k| self.remove(k)).count()
    }
}

/// TTL- and size-bounded directory listing cache.
#[derive(Debug)]
pub struct DirectoryCache {
    config: CacheConfig,
    inner: Mutex<Inner>,
}

impl Default for DirectoryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl DirectoryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cached listing for `(mount_id, path)`. Expired entries count as a
    /// miss and are evicted.
    pub fn get(&self, mount_id: &str, path: &str) -> Option<ListingResult> {
        let key = CacheKey::new(mount_id, path);
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get_mut(&key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_accessed_at = now;
                let data = entry.data.clone();
                inner.hits += 1;
                debug!("cache hit {}", key.encoded());
                return Some(data);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.remove(&key);
            debug!("cache entry expired {}", key.encoded());
        }
        inner.misses += 1;
        None
    }

    /// Store a listing for `ttl_seconds`. A zero TTL stores nothing.
    pub fn set(&self, mount_id: &str, path: &str, data: ListingResult, ttl_seconds: u64) {
        if ttl_seconds == 0 {
            return;
        }
        let key = CacheKey::new(mount_id, path);
        let now = Instant::now();
        let estimated_size = key.mount_id.approx_size() + key.path.approx_size() + data.approx_size();
        let entry = CacheEntry {
            data,
            expires_at: now + Duration::from_secs(ttl_seconds),
            last_accessed_at: now,
            estimated_size,
        };

        let mut inner = self.inner.lock();
        if let Some(old) = inner.entries.insert(key, entry) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.estimated_size);
        }
        inner.total_bytes += estimated_size;

        if self.over_limits(&inner) {
            self.prune(&mut inner, now);
        }
    }

    fn over_limits(&self, inner: &Inner) -> bool {
        inner.entries.len() > self.config.max_entries
            || inner.total_bytes > self.config.max_memory_bytes
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        let len = inner.entries.len();
        let pct = self.config.prune_percentage.clamp(0.0, 1.0);
        let target = ((len as f64 * pct).ceil() as usize).max(1);

        let expired = inner.entries.keys_where(|_, e| e.is_expired(now));
        let removed = if !expired.is_empty() && expired.len() >= target {
            expired.iter().filter(|k| inner.remove(k)).count()
        } else {
            let mut n = 0;
            while n < target && inner.pop_lru() {
                n += 1;
            }
            n
        };

        while self.over_limits(inner) && inner.pop_lru() {}

        debug!(
            "cache pruned {} entries ({} remain, ~{} bytes)",
            removed,
            inner.entries.len(),
            inner.total_bytes
        );
    }

    /// Drop one entry. Returns whether it existed.
    pub fn invalidate(&self, mount_id: &str, path: &str) -> bool {
        let key = CacheKey::new(mount_id, path);
        self.inner.lock().remove(&key)
    }

    /// Drop every entry of a mount.
    pub fn invalidate_mount(&self, mount_id: &str) -> usize {
        let count = self.inner.lock().remove_where(|k| k.mount_id == mount_id);
        debug!("invalidated {} cache entries for mount {}", count, mount_id);
        count
    }

    /// Drop everything.
    pub fn invalidate_all(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.total_bytes = 0;
        count
    }

    /// Drop `path` and every ancestor up to and including `/`.
    pub fn invalidate_path_and_ancestors(&self, mount_id: &str, path: &str) -> usize {
        let mut current = paths::canonical_dir(path);
        let mut inner = self.inner.lock();
        let mut count = 0;
        loop {
            if inner.remove(&CacheKey::new(mount_id, &current)) {
                count += 1;
            }
            if current == "/" {
                break;
            }
            current = paths::canonical_dir(&paths::parent(&current));
        }
        count
    }

    /// Drop `path` and everything cached beneath it.
    pub fn invalidate_subtree(&self, mount_id: &str, path: &str) -> usize {
        let dir = paths::canonical_dir(path);
        self.inner.lock().remove_where(|k| k.is_within(mount_id, &dir))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            estimated_bytes: inner.total_bytes,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketfs_types::Item;

    fn listing(path: &str) -> ListingResult {
        ListingResult {
            path: path.to_string(),
            is_virtual: false,
            is_root: false,
            mount_id: Some("m".into()),
            items: vec![Item::file("a.txt", format!("{}a.txt", path), 1)],
        }
    }

    fn small(max_entries: usize) -> DirectoryCache {
        DirectoryCache::new(CacheConfig {
            max_entries,
            max_memory_bytes: usize::MAX,
            prune_percentage: 0.5,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_set_and_expiry() {
        let cache = DirectoryCache::default();
        cache.set("m", "/x", listing("/x/"), 60);
        assert_eq!(cache.get("m", "/x"), Some(listing("/x/")));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("m", "/x").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("m", "/x").is_none());
        assert_eq!(cache.len(), 0);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_zero_ttl_is_not_cached() {
        let cache = DirectoryCache::default();
        cache.set("m", "/x", listing("/x/"), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_paths_are_canonicalized() {
        let cache = DirectoryCache::default();
        cache.set("m", "/x/", listing("/x/"), 60);
        assert!(cache.get("m", "/x").is_some());
        assert!(cache.get("m", "x//").is_some());
        assert!(cache.get("other", "/x").is_none());
    }

    #[test]
    fn test_keys_do_not_collide() {
        let cache = DirectoryCache::default();
        cache.set("a", "/b:c", listing("/1/"), 60);
        cache.set("a:b", "/c", listing("/2/"), 60);
        assert_eq!(cache.get("a", "/b:c").unwrap().path, "/1/");
        assert_eq!(cache.get("a:b", "/c").unwrap().path, "/2/");
        assert_ne!(CacheKey::new("a", "/b:c").encoded(), CacheKey::new("a:b", "/c").encoded());
    }

    #[test]
    fn test_invalidate_path_and_ancestors() {
        let cache = DirectoryCache::default();
        for path in ["/", "/a", "/a/b", "/a/b/c", "/a/x"] {
            cache.set("m", path, listing(path), 60);
        }
        cache.set("other", "/a", listing("/a"), 60);

        assert_eq!(cache.invalidate_path_and_ancestors("m", "/a/b/c"), 4);
        assert!(cache.get("m", "/a/b/c").is_none());
        assert!(cache.get("m", "/a/b").is_none());
        assert!(cache.get("m", "/a").is_none());
        assert!(cache.get("m", "/").is_none());
        assert!(cache.get("m", "/a/x").is_some());
        assert!(cache.get("other", "/a").is_some());
    }

    #[test]
    fn test_invalidate_variants() {
        let cache = DirectoryCache::default();
        cache.set("m", "/a", listing("/a"), 60);
        cache.set("m", "/a/b", listing("/a/b"), 60);
        cache.set("m", "/ab", listing("/ab"), 60);
        cache.set("n", "/a", listing("/a"), 60);

        assert!(cache.invalidate("m", "/ab"));
        assert!(!cache.invalidate("m", "/ab"));
        assert_eq!(cache.invalidate_subtree("m", "/a"), 2);
        assert_eq!(cache.invalidate_mount("n"), 1);

        cache.set("m", "/z", listing("/z"), 60);
        assert_eq!(cache.invalidate_all(), 1);
        assert_eq!(cache.stats().estimated_bytes, 0);
    }

    #[test]
    fn test_count_limit_evicts_least_recently_used() {
        let cache = small(4);
        for path in ["/1", "/2", "/3", "/4"] {
            cache.set("m", path, listing(path), 60);
        }
        // Touch /1 so /2 and /3 are the oldest.
        assert!(cache.get("m", "/1").is_some());
        cache.set("m", "/5", listing("/5"), 60);

        // 5 entries, prune 50% -> 3 evicted.
        assert_eq!(cache.len(), 2);
        assert!(cache.get("m", "/1").is_some());
        assert!(cache.get("m", "/5").is_some());
        assert!(cache.get("m", "/2").is_none());
        assert_eq!(cache.stats().evictions, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_prefers_expired_entries() {
        let cache = small(4);
        cache.set("m", "/old1", listing("/old1"), 1);
        cache.set("m", "/old2", listing("/old2"), 1);
        cache.set("m", "/old3", listing("/old3"), 1);
        cache.set("m", "/keep", listing("/keep"), 600);
        tokio::time::advance(Duration::from_secs(5)).await;

        cache.set("m", "/new", listing("/new"), 600);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("m", "/keep").is_some());
        assert!(cache.get("m", "/new").is_some());
    }

    #[test]
    fn test_memory_limit() {
        let one = {
            let key = CacheKey::new("m", "/1");
            key.mount_id.approx_size() + key.path.approx_size() + listing("/1").approx_size()
        };
        let cache = DirectoryCache::new(CacheConfig {
            max_entries: 100,
            max_memory_bytes: one * 3,
            prune_percentage: 0.25,
        });
        for path in ["/1", "/2", "/3", "/4"] {
            cache.set("m", path, listing(path), 60);
        }
        let stats = cache.stats();
        assert!(stats.estimated_bytes <= one * 3);
        assert_eq!(stats.entries, 3);
        assert!(cache.get("m", "/4").is_some());
    }
}
