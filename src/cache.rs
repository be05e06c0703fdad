//! Short-lived memoization of search results.
//!
//! Entries expire after a fixed TTL and the whole cache is cleared every
//! time the underlying content changes. The cache never looks at
//! documents itself; callers key entries by query and limit.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::{task::JoinHandle, time::Instant};

use crate::search::{SearchPage, SearchResult};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 2000;
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Which search operation produced a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Search,
    Title,
    Suggestions,
    Page { page: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: QueryKind,
    pub query: String,
    pub limit: usize,
}

impl CacheKey {
    /// Queries differing only in case or spacing share one entry.
    pub fn new(kind: QueryKind, query: &str, limit: usize) -> Self {
        Self {
            kind,
            query: query
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
            limit,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Results(Vec<SearchResult>),
    Suggestions(Vec<String>),
    Page(SearchPage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct Entry {
    value: CachedValue,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct SearchCache {
    config: CacheConfig,
    entries: Mutex<HashMap<CacheKey, Entry>>,
    /// Bumped by every [`clear`](SearchCache::clear).
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl SearchCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A live entry for `key`. Expired entries count as misses and are
    /// dropped on the spot.
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(query = %key.query, "Search cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Current generation. Read it before taking the snapshot a value is
    /// computed from, then hand it to [`insert_at`](Self::insert_at).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store `value` under `key`. When the cache is full, expired entries
    /// go first, then the entry closest to expiry.
    pub fn insert(&self, key: CacheKey, value: CachedValue) {
        let mut entries = self.entries.lock();
        self.store(&mut *entries, key, value);
    }

    /// Like [`insert`](Self::insert), but drops `value` when the cache
    /// was cleared after `generation` was read. Returns whether the
    /// value was stored.
    pub fn insert_at(
        &self,
        generation: u64,
        key: CacheKey,
        value: CachedValue,
    ) -> bool {
        let mut entries = self.entries.lock();
        if self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(
                query = %key.query,
                "Dropping search result computed before a clear"
            );
            return false;
        }
        self.store(&mut *entries, key, value);
        true
    }

    fn store(
        &self,
        entries: &mut HashMap<CacheKey, Entry>,
        key: CacheKey,
        value: CachedValue,
    ) {
        if self.config.max_entries == 0 {
            return;
        }

        let now = Instant::now();
        if !entries.contains_key(&key)
            && entries.len() >= self.config.max_entries
        {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.config.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.config.ttl,
            },
        );
    }

    /// Drop every entry and start a new generation. Hit and miss counters
    /// are kept.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        let dropped = entries.len();
        entries.clear();
        tracing::debug!(dropped, "Cleared search cache");
    }

    /// Drop expired entries and return how many were removed.
    pub fn cleanup(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().len(),
        }
    }

    /// Run [`cleanup`](Self::cleanup) every `interval` on the current
    /// tokio runtime. The task stops once the cache is dropped.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.cleanup();
                if removed > 0 {
                    tracing::debug!(removed, "Expired search cache entries");
                }
            }
        })
    }
}
