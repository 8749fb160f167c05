//! Metadata probing with an owned expiring cache
//!
//! Probing a URL (title, uploader, duration and available formats) is a read path separate
//! from job execution. Results are cached per URL for `cache_ttl`; the cache is bounded by
//! `cache_capacity` and evicts the oldest entry when full. A background task started by the
//! orchestrator calls [`ProbeCache::sweep_expired`] every `sweep_interval`.

use crate::config::ProbeConfig;
use crate::types::MediaInfo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry {
    info: MediaInfo,
    inserted_at: Instant,
}

/// Bounded, time-limited cache of probe results keyed by URL
pub struct ProbeCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl ProbeCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            ttl,
        }
    }

    /// Create a cache from configuration
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.cache_capacity, config.cache_ttl)
    }

    /// Fresh cached result for a URL
    pub fn get(&self, url: &str) -> Option<MediaInfo> {
        let mut entries = self.entries.lock();
        match entries.get(url) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.info.clone()),
            Some(_) => {
                entries.remove(url);
                None
            }
            None => None,
        }
    }

    /// Store a result, evicting the oldest entry when the cache is full
    pub fn insert(&self, info: MediaInfo) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.entries.lock();
        if !entries.contains_key(&info.url) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(url, _)| url.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            info.url.clone(),
            CacheEntry {
                info,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop one URL
    pub fn invalidate(&self, url: &str) -> bool {
        self.entries.lock().remove(url).is_some()
    }

    /// Remove every expired entry, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        before - entries.len()
    }

    /// Number of cached entries (expired ones included until swept)
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
