use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use wordgrid_core::{normalize_word, WordFrequency};

use crate::config::CacheConfig;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    hits: u64,
    misses: u64,
}

#[derive(Debug)]
pub struct TtlLruCache<K: Hash + Eq, V> {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Hash + Eq, V: Clone> TtlLruCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let bound = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            capacity,
            ttl,
            inner: Mutex::new(Inner {
                entries: LruCache::new(bound),
                hits: 0,
                misses: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.lock();
        let lookup = inner
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));
        let found = match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                inner.entries.pop(key);
                None
            }
            None => None,
        };
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    pub fn put(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let now = Instant::now();
        let mut inner = self.lock();
        while inner
            .entries
            .peek_lru()
            .is_some_and(|(_, entry)| entry.expires_at <= now)
        {
            inner.entries.pop_lru();
        }
        inner.entries.put(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

pub fn cache_key(fingerprint: &str, word: &str) -> String {
    format!("{fingerprint}::{}", normalize_word(word))
}

#[derive(Debug)]
pub struct ProbabilityCache {
    store: TtlLruCache<String, f64>,
}

impl ProbabilityCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            store: TtlLruCache::new(config.capacity, config.ttl()),
        }
    }

    pub fn get(&self, fingerprint: &str, word: &str) -> Option<f64> {
        self.store.get(&cache_key(fingerprint, word))
    }

    pub fn put(&self, fingerprint: &str, word: &str, probability: f64) {
        self.store
            .put(cache_key(fingerprint, word), probability.clamp(0.0, 1.0));
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    #[cfg(test)]
    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }
}

pub type DistributionMemo = TtlLruCache<String, Vec<WordFrequency>>;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(capacity: usize, ttl_secs: u64) -> CacheConfig {
        CacheConfig { capacity, ttl_secs }
    }

    #[tokio::test(start_paused = true)]
    async fn put_then_get_round_trips() {
        let cache = ProbabilityCache::new(&config(10, 300));
        cache.put("the|quick", "Fox ", 0.4);
        assert_eq!(cache.get("the|quick", "fox"), Some(0.4));
        assert_eq!(cache.get("the|slow", "fox"), None);
        assert_eq!(cache.size(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_least_recently_used() {
        let capacity = 3;
        let cache = ProbabilityCache::new(&config(capacity, 300));
        for i in 0..=capacity {
            cache.put("ctx", &format!("w{i}"), 0.1);
        }
        assert_eq!(cache.size(), capacity);
        assert_eq!(cache.get("ctx", "w0"), None);
        assert_eq!(cache.get("ctx", "w3"), Some(0.1));
    }

    #[tokio::test(start_paused = true)]
    async fn reads_refresh_recency() {
        let cache = ProbabilityCache::new(&config(2, 300));
        cache.put("ctx", "a", 0.1);
        cache.put("ctx", "b", 0.2);
        assert!(cache.get("ctx", "a").is_some());
        cache.put("ctx", "c", 0.3);
        assert_eq!(cache.get("ctx", "b"), None);
        assert_eq!(cache.get("ctx", "a"), Some(0.1));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_regardless_of_access() {
        let cache = ProbabilityCache::new(&config(10, 300));
        cache.put("ctx", "a", 0.5);
        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(cache.get("ctx", "a"), Some(0.5));
        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(cache.get("ctx", "a"), None);
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn insert_sweeps_expired_tail() {
        let cache = ProbabilityCache::new(&config(10, 60));
        cache.put("ctx", "old", 0.5);
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.put("ctx", "new", 0.5);
        assert_eq!(cache.size(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_stay_within_capacity() {
        let capacity = 32;
        let (workers, per_worker) = (8, 50);
        let cache = std::sync::Arc::new(ProbabilityCache::new(&config(capacity, 300)));

        let mut tasks = tokio::task::JoinSet::new();
        for worker in 0..workers {
            let cache = cache.clone();
            tasks.spawn(async move {
                for i in 0..per_worker {
                    let fingerprint = format!("ctx{worker}");
                    cache.put(&fingerprint, &format!("w{i}"), 0.5);
                    let _ = cache.get(&fingerprint, &format!("w{i}"));
                    tokio::task::yield_now().await;
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.entries, capacity);
        assert_eq!(stats.hits + stats.misses, (workers * per_worker) as u64);

        let mut surviving = 0;
        for worker in 0..workers {
            for i in 0..per_worker {
                if let Some(probability) = cache.get(&format!("ctx{worker}"), &format!("w{i}")) {
                    assert_eq!(probability, 0.5);
                    surviving += 1;
                }
            }
        }
        assert_eq!(surviving, capacity);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_capacity_stores_nothing() {
        let cache = ProbabilityCache::new(&config(0, 300));
        cache.put("ctx", "a", 0.5);
        assert_eq!(cache.get("ctx", "a"), None);
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_track_hits_and_clear_resets() {
        let cache = ProbabilityCache::new(&config(10, 300));
        cache.put("ctx", "a", 0.5);
        cache.get("ctx", "a");
        cache.get("ctx", "b");
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn key_is_fingerprint_and_normalized_word() {
        assert_eq!(cache_key("sun|moon", "  Rises "), "sun|moon::rises");
        assert_eq!(cache_key("", "x"), "::x");
    }

    proptest! {
        #[test]
        fn round_trip_for_any_key(
            fingerprint in "[a-z|]{0,12}",
            word in "[a-z]{1,8}",
            probability in 0.0f64..=1.0,
        ) {
            let cache = ProbabilityCache::new(&config(16, 300));
            cache.put(&fingerprint, &word, probability);
            prop_assert_eq!(cache.get(&fingerprint, &word), Some(probability));
        }
    }
}
