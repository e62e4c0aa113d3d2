//! The loading cache.
//!
//! [`LoadingCache`] wraps a [`RecencyStore`] of timestamped entries and calls
//! a configured loader whenever a key is missing or stale. Staleness is
//! checked on every read; sweeping expired entries only bounds memory.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::config::{CacheConfig, Loader};
use crate::entry::LoadingItem;
use crate::error::{CacheError, CacheResult};
use crate::key::{CacheKey, KeyNormalizer};
use crate::lru::RecencyStore;
use crate::stats::{CacheStats, StatsSnapshot};

/// A thread-safe cache with TTL expiration and loader-on-miss.
///
/// Cloning a `LoadingCache` creates a new handle to the same entries.
///
/// # Example
/// ```
/// use loading_cache::{CacheConfig, LoadingCache};
/// use std::time::Duration;
///
/// let cache = LoadingCache::new(
///     CacheConfig::new()
///         .capacity(1000)
///         .expire_after_write(Duration::from_secs(5))
///         .loader(|n: &u64| Ok(n * 2))
///         .build()
///         .unwrap(),
/// );
///
/// assert_eq!(cache.get(&3).unwrap(), 6);
/// cache.put(4, 100).unwrap();
/// assert_eq!(cache.get(&4).unwrap(), 100);
/// ```
pub struct LoadingCache<K, V> {
    shared: Arc<Shared<K, V>>,
}

struct Shared<K, V> {
    store: RecencyStore<K, LoadingItem<V>>,
    stats: Arc<CacheStats>,
    expire_after_write: Duration,
    sweep_interval: Duration,
    min_sweep_interval: Duration,
    loader: Option<Loader<K, V>>,
    clock: Arc<dyn Clock>,

    /// Held across lookup, load and write so loads for this cache are
    /// serialized and no reader sees a half-written entry.
    guard: Mutex<SweepState>,
}

#[derive(Debug, Default)]
struct SweepState {
    last_sweep: Option<Instant>,
}

impl<K: CacheKey, V> LoadingCache<K, V> {
    /// Create a new cache with the given configuration.
    pub fn new(config: CacheConfig<K, V>) -> Self {
        let normalizer = KeyNormalizer::from_option(config.key_encoder);
        let store = RecencyStore::with_normalizer(config.capacity, normalizer);
        let stats = store.stats();
        Self {
            shared: Arc::new(Shared {
                store,
                stats,
                expire_after_write: config.expire_after_write,
                sweep_interval: config.sweep_interval,
                min_sweep_interval: config.min_sweep_interval,
                loader: config.loader,
                clock: config.clock,
                guard: Mutex::new(SweepState::default()),
            }),
        }
    }
}

impl<K, V> LoadingCache<K, V>
where
    K: CacheKey + Clone,
    V: Clone,
{
    /// Get the value for `key`, loading it if absent or stale.
    ///
    /// A fresh hit refreshes the entry's recency. On a miss the loader runs
    /// synchronously; its result is stored with a new deadline. Loader errors
    /// are returned and nothing is cached, so a stale entry survives a failed
    /// reload. Without a loader a miss is [`CacheError::NotFound`].
    pub fn get(&self, key: &K) -> CacheResult<V> {
        let s = &*self.shared;
        let id = s.store.normalizer().normalize(key)?;
        let _guard = s.guard.lock();

        if let Some(item) = s.store.get_normalized(&id) {
            if !item.is_expired_at(s.clock.now()) {
                s.stats.record_hit();
                return Ok(item.value);
            }
            trace!(key = %id, "entry is stale");
        }
        s.stats.record_miss();
        self.load_locked(id, key)
    }

    /// Like [`get`](Self::get), but any failure yields `None`.
    pub fn must_get(&self, key: &K) -> Option<V> {
        self.get(key).ok()
    }

    /// Best-effort batch lookup. Returns the keys that produced a value, in
    /// input order, each paired with its value.
    pub fn get_all<'a, I>(&self, keys: I) -> Vec<(K, V)>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        keys.into_iter()
            .filter_map(|key| self.get(key).ok().map(|value| (key.clone(), value)))
            .collect()
    }

    /// Store `value` directly, bypassing the loader.
    pub fn put(&self, key: K, value: V) -> CacheResult<()> {
        let s = &*self.shared;
        let id = s.store.normalizer().normalize(&key)?;
        let _guard = s.guard.lock();
        self.write_locked(id, key, value);
        Ok(())
    }

    /// Reload `key` unconditionally.
    pub fn refresh(&self, key: &K) -> CacheResult<V> {
        let s = &*self.shared;
        let id = s.store.normalizer().normalize(key)?;
        let _guard = s.guard.lock();
        self.load_locked(id, key)
    }

    /// Whether `key` holds a fresh value. Never loads and never touches recency.
    pub fn contains(&self, key: &K) -> CacheResult<bool> {
        let s = &*self.shared;
        let now = s.clock.now();
        Ok(s.store
            .peek(key)?
            .map_or(false, |item| !item.is_expired_at(now)))
    }

    /// Remove `key`, returning its value (fresh or stale) if present.
    pub fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        let s = &*self.shared;
        let id = s.store.normalizer().normalize(key)?;
        let _guard = s.guard.lock();
        Ok(s.store.remove_normalized(&id).map(|item| item.value))
    }

    fn load_locked(&self, id: String, key: &K) -> CacheResult<V> {
        let s = &*self.shared;
        let Some(loader) = &s.loader else {
            return Err(CacheError::NotFound(id));
        };

        match loader(key) {
            Ok(value) => {
                s.stats.record_load();
                trace!(key = %id, "loaded entry");
                self.write_locked(id, key.clone(), value.clone());
                Ok(value)
            }
            Err(err) => {
                s.stats.record_load_failure();
                warn!(key = %id, error = %err, "loader failed");
                Err(CacheError::Loader(err))
            }
        }
    }

    fn write_locked(&self, id: String, key: K, value: V) {
        let s = &*self.shared;
        let item = LoadingItem::new(value, s.clock.now(), s.expire_after_write);
        s.store.put_normalized(id, key, item);
    }
}

impl<K, V> LoadingCache<K, V> {
    /// Number of stored entries, including stale ones not yet swept.
    pub fn size(&self) -> usize {
        self.shared.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn clear(&self) {
        let _guard = self.shared.guard.lock();
        self.shared.store.clear();
    }

    /// Remove every expired entry and return how many were removed.
    ///
    /// Unless `force` is set, a call less than the minimum sweep interval
    /// after the previous sweep does nothing and returns 0.
    pub fn remove_expired(&self, force: bool) -> usize {
        let s = &*self.shared;
        let mut state = s.guard.lock();
        let now = s.clock.now();

        if !force {
            if let Some(last) = state.last_sweep {
                let too_soon = last
                    .checked_add(s.min_sweep_interval)
                    .map_or(true, |next| now < next);
                if too_soon {
                    return 0;
                }
            }
        }

        let started = Instant::now();
        let removed = s.store.sweep_if(|_, item| item.is_expired_at(now));
        state.last_sweep = Some(now);
        s.stats.record_expirations(removed as u64);

        debug!(
            removed,
            remaining = s.store.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "swept expired entries"
        );
        removed
    }

    /// Get a snapshot of the cache statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Get a reference to the live statistics counters.
    pub fn stats_ref(&self) -> Arc<CacheStats> {
        Arc::clone(&self.shared.stats)
    }

    pub fn capacity(&self) -> usize {
        self.shared.store.capacity()
    }

    pub fn expire_after_write(&self) -> Duration {
        self.shared.expire_after_write
    }

    pub fn sweep_interval(&self) -> Duration {
        self.shared.sweep_interval
    }

    pub fn min_sweep_interval(&self) -> Duration {
        self.shared.min_sweep_interval
    }

    pub fn has_loader(&self) -> bool {
        self.shared.loader.is_some()
    }
}

impl<K, V> Clone for LoadingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: CacheKey, V> Default for LoadingCache<K, V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<K, V> fmt::Debug for LoadingCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingCache")
            .field("store", &self.shared.store)
            .field("expire_after_write", &self.shared.expire_after_write)
            .field("loader", &self.shared.loader.is_some())
            .finish()
    }
}
