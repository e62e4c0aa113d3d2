//! Configuration for the loading cache.
//!
//! A consuming builder: start from [`CacheConfig::new`], chain setters, then
//! call [`CacheConfig::build`] to validate. Each setter changes exactly one
//! field; nothing resets fields set earlier.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, CacheResult, LoadError};
use crate::key::KeyEncoder;

/// A user-supplied function producing the value for a missing or stale key.
pub type Loader<K, V> = Arc<dyn Fn(&K) -> Result<V, LoadError> + Send + Sync>;

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_EXPIRE_AFTER_WRITE: Duration = Duration::from_secs(60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(3);

/// Configuration for creating a [`LoadingCache`](crate::LoadingCache).
///
/// ```
/// use loading_cache::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::<u64, String>::new()
///     .capacity(10_000)
///     .expire_after_write(Duration::from_secs(300))
///     .loader(|id: &u64| Ok(format!("user-{}", id)))
///     .build()
///     .unwrap();
///
/// assert_eq!(config.get_capacity(), 10_000);
/// ```
pub struct CacheConfig<K, V> {
    /// Maximum number of entries; the least recently used one is evicted
    /// beyond it. Zero disables storage.
    pub(crate) capacity: usize,

    /// TTL applied on every write.
    pub(crate) expire_after_write: Duration,

    /// How often an external sweeper should call `remove_expired`.
    pub(crate) sweep_interval: Duration,

    /// Unforced sweeps closer together than this are skipped.
    pub(crate) min_sweep_interval: Duration,

    pub(crate) key_encoder: Option<KeyEncoder<K>>,
    pub(crate) loader: Option<Loader<K, V>>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<K, V> Default for CacheConfig<K, V> {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            expire_after_write: DEFAULT_EXPIRE_AFTER_WRITE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            min_sweep_interval: DEFAULT_MIN_SWEEP_INTERVAL,
            key_encoder: None,
            loader: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl<K, V> CacheConfig<K, V> {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the time-to-live applied on every write. A zero TTL makes every
    /// entry stale as soon as it is written.
    pub fn expire_after_write(mut self, ttl: Duration) -> Self {
        self.expire_after_write = ttl;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn min_sweep_interval(mut self, interval: Duration) -> Self {
        self.min_sweep_interval = interval;
        self
    }

    /// Derive index keys with `encoder` instead of the key's own string form.
    pub fn key_encoder<F>(mut self, encoder: F) -> Self
    where
        F: Fn(&K) -> String + Send + Sync + 'static,
    {
        self.key_encoder = Some(Arc::new(encoder));
        self
    }

    /// Set the function called on a miss or a stale read.
    pub fn loader<F>(mut self, loader: F) -> Self
    where
        F: Fn(&K) -> Result<V, LoadError> + Send + Sync + 'static,
    {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Replace the time source (mainly for tests).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate and return the final configuration.
    pub fn build(self) -> CacheResult<Self> {
        if self.min_sweep_interval > self.sweep_interval {
            return Err(CacheError::InvalidArgument(format!(
                "min sweep interval {:?} exceeds sweep interval {:?}",
                self.min_sweep_interval, self.sweep_interval
            )));
        }
        Ok(self)
    }

    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_expire_after_write(&self) -> Duration {
        self.expire_after_write
    }

    pub fn get_sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub fn get_min_sweep_interval(&self) -> Duration {
        self.min_sweep_interval
    }
}

impl<K, V> Clone for CacheConfig<K, V> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            expire_after_write: self.expire_after_write,
            sweep_interval: self.sweep_interval,
            min_sweep_interval: self.min_sweep_interval,
            key_encoder: self.key_encoder.clone(),
            loader: self.loader.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<K, V> fmt::Debug for CacheConfig<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("capacity", &self.capacity)
            .field("expire_after_write", &self.expire_after_write)
            .field("sweep_interval", &self.sweep_interval)
            .field("min_sweep_interval", &self.min_sweep_interval)
            .field("key_encoder", &self.key_encoder.is_some())
            .field("loader", &self.loader.is_some())
            .field("clock", &self.clock)
            .finish()
    }
}
