//! # Loading Cache
//!
//! Thread-safe, in-process key-value caching for Rust: two bounded stores
//! with different eviction policies, and a loading cache with TTL
//! expiration on top of the LRU store.
//!
//! ## Features
//!
//! - **[`RecencyStore`]**: least-recently-used eviction, O(1) operations
//! - **[`FrequencyStore`]**: least-frequently-used eviction, O(log n) updates
//! - **[`LoadingCache`]**: cache-aside with a pluggable loader, read-time
//!   staleness checks and an on-demand expiration sweep
//! - **Key normalization**: strings, integers, floats and `bool` work out of
//!   the box; anything else through [`Described`] or a key encoder
//! - **Statistics**: hits, misses, evictions, loads and more
//! - **Zero unsafe code**
//!
//! ## Quick Start
//!
//! ```rust
//! use loading_cache::{CacheConfig, LoadingCache};
//! use std::time::Duration;
//!
//! let config = CacheConfig::new()
//!     .capacity(10_000)
//!     .expire_after_write(Duration::from_secs(300))
//!     .loader(|id: &u64| Ok(format!("user-{}", id)))
//!     .build()
//!     .unwrap();
//!
//! let cache = LoadingCache::new(config);
//!
//! // Loaded on first access, served from memory afterwards
//! assert_eq!(cache.get(&7).unwrap(), "user-7");
//!
//! let stats = cache.stats();
//! println!("Hit rate: {:.1}%", stats.hit_rate);
//! ```
//!
//! ## Thread Safety
//!
//! Every store guards its whole state with one lock, so operations on the
//! same instance are serialized. Cloning a `LoadingCache` creates a new
//! handle to the same data:
//!
//! ```rust
//! use loading_cache::{CacheConfig, LoadingCache};
//! use std::thread;
//!
//! let cache = LoadingCache::new(
//!     CacheConfig::new().loader(|k: &u32| Ok(k * k)).build().unwrap(),
//! );
//!
//! let handles: Vec<_> = (0..4u32).map(|i| {
//!     let cache = cache.clone();
//!     thread::spawn(move || cache.get(&i).unwrap())
//! }).collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(cache.size(), 4);
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod key;
pub mod lfu;
pub mod lru;
pub mod stats;
pub mod task;

pub use cache::LoadingCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, Loader};
pub use error::{CacheError, CacheResult, LoadError};
pub use key::{CacheKey, Described, KeyEncoder, KeyNormalizer, KeyPart};
pub use lfu::FrequencyStore;
pub use lru::RecencyStore;
pub use stats::{CacheStats, StatsSnapshot};
pub use task::{spawn_sweeper, LoadTask};

pub(crate) mod arena;
pub(crate) mod entry;
