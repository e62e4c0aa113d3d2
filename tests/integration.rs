//! Integration tests for the cache library.

use loading_cache::{
    CacheConfig, CacheError, CacheKey, Described, FrequencyStore, LoadError, LoadingCache,
    ManualClock, RecencyStore,
};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_lru_scenario() {
    let store = RecencyStore::new(3);
    store.put("a", 1).unwrap();
    store.put("b", 2).unwrap();
    store.put("c", 3).unwrap();
    store.get(&"a").unwrap();
    store.put("d", 4).unwrap();

    assert_eq!(store.len(), 3);
    assert!(store.contains(&"a").unwrap());
    assert!(!store.contains(&"b").unwrap());
    assert!(store.contains(&"c").unwrap());
    assert!(store.contains(&"d").unwrap());
}

#[test]
fn test_lfu_scenario() {
    let store = FrequencyStore::new(3);
    store.put("a", 1).unwrap();
    store.put("b", 2).unwrap();
    store.put("c", 3).unwrap();
    for _ in 0..5 {
        store.get(&"a").unwrap();
    }
    store.get(&"b").unwrap();
    store.put("d", 4).unwrap();

    assert_eq!(store.len(), 3);
    assert!(store.contains(&"a").unwrap());
    assert!(store.contains(&"b").unwrap());
    assert!(!store.contains(&"c").unwrap());
    assert!(store.contains(&"d").unwrap());
}

#[test]
fn test_loading_cache_ttl_scenario() {
    let clock = Arc::new(ManualClock::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = LoadingCache::new(
        CacheConfig::new()
            .expire_after_write(Duration::from_secs(5))
            .clock(clock.clone())
            .loader(move |k: &i64| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(k * 2)
            })
            .build()
            .unwrap(),
    );

    assert_eq!(cache.get(&3).unwrap(), 6);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(3));
    assert_eq!(cache.get(&3).unwrap(), 6);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(3));
    assert_eq!(cache.get(&3).unwrap(), 6);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_ttl_boundary() {
    let clock = Arc::new(ManualClock::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = LoadingCache::new(
        CacheConfig::new()
            .expire_after_write(Duration::from_secs(10))
            .clock(clock.clone())
            .loader(move |_: &&str| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("loaded")
            })
            .build()
            .unwrap(),
    );

    cache.put("k", "written").unwrap();
    clock.advance(Duration::from_millis(9_999));
    assert_eq!(cache.get(&"k").unwrap(), "written");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    clock.advance(Duration::from_millis(2));
    assert_eq!(cache.get(&"k").unwrap(), "loaded");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_reload_surfaces_once_per_call() {
    let clock = Arc::new(ManualClock::new());
    let cache: LoadingCache<u32, u32> = LoadingCache::new(
        CacheConfig::new()
            .expire_after_write(Duration::from_secs(1))
            .clock(clock.clone())
            .loader(|_: &u32| Err(LoadError::from("upstream timeout")))
            .build()
            .unwrap(),
    );

    cache.put(1, 10).unwrap();
    clock.advance(Duration::from_secs(1));

    let first = cache.get(&1).unwrap_err();
    let second = cache.get(&1).unwrap_err();
    assert_eq!(first.to_string(), "loader failed: upstream timeout");
    assert!(matches!(second, CacheError::Loader(_)));
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.stats().load_failures, 2);
    assert_eq!(cache.must_get(&1), None);
}

#[test]
fn test_resize_leaves_exactly_new_capacity() {
    let lru = RecencyStore::new(10);
    let lfu = FrequencyStore::new(10);
    for i in 0..10u32 {
        lru.put(i, i).unwrap();
        lfu.put(i, i).unwrap();
    }

    lru.resize(4);
    lfu.resize(4);
    assert_eq!(lru.len(), 4);
    assert_eq!(lfu.len(), 4);
    assert_eq!(lru.stats().evictions(), 6);
    assert_eq!(lfu.stats().evictions(), 6);

    // The four most recent puts survive in the LRU.
    for i in 6..10u32 {
        assert!(lru.contains(&i).unwrap());
    }
}

#[test]
fn test_custom_key_types() {
    #[derive(Clone)]
    struct Tenant {
        org: &'static str,
        id: u32,
    }
    impl CacheKey for Tenant {}

    let cache = LoadingCache::new(
        CacheConfig::new()
            .key_encoder(|t: &Tenant| format!("{}/{}", t.org, t.id))
            .build()
            .unwrap(),
    );
    cache.put(Tenant { org: "acme", id: 1 }, "ok").unwrap();
    assert_eq!(cache.get(&Tenant { org: "acme", id: 1 }).unwrap(), "ok");

    let unencoded: LoadingCache<Tenant, &str> = LoadingCache::default();
    assert!(matches!(
        unencoded.put(Tenant { org: "acme", id: 1 }, "no"),
        Err(CacheError::UnsupportedKeyType(_))
    ));
}

#[test]
fn test_described_keys() {
    #[derive(Clone, Copy)]
    struct Sku(u32);
    impl fmt::Display for Sku {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "sku-{:06}", self.0)
        }
    }

    let store = RecencyStore::new(4);
    store.put(Described(Sku(42)), 9.99).unwrap();
    assert_eq!(store.get(&Described(Sku(42))).unwrap(), Some(9.99));
}

#[test]
fn test_concurrent_mixed_operations() {
    let cache = LoadingCache::new(
        CacheConfig::new()
            .capacity(64)
            .loader(|k: &u64| Ok(k.to_string()))
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..500u64 {
                    let key = (t * 31 + i) % 200;
                    match i % 5 {
                        0 => cache.put(key, format!("p{}", key)).unwrap(),
                        1 => {
                            cache.remove(&key).unwrap();
                        }
                        2 => {
                            cache.remove_expired(true);
                        }
                        _ => {
                            let value = cache.get(&key).unwrap();
                            assert!(value == key.to_string() || value == format!("p{}", key));
                        }
                    }
                    assert!(cache.size() <= 64);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    assert!(cache.size() <= 64);
}

#[test]
fn test_clone_shares_data() {
    let cache1: LoadingCache<String, i32> = LoadingCache::default();
    cache1.put("key".to_string(), 1).unwrap();

    let cache2 = cache1.clone();
    assert_eq!(cache2.get(&"key".to_string()).unwrap(), 1);

    cache2.clear();
    assert!(cache1.is_empty());
}
