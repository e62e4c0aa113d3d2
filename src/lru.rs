//! Bounded store with least-recently-used eviction.
//!
//! Entries live in a slot arena and are threaded into a doubly linked
//! recency list by slot index (head = most recent, tail = eviction victim).
//! A side index maps each normalized key to its slot, so lookups, moves to
//! the front and evictions are all O(1).

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::arena::{SlotArena, SlotId};
use crate::error::CacheResult;
use crate::key::{CacheKey, KeyNormalizer};
use crate::stats::CacheStats;

struct Node<K, V> {
    id: String,
    key: K,
    value: V,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

/// Unsynchronized LRU state. Every mapped id has exactly one node in the
/// list and vice versa.
struct LruState<K, V> {
    capacity: usize,
    index: FxHashMap<String, SlotId>,
    nodes: SlotArena<Node<K, V>>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
}

impl<K, V> LruState<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index: FxHashMap::default(),
            nodes: SlotArena::new(),
            head: None,
            tail: None,
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn detach(&mut self, slot: SlotId) {
        let (prev, next) = match self.nodes.get_mut(slot) {
            Some(node) => (node.prev.take(), node.next.take()),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.nodes.get_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.nodes.get_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn attach_front(&mut self, slot: SlotId) {
        let old_head = self.head;
        match self.nodes.get_mut(slot) {
            Some(node) => {
                node.prev = None;
                node.next = old_head;
            }
            None => return,
        }

        match old_head {
            Some(h) => {
                if let Some(node) = self.nodes.get_mut(h) {
                    node.prev = Some(slot);
                }
            }
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    fn touch(&mut self, slot: SlotId) {
        if self.head != Some(slot) {
            self.detach(slot);
            self.attach_front(slot);
        }
    }

    fn unlink(&mut self, slot: SlotId) -> Option<Node<K, V>> {
        self.detach(slot);
        let node = self.nodes.remove(slot)?;
        self.index.remove(&node.id);
        Some(node)
    }

    fn evict_lru(&mut self) -> Option<Node<K, V>> {
        let node = self.unlink(self.tail?)?;
        trace!(key = %node.id, "evicted least recently used entry");
        Some(node)
    }

    fn get(&mut self, id: &str) -> Option<&V> {
        let slot = *self.index.get(id)?;
        self.touch(slot);
        self.nodes.get(slot).map(|node| &node.value)
    }

    fn peek(&self, id: &str) -> Option<&V> {
        let slot = *self.index.get(id)?;
        self.nodes.get(slot).map(|node| &node.value)
    }

    /// Insert or replace, returning how many entries were evicted.
    fn put(&mut self, id: String, key: K, value: V) -> usize {
        if self.capacity == 0 {
            return 0;
        }

        if let Some(&slot) = self.index.get(&id) {
            if let Some(node) = self.nodes.get_mut(slot) {
                node.key = key;
                node.value = value;
            }
            self.touch(slot);
            return 0;
        }

        let mut evicted = 0;
        while self.len() >= self.capacity && self.evict_lru().is_some() {
            evicted += 1;
        }

        let slot = self.nodes.insert(Node {
            id: id.clone(),
            key,
            value,
            prev: None,
            next: None,
        });
        self.attach_front(slot);
        self.index.insert(id, slot);
        evicted
    }

    fn remove(&mut self, id: &str) -> Option<V> {
        let slot = *self.index.get(id)?;
        self.unlink(slot).map(|node| node.value)
    }

    fn remove_if<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let doomed: Vec<SlotId> = self
            .nodes
            .iter()
            .filter(|(_, node)| predicate(&node.key, &node.value))
            .map(|(slot, _)| slot)
            .collect();
        for &slot in &doomed {
            self.unlink(slot);
        }
        doomed.len()
    }

    fn resize(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.len() > capacity && self.evict_lru().is_some() {
            evicted += 1;
        }
        self.capacity = capacity;
        evicted
    }

    fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Keys from most to least recently used.
    #[cfg(test)]
    fn order(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let Some(node) = self.nodes.get(slot) else { break };
            out.push(node.id.clone());
            cursor = node.next;
        }
        out
    }
}

/// A thread-safe, bounded store that evicts the least recently used entry.
///
/// Both `get` and `put` count as a use. A capacity of zero turns `put` into
/// a no-op.
///
/// # Example
/// ```
/// use loading_cache::RecencyStore;
///
/// let store = RecencyStore::new(2);
/// store.put("a", 1).unwrap();
/// store.put("b", 2).unwrap();
/// store.get(&"a").unwrap();     // "a" is now most recent
/// store.put("c", 3).unwrap();   // evicts "b"
///
/// assert_eq!(store.get(&"b").unwrap(), None);
/// assert_eq!(store.get(&"a").unwrap(), Some(1));
/// ```
pub struct RecencyStore<K, V> {
    state: Mutex<LruState<K, V>>,
    normalizer: KeyNormalizer<K>,
    stats: Arc<CacheStats>,
}

impl<K: CacheKey, V> RecencyStore<K, V> {
    /// Create a store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self::with_normalizer(capacity, KeyNormalizer::new())
    }

    /// Create a store that derives its index keys with `encoder`.
    pub fn with_key_encoder<F>(capacity: usize, encoder: F) -> Self
    where
        F: Fn(&K) -> String + Send + Sync + 'static,
    {
        Self::with_normalizer(capacity, KeyNormalizer::with_encoder(Arc::new(encoder)))
    }

    pub(crate) fn with_normalizer(capacity: usize, normalizer: KeyNormalizer<K>) -> Self {
        Self {
            state: Mutex::new(LruState::new(capacity)),
            normalizer,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&self, key: &K) -> CacheResult<Option<V>>
    where
        V: Clone,
    {
        let id = self.normalizer.normalize(key)?;
        let value = self.get_normalized(&id);
        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(value)
    }

    /// Look up `key` without touching its recency.
    pub fn peek(&self, key: &K) -> CacheResult<Option<V>>
    where
        V: Clone,
    {
        let id = self.normalizer.normalize(key)?;
        Ok(self.state.lock().peek(&id).cloned())
    }

    pub fn contains(&self, key: &K) -> CacheResult<bool> {
        let id = self.normalizer.normalize(key)?;
        Ok(self.state.lock().index.contains_key(&id))
    }

    /// Insert or replace `key`, evicting the least recently used entry if
    /// the store is full.
    pub fn put(&self, key: K, value: V) -> CacheResult<()> {
        let id = self.normalizer.normalize(&key)?;
        self.put_normalized(id, key, value);
        Ok(())
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        let id = self.normalizer.normalize(key)?;
        Ok(self.remove_normalized(&id))
    }

    pub(crate) fn normalizer(&self) -> &KeyNormalizer<K> {
        &self.normalizer
    }
}

impl<K, V> RecencyStore<K, V> {
    /// Lookup by an already normalized id. Bumps recency; leaves hit/miss
    /// accounting to the caller.
    pub(crate) fn get_normalized(&self, id: &str) -> Option<V>
    where
        V: Clone,
    {
        self.state.lock().get(id).cloned()
    }

    pub(crate) fn put_normalized(&self, id: String, key: K, value: V) {
        let mut state = self.state.lock();
        if state.capacity == 0 {
            return;
        }
        let evicted = state.put(id, key, value);
        self.stats.record_set();
        self.stats.record_evictions(evicted as u64);
        self.stats.set_size(state.len());
    }

    pub(crate) fn remove_normalized(&self, id: &str) -> Option<V> {
        let mut state = self.state.lock();
        let removed = state.remove(id);
        if removed.is_some() {
            self.stats.record_deletes(1);
            self.stats.set_size(state.len());
        }
        removed
    }

    /// Remove every entry matching `predicate` in a single scan. Returns the
    /// number removed. Visitation order is unspecified.
    pub fn remove_if<F>(&self, predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let removed = self.sweep_if(predicate);
        self.stats.record_deletes(removed as u64);
        removed
    }

    /// Like [`remove_if`](Self::remove_if), leaving removal accounting to
    /// the caller.
    pub(crate) fn sweep_if<F>(&self, predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut state = self.state.lock();
        let removed = state.remove_if(predicate);
        self.stats.set_size(state.len());
        removed
    }

    /// Change the capacity, evicting least recently used entries until the
    /// store fits.
    pub fn resize(&self, capacity: usize) {
        let mut state = self.state.lock();
        let evicted = state.resize(capacity);
        self.stats.record_evictions(evicted as u64);
        self.stats.set_size(state.len());
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        self.stats.record_deletes(state.len() as u64);
        state.clear();
        self.stats.set_size(0);
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }
}

impl<K, V> fmt::Debug for RecencyStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RecencyStore")
            .field("capacity", &state.capacity)
            .field("len", &state.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    fn filled(keys: &[&'static str]) -> RecencyStore<&'static str, usize> {
        let store = RecencyStore::new(keys.len());
        for (i, k) in keys.iter().enumerate() {
            store.put(*k, i + 1).unwrap();
        }
        store
    }

    #[test]
    fn test_bulk_removals_count_as_deletes() {
        let store = filled(&["a", "b", "c", "d"]);
        store.remove(&"a").unwrap();
        assert_eq!(store.remove_if(|_, v| *v == 2 || *v == 3), 2);
        assert_eq!(store.stats().deletes(), 3);

        store.clear();
        assert_eq!(store.stats().deletes(), 4);
        assert_eq!(store.stats().size(), 0);
    }

    #[test]
    fn test_basic_put_get() {
        let store = RecencyStore::new(4);
        store.put("key1".to_string(), "value1").unwrap();

        assert_eq!(store.get(&"key1".to_string()).unwrap(), Some("value1"));
        assert_eq!(store.get(&"missing".to_string()).unwrap(), None);
    }

    #[test]
    fn test_lru_eviction_order() {
        let store = filled(&["a", "b", "c"]);
        store.get(&"a").unwrap();
        store.put("d", 4).unwrap();

        assert_eq!(store.len(), 3);
        assert!(store.contains(&"a").unwrap());
        assert!(!store.contains(&"b").unwrap());
        assert!(store.contains(&"c").unwrap());
        assert!(store.contains(&"d").unwrap());
        assert_eq!(store.stats().evictions(), 1);
    }

    #[test]
    fn test_put_counts_as_use() {
        let store = filled(&["a", "b", "c"]);
        store.put("a", 10).unwrap();
        store.put("d", 4).unwrap();

        assert_eq!(store.get(&"a").unwrap(), Some(10));
        assert!(!store.contains(&"b").unwrap());
    }

    #[test]
    fn test_overwrite_does_not_grow() {
        let store = filled(&["a", "b", "c"]);
        store.put("b", 20).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.stats().evictions(), 0);
        assert_eq!(store.state.lock().order(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_peek_does_not_touch() {
        let store = filled(&["a", "b"]);
        assert_eq!(store.peek(&"a").unwrap(), Some(1));
        store.put("c", 3).unwrap();
        assert!(!store.contains(&"a").unwrap());
    }

    #[test]
    fn test_zero_capacity_rejects_inserts() {
        let store = RecencyStore::new(0);
        store.put("a", 1).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.get(&"a").unwrap(), None);
    }

    #[test]
    fn test_remove() {
        let store = filled(&["a", "b", "c"]);
        assert_eq!(store.remove(&"b").unwrap(), Some(2));
        assert_eq!(store.remove(&"b").unwrap(), None);
        assert_eq!(store.len(), 2);
        assert_eq!(store.state.lock().order(), vec!["c", "a"]);
    }

    #[test]
    fn test_remove_if_keeps_list_consistent() {
        let store = RecencyStore::new(10);
        for i in 0..10u32 {
            store.put(i, i).unwrap();
        }

        let removed = store.remove_if(|_, v| v % 2 == 0);
        assert_eq!(removed, 5);
        assert_eq!(store.len(), 5);

        let state = store.state.lock();
        assert_eq!(state.order(), vec!["9", "7", "5", "3", "1"]);
        assert_eq!(state.index.len(), 5);
    }

    #[test]
    fn test_resize_evicts_lru_entries() {
        let store = filled(&["a", "b", "c", "d"]);
        store.get(&"a").unwrap();

        store.resize(2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.capacity(), 2);
        assert_eq!(store.state.lock().order(), vec!["a", "d"]);
        assert_eq!(store.stats().evictions(), 2);

        store.resize(5);
        store.put("e", 5).unwrap();
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_resize_to_zero_empties() {
        let store = filled(&["a", "b"]);
        store.resize(0);
        assert!(store.is_empty());
        store.put("c", 3).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear() {
        let store = filled(&["a", "b"]);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.stats().size(), 0);
        store.put("a", 1).unwrap();
        assert_eq!(store.get(&"a").unwrap(), Some(1));
    }

    #[test]
    fn test_custom_encoder() {
        #[derive(Clone)]
        struct Point(i32, i32);
        impl CacheKey for Point {}

        let store = RecencyStore::with_key_encoder(2, |p: &Point| format!("{},{}", p.0, p.1));
        store.put(Point(1, 2), "x").unwrap();
        assert_eq!(store.get(&Point(1, 2)).unwrap(), Some("x"));

        let plain: RecencyStore<Point, &str> = RecencyStore::new(2);
        assert!(matches!(
            plain.put(Point(0, 0), "y"),
            Err(CacheError::UnsupportedKeyType(_))
        ));
    }

    #[test]
    fn test_thread_safety() {
        use std::thread;

        let store = Arc::new(RecencyStore::new(64));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..500u64 {
                        let key = (t * 1000 + i) % 200;
                        store.put(key, i).unwrap();
                        let _ = store.get(&key).unwrap();
                        if i % 50 == 0 {
                            store.remove(&key).unwrap();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let state = store.state.lock();
        assert!(state.len() <= 64);
        assert_eq!(state.order().len(), state.len());
        assert_eq!(state.index.len(), state.len());
    }
}
