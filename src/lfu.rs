//! Bounded store with least-frequently-used eviction.
//!
//! Entries live in a slot arena; a binary min-heap of slot ids orders them by
//! access count and each entry records its own heap position so a frequency
//! bump can restore the heap in O(log n). The heap root is always the next
//! victim. Sifts compare frequencies strictly, so entries with equal counts
//! keep their relative heap positions: the root wins ties.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::arena::{SlotArena, SlotId};
use crate::error::CacheResult;
use crate::key::{CacheKey, KeyNormalizer};
use crate::stats::CacheStats;

struct Item<K, V> {
    id: String,
    key: K,
    value: V,
    frequency: u64,
    heap_index: usize,
}

struct LfuState<K, V> {
    capacity: usize,
    index: FxHashMap<String, SlotId>,
    items: SlotArena<Item<K, V>>,
    heap: Vec<SlotId>,
}

impl<K, V> LfuState<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index: FxHashMap::default(),
            items: SlotArena::new(),
            heap: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn frequency_at(&self, pos: usize) -> u64 {
        self.items
            .get(self.heap[pos])
            .map_or(u64::MAX, |item| item.frequency)
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        for pos in [a, b] {
            let slot = self.heap[pos];
            if let Some(item) = self.items.get_mut(slot) {
                item.heap_index = pos;
            }
        }
    }

    fn sift_up(&mut self, mut pos: usize) -> bool {
        let start = pos;
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.frequency_at(pos) >= self.frequency_at(parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
        pos != start
    }

    fn sift_down(&mut self, mut pos: usize) {
        let n = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= n {
                break;
            }
            let mut child = left;
            let right = left + 1;
            if right < n && self.frequency_at(right) < self.frequency_at(left) {
                child = right;
            }
            if self.frequency_at(child) >= self.frequency_at(pos) {
                break;
            }
            self.swap(pos, child);
            pos = child;
        }
    }

    fn fix(&mut self, pos: usize) {
        if !self.sift_up(pos) {
            self.sift_down(pos);
        }
    }

    fn bump(&mut self, slot: SlotId) {
        let pos = match self.items.get_mut(slot) {
            Some(item) => {
                item.frequency = item.frequency.saturating_add(1);
                item.heap_index
            }
            None => return,
        };
        self.sift_down(pos);
    }

    fn unlink(&mut self, slot: SlotId) -> Option<Item<K, V>> {
        let pos = self.items.get(slot)?.heap_index;
        let last = self.heap.len() - 1;
        if pos != last {
            self.swap(pos, last);
        }
        self.heap.pop();
        if pos < self.heap.len() {
            self.fix(pos);
        }
        let item = self.items.remove(slot)?;
        self.index.remove(&item.id);
        Some(item)
    }

    fn evict_lfu(&mut self) -> Option<Item<K, V>> {
        let root = *self.heap.first()?;
        let item = self.unlink(root)?;
        trace!(key = %item.id, frequency = item.frequency, "evicted least frequently used entry");
        Some(item)
    }

    fn get(&mut self, id: &str) -> Option<&V> {
        let slot = *self.index.get(id)?;
        self.bump(slot);
        self.items.get(slot).map(|item| &item.value)
    }

    fn put(&mut self, id: String, key: K, value: V) -> usize {
        if self.capacity == 0 {
            return 0;
        }

        if let Some(&slot) = self.index.get(&id) {
            if let Some(item) = self.items.get_mut(slot) {
                item.key = key;
                item.value = value;
            }
            self.bump(slot);
            return 0;
        }

        let mut evicted = 0;
        while self.len() >= self.capacity && self.evict_lfu().is_some() {
            evicted += 1;
        }

        let pos = self.heap.len();
        let slot = self.items.insert(Item {
            id: id.clone(),
            key,
            value,
            frequency: 1,
            heap_index: pos,
        });
        self.heap.push(slot);
        self.sift_up(pos);
        self.index.insert(id, slot);
        evicted
    }

    fn remove_if<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let doomed: Vec<SlotId> = self
            .items
            .iter()
            .filter(|(_, item)| predicate(&item.key, &item.value))
            .map(|(slot, _)| slot)
            .collect();
        for &slot in &doomed {
            self.unlink(slot);
        }
        doomed.len()
    }

    fn resize(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.len() > capacity && self.evict_lfu().is_some() {
            evicted += 1;
        }
        self.capacity = capacity;
        evicted
    }

    fn clear(&mut self) {
        self.index.clear();
        self.items.clear();
        self.heap.clear();
    }

    #[cfg(test)]
    fn check_heap(&self) {
        assert_eq!(self.heap.len(), self.items.len());
        assert_eq!(self.index.len(), self.items.len());
        for (pos, &slot) in self.heap.iter().enumerate() {
            let item = self.items.get(slot).expect("heap slot is live");
            assert_eq!(item.heap_index, pos);
            assert_eq!(self.index.get(&item.id), Some(&slot));
            if pos > 0 {
                assert!(self.frequency_at((pos - 1) / 2) <= item.frequency);
            }
        }
    }
}

/// A thread-safe, bounded store that evicts the least frequently used entry.
///
/// New entries start with a frequency of 1; every `get` hit and every `put`
/// of an existing key adds one. When several entries share the lowest
/// frequency, one of them is evicted.
///
/// # Example
/// ```
/// use loading_cache::FrequencyStore;
///
/// let store = FrequencyStore::new(2);
/// store.put("a", 1).unwrap();
/// store.put("b", 2).unwrap();
/// store.get(&"a").unwrap();
/// store.put("c", 3).unwrap();   // "b" was used least
///
/// assert!(!store.contains(&"b").unwrap());
/// assert_eq!(store.frequency(&"a").unwrap(), Some(2));
/// ```
pub struct FrequencyStore<K, V> {
    state: Mutex<LfuState<K, V>>,
    normalizer: KeyNormalizer<K>,
    stats: Arc<CacheStats>,
}

impl<K: CacheKey, V> FrequencyStore<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self::with_normalizer(capacity, KeyNormalizer::new())
    }

    pub fn with_key_encoder<F>(capacity: usize, encoder: F) -> Self
    where
        F: Fn(&K) -> String + Send + Sync + 'static,
    {
        Self::with_normalizer(capacity, KeyNormalizer::with_encoder(Arc::new(encoder)))
    }

    fn with_normalizer(capacity: usize, normalizer: KeyNormalizer<K>) -> Self {
        Self {
            state: Mutex::new(LfuState::new(capacity)),
            normalizer,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Look up `key`, counting a hit as one more access.
    pub fn get(&self, key: &K) -> CacheResult<Option<V>>
    where
        V: Clone,
    {
        let id = self.normalizer.normalize(key)?;
        let mut state = self.state.lock();
        let value = state.get(&id).cloned();
        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(value)
    }

    /// Look up `key` without counting an access.
    pub fn peek(&self, key: &K) -> CacheResult<Option<V>>
    where
        V: Clone,
    {
        let id = self.normalizer.normalize(key)?;
        let state = self.state.lock();
        Ok(state
            .index
            .get(&id)
            .and_then(|&slot| state.items.get(slot))
            .map(|item| item.value.clone()))
    }

    pub fn contains(&self, key: &K) -> CacheResult<bool> {
        let id = self.normalizer.normalize(key)?;
        Ok(self.state.lock().index.contains_key(&id))
    }

    /// Current access count of `key`, if stored.
    pub fn frequency(&self, key: &K) -> CacheResult<Option<u64>> {
        let id = self.normalizer.normalize(key)?;
        let state = self.state.lock();
        Ok(state
            .index
            .get(&id)
            .and_then(|&slot| state.items.get(slot))
            .map(|item| item.frequency))
    }

    /// Insert `key`, or replace its value and count an access. Evicts the
    /// least frequently used entry if a new key arrives while full.
    pub fn put(&self, key: K, value: V) -> CacheResult<()> {
        let id = self.normalizer.normalize(&key)?;
        let mut state = self.state.lock();
        if state.capacity == 0 {
            return Ok(());
        }
        let evicted = state.put(id, key, value);
        self.stats.record_set();
        self.stats.record_evictions(evicted as u64);
        self.stats.set_size(state.len());
        Ok(())
    }

    pub fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        let id = self.normalizer.normalize(key)?;
        let mut state = self.state.lock();
        let Some(&slot) = state.index.get(&id) else {
            return Ok(None);
        };
        let removed = state.unlink(slot).map(|item| item.value);
        self.stats.record_deletes(1);
        self.stats.set_size(state.len());
        Ok(removed)
    }
}

impl<K, V> FrequencyStore<K, V> {
    /// Remove every entry matching `predicate`. Returns the number removed.
    pub fn remove_if<F>(&self, predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut state = self.state.lock();
        let removed = state.remove_if(predicate);
        self.stats.record_deletes(removed as u64);
        self.stats.set_size(state.len());
        removed
    }

    /// Change the capacity, evicting least frequently used entries until the
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

impl<K, V> fmt::Debug for FrequencyStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FrequencyStore")
            .field("capacity", &state.capacity)
            .field("len", &state.len())
            .finish()
    }
}
