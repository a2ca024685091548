//! In-memory aggregation cache
//!
//! Holds every day bucket touched since start, keyed by day. Increments
//! mutate memory only and mark the day dirty; the flush scheduler persists
//! dirty days later. One lock guards buckets and dirty markers together, so
//! read-modify-write of a counter and the snapshot taken for a flush are
//! both atomic with respect to concurrent increments.

use crate::services::store::DayStore;
use crate::types::{DayBucket, DayKey, IncrementDelta};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct CacheState {
    days: HashMap<DayKey, DayBucket>,
    dirty: HashSet<DayKey>,
}

impl CacheState {
    fn bucket_mut(&mut self, store: &dyn DayStore, key: DayKey) -> &mut DayBucket {
        self.days.entry(key).or_insert_with(|| store.load(key))
    }
}

pub struct AggregationCache {
    store: Box<dyn DayStore>,
    state: Mutex<CacheState>,
    /// Serializes flushes so an older snapshot never lands after a newer one
    flush_lock: Mutex<()>,
}

impl AggregationCache {
    pub fn new(store: Box<dyn DayStore>) -> Self {
        Self {
            store,
            state: Mutex::new(CacheState::default()),
            flush_lock: Mutex::new(()),
        }
    }

    pub(crate) fn store(&self) -> &dyn DayStore {
        self.store.as_ref()
    }

    /// Copy of the bucket for `key`, loading it from the store on first access.
    /// At most one store read happens per day key for the cache's lifetime.
    pub fn get_or_load(&self, key: DayKey) -> DayBucket {
        let mut state = self.state.lock();
        state.bucket_mut(self.store.as_ref(), key).clone()
    }

    /// Add `delta` to `entity_id` on `key` and mark the day dirty
    pub fn apply_increment(&self, key: DayKey, entity_id: &str, delta: &IncrementDelta) {
        let mut state = self.state.lock();
        state.bucket_mut(self.store.as_ref(), key).apply(entity_id, delta);
        state.dirty.insert(key);
    }

    pub fn has_dirty(&self) -> bool {
        !self.state.lock().dirty.is_empty()
    }

    pub fn dirty_days(&self) -> Vec<DayKey> {
        let mut days: Vec<DayKey> = self.state.lock().dirty.iter().copied().collect();
        days.sort();
        days
    }

    pub fn cached_days(&self) -> usize {
        self.state.lock().days.len()
    }

    /// Point-in-time copies of every dirty day, clearing their markers.
    /// Callers must hand failed saves back through [`Self::mark_dirty`].
    pub(crate) fn take_dirty_snapshots(&self) -> Vec<(DayKey, DayBucket)> {
        let mut state = self.state.lock();
        let dirty: Vec<DayKey> = state.dirty.drain().collect();
        let mut snapshots: Vec<(DayKey, DayBucket)> = dirty
            .into_iter()
            .filter_map(|key| state.days.get(&key).map(|bucket| (key, bucket.clone())))
            .collect();
        snapshots.sort_by_key(|(key, _)| *key);
        snapshots
    }

    pub(crate) fn mark_dirty(&self, key: DayKey) {
        self.state.lock().dirty.insert(key);
    }

    pub(crate) fn flush_lock(&self) -> &Mutex<()> {
        &self.flush_lock
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::types::{Result, UsageMeterError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory store that counts calls and can be told to fail saves
    #[derive(Default)]
    pub struct MemoryStore {
        pub days: Mutex<HashMap<DayKey, DayBucket>>,
        pub loads: AtomicUsize,
        pub saves: AtomicUsize,
        pub fail_saves: AtomicBool,
    }

    impl DayStore for MemoryStore {
        fn load(&self, key: DayKey) -> DayBucket {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.days.lock().get(&key).cloned().unwrap_or_default()
        }

        fn save(&self, key: DayKey, bucket: &DayBucket) -> Result<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(UsageMeterError::Store("disk full".into()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.days.lock().insert(key, bucket.clone());
            Ok(())
        }
    }

    pub fn memory_cache() -> (AggregationCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (AggregationCache::new(Box::new(Arc::clone(&store))), store)
    }
}
