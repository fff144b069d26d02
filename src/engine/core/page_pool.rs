//! Buffer pool (spec §5): an in-process cache of decoded data pages, bounded by page
//! count, so repeated scans over hot segments don't re-decode Arrow batches from disk
//! every time. Pinned pages are exempt from eviction for the duration of a query.

use crate::engine::core::event::Event;
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub table: String,
    pub data_file: String,
    pub page_idx: u32,
}

/// What a `PagePool` implementation must provide; kept as a trait so a future distributed
/// deployment can swap in a remote cache without touching the scan cursor.
pub trait PagePool: Send + Sync {
    fn get_or_load(
        &self,
        key: PageKey,
        load: impl FnOnce() -> Arc<Vec<Event>>,
    ) -> Arc<Vec<Event>>;

    fn pin(&self, key: &PageKey);
    fn unpin(&self, key: &PageKey);
}

struct Entry {
    rows: Arc<Vec<Event>>,
    pins: u32,
}

/// Bounded LRU cache of decoded pages. A page with `pins > 0` is skipped by eviction even
/// if it's the least-recently-used entry.
pub struct InProcessPagePool {
    cache: Mutex<LruCache<PageKey, Entry>>,
    capacity: usize,
}

impl InProcessPagePool {
    /// `LruCache` is constructed unbounded: capacity is enforced by `evict_one_unpinned`
    /// before every insert instead, so a pinned page is never silently dropped by the
    /// underlying cache's own eviction.
    pub fn new(capacity_pages: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::unbounded()),
            capacity: capacity_pages.max(1),
        }
    }

    fn evict_one_unpinned(cache: &mut LruCache<PageKey, Entry>) -> bool {
        let victim = cache
            .iter()
            .rev()
            .find(|(_, entry)| entry.pins == 0)
            .map(|(k, _)| k.clone());
        match victim {
            Some(key) => {
                cache.pop(&key);
                true
            }
            None => false,
        }
    }
}

impl PagePool for InProcessPagePool {
    fn get_or_load(
        &self,
        key: PageKey,
        load: impl FnOnce() -> Arc<Vec<Event>>,
    ) -> Arc<Vec<Event>> {
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.get(&key) {
            return entry.rows.clone();
        }
        let rows = load();
        if cache.len() >= self.capacity {
            Self::evict_one_unpinned(&mut cache);
        }
        cache.put(
            key,
            Entry {
                rows: rows.clone(),
                pins: 0,
            },
        );
        rows
    }

    fn pin(&self, key: &PageKey) {
        if let Some(entry) = self.cache.lock().get_mut(key) {
            entry.pins += 1;
        }
    }

    fn unpin(&self, key: &PageKey) {
        if let Some(entry) = self.cache.lock().get_mut(key) {
            entry.pins = entry.pins.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(page_idx: u32) -> PageKey {
        PageKey {
            table: "docs".into(),
            data_file: "log-l00-fr0000000000-nr0000000010".into(),
            page_idx,
        }
    }

    #[test]
    fn caches_on_second_load() {
        let pool = InProcessPagePool::new(2);
        let mut loads = 0;
        for _ in 0..3 {
            pool.get_or_load(key(0), || {
                loads += 1;
                Arc::new(Vec::new())
            });
        }
        assert_eq!(loads, 1);
    }

    #[test]
    fn evicts_least_recently_used_when_over_capacity() {
        let pool = InProcessPagePool::new(1);
        pool.get_or_load(key(0), || Arc::new(Vec::new()));
        pool.get_or_load(key(1), || Arc::new(Vec::new()));

        let mut reloaded = false;
        pool.get_or_load(key(0), || {
            reloaded = true;
            Arc::new(Vec::new())
        });
        assert!(reloaded);
    }

    #[test]
    fn pinned_page_survives_eviction_pressure() {
        let pool = InProcessPagePool::new(1);
        pool.get_or_load(key(0), || Arc::new(Vec::new()));
        pool.pin(&key(0));

        pool.get_or_load(key(1), || Arc::new(Vec::new()));

        let mut reloaded = false;
        pool.get_or_load(key(0), || {
            reloaded = true;
            Arc::new(Vec::new())
        });
        assert!(!reloaded);
    }
}
