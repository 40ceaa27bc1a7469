//! Bounded LRU cache of decoded pages, shared by the control thread and the
//! preload worker.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace, warn};
use lru::LruCache;
use parking_lot::Mutex;

use crate::page::Page;

/// Capacity used when the configured one is invalid.
pub const DEFAULT_CAPACITY: usize = 16;

/// Called with every page the cache lets go of (evicted, replaced, removed,
/// cleared). Runs synchronously on the thread that caused the release, after
/// the cache lock has been dropped.
pub type ReleaseHook = Box<dyn Fn(&str, Arc<Page>) + Send + Sync>;

/// Hit/miss/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Key → decoded page store with least-recently-used eviction.
///
/// `get` never blocks on I/O. All methods take `&self`; a single mutex guards
/// the map and recency order, so callers share the cache as `Arc<PageCache>`.
pub struct PageCache {
    entries: Mutex<LruCache<String, Arc<Page>>>,
    release: ReleaseHook,
    /// Bumped by `clear` while the entry lock is held.
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PageCache {
    /// Create a cache holding at most `capacity` pages.
    ///
    /// A zero capacity is replaced by [`DEFAULT_CAPACITY`] with a warning.
    pub fn new(capacity: usize) -> Self {
        Self::with_release_hook(capacity, Box::new(release_page))
    }

    pub fn with_release_hook(capacity: usize, release: ReleaseHook) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or_else(|| {
            warn!("cache: invalid capacity {capacity}, using {DEFAULT_CAPACITY}");
            NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN)
        });
        debug!("cache: capacity {cap}");
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            release,
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a page and mark it most recently used.
    pub fn get(&self, key: &str) -> Option<Arc<Page>> {
        let found = self.entries.lock().get(key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        trace!("cache: get {key} -> {}", if found.is_some() { "hit" } else { "miss" });
        found
    }

    /// Presence check that leaves the recency order alone.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    /// Insert or replace a page, evicting the least recently used entry when
    /// the cache is full.
    pub fn put(&self, key: impl Into<String>, page: Arc<Page>) {
        let key = key.into();
        let displaced = self.entries.lock().push(key.clone(), page);
        self.release_displaced(&key, displaced);
    }

    /// Like [`put`](Self::put), but only while no `clear` has happened since
    /// `generation` was read. Returns whether the page was inserted.
    pub fn put_if_generation(
        &self,
        key: impl Into<String>,
        page: Arc<Page>,
        generation: u64,
    ) -> bool {
        let key = key.into();
        let displaced = {
            let mut entries = self.entries.lock();
            if self.generation.load(Ordering::Acquire) != generation {
                trace!("cache: reject {key} from generation {generation}");
                return false;
            }
            entries.push(key.clone(), page)
        };
        self.release_displaced(&key, displaced);
        true
    }

    /// Current generation. Changes on every `clear`.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn release_displaced(&self, key: &str, displaced: Option<(String, Arc<Page>)>) {
        if let Some((old_key, old_page)) = displaced {
            if old_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                trace!("cache: evict {old_key}");
            }
            (self.release)(&old_key, old_page);
        }
    }

    /// Drop one entry. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.entries.lock().pop_entry(key);
        match removed {
            Some((k, page)) => {
                (self.release)(&k, page);
                true
            }
            None => false,
        }
    }

    /// Drop every entry and start a new generation.
    pub fn clear(&self) {
        let drained: Vec<(String, Arc<Page>)> = {
            let mut entries = self.entries.lock();
            self.generation.fetch_add(1, Ordering::AcqRel);
            let mut drained = Vec::with_capacity(entries.len());
            while let Some(kv) = entries.pop_lru() {
                drained.push(kv);
            }
            drained
        };
        debug!("cache: cleared {} page(s)", drained.len());
        for (k, page) in drained {
            (self.release)(&k, page);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Drop for PageCache {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Default release: drop the cache's handle now. The bitmap is freed as soon
/// as no displayed frame still holds the page.
fn release_page(key: &str, page: Arc<Page>) {
    trace!(
        "cache: release {key} ({} bytes, {} other holder(s))",
        page.size_hint(),
        Arc::strong_count(&page) - 1
    );
    drop(page);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn page(label: &str) -> Arc<Page> {
        Arc::new(Page::decoded(label, DynamicImage::new_rgba8(2, 2)))
    }

    fn recording_cache(capacity: usize) -> (PageCache, Arc<Mutex<Vec<String>>>) {
        let released = Arc::new(Mutex::new(Vec::new()));
        let sink = released.clone();
        let cache = PageCache::with_release_hook(
            capacity,
            Box::new(move |key, _page| sink.lock().push(key.to_string())),
        );
        (cache, released)
    }

    #[test]
    fn evicts_least_recently_used_for_every_capacity() {
        for cap in 1..=8 {
            let (cache, released) = recording_cache(cap);
            for i in 0..cap {
                cache.put(format!("k{i}"), page("p"));
            }
            // Touch everything except k0 so k0 is the least recently used.
            for i in 1..cap {
                assert!(cache.get(&format!("k{i}")).is_some());
            }
            cache.put("new", page("p"));
            assert_eq!(cache.len(), cap, "cap={cap}");
            assert_eq!(*released.lock(), vec!["k0".to_string()], "cap={cap}");
            assert!(!cache.contains("k0"));
            assert!(cache.contains("new"));
            assert_eq!(cache.stats().evictions, 1);
        }
    }

    #[test]
    fn get_refreshes_recency() {
        let (cache, released) = recording_cache(2);
        cache.put("a", page("a"));
        cache.put("b", page("b"));
        cache.get("a");
        cache.put("c", page("c"));
        assert_eq!(*released.lock(), vec!["b".to_string()]);
    }

    #[test]
    fn contains_does_not_refresh_recency() {
        let (cache, released) = recording_cache(2);
        cache.put("a", page("a"));
        cache.put("b", page("b"));
        assert!(cache.contains("a"));
        cache.put("c", page("c"));
        assert_eq!(*released.lock(), vec!["a".to_string()]);
    }

    #[test]
    fn replace_releases_old_value_without_counting_eviction() {
        let (cache, released) = recording_cache(2);
        cache.put("a", page("old"));
        cache.put("a", page("new"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().label(), "new");
        assert_eq!(*released.lock(), vec!["a".to_string()]);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn remove_and_clear_release() {
        let (cache, released) = recording_cache(4);
        cache.put("a", page("a"));
        cache.put("b", page("b"));
        cache.put("c", page("c"));
        assert!(cache.remove("b"));
        assert!(!cache.remove("b"));
        cache.clear();
        assert!(cache.is_empty());
        let mut got = released.lock().clone();
        got.sort();
        assert_eq!(got, ["a", "b", "c"]);
    }

    #[test]
    fn clear_rejects_puts_from_older_generation() {
        let cache = PageCache::new(4);
        let before = cache.generation();
        assert!(cache.put_if_generation("a", page("a"), before));

        cache.clear();
        assert_ne!(cache.generation(), before);
        assert!(!cache.put_if_generation("b", page("b"), before));
        assert!(!cache.contains("b"));

        assert!(cache.put_if_generation("c", page("c"), cache.generation()));
        assert_eq!(cache.keys(), ["c"]);
    }

    #[test]
    fn zero_capacity_falls_back() {
        let cache = PageCache::new(0);
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn hit_miss_counters() {
        let cache = PageCache::new(4);
        cache.put("a", page("a"));
        cache.get("a");
        cache.get("a");
        cache.get("zz");
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (2, 1));
    }

    #[test]
    fn evicted_page_outlives_cache_while_held() {
        let cache = PageCache::new(1);
        cache.put("a", page("a"));
        let held = cache.get("a").unwrap();
        cache.put("b", page("b"));
        assert!(!cache.contains("a"));
        assert_eq!(held.label(), "a");
        assert_eq!(Arc::strong_count(&held), 1);
    }

    #[test]
    fn concurrent_get_put() {
        let cache = Arc::new(PageCache::new(8));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("t{t}-{}", i % 16);
                        if cache.get(&key).is_none() {
                            cache.put(key, page("p"));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.len() <= 8);
    }
}
