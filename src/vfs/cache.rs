//! Memory cache for downloaded file content with LRU eviction.
//!
//! Entries are keyed by the link the content was fetched from (so each
//! export format of a document is cached separately) and tagged with the
//! modification time at download; a lookup with a different mtime misses.

use std::collections::HashMap;
use std::time::Instant;

/// Cached content entry with LRU tracking.
struct CachedContent {
    data: Vec<u8>,
    mtime: Option<i64>,
    accessed_at: Instant,
}

/// In-memory LRU cache for file content, keyed by content link.
///
/// Evicts least-recently-accessed entries when total size exceeds the budget.
pub struct ContentCache {
    entries: HashMap<String, CachedContent>,
    current_size: usize,
    max_size: usize,
}

impl ContentCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            current_size: 0,
            max_size,
        }
    }

    /// Get cached content downloaded at `mtime`, updating LRU tracking.
    pub fn get(&mut self, link: &str, mtime: Option<i64>) -> Option<&[u8]> {
        let entry = self.entries.get_mut(link)?;
        if entry.mtime != mtime {
            return None;
        }
        entry.accessed_at = Instant::now();
        Some(&entry.data)
    }

    /// Store content, evicting LRU entries if over budget.
    pub fn set(&mut self, link: &str, mtime: Option<i64>, data: Vec<u8>) {
        let size = data.len();
        self.invalidate(link);

        while self.current_size + size > self.max_size && !self.entries.is_empty() {
            self.evict_lru();
        }

        // An oversized item is still cached; it goes on the next insertion.
        self.current_size += size;
        self.entries.insert(
            link.to_string(),
            CachedContent {
                data,
                mtime,
                accessed_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&mut self, link: &str) {
        if let Some(old) = self.entries.remove(link) {
            self.current_size = self.current_size.saturating_sub(old.data.len());
        }
    }

    fn evict_lru(&mut self) {
        if let Some(oldest_key) = self
            .entries
            .iter()
            .min_by_key(|(_, v)| v.accessed_at)
            .map(|(k, _)| k.clone())
        {
            log::debug!("Evicting cached content for {}", oldest_key);
            self.invalidate(&oldest_key);
        }
    }

    /// Current total size of cached content in bytes.
    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_cache_set_and_get() {
        let mut cache = ContentCache::new(1024);
        cache.set("f1", Some(10), vec![1, 2, 3, 4]);
        assert_eq!(cache.get("f1", Some(10)).unwrap(), &[1, 2, 3, 4]);
        assert!(cache.get("missing", Some(10)).is_none());
    }

    #[test]
    fn test_content_cache_stale_mtime_misses() {
        let mut cache = ContentCache::new(1024);
        cache.set("f1", Some(10), vec![1]);
        assert!(cache.get("f1", Some(11)).is_none());
        assert!(cache.get("f1", None).is_none());
    }

    #[test]
    fn test_content_cache_evicts_when_over_budget() {
        let mut cache = ContentCache::new(10);
        cache.set("a", None, vec![0u8; 6]);
        cache.set("b", None, vec![1u8; 6]);
        assert!(cache.get("a", None).is_none());
        assert!(cache.get("b", None).is_some());
        assert_eq!(cache.current_size(), 6);
    }

    #[test]
    fn test_content_cache_lru_eviction_order() {
        let mut cache = ContentCache::new(10);
        cache.set("a", None, vec![0u8; 4]);
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.set("b", None, vec![1u8; 4]);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let _ = cache.get("a", None);

        cache.set("c", None, vec![2u8; 4]);

        assert!(cache.get("a", None).is_some(), "a was accessed most recently");
        assert!(cache.get("b", None).is_none(), "b is least recently used");
        assert!(cache.get("c", None).is_some());
    }

    #[test]
    fn test_content_cache_update_existing() {
        let mut cache = ContentCache::new(1024);
        cache.set("f1", Some(1), vec![1, 2, 3]);
        cache.set("f1", Some(2), vec![1, 2, 3, 4, 5]);
        assert_eq!(cache.current_size(), 5);
        assert_eq!(cache.get("f1", Some(2)).unwrap(), &[1, 2, 3, 4, 5]);

        cache.clear();
        assert_eq!(cache.current_size(), 0);
    }
}
