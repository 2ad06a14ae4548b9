use indexmap::IndexMap;

use super::UrlMetadata;

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Metadata keyed by address with least-recently-used eviction.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    capacity: usize,
    entries: IndexMap<String, UrlMetadata>,
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl MetadataCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: IndexMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raises the capacity to at least `entries`. Never shrinks.
    pub fn reserve(&mut self, entries: usize) {
        self.capacity = self.capacity.max(entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    /// Returns the entry and marks it most recently used.
    pub fn get(&mut self, address: &str) -> Option<&UrlMetadata> {
        let index = self.entries.get_index_of(address)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        self.entries.get_index(last).map(|(_, metadata)| metadata)
    }

    pub fn insert(&mut self, address: String, metadata: UrlMetadata) {
        self.entries.shift_remove(&address);
        self.entries.insert(address, metadata);
        while self.entries.len() > self.capacity {
            self.entries.shift_remove_index(0);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(title: &str) -> UrlMetadata {
        UrlMetadata {
            title: Some(title.to_string()),
            ..UrlMetadata::default()
        }
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = MetadataCache::new(2);
        cache.insert("https://a.example/".into(), titled("a"));
        cache.insert("https://b.example/".into(), titled("b"));

        assert!(cache.get("https://a.example/").is_some());
        cache.insert("https://c.example/".into(), titled("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("https://a.example/"));
        assert!(!cache.contains("https://b.example/"));
        assert!(cache.contains("https://c.example/"));
    }

    #[test]
    fn reinsert_replaces_and_refreshes() {
        let mut cache = MetadataCache::new(2);
        cache.insert("https://a.example/".into(), titled("old"));
        cache.insert("https://b.example/".into(), titled("b"));
        cache.insert("https://a.example/".into(), titled("new"));
        cache.insert("https://c.example/".into(), titled("c"));

        assert_eq!(
            cache.get("https://a.example/").and_then(|m| m.title.as_deref()),
            Some("new")
        );
        assert!(!cache.contains("https://b.example/"));
    }

    #[test]
    fn reserve_only_grows() {
        let mut cache = MetadataCache::new(2);
        cache.reserve(1);
        assert_eq!(cache.capacity(), 2);

        cache.reserve(3);
        for name in ["a", "b", "c"] {
            cache.insert(format!("https://{}.example/", name), titled(name));
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.contains("https://a.example/"));
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut cache = MetadataCache::new(0);
        cache.insert("https://a.example/".into(), titled("a"));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
