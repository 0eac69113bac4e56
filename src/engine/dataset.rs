//! LETHE - Dataset
//! The key → item map at the heart of the store.
//!
//! The dataset itself does no locking: the store facade keeps it behind a
//! single `RwLock` and every method here runs inside that lock's scope.

use std::collections::HashMap;

use crate::types::{Item, Key};

/// Result of a read-only lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Key present and not expired.
    Live(&'a Item),
    /// Key present but its TTL has elapsed; the caller must remove it under an exclusive lock.
    Expired,
    /// Key absent.
    Missing,
}

/// Point-in-time key counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetStats {
    /// Keys physically present.
    pub total_keys: usize,
    /// Keys whose TTL has elapsed but are not yet swept.
    pub expired_keys: usize,
    /// `total_keys - expired_keys`.
    pub active_keys: usize,
}

/// In-memory map from key to [`Item`].
#[derive(Debug, Default)]
pub struct Dataset {
    items: HashMap<Key, Item>,
}

impl Dataset {
    /// Create a new, empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys physically present (expired-but-unswept included).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the dataset holds no keys.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert or wholly replace the item for `key`, returning the previous one.
    pub fn insert(&mut self, key: Key, item: Item) -> Option<Item> {
        self.items.insert(key, item)
    }

    /// Look up `key` as of `now_ms` without modifying anything.
    pub fn lookup(&self, key: &str, now_ms: u64) -> Lookup<'_> {
        match self.items.get(key) {
            Some(item) if item.is_expired_at(now_ms) => Lookup::Expired,
            Some(item) => Lookup::Live(item),
            None => Lookup::Missing,
        }
    }

    /// Borrow the raw item, expired or not.
    pub fn item(&self, key: &str) -> Option<&Item> {
        self.items.get(key)
    }

    /// Remove `key`. Returns whether a removal occurred.
    pub fn remove(&mut self, key: &str) -> bool {
        self.items.remove(key).is_some()
    }

    /// Remove `key` only if its TTL has elapsed at `now_ms`.
    ///
    /// A key that was replaced after a timer was armed no longer matches
    /// the timer's instant, so it survives.
    pub fn remove_if_expired(&mut self, key: &str, now_ms: u64) -> bool {
        match self.items.get(key) {
            Some(item) if item.is_expired_at(now_ms) => self.items.remove(key).is_some(),
            _ => false,
        }
    }

    /// Clone every item that is still live at `now_ms`.
    pub fn live_items(&self, now_ms: u64) -> HashMap<Key, Item> {
        self.items
            .iter()
            .filter(|(_, item)| !item.is_expired_at(now_ms))
            .map(|(key, item)| (key.clone(), item.clone()))
            .collect()
    }

    /// Replace the whole contents, returning the old map.
    pub fn replace(&mut self, items: HashMap<Key, Item>) -> HashMap<Key, Item> {
        std::mem::replace(&mut self.items, items)
    }

    /// Count total, expired and active keys as of `now_ms`.
    pub fn stats(&self, now_ms: u64) -> DatasetStats {
        let total_keys = self.items.len();
        let expired_keys = self
            .items
            .values()
            .filter(|item| item.is_expired_at(now_ms))
            .count();
        DatasetStats {
            total_keys,
            expired_keys,
            active_keys: total_keys - expired_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut ds = Dataset::new();
        ds.insert("key1".into(), Item::persistent("value1"));
        assert_eq!(ds.lookup("key1", 0), Lookup::Live(&Item::persistent("value1")));
        assert_eq!(ds.lookup("missing", 0), Lookup::Missing);
    }

    #[test]
    fn test_overwrite_replaces_whole_item() {
        let mut ds = Dataset::new();
        ds.insert("key".into(), Item::expiring("old", 10));
        let prev = ds.insert("key".into(), Item::persistent("new"));
        assert_eq!(prev, Some(Item::expiring("old", 10)));
        assert_eq!(ds.item("key"), Some(&Item::persistent("new")));
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_lookup_reports_expired_without_removing() {
        let mut ds = Dataset::new();
        ds.insert("k".into(), Item::expiring("v", 100));
        assert_eq!(ds.lookup("k", 100), Lookup::Expired);
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_remove_if_expired_spares_live_items() {
        let mut ds = Dataset::new();
        ds.insert("old".into(), Item::expiring("v", 100));
        ds.insert("fresh".into(), Item::expiring("v", 500));
        ds.insert("plain".into(), Item::persistent("v"));

        assert!(ds.remove_if_expired("old", 200));
        assert!(!ds.remove_if_expired("fresh", 200));
        assert!(!ds.remove_if_expired("plain", 200));
        assert!(!ds.remove_if_expired("missing", 200));
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn test_live_items_and_stats() {
        let mut ds = Dataset::new();
        ds.insert("a".into(), Item::persistent("1"));
        ds.insert("b".into(), Item::expiring("2", 50));
        ds.insert("c".into(), Item::expiring("3", 5_000));

        let live = ds.live_items(100);
        assert_eq!(live.len(), 2);
        assert!(!live.contains_key("b"));

        let stats = ds.stats(100);
        assert_eq!(stats.total_keys, 3);
        assert_eq!(stats.expired_keys, 1);
        assert_eq!(stats.active_keys, 2);
    }

    #[test]
    fn test_replace() {
        let mut ds = Dataset::new();
        ds.insert("a".into(), Item::persistent("1"));
        let mut next = HashMap::new();
        next.insert("z".to_string(), Item::persistent("26"));
        let old = ds.replace(next);
        assert!(old.contains_key("a"));
        assert_eq!(ds.item("a"), None);
        assert_eq!(ds.len(), 1);
    }
}
