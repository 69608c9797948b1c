use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::normalize::normalize_location_key;
use super::types::GeocodeCacheEntry;

/// Memo of geocoding results keyed by normalized place name.
///
/// Each key owns a single `OnceCell`: the first caller to miss runs the lookup, concurrent
/// callers for the same key await that same lookup, and the entry becomes visible only once
/// it is complete. Entries are never evicted.
#[derive(Default)]
pub struct GeocodeCache {
    slots: DashMap<String, Arc<OnceCell<GeocodeCacheEntry>>>,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cache pre-seeded with known entries.
    pub fn with_entries(entries: impl IntoIterator<Item = GeocodeCacheEntry>) -> Self {
        let cache = Self::new();
        for entry in entries {
            cache.insert(entry);
        }
        cache
    }

    /// Returns the completed entry for `name`, if any.
    pub fn get(&self, name: &str) -> Option<GeocodeCacheEntry> {
        let key = normalize_location_key(name);
        self.slots
            .get(&key)
            .and_then(|slot| slot.value().get().cloned())
    }

    /// Stores an entry unless the key already holds one. Returns whether it was stored.
    pub fn insert(&self, mut entry: GeocodeCacheEntry) -> bool {
        entry.location_name = normalize_location_key(&entry.location_name);
        let slot = self.slot(&entry.location_name);
        slot.set(entry).is_ok()
    }

    /// Returns the entry for `key`, running `lookup` only if no caller has done so yet.
    ///
    /// `key` must already be normalized.
    pub async fn get_or_resolve<F, Fut>(&self, key: &str, lookup: F) -> GeocodeCacheEntry
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GeocodeCacheEntry>,
    {
        let slot = self.slot(key);
        slot.get_or_init(lookup).await.clone()
    }

    fn slot(&self, key: &str) -> Arc<OnceCell<GeocodeCacheEntry>> {
        // Clone the Arc so the shard lock is released before any await.
        self.slots.entry(key.to_string()).or_default().clone()
    }

    /// Number of completed entries.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every completed entry.
    pub fn entries(&self) -> Vec<GeocodeCacheEntry> {
        self.slots
            .iter()
            .filter_map(|slot| slot.value().get().cloned())
            .collect()
    }
}
