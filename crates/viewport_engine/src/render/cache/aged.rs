//! Frame-age bounded cache

use super::{CacheStatistics, ResourceLoader};
use crate::render::api::GpuDevice;
use crate::render::RenderResult;
use std::collections::HashMap;

struct AgedEntry<V> {
    value: V,
    last_used_frame: u64,
    size: u64,
}

/// Cache whose entries expire when unused for more than `max_age` frames.
///
/// The total size is unbounded; expiry is the only eviction. Frames are counted
/// by the caller and passed in explicitly.
pub struct AgedCache<L: ResourceLoader> {
    loader: L,
    max_age: u64,
    entries: HashMap<L::Key, AgedEntry<L::Value>>,
}

impl<L: ResourceLoader> AgedCache<L> {
    /// Create an empty cache
    pub fn new(loader: L, max_age_frames: u64) -> Self {
        Self {
            loader,
            max_age: max_age_frames,
            entries: HashMap::new(),
        }
    }

    /// Value for `key`, loading it on a miss, stamped as used in `frame`
    pub fn get(
        &mut self,
        device: &mut dyn GpuDevice,
        frame: u64,
        key: &L::Key,
    ) -> RenderResult<L::Value> {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_used_frame = frame;
            return Ok(entry.value.clone());
        }
        let value = self.loader.load(device, key)?;
        let size = self.loader.size_in_bytes(key, &value);
        log::debug!("aged cache: loaded {key:?} in frame {frame}");
        self.entries.insert(
            key.clone(),
            AgedEntry {
                value: value.clone(),
                last_used_frame: frame,
                size,
            },
        );
        Ok(value)
    }

    /// Release every entry last used more than `max_age` frames before `frame`.
    /// Returns the number released.
    pub fn evict_expired(&mut self, device: &mut dyn GpuDevice, frame: u64) -> usize {
        let expired: Vec<L::Key> = self
            .entries
            .iter()
            .filter(|(_, entry)| frame.saturating_sub(entry.last_used_frame) > self.max_age)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            if let Some(entry) = self.entries.remove(key) {
                log::debug!("aged cache: expiring {key:?}");
                self.loader.release(device, key, entry.value);
            }
        }
        expired.len()
    }

    /// Release every entry
    pub fn clear(&mut self, device: &mut dyn GpuDevice) {
        for (key, entry) in self.entries.drain() {
            self.loader.release(device, &key, entry.value);
        }
    }

    /// Cached entries in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&L::Key, &L::Value)> {
        self.entries.iter().map(|(key, entry)| (key, &entry.value))
    }

    /// True if `key` is cached
    pub fn contains(&self, key: &L::Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Item count and total tracked size
    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            items: self.entries.len(),
            size_bytes: Some(self.entries.values().map(|entry| entry.size).sum()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::HeadlessDevice;
    use crate::render::cache::lru::tests::CountingLoader;

    #[test]
    fn test_entries_expire_after_max_age() {
        let mut device = HeadlessDevice::new();
        let mut cache = AgedCache::new(CountingLoader::default(), 2);
        cache.get(&mut device, 0, &"a".to_string()).unwrap();
        cache.get(&mut device, 1, &"b".to_string()).unwrap();

        assert_eq!(cache.evict_expired(&mut device, 2), 0);
        assert_eq!(cache.evict_expired(&mut device, 3), 1);
        assert!(!cache.contains(&"a".to_string()));
        assert!(cache.contains(&"b".to_string()));
    }

    #[test]
    fn test_use_refreshes_age() {
        let mut device = HeadlessDevice::new();
        let mut cache = AgedCache::new(CountingLoader::default(), 1);
        cache.get(&mut device, 0, &"a".to_string()).unwrap();
        cache.get(&mut device, 5, &"a".to_string()).unwrap();
        assert_eq!(cache.evict_expired(&mut device, 6), 0);
        assert_eq!(cache.loader.loads.len(), 1);
        assert_eq!(cache.evict_expired(&mut device, 7), 1);
        assert_eq!(cache.loader.released.len(), 1);
    }
}
