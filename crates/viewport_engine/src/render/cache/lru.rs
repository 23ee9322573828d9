//! Count-bounded least-recently-used cache

use super::{CacheStatistics, ResourceLoader};
use crate::render::api::GpuDevice;
use crate::render::RenderResult;
use std::collections::HashMap;

struct LruEntry<V> {
    value: V,
    last_used: u64,
}

/// Least-recently-used cache holding at most `capacity` values
pub struct LruCache<L: ResourceLoader> {
    loader: L,
    capacity: usize,
    entries: HashMap<L::Key, LruEntry<L::Value>>,
    clock: u64,
}

impl<L: ResourceLoader> LruCache<L> {
    /// Create an empty cache; a zero capacity is raised to one
    pub fn new(loader: L, capacity: usize) -> Self {
        Self {
            loader,
            capacity: capacity.max(1),
            entries: HashMap::new(),
            clock: 0,
        }
    }

    /// Value for `key`, loading it on a miss.
    ///
    /// The least recently used entry is released when a new value would exceed
    /// the capacity. A failed load leaves the cache untouched.
    pub fn get(&mut self, device: &mut dyn GpuDevice, key: &L::Key) -> RenderResult<L::Value> {
        self.clock += 1;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_used = self.clock;
            return Ok(entry.value.clone());
        }

        let value = self.loader.load(device, key)?;
        while self.entries.len() >= self.capacity {
            if !self.evict_least_recent(device) {
                break;
            }
        }
        log::debug!("lru cache: loaded {key:?} ({} live)", self.entries.len() + 1);
        self.entries.insert(
            key.clone(),
            LruEntry {
                value: value.clone(),
                last_used: self.clock,
            },
        );
        Ok(value)
    }

    /// Release the value for `key`; returns whether one was cached
    pub fn invalidate(&mut self, device: &mut dyn GpuDevice, key: &L::Key) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.loader.release(device, key, entry.value);
                true
            }
            None => false,
        }
    }

    /// Release every value
    pub fn clear(&mut self, device: &mut dyn GpuDevice) {
        for (key, entry) in self.entries.drain() {
            self.loader.release(device, &key, entry.value);
        }
    }

    /// True if `key` is cached
    pub fn contains(&self, key: &L::Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Maximum number of values
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Item count
    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            items: self.entries.len(),
            size_bytes: None,
        }
    }

    /// The wrapped loader
    pub const fn loader(&self) -> &L {
        &self.loader
    }

    /// The wrapped loader, mutably
    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    fn evict_least_recent(&mut self, device: &mut dyn GpuDevice) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        match oldest {
            Some(key) => {
                log::debug!("lru cache: evicting {key:?}");
                if let Some(entry) = self.entries.remove(&key) {
                    self.loader.release(device, &key, entry.value);
                }
                true
            }
            None => false,
        }
    }
}
