//! Borrow/return cache with a soft byte budget
//!
//! A caller borrows a value for the duration of one pass and gives it back
//! afterwards. Several values may exist per key (one per concurrent borrow,
//! up to a per-key limit). Only idle values are ever released, so a borrowed
//! value can never be destroyed under its borrower; a borrow that is never
//! returned costs capacity, not correctness.

use super::{CacheStatistics, ResourceLoader};
use crate::render::api::GpuDevice;
use crate::render::{RenderError, RenderResult};
use std::collections::HashMap;

struct Slot<V> {
    id: u64,
    value: V,
    size: u64,
    borrowed: bool,
    last_returned: u64,
}

/// A value checked out of a [`BorrowCache`]. Must be handed back with
/// [`BorrowCache::give_back`].
#[must_use = "borrowed values must be given back to the cache"]
#[derive(Debug)]
pub struct Borrowed<K, V> {
    key: K,
    id: u64,
    value: V,
}

impl<K, V> Borrowed<K, V> {
    /// The borrowed value
    pub const fn value(&self) -> &V {
        &self.value
    }

    /// Key the value was borrowed under
    pub const fn key(&self) -> &K {
        &self.key
    }
}

/// Byte-bounded pool of reusable values with per-key borrow limits
pub struct BorrowCache<L: ResourceLoader> {
    loader: L,
    capacity_bytes: u64,
    max_borrows_per_key: usize,
    entries: HashMap<L::Key, Vec<Slot<L::Value>>>,
    used_bytes: u64,
    clock: u64,
    next_id: u64,
}

impl<L: ResourceLoader> BorrowCache<L> {
    /// Create an empty cache
    pub fn new(loader: L, capacity_bytes: u64, max_borrows_per_key: usize) -> Self {
        Self {
            loader,
            capacity_bytes,
            max_borrows_per_key: max_borrows_per_key.max(1),
            entries: HashMap::new(),
            used_bytes: 0,
            clock: 0,
            next_id: 0,
        }
    }

    /// Borrow a value for `key`, reusing an idle one when available.
    ///
    /// A new value is loaded when every existing value for `key` is out, unless
    /// that would exceed the per-key borrow limit. Before a new value is added,
    /// idle values are reclaimed (oldest first) to stay within the byte budget;
    /// if not enough is idle the allocation proceeds over budget and the excess
    /// is trimmed as values come back.
    pub fn borrow(
        &mut self,
        device: &mut dyn GpuDevice,
        key: &L::Key,
    ) -> RenderResult<Borrowed<L::Key, L::Value>> {
        self.clock += 1;

        if let Some(slot) = self
            .entries
            .get_mut(key)
            .and_then(|slots| slots.iter_mut().find(|slot| !slot.borrowed))
        {
            slot.borrowed = true;
            return Ok(Borrowed {
                key: key.clone(),
                id: slot.id,
                value: slot.value.clone(),
            });
        }

        let outstanding = self.entries.get(key).map_or(0, Vec::len);
        if outstanding >= self.max_borrows_per_key {
            return Err(RenderError::BorrowLimitExceeded {
                key: format!("{key:?}"),
                limit: self.max_borrows_per_key,
            });
        }

        let value = self.loader.load(device, key)?;
        let size = self.loader.size_in_bytes(key, &value);
        self.reclaim(device, size);
        if self.used_bytes + size > self.capacity_bytes {
            log::warn!(
                "borrow cache: over budget ({} + {} > {} bytes) while allocating {key:?}",
                self.used_bytes,
                size,
                self.capacity_bytes
            );
        }

        self.next_id += 1;
        let id = self.next_id;
        self.used_bytes += size;
        self.entries.entry(key.clone()).or_default().push(Slot {
            id,
            value: value.clone(),
            size,
            borrowed: true,
            last_returned: self.clock,
        });
        log::debug!("borrow cache: allocated {key:?} ({} bytes in use)", self.used_bytes);
        Ok(Borrowed {
            key: key.clone(),
            id,
            value,
        })
    }

    /// Return a borrowed value. Values over budget are reclaimed right away.
    pub fn give_back(&mut self, device: &mut dyn GpuDevice, borrowed: Borrowed<L::Key, L::Value>) {
        self.clock += 1;
        let slot = self
            .entries
            .get_mut(&borrowed.key)
            .and_then(|slots| slots.iter_mut().find(|slot| slot.id == borrowed.id));
        match slot {
            Some(slot) => {
                slot.borrowed = false;
                slot.last_returned = self.clock;
            }
            None => {
                log::warn!("borrow cache: returned unknown value for {:?}", borrowed.key);
                return;
            }
        }
        if self.used_bytes > self.capacity_bytes {
            self.reclaim(device, 0);
        }
    }

    /// Release every idle value; returns how many values are still borrowed
    pub fn clear_idle(&mut self, device: &mut dyn GpuDevice) -> usize {
        let mut still_borrowed = 0;
        let loader = &mut self.loader;
        let used_bytes = &mut self.used_bytes;
        self.entries.retain(|key, slots| {
            slots.retain_mut(|slot| {
                if slot.borrowed {
                    still_borrowed += 1;
                    return true;
                }
                *used_bytes -= slot.size;
                loader.release(device, key, slot.value.clone());
                false
            });
            !slots.is_empty()
        });
        if still_borrowed > 0 {
            log::warn!("borrow cache: {still_borrowed} values still borrowed at clear");
        }
        still_borrowed
    }

    /// Number of values currently borrowed
    pub fn outstanding_borrows(&self) -> usize {
        self.entries
            .values()
            .flatten()
            .filter(|slot| slot.borrowed)
            .count()
    }

    /// Number of values (idle or borrowed) held for `key`
    pub fn values_for(&self, key: &L::Key) -> usize {
        self.entries.get(key).map_or(0, Vec::len)
    }

    /// Soft byte budget
    pub const fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// Item count and bytes in use
    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            items: self.entries.values().map(Vec::len).sum(),
            size_bytes: Some(self.used_bytes),
        }
    }

    /// Release idle values, least recently returned first, until `incoming`
    /// more bytes fit in the budget or nothing idle is left.
    fn reclaim(&mut self, device: &mut dyn GpuDevice, incoming: u64) {
        while self.used_bytes + incoming > self.capacity_bytes {
            let victim = self
                .entries
                .iter()
                .flat_map(|(key, slots)| {
                    slots
                        .iter()
                        .filter(|slot| !slot.borrowed)
                        .map(move |slot| (slot.last_returned, key, slot.id))
                })
                .min_by_key(|(last_returned, _, _)| *last_returned)
                .map(|(_, key, id)| (key.clone(), id));

            let Some((key, id)) = victim else {
                return;
            };
            let Some(slots) = self.entries.get_mut(&key) else {
                return;
            };
            if let Some(index) = slots.iter().position(|slot| slot.id == id) {
                let slot = slots.swap_remove(index);
                self.used_bytes -= slot.size;
                log::debug!("borrow cache: reclaiming {key:?} ({} bytes)", slot.size);
                self.loader.release(device, &key, slot.value);
            }
            if slots.is_empty() {
                self.entries.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{Area, FramebufferDescription, HeadlessDevice, TextureFilter};
    use crate::render::cache::FramebufferLoader;

    fn rgba(width: u32) -> FramebufferDescription {
        FramebufferDescription::rgba(Area::new(width, 1), TextureFilter::Linear)
    }

    #[test]
    fn test_borrowed_entry_survives_capacity_pressure() {
        let mut device = HeadlessDevice::new();
        // Room for exactly one 16x1 RGBA8 buffer.
        let mut cache = BorrowCache::new(FramebufferLoader, 64, 10);

        let held = cache.borrow(&mut device, &rgba(16)).unwrap();
        let other = cache.borrow(&mut device, &rgba(8)).unwrap();

        assert_eq!(cache.values_for(&rgba(16)), 1);
        assert_eq!(device.live_framebuffers(), 2);
        assert_eq!(cache.statistics().size_bytes, Some(96));

        cache.give_back(&mut device, other);
        // Over budget: the idle 8-wide buffer goes, the borrowed one stays.
        assert_eq!(cache.values_for(&rgba(8)), 0);
        assert_eq!(cache.values_for(&rgba(16)), 1);

        cache.give_back(&mut device, held);
        let third = cache.borrow(&mut device, &rgba(12)).unwrap();
        assert_eq!(cache.values_for(&rgba(16)), 0);
        assert_eq!(device.live_framebuffers(), 1);
        cache.give_back(&mut device, third);
    }

    #[test]
    fn test_idle_value_is_reused() {
        let mut device = HeadlessDevice::new();
        let mut cache = BorrowCache::new(FramebufferLoader, 1 << 20, 10);
        let first = cache.borrow(&mut device, &rgba(4)).unwrap();
        let handle = first.value().handle;
        cache.give_back(&mut device, first);

        let second = cache.borrow(&mut device, &rgba(4)).unwrap();
        assert_eq!(second.value().handle, handle);
        assert_eq!(device.live_framebuffers(), 1);
        cache.give_back(&mut device, second);
    }

    #[test]
    fn test_concurrent_borrows_get_distinct_values_up_to_limit() {
        let mut device = HeadlessDevice::new();
        let mut cache = BorrowCache::new(FramebufferLoader, 1 << 20, 2);
        let a = cache.borrow(&mut device, &rgba(4)).unwrap();
        let b = cache.borrow(&mut device, &rgba(4)).unwrap();
        assert_ne!(a.value().handle, b.value().handle);

        let err = cache.borrow(&mut device, &rgba(4)).unwrap_err();
        assert!(matches!(err, RenderError::BorrowLimitExceeded { limit: 2, .. }));
        assert_eq!(cache.outstanding_borrows(), 2);

        cache.give_back(&mut device, a);
        cache.give_back(&mut device, b);
        assert_eq!(cache.outstanding_borrows(), 0);
    }

    #[test]
    fn test_clear_idle_keeps_borrowed_values() {
        let mut device = HeadlessDevice::new();
        let mut cache = BorrowCache::new(FramebufferLoader, 1 << 20, 4);
        let kept = cache.borrow(&mut device, &rgba(4)).unwrap();
        let idle = cache.borrow(&mut device, &rgba(4)).unwrap();
        cache.give_back(&mut device, idle);

        assert_eq!(cache.clear_idle(&mut device), 1);
        assert_eq!(device.live_framebuffers(), 1);
        assert_eq!(cache.statistics().items, 1);

        cache.give_back(&mut device, kept);
        assert_eq!(cache.clear_idle(&mut device), 0);
        assert_eq!(device.live_framebuffers(), 0);
        assert_eq!(cache.statistics().size_bytes, Some(0));
    }
}
