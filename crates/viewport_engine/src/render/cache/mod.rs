//! # GPU Resource Caches
//!
//! Bounded caches of expensive GPU objects. Every cache wraps a
//! [`ResourceLoader`] that knows how to produce a value for a key and how to
//! release it. Release happens synchronously, exactly once, at the moment a
//! value is evicted, invalidated or cleared; nothing waits for a collector.
//!
//! Three policies are provided:
//!
//! - [`LruCache`]: count-bounded, least recently used eviction (programs)
//! - [`AgedCache`]: unbounded, evicts entries unused for N frames (shadow maps)
//! - [`BorrowCache`]: byte-bounded borrow/return pool; only idle values can be
//!   reclaimed (intermediate framebuffers)

pub mod aged;
pub mod borrow;
pub mod loaders;
pub mod lru;

pub use aged::AgedCache;
pub use borrow::{BorrowCache, Borrowed};
pub use loaders::{FramebufferLoader, ShaderLoader, ShadowMapKey, ShadowMapLoader};
pub use lru::LruCache;

use crate::core::CacheSettings;
use crate::render::api::{GpuDevice, ProgramHandle};
use crate::render::resources::ShaderLibrary;
use crate::render::RenderResult;
use std::fmt::Debug;
use std::hash::Hash;

/// Produces and releases cached values
pub trait ResourceLoader {
    /// Resource description
    type Key: Clone + Eq + Hash + Debug;
    /// Produced resource; usually a copyable handle
    type Value: Clone;

    /// Create the value for `key`
    fn load(&mut self, device: &mut dyn GpuDevice, key: &Self::Key) -> RenderResult<Self::Value>;

    /// Destroy a value that left the cache
    fn release(&mut self, device: &mut dyn GpuDevice, key: &Self::Key, value: Self::Value);

    /// GPU memory held by `value`; zero when not tracked
    fn size_in_bytes(&self, key: &Self::Key, value: &Self::Value) -> u64 {
        let _ = (key, value);
        0
    }
}

/// Item count and memory of one cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatistics {
    /// Live values
    pub items: usize,
    /// Bytes held, when the cache tracks sizes
    pub size_bytes: Option<u64>,
}

/// Statistics of every kernel cache taken at one instant on the GPU thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatisticsSnapshot {
    /// Program cache
    pub shaders: CacheStatistics,
    /// Shadow map cache
    pub shadow_maps: CacheStatistics,
    /// Intermediate framebuffer cache
    pub framebuffers: CacheStatistics,
}

/// The caches shared by the orchestrator and every strategy
pub struct RenderCaches {
    /// Compiled programs by name
    pub shaders: LruCache<ShaderLoader>,
    /// Shadow maps by light and configuration
    pub shadow_maps: AgedCache<ShadowMapLoader>,
    /// Intermediate framebuffers by description
    pub framebuffers: BorrowCache<FramebufferLoader>,
}

impl RenderCaches {
    /// Create empty caches bounded by `settings`
    pub fn new(settings: &CacheSettings, library: ShaderLibrary) -> Self {
        Self {
            shaders: LruCache::new(ShaderLoader::new(library), settings.shader_capacity),
            shadow_maps: AgedCache::new(ShadowMapLoader, settings.shadow_map_max_age_frames),
            framebuffers: BorrowCache::new(
                FramebufferLoader,
                settings.framebuffer_capacity_bytes,
                settings.framebuffer_max_borrows_per_key,
            ),
        }
    }

    /// Program for `name`, compiling it on a miss
    pub fn program(&mut self, device: &mut dyn GpuDevice, name: &str) -> RenderResult<ProgramHandle> {
        self.shaders.get(device, &name.to_string())
    }

    /// Current statistics of all caches
    pub fn statistics(&self) -> CacheStatisticsSnapshot {
        CacheStatisticsSnapshot {
            shaders: self.shaders.statistics(),
            shadow_maps: self.shadow_maps.statistics(),
            framebuffers: self.framebuffers.statistics(),
        }
    }

    /// Release every cached value. Borrowed framebuffers are left alone and
    /// counted in the returned number.
    pub fn release_all(&mut self, device: &mut dyn GpuDevice) -> usize {
        self.shaders.clear(device);
        self.shadow_maps.clear(device);
        self.framebuffers.clear_idle(device)
    }
}
