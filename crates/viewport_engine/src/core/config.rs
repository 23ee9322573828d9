//! # Viewport Configuration
//!
//! Settings consumed by the frame orchestrator at construction time: initial
//! viewport size, cache bounds, the default free-camera projection, debug
//! overlay selection, debug dump location and the initially selected render
//! strategies.
//!
//! All sections have sensible defaults, so a partial TOML/RON file is enough:
//!
//! ```toml
//! [caches]
//! shader_capacity = 32
//!
//! [strategies]
//! renderer = "Normals"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::config::{Config, ConfigError};
use crate::render::frame::DebugOverlays;
use crate::render::strategies::{PostprocessorKind, RendererKind};

/// Smallest accepted `framebuffer_max_borrows_per_key`
pub const MIN_BORROWS_PER_KEY: usize = 2;

/// Top-level configuration for a viewport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Initial viewport area
    pub viewport: ViewportSettings,
    /// Bounds of the GPU resource caches
    pub caches: CacheSettings,
    /// Default free-camera projection
    pub camera: CameraSettings,
    /// Debug overlays drawn over the presented frame
    pub overlays: OverlaySettings,
    /// Where debug texture dumps are written
    pub debug: DebugDumpSettings,
    /// Initially selected renderer and postprocessor
    pub strategies: StrategySettings,
}

impl Config for ViewportConfig {}

impl ViewportConfig {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ConfigError::Invalid {
                field: "viewport",
                reason: format!(
                    "area must be non-empty, got {}x{}",
                    self.viewport.width, self.viewport.height
                ),
            });
        }
        if self.caches.shader_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "caches.shader_capacity",
                reason: "must hold at least one program".to_string(),
            });
        }
        // The postprocessor output and a same-sized scratch buffer are
        // borrowed under one key at the same time.
        if self.caches.framebuffer_max_borrows_per_key < MIN_BORROWS_PER_KEY {
            return Err(ConfigError::Invalid {
                field: "caches.framebuffer_max_borrows_per_key",
                reason: format!(
                    "must allow at least {MIN_BORROWS_PER_KEY} borrows, got {}",
                    self.caches.framebuffer_max_borrows_per_key
                ),
            });
        }
        if !(self.camera.near > 0.0 && self.camera.near < self.camera.far) {
            return Err(ConfigError::Invalid {
                field: "camera",
                reason: format!(
                    "expected 0 < near < far, got near={} far={}",
                    self.camera.near, self.camera.far
                ),
            });
        }
        if !(self.camera.fov_y_degrees > 0.0 && self.camera.fov_y_degrees < 180.0) {
            return Err(ConfigError::Invalid {
                field: "camera.fov_y_degrees",
                reason: format!("{} is outside (0, 180)", self.camera.fov_y_degrees),
            });
        }
        Ok(())
    }
}

/// Initial viewport area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Bounds of the three GPU resource caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of compiled programs kept alive
    pub shader_capacity: usize,
    /// Shadow maps unused for more than this many frames are released
    pub shadow_map_max_age_frames: u64,
    /// Soft byte budget for intermediate framebuffers
    pub framebuffer_capacity_bytes: u64,
    /// Maximum simultaneous borrows of one framebuffer description
    pub framebuffer_max_borrows_per_key: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            shader_capacity: 64,
            shadow_map_max_age_frames: 60,
            framebuffer_capacity_bytes: 128 * 1024 * 1024,
            framebuffer_max_borrows_per_key: 10,
        }
    }
}

/// Default free-camera placement and projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Initial eye position
    pub position: [f32; 3],
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_y_degrees: 60.0,
            near: 1.0,
            far: 100.0,
            position: [0.0, 2.0, 10.0],
        }
    }
}

/// Debug overlay toggles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Draw the ground grid on the XZ plane
    pub grid: bool,
    /// Draw the world coordinate axes
    pub axes: bool,
    /// Draw light position and range gizmos
    pub light_gizmos: bool,
    /// Number of grid cells from the origin to the edge
    pub grid_half_extent: u32,
    /// Distance between grid lines
    pub grid_spacing: f32,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            grid: true,
            axes: true,
            light_gizmos: true,
            grid_half_extent: 10,
            grid_spacing: 1.0,
        }
    }
}

impl OverlaySettings {
    /// Overlay selection as flags
    pub fn flags(&self) -> DebugOverlays {
        let mut flags = DebugOverlays::empty();
        flags.set(DebugOverlays::GRID, self.grid);
        flags.set(DebugOverlays::AXES, self.axes);
        flags.set(DebugOverlays::LIGHT_GIZMOS, self.light_gizmos);
        flags
    }
}

/// Debug dump destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugDumpSettings {
    /// Directory receiving timestamped PNG dumps
    pub dump_directory: PathBuf,
}

impl Default for DebugDumpSettings {
    fn default() -> Self {
        Self {
            dump_directory: PathBuf::from("dumps"),
        }
    }
}

/// Initially selected render strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Renderer constructed during first-frame initialization
    pub renderer: RendererKind,
    /// Postprocessor applied after the renderer, if any
    pub postprocessor: Option<PostprocessorKind>,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            renderer: RendererKind::Forward,
            postprocessor: None,
        }
    }
}
