//! # Viewport Engine
//!
//! Render-frame kernel for an interactive 3D viewport sandbox.
//!
//! ## Features
//!
//! - **Deferred GPU work**: uploads and deletions submitted from any thread,
//!   executed on the GPU thread at the start of a frame
//! - **Resource caches**: LRU shader programs, age-evicted shadow maps and a
//!   borrow-based pool of intermediate framebuffers
//! - **Scene batching**: per-frame compilation of a scene snapshot into opaque,
//!   lit and depth-sorted translucent draw batches
//! - **Observer switching**: view the scene through any projective light
//! - **Hot-swappable strategies**: renderers and postprocessors replaced
//!   between frames without restarting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use viewport_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scene = SceneSnapshot::new()
//!         .with_light(Light::directional(1, Vec3::new(0.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 1.0));
//!     let mut viewport =
//!         FrameOrchestrator::new(HeadlessDevice::new(), ViewportConfig::default(), scene)?;
//!
//!     viewport.control().select_renderer(RendererKind::Normals);
//!     viewport.frame();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

/// Common imports for kernel users
pub mod prelude {
    pub use crate::{
        core::config::{Config, ViewportConfig},
        foundation::math::{Mat4, Mat4Ext, Quat, Vec3, Vec4},
        render::{
            scene::{Material, OwningObject, ProjectiveLight, RenderableInstance, ShadowConfig},
            FrameControl, FrameOrchestrator, FrameOutcome, GpuDevice, HeadlessDevice, Light,
            OperationSubmitter, PostprocessorKind, RenderError, RenderResult, RendererKind,
            RunningState, SceneSnapshot,
        },
    };
}
