//! # Rendering System
//!
//! The render-frame kernel of the viewport sandbox. It sits above an abstract
//! GPU device and sequences everything a frame needs:
//!
//! - **api**: the [`GpuDevice`] seam plus an in-memory headless implementation
//! - **resources**: CPU-side mesh, texture and shader payloads
//! - **cache**: bounded caches of expensive GPU objects (shaders, shadow maps,
//!   intermediate framebuffers)
//! - **queue**: deferred GPU operations produced on any thread and drained on
//!   the GPU thread
//! - **scene**: lights, instances and the per-frame batch compiler
//! - **observer**: free camera vs. view-from-light switching
//! - **strategies**: pluggable renderers and postprocessors
//! - **frame**: the per-frame orchestrator tying it all together
//!
//! ## Threading
//!
//! Exactly one thread owns the device and the orchestrator. Worker threads
//! only ever talk to the kernel through an [`OperationSubmitter`] or a
//! [`FrameControl`]; they never touch the device.

pub mod api;
pub mod cache;
pub mod frame;
pub mod observer;
pub mod queue;
pub mod resources;
pub mod scene;
pub mod strategies;

pub use api::{
    Area, Framebuffer, FramebufferDescription, FramebufferHandle, GpuDevice, HeadlessDevice,
    MeshHandle, PipelineState, ProgramHandle, RenderTarget, TextureFilter, TextureFormat,
    TextureHandle,
};
pub use frame::{FrameControl, FrameOrchestrator, FrameOutcome, RunningState};
pub use observer::{FreeCamera, Observer, ObserverState, ViewMatrices};
pub use queue::{OperationHandle, OperationQueues, OperationSubmitter, PendingOperation};
pub use scene::{Light, LightId, Scene, SceneProvider, SceneSnapshot};
pub use strategies::{PostprocessorKind, RendererKind};

use thiserror::Error;

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// A GPU operation ran before the device was initialized
    #[error("GPU not ready")]
    GpuNotReady,

    /// One-time setup or size-dependent reallocation failed
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// The device rejected a call
    #[error("Device error: {0}")]
    Device(String),

    /// A handle did not name a live device object
    #[error("Unknown {kind} handle: {handle}")]
    UnknownResource {
        /// Resource kind ("mesh", "texture", ...)
        kind: &'static str,
        /// Debug rendering of the handle
        handle: String,
    },

    /// No source is registered under the requested program name
    #[error("Shader not found: {0}")]
    ShaderNotFound(String),

    /// Too many concurrent borrows of one cache key
    #[error("Borrow limit of {limit} exceeded for {key}")]
    BorrowLimitExceeded {
        /// Debug rendering of the cache key
        key: String,
        /// Configured per-key maximum
        limit: usize,
    },

    /// A renderer or postprocessor failed
    #[error("{strategy} failed: {reason}")]
    Strategy {
        /// Strategy name
        strategy: String,
        /// Failure description
        reason: String,
    },

    /// File access failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode or encode failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Mesh payload could not be parsed or is inconsistent
    #[error("Mesh decode error: {0}")]
    MeshDecode(String),

    /// The completion side of a deferred operation went away unresolved
    #[error("Deferred operation was dropped before completing")]
    OperationDropped,

    /// Waiting on a deferred operation timed out
    #[error("Timed out waiting for deferred operation")]
    OperationTimedOut,

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl RenderError {
    /// Shorthand for strategy failures
    pub fn strategy(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Strategy {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }
}
