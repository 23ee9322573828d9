//! # Frame Orchestration
//!
//! One frame, in order:
//!
//! 1. first frame only: caches, builtin meshes, the working framebuffer and
//!    the initial strategies; failure here is permanent
//! 2. reinitialization and strategy swaps requested through [`FrameControl`]
//! 3. drain of the deferred operation queues
//! 4. pause toggle and debug dumps
//! 5. state dispatch: only `Running`, or `Paused` with a pending step, go on
//! 6. observer validation and switching
//! 7. scene compilation and the renderer
//! 8. the postprocessor, into a borrowed framebuffer
//! 9. blit to the screen and debug overlays on top
//!
//! The shadow map cache ages once per rendered frame.

pub mod collaborators;
pub mod context;
pub mod control;
pub mod orchestrator;
pub mod overlay;

#[cfg(test)]
mod tests;

pub use collaborators::{DebugImageWriter, ErrorNotifier, LogErrorNotifier, PngImageWriter};
pub use context::{BuiltinMeshes, FrameContext};
pub use control::{FrameControl, PostprocessorRequest};
pub use orchestrator::{FrameOrchestrator, FrameOutcome, RunningState};
pub use overlay::DebugOverlays;
