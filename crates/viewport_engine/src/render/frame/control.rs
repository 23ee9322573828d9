//! Cross-thread frame requests
//!
//! Every request is a single slot: a later request of the same kind
//! overwrites an earlier one that the GPU thread has not picked up yet.

use crate::render::strategies::{
    PostprocessorFactory, PostprocessorKind, RendererFactory, RendererKind,
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Requested postprocessor, `None` disables postprocessing
pub type PostprocessorRequest = Option<Box<dyn PostprocessorFactory>>;

/// Requests picked up by one frame
#[derive(Default)]
pub(crate) struct FrameRequests {
    pub toggle_pause: bool,
    pub step: bool,
    pub renderer: Option<Box<dyn RendererFactory>>,
    pub postprocessor: Option<PostprocessorRequest>,
    pub observer_next: bool,
    pub dump_shadow_maps: bool,
    pub dump_framebuffer: bool,
    pub reinitialize: bool,
}

/// Cloneable handle for steering the orchestrator from any thread
#[derive(Clone, Default)]
pub struct FrameControl {
    slots: Arc<Mutex<FrameRequests>>,
}

impl fmt::Debug for FrameControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.lock();
        f.debug_struct("FrameControl")
            .field("toggle_pause", &slots.toggle_pause)
            .field("step", &slots.step)
            .field("renderer", &slots.renderer.as_ref().map(|r| r.name()))
            .field("postprocessor_pending", &slots.postprocessor.is_some())
            .field("observer_next", &slots.observer_next)
            .field("reinitialize", &slots.reinitialize)
            .finish_non_exhaustive()
    }
}

impl FrameControl {
    /// New control with no pending requests
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrameRequests> {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Flip between running and paused. Repeated toggles before the next
    /// frame collapse into one.
    pub fn toggle_pause(&self) {
        self.lock().toggle_pause = true;
    }

    /// Render exactly one frame while paused
    pub fn step(&self) {
        self.lock().step = true;
    }

    /// Swap to a built-in renderer
    pub fn select_renderer(&self, kind: RendererKind) {
        self.select_renderer_factory(Box::new(kind));
    }

    /// Swap to a renderer built by `factory`
    pub fn select_renderer_factory(&self, factory: Box<dyn RendererFactory>) {
        log::debug!("renderer {} requested", factory.name());
        self.lock().renderer = Some(factory);
    }

    /// Swap to a built-in postprocessor, or disable postprocessing
    pub fn select_postprocessor(&self, kind: Option<PostprocessorKind>) {
        self.select_postprocessor_factory(
            kind.map(|kind| Box::new(kind) as Box<dyn PostprocessorFactory>),
        );
    }

    /// Swap to a postprocessor built by `factory`, or disable postprocessing
    pub fn select_postprocessor_factory(&self, factory: PostprocessorRequest) {
        self.lock().postprocessor = Some(factory);
    }

    /// Advance the observer to the next projective light
    pub fn request_observer_next(&self) {
        self.lock().observer_next = true;
    }

    /// Write every cached shadow map to the debug image writer
    pub fn dump_shadow_maps(&self) {
        self.lock().dump_shadow_maps = true;
    }

    /// Write the working framebuffer to the debug image writer
    pub fn dump_framebuffer(&self) {
        self.lock().dump_framebuffer = true;
    }

    /// Rebuild caches and strategies; the only way out of `Failed` besides a
    /// successful renderer swap
    pub fn reinitialize(&self) {
        self.lock().reinitialize = true;
    }

    /// Take every pending request, leaving the slots empty
    pub(crate) fn take(&self) -> FrameRequests {
        std::mem::take(&mut *self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_latest_renderer_request_wins() {
        let control = FrameControl::new();
        control.select_renderer(RendererKind::Normals);
        control.select_renderer(RendererKind::Depth);

        let requests = control.take();
        assert_eq!(requests.renderer.map(|r| r.name()), Some("Depth".to_string()));
        assert!(control.take().renderer.is_none());
    }

    #[test]
    fn test_disabling_postprocessing_is_a_request() {
        let control = FrameControl::new();
        control.select_postprocessor(Some(PostprocessorKind::Copy));
        control.select_postprocessor(None);

        assert!(matches!(control.take().postprocessor, Some(None)));
    }

    #[test]
    fn test_requests_cross_threads() {
        let control = FrameControl::new();
        let remote = control.clone();
        thread::spawn(move || {
            remote.step();
            remote.toggle_pause();
            remote.dump_framebuffer();
        })
        .join()
        .unwrap();

        let requests = control.take();
        assert!(requests.step && requests.toggle_pause && requests.dump_framebuffer);
        assert!(!requests.reinitialize);
    }
}
