//! Plain copy, useful as a postprocessing baseline

use super::Postprocessor;
use crate::render::api::{Framebuffer, GpuDevice};
use crate::render::cache::RenderCaches;
use crate::render::frame::FrameContext;
use crate::render::resources::builtin;
use crate::render::{RenderError, RenderResult};

/// Copies the input color attachment into the output
#[derive(Debug, Default)]
pub struct CopyPostprocessor;

impl CopyPostprocessor {
    /// Compile the copy program
    pub fn new(device: &mut dyn GpuDevice, caches: &mut RenderCaches) -> RenderResult<Self> {
        caches.program(device, builtin::COPY)?;
        Ok(Self)
    }
}

impl Postprocessor for CopyPostprocessor {
    fn name(&self) -> &str {
        "copy"
    }

    fn evaluate(
        &mut self,
        ctx: &mut FrameContext<'_>,
        input: &Framebuffer,
        output: &Framebuffer,
    ) -> RenderResult<()> {
        let color = input
            .color
            .ok_or_else(|| RenderError::strategy("copy", "input has no color attachment"))?;
        ctx.fullscreen_pass(builtin::COPY, color, output, &[])
    }

    fn close(&mut self, _device: &mut dyn GpuDevice) {}
}
