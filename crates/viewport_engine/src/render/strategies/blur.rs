//! Separable box blur

use super::Postprocessor;
use crate::foundation::math::Vec3;
use crate::render::api::{Framebuffer, FramebufferDescription, GpuDevice, UniformValue};
use crate::render::cache::RenderCaches;
use crate::render::frame::FrameContext;
use crate::render::resources::builtin;
use crate::render::{RenderError, RenderResult};

/// Blurs the input with `passes` horizontal and vertical pass pairs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurPostprocessor {
    radius: u32,
    passes: u32,
}

impl BlurPostprocessor {
    /// Compile the blur program. `passes` is clamped to at least one.
    pub fn new(
        radius: u32,
        passes: u32,
        device: &mut dyn GpuDevice,
        caches: &mut RenderCaches,
    ) -> RenderResult<Self> {
        caches.program(device, builtin::BLUR)?;
        Ok(Self {
            radius,
            passes: passes.max(1),
        })
    }

    fn pass(
        &self,
        ctx: &mut FrameContext<'_>,
        source: &Framebuffer,
        target: &Framebuffer,
        direction: Vec3,
    ) -> RenderResult<()> {
        let color = source
            .color
            .ok_or_else(|| RenderError::strategy("blur", "source has no color attachment"))?;
        let area = source.area();
        let texel = Vec3::new(
            direction.x / area.width as f32,
            direction.y / area.height as f32,
            0.0,
        );
        ctx.fullscreen_pass(
            builtin::BLUR,
            color,
            target,
            &[
                ("direction", UniformValue::Vec3(texel)),
                ("radius", UniformValue::Int(i32::try_from(self.radius).unwrap_or(i32::MAX))),
            ],
        )
    }
}

impl Postprocessor for BlurPostprocessor {
    fn name(&self) -> &str {
        "blur"
    }

    fn evaluate(
        &mut self,
        ctx: &mut FrameContext<'_>,
        input: &Framebuffer,
        output: &Framebuffer,
    ) -> RenderResult<()> {
        let scratch = FramebufferDescription::rgba(output.area(), output.description.filter);
        ctx.with_borrowed(scratch, |ctx, scratch| {
            for pass in 0..self.passes {
                let source = if pass == 0 { input } else { output };
                self.pass(ctx, source, scratch, Vec3::x())?;
                self.pass(ctx, scratch, output, Vec3::y())?;
            }
            Ok(())
        })
    }

    fn close(&mut self, _device: &mut dyn GpuDevice) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::strategies::tests::Harness;

    #[test]
    fn test_each_pass_pair_reuses_one_scratch_buffer() {
        let mut harness = Harness::new();
        let input = harness.framebuffer(true);
        let output = harness.framebuffer(false);
        let mut blur = BlurPostprocessor::new(3, 2, &mut harness.device, &mut harness.caches).unwrap();

        blur.evaluate(&mut harness.context(), &input, &output).unwrap();

        assert_eq!(
            harness.programs_drawn_into(output.target()),
            vec![builtin::BLUR, builtin::BLUR]
        );
        let scratch = FramebufferDescription::rgba(output.area(), output.description.filter);
        assert_eq!(harness.caches.framebuffers.values_for(&scratch), 1);
        assert_eq!(harness.caches.framebuffers.outstanding_borrows(), 0);
    }

    #[test]
    fn test_depth_only_input_is_rejected() {
        let mut harness = Harness::new();
        let output = harness.framebuffer(false);
        let input = harness
            .device
            .create_framebuffer(&FramebufferDescription {
                color: None,
                ..FramebufferDescription::rgba_with_depth(output.area(), output.description.filter)
            })
            .unwrap();
        let mut blur = BlurPostprocessor::new(1, 1, &mut harness.device, &mut harness.caches).unwrap();

        let result = blur.evaluate(&mut harness.context(), &input, &output);
        assert!(matches!(result, Err(RenderError::Strategy { .. })));
        assert_eq!(harness.caches.framebuffers.outstanding_borrows(), 0);
    }
}
